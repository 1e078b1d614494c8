//! Shared types for deskhand.
//!
//! This crate contains the types shared across the deskhand workspace:
//! wire event codes, failure kinds carried in error responses, pointer and
//! key input actions, and screen geometry.

pub mod event;
pub mod failure;
pub mod input;
pub mod screen;

pub use event::Event;
pub use failure::FailureKind;
pub use input::{
    InputWireError, KeyState, PointerButton, PointerPhase, PointerSample, ScrollDirection,
};
pub use screen::ScreenSize;
