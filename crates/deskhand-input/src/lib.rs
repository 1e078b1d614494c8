//! Input injection seam for deskhand control sessions.
//!
//! This crate defines the [`InputInjector`] trait the pointer and keyboard
//! channels drive. Platform backends implement it; the built-in
//! [`LogInjector`] stands in on headless hosts, and the `mock` feature adds
//! a recording backend for tests.

use async_trait::async_trait;
use deskhand_types::{KeyState, PointerButton, ScrollDirection};

pub mod error;
pub mod log;
#[cfg(feature = "mock")]
pub mod mock;

pub use error::InputError;
pub use log::LogInjector;

/// Injects pointer and keyboard actions on the controlled machine.
///
/// Implementations are shared across the session's channel tasks, so all
/// methods take `&self`.
#[async_trait]
pub trait InputInjector: Send + Sync + 'static {
    /// Move the pointer to an absolute pixel position.
    async fn pointer_move(&self, x: u32, y: u32) -> Result<(), InputError>;

    /// Press a pointer button at a pixel position.
    async fn button_press(&self, button: PointerButton, x: u32, y: u32)
        -> Result<(), InputError>;

    /// Release a pointer button at a pixel position.
    async fn button_release(
        &self,
        button: PointerButton,
        x: u32,
        y: u32,
    ) -> Result<(), InputError>;

    /// Scroll at a pixel position.
    async fn scroll(&self, direction: ScrollDirection, x: u32, y: u32) -> Result<(), InputError>;

    /// Press or release a named key.
    async fn key(&self, name: &str, state: KeyState) -> Result<(), InputError>;
}
