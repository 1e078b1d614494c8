//! The deskhand server.
//!
//! Accepts encrypted client connections on the control port and routes
//! delimiter-framed events to handlers: file transfer and management,
//! shell commands, screenshots, and live control or watch sessions that
//! stream frames and accept input over dedicated side channels.

pub mod config;
pub mod control;
pub mod daemon;
pub mod error;
pub mod handlers;
pub mod registry;

pub use config::{load_config, Config};
pub use control::ControlMode;
pub use daemon::{Server, ServerAddrs};
pub use error::ServerError;
