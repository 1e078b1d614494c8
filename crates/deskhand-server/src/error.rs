//! Server errors.

use deskhand_types::Event;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("malformed {event} payload: {detail}")]
    MalformedEvent { event: Event, detail: String },

    #[error("protocol error: {0}")]
    Protocol(#[from] deskhand_protocol::ProtocolError),

    #[error("input error: {0}")]
    Input(#[from] deskhand_input::InputError),

    #[error("screen error: {0}")]
    Screen(#[from] deskhand_screen::ScreenError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("listing error: {0}")]
    Listing(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ServerError {
    /// Shorthand for a malformed payload on a known event.
    pub(crate) fn malformed(event: Event, detail: impl Into<String>) -> Self {
        Self::MalformedEvent {
            event,
            detail: detail.into(),
        }
    }
}
