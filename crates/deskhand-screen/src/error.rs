//! Screen subsystem errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScreenError {
    #[error("capture failed: {0}")]
    Capture(String),

    #[error("encoder failed: {0}")]
    Encoder(String),

    #[error("no display available")]
    Unavailable,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
