//! Protocol and transport errors.
//!
//! A peer closing its end is not an error: receive paths report it as
//! `Ok(None)`. The variants here cover transient I/O, protocol violations,
//! and handshake failures, which callers log and act on differently.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer announced a frame larger than the cap.
    #[error("frame length {len} exceeds maximum {max}")]
    FrameTooLarge { len: u32, max: u32 },

    /// The peer closed the stream in the middle of the handshake.
    #[error("peer closed during handshake")]
    HandshakeClosed,

    /// The handshake saw a different event than the exchange calls for.
    #[error("unexpected handshake event {code:?}")]
    UnexpectedHandshakeEvent { code: String },

    /// A handshake message had the wrong number or shape of fields.
    #[error("malformed handshake message")]
    MalformedHandshake,

    /// Key agreement or unsealing failed; the peer's secret is unusable.
    #[error("could not recover session key")]
    KeyRecovery,

    /// The handshake step was driven out of order.
    #[error("handshake out of order")]
    HandshakeOutOfOrder,

    /// The operation needs an established secure channel.
    #[error("secure channel not established")]
    NotEstablished,

    /// A cryptographic primitive failed internally.
    #[error("crypto operation failed")]
    Crypto,
}

impl From<ring::error::Unspecified> for ProtocolError {
    fn from(_: ring::error::Unspecified) -> Self {
        Self::Crypto
    }
}
