//! Wire protocol for deskhand.
//!
//! This crate handles transport framing (length-prefixed frames over TCP
//! streams and UDP datagram pairs), the delimiter-separated message codec,
//! per-connection channel encryption (X25519 handshake, AES-256-GCM
//! traffic), and the `Connection` type tying them together. Both halves of
//! the handshake live here so tests and clients can speak to a real server.

pub mod connection;
pub mod error;
pub mod frame;
pub mod message;
pub mod secure;

pub use connection::{Connection, DatagramChannel};
pub use error::ProtocolError;
pub use frame::MAX_FRAME_LEN;
pub use message::Message;
pub use secure::{seal_session_key, SecureChannel, SessionKey, PUBLIC_KEY_LEN, SESSION_KEY_LEN};
