//! Channel encryption: handshake key exchange and per-message sealing.
//!
//! The server generates an ephemeral X25519 keypair and sends the public
//! key in the clear. The client answers with the 32-byte session key sealed
//! to that public key: `client_public(32) ‖ nonce(12) ‖ ciphertext+tag`,
//! where the wrapping key is HKDF-SHA256 over the X25519 shared secret.
//! Completing the agreement consumes the server's private key, so it cannot
//! outlive the handshake. All later traffic is AES-256-GCM under the
//! session key with a fresh random nonce per message.

use std::fmt;
use std::sync::Arc;

use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey};
use ring::agreement::{self, EphemeralPrivateKey, UnparsedPublicKey};
use ring::hkdf;
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::ProtocolError;

/// Session key length (AES-256).
pub const SESSION_KEY_LEN: usize = 32;

/// X25519 public key length.
pub const PUBLIC_KEY_LEN: usize = 32;

/// AES-GCM nonce length.
pub const NONCE_LEN: usize = aead::NONCE_LEN;

/// AES-GCM tag length.
pub const TAG_LEN: usize = 16;

/// HKDF info label binding the wrapping key to this exchange.
const KEY_WRAP_INFO: &[u8] = b"deskhand key wrap v1";

/// A symmetric session key with its derived AEAD state.
pub struct SessionKey {
    key: Arc<LessSafeKey>,
    raw: [u8; SESSION_KEY_LEN],
    rng: SystemRandom,
}

impl SessionKey {
    /// Build from raw key bytes.
    pub fn from_bytes(raw: [u8; SESSION_KEY_LEN]) -> Result<Self, ProtocolError> {
        let unbound = UnboundKey::new(&aead::AES_256_GCM, &raw)?;
        Ok(Self {
            key: Arc::new(LessSafeKey::new(unbound)),
            raw,
            rng: SystemRandom::new(),
        })
    }

    /// Generate a fresh random key (the client side of the handshake).
    pub fn generate() -> Result<Self, ProtocolError> {
        let rng = SystemRandom::new();
        let mut raw = [0u8; SESSION_KEY_LEN];
        rng.fill(&mut raw)?;
        Self::from_bytes(raw)
    }

    /// The raw key bytes, as sealed during the handshake.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_LEN] {
        &self.raw
    }

    /// Encrypt a payload: `nonce ‖ ciphertext ‖ tag`.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng.fill(&mut nonce_bytes)?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut sealed = Vec::with_capacity(NONCE_LEN + plaintext.len() + TAG_LEN);
        sealed.extend_from_slice(&nonce_bytes);
        let mut body = plaintext.to_vec();
        self.key
            .seal_in_place_append_tag(nonce, Aad::empty(), &mut body)?;
        sealed.extend_from_slice(&body);
        Ok(sealed)
    }

    /// Decrypt a sealed payload.
    ///
    /// Any failure — tag mismatch, truncation, a buffer too short to even
    /// hold a nonce and tag — yields `None`: an unauthenticated frame
    /// carries no message.
    #[must_use]
    pub fn open(&self, sealed: &[u8]) -> Option<Vec<u8>> {
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return None;
        }
        let (nonce_bytes, body) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes).ok()?;
        let mut body = body.to_vec();
        let plaintext_len = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut body)
            .ok()?
            .len();
        body.truncate(plaintext_len);
        Some(body)
    }
}

impl Clone for SessionKey {
    fn clone(&self) -> Self {
        Self {
            key: Arc::clone(&self.key),
            raw: self.raw,
            rng: SystemRandom::new(),
        }
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

/// Per-connection cryptographic state.
pub enum SecureChannel {
    /// No handshake yet; traffic is plaintext.
    Uninitialized,
    /// Public key sent, waiting for the sealed session key.
    AwaitingSecret {
        private_key: EphemeralPrivateKey,
        public_key: Vec<u8>,
    },
    /// Session key adopted; all traffic is sealed.
    Established { key: SessionKey },
    /// Torn down; no further traffic.
    Closed,
}

impl SecureChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::Uninitialized
    }

    /// Generate the handshake keypair and return the public key bytes to
    /// send in the clear.
    pub fn begin_handshake(&mut self) -> Result<Vec<u8>, ProtocolError> {
        if !matches!(self, Self::Uninitialized) {
            return Err(ProtocolError::HandshakeOutOfOrder);
        }
        let rng = SystemRandom::new();
        let private_key = EphemeralPrivateKey::generate(&agreement::X25519, &rng)?;
        let public_key = private_key.compute_public_key()?.as_ref().to_vec();
        *self = Self::AwaitingSecret {
            private_key,
            public_key: public_key.clone(),
        };
        Ok(public_key)
    }

    /// Recover the session key from the peer's sealed secret and adopt it.
    /// The private key is consumed by the agreement and discarded.
    pub fn complete_handshake(&mut self, sealed: &[u8]) -> Result<(), ProtocolError> {
        let state = std::mem::replace(self, Self::Closed);
        let (private_key, public_key) = match state {
            Self::AwaitingSecret {
                private_key,
                public_key,
            } => (private_key, public_key),
            other => {
                *self = other;
                return Err(ProtocolError::HandshakeOutOfOrder);
            }
        };

        if sealed.len() < PUBLIC_KEY_LEN + NONCE_LEN + TAG_LEN {
            return Err(ProtocolError::MalformedHandshake);
        }
        let (client_public, boxed) = sealed.split_at(PUBLIC_KEY_LEN);

        let peer = UnparsedPublicKey::new(&agreement::X25519, client_public);
        let wrap_key = agreement::agree_ephemeral(private_key, &peer, |shared| {
            derive_wrap_key(&public_key, client_public, shared)
        })
        .map_err(|_| ProtocolError::KeyRecovery)?
        .map_err(|_| ProtocolError::KeyRecovery)?;

        let wrap = SessionKey::from_bytes(wrap_key)?;
        let recovered = wrap.open(boxed).ok_or(ProtocolError::KeyRecovery)?;
        let raw: [u8; SESSION_KEY_LEN] = recovered
            .try_into()
            .map_err(|_| ProtocolError::KeyRecovery)?;

        *self = Self::Established {
            key: SessionKey::from_bytes(raw)?,
        };
        Ok(())
    }

    /// Adopt an already-known session key (the client side, and the
    /// auxiliary channels that reuse an existing connection's key).
    pub fn establish_with(&mut self, key: SessionKey) {
        *self = Self::Established { key };
    }

    #[must_use]
    pub fn is_established(&self) -> bool {
        matches!(self, Self::Established { .. })
    }

    /// The session key, once established.
    #[must_use]
    pub fn session_key(&self) -> Option<&SessionKey> {
        match self {
            Self::Established { key } => Some(key),
            _ => None,
        }
    }

    /// Encrypt a payload for the wire.
    pub fn seal(&self, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        match self {
            Self::Established { key } => key.seal(payload),
            _ => Err(ProtocolError::NotEstablished),
        }
    }

    /// Decrypt a wire payload; `None` on any authentication failure.
    #[must_use]
    pub fn open(&self, sealed: &[u8]) -> Option<Vec<u8>> {
        match self {
            Self::Established { key } => key.open(sealed),
            _ => None,
        }
    }

    pub fn close(&mut self) {
        *self = Self::Closed;
    }

    /// State name for logs.
    #[must_use]
    pub fn state_name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::AwaitingSecret { .. } => "awaiting secret",
            Self::Established { .. } => "established",
            Self::Closed => "closed",
        }
    }
}

impl Default for SecureChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SecureChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureChannel({})", self.state_name())
    }
}

/// Seal a session key to a server's handshake public key (the client half
/// of the exchange).
pub fn seal_session_key(
    server_public: &[u8],
    session_key: &SessionKey,
) -> Result<Vec<u8>, ProtocolError> {
    let rng = SystemRandom::new();
    let private_key = EphemeralPrivateKey::generate(&agreement::X25519, &rng)?;
    let client_public = private_key.compute_public_key()?;

    let peer = UnparsedPublicKey::new(&agreement::X25519, server_public.to_vec());
    let wrap_key = agreement::agree_ephemeral(private_key, &peer, |shared| {
        derive_wrap_key(server_public, client_public.as_ref(), shared)
    })
    .map_err(|_| ProtocolError::KeyRecovery)?
    .map_err(|_| ProtocolError::KeyRecovery)?;

    let wrap = SessionKey::from_bytes(wrap_key)?;
    let mut sealed = client_public.as_ref().to_vec();
    sealed.extend_from_slice(&wrap.seal(session_key.as_bytes())?);
    Ok(sealed)
}

/// HKDF-SHA256 over the shared secret, salted with the server public key
/// and bound to the client public key.
fn derive_wrap_key(
    server_public: &[u8],
    client_public: &[u8],
    shared: &[u8],
) -> Result<[u8; SESSION_KEY_LEN], ring::error::Unspecified> {
    let prk = hkdf::Salt::new(hkdf::HKDF_SHA256, server_public).extract(shared);
    let info = [KEY_WRAP_INFO, client_public];
    let okm = prk.expand(&info, hkdf::HKDF_SHA256)?;
    let mut out = [0u8; SESSION_KEY_LEN];
    okm.fill(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_roundtrip() {
        let key = SessionKey::generate().unwrap();
        let sealed = key.seal(b"the quick brown fox").unwrap();
        assert_eq!(key.open(&sealed).unwrap(), b"the quick brown fox");
    }

    #[test]
    fn sealed_payloads_differ_per_message() {
        let key = SessionKey::generate().unwrap();
        let a = key.seal(b"same plaintext").unwrap();
        let b = key.seal(b"same plaintext").unwrap();
        assert_ne!(a, b, "nonces must not repeat");
    }

    #[test]
    fn tampered_ciphertext_yields_no_data() {
        let key = SessionKey::generate().unwrap();
        let mut sealed = key.seal(b"payload").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(key.open(&sealed).is_none());
    }

    #[test]
    fn tampered_nonce_yields_no_data() {
        let key = SessionKey::generate().unwrap();
        let mut sealed = key.seal(b"payload").unwrap();
        sealed[0] ^= 0x01;
        assert!(key.open(&sealed).is_none());
    }

    #[test]
    fn truncated_or_short_buffers_yield_no_data() {
        let key = SessionKey::generate().unwrap();
        let sealed = key.seal(b"payload").unwrap();
        assert!(key.open(&sealed[..sealed.len() - 1]).is_none());
        assert!(key.open(b"short").is_none());
        assert!(key.open(b"").is_none());
    }

    #[test]
    fn wrong_key_yields_no_data() {
        let key = SessionKey::generate().unwrap();
        let other = SessionKey::generate().unwrap();
        let sealed = key.seal(b"payload").unwrap();
        assert!(other.open(&sealed).is_none());
    }

    #[test]
    fn empty_plaintext_roundtrip() {
        let key = SessionKey::generate().unwrap();
        let sealed = key.seal(b"").unwrap();
        assert_eq!(sealed.len(), NONCE_LEN + TAG_LEN);
        assert_eq!(key.open(&sealed).unwrap(), b"");
    }

    #[test]
    fn handshake_establishes_matching_keys() {
        let mut server = SecureChannel::new();
        let server_public = server.begin_handshake().unwrap();

        let client_key = SessionKey::generate().unwrap();
        let sealed = seal_session_key(&server_public, &client_key).unwrap();
        server.complete_handshake(&sealed).unwrap();
        assert!(server.is_established());

        // Traffic sealed by one side opens on the other.
        let from_server = server.seal(b"hello client").unwrap();
        assert_eq!(client_key.open(&from_server).unwrap(), b"hello client");
        let from_client = client_key.seal(b"hello server").unwrap();
        assert_eq!(server.open(&from_client).unwrap(), b"hello server");
    }

    #[test]
    fn garbage_secret_fails_key_recovery() {
        let mut server = SecureChannel::new();
        let _ = server.begin_handshake().unwrap();
        let garbage = vec![0x42u8; PUBLIC_KEY_LEN + NONCE_LEN + TAG_LEN + 32];
        match server.complete_handshake(&garbage) {
            Err(ProtocolError::KeyRecovery) => {}
            other => panic!("expected KeyRecovery, got {other:?}"),
        }
    }

    #[test]
    fn short_secret_is_malformed() {
        let mut server = SecureChannel::new();
        let _ = server.begin_handshake().unwrap();
        match server.complete_handshake(b"way too short") {
            Err(ProtocolError::MalformedHandshake) => {}
            other => panic!("expected MalformedHandshake, got {other:?}"),
        }
    }

    #[test]
    fn handshake_steps_out_of_order_are_rejected() {
        let mut channel = SecureChannel::new();
        assert!(matches!(
            channel.complete_handshake(&[0u8; 128]),
            Err(ProtocolError::HandshakeOutOfOrder)
        ));

        let _ = channel.begin_handshake().unwrap();
        assert!(matches!(
            channel.begin_handshake(),
            Err(ProtocolError::HandshakeOutOfOrder)
        ));
    }

    #[test]
    fn unestablished_channel_seals_nothing() {
        let channel = SecureChannel::new();
        assert!(matches!(
            channel.seal(b"data"),
            Err(ProtocolError::NotEstablished)
        ));
        assert!(channel.open(b"data").is_none());
    }
}
