//! TCP connections carrying framed, optionally sealed messages.

use std::net::SocketAddr;
use std::sync::Arc;

use deskhand_types::{Event, FailureKind};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::{Mutex, RwLock};
use tracing::trace;

use crate::error::ProtocolError;
use crate::frame;
use crate::message::{encode_uint, Message};
use crate::secure::{seal_session_key, SecureChannel, SessionKey};

/// A connection to a remote peer.
///
/// Reads and writes are independently locked, so a connection can be shared
/// across tasks behind an `Arc`.
pub struct Connection {
    peer: SocketAddr,
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
    channel: RwLock<SecureChannel>,
}

impl Connection {
    /// Wrap a freshly accepted stream. Traffic is plaintext until a
    /// handshake runs.
    pub fn new(stream: TcpStream) -> Result<Self, ProtocolError> {
        Self::with_channel(stream, SecureChannel::new())
    }

    /// Wrap a stream that continues an existing session under `key`.
    pub fn established(stream: TcpStream, key: SessionKey) -> Result<Self, ProtocolError> {
        let mut channel = SecureChannel::new();
        channel.establish_with(key);
        Self::with_channel(stream, channel)
    }

    fn with_channel(stream: TcpStream, channel: SecureChannel) -> Result<Self, ProtocolError> {
        let peer = stream.peer_addr()?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            peer,
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            channel: RwLock::new(channel),
        })
    }

    /// Remote address of this connection.
    #[must_use]
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Whether a session key is active.
    pub async fn is_established(&self) -> bool {
        self.channel.read().await.is_established()
    }

    /// A clone of the active session key, once established.
    pub async fn session_key(&self) -> Option<SessionKey> {
        self.channel.read().await.session_key().cloned()
    }

    /// Adopt a session key; all traffic from here on is sealed.
    pub async fn install_session_key(&self, key: SessionKey) {
        self.channel.write().await.establish_with(key);
    }

    /// Send a raw payload, sealing it when a session key is active.
    pub async fn send_payload(&self, payload: &[u8]) -> Result<(), ProtocolError> {
        let wire = {
            let channel = self.channel.read().await;
            if channel.is_established() {
                channel.seal(payload)?
            } else {
                payload.to_vec()
            }
        };
        let mut writer = self.writer.lock().await;
        frame::write_frame(&mut *writer, &wire).await?;
        trace!(len = wire.len(), "sent frame");
        Ok(())
    }

    /// Send an event message with its fields.
    pub async fn send_message(&self, event: Event, fields: &[&[u8]]) -> Result<(), ProtocolError> {
        let mut parts: Vec<&[u8]> = Vec::with_capacity(fields.len() + 1);
        parts.push(event.code());
        parts.extend_from_slice(fields);
        self.send_payload(&Message::encode(&parts)).await
    }

    /// Send a bare `SUCC`.
    pub async fn send_success(&self) -> Result<(), ProtocolError> {
        self.send_message(Event::Success, &[]).await
    }

    /// Send an `ERRR` carrying `kind` plus optional context fields.
    pub async fn send_failure(
        &self,
        kind: FailureKind,
        context: &[&[u8]],
    ) -> Result<(), ProtocolError> {
        let value = encode_uint(u64::from(kind.value()));
        let mut fields: Vec<&[u8]> = Vec::with_capacity(context.len() + 1);
        fields.push(&value);
        fields.extend_from_slice(context);
        self.send_message(Event::Failure, &fields).await
    }

    /// Receive the next message.
    ///
    /// Returns `None` when the peer closed the stream or, once sealed, when
    /// a frame fails authentication.
    pub async fn recv_message(&self) -> Result<Option<Message>, ProtocolError> {
        let wire = {
            let mut reader = self.reader.lock().await;
            frame::read_frame(&mut *reader).await?
        };
        let Some(wire) = wire else {
            return Ok(None);
        };

        let payload = {
            let channel = self.channel.read().await;
            if channel.is_established() {
                match channel.open(&wire) {
                    Some(payload) => payload,
                    None => {
                        trace!(len = wire.len(), "dropping unauthenticated frame");
                        return Ok(None);
                    }
                }
            } else {
                wire
            }
        };

        trace!(len = payload.len(), "received message");
        Ok(Some(Message::decode(&payload)))
    }

    /// Run the server side of the key exchange.
    ///
    /// Sends the handshake public key, waits for the sealed session key,
    /// adopts it, and confirms with an encrypted `SUCC`. On failure the
    /// peer gets a plaintext `ERRR` naming the reason and the connection
    /// is shut down.
    pub async fn accept_handshake(&self) -> Result<(), ProtocolError> {
        match self.exchange_keys().await {
            Ok(()) => self.send_success().await,
            Err(err) => {
                if let Some(kind) = handshake_failure_kind(&err) {
                    let _ = self.send_failure(kind, &[]).await;
                }
                self.disconnect().await;
                Err(err)
            }
        }
    }

    async fn exchange_keys(&self) -> Result<(), ProtocolError> {
        let public_key = self.channel.write().await.begin_handshake()?;
        self.send_message(Event::PublicKey, &[&public_key]).await?;

        let message = self
            .recv_message()
            .await?
            .ok_or(ProtocolError::HandshakeClosed)?;
        if message.event() != Some(Event::SessionSecret) {
            return Err(unexpected_event(&message));
        }
        // The sealed key is random bytes and may contain separator bytes,
        // so take the unsplit remainder.
        let sealed = message.raw();
        if sealed.is_empty() {
            return Err(ProtocolError::MalformedHandshake);
        }
        self.channel.write().await.complete_handshake(sealed)
    }

    /// Run the client side of the key exchange: receive the server's public
    /// key, answer with a freshly generated session key sealed to it, and
    /// wait for the encrypted confirmation.
    pub async fn request_handshake(&self) -> Result<(), ProtocolError> {
        let message = self
            .recv_message()
            .await?
            .ok_or(ProtocolError::HandshakeClosed)?;
        if message.event() != Some(Event::PublicKey) {
            return Err(unexpected_event(&message));
        }
        // Public key bytes may contain the separator; take the unsplit
        // remainder.
        let server_public = message.raw();
        if server_public.is_empty() {
            return Err(ProtocolError::MalformedHandshake);
        }

        let key = SessionKey::generate()?;
        let sealed = seal_session_key(server_public, &key)?;
        self.send_message(Event::SessionSecret, &[&sealed]).await?;
        self.install_session_key(key).await;

        match self.recv_message().await? {
            Some(message) if message.event() == Some(Event::Success) => Ok(()),
            Some(message) => Err(unexpected_event(&message)),
            None => Err(ProtocolError::HandshakeClosed),
        }
    }

    /// Close the channel and shut the stream down. Safe to call twice.
    pub async fn disconnect(&self) {
        self.channel.write().await.close();
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }
}

fn unexpected_event(message: &Message) -> ProtocolError {
    ProtocolError::UnexpectedHandshakeEvent {
        code: String::from_utf8_lossy(message.code_bytes()).into_owned(),
    }
}

fn handshake_failure_kind(err: &ProtocolError) -> Option<FailureKind> {
    match err {
        ProtocolError::UnexpectedHandshakeEvent { .. } | ProtocolError::MalformedHandshake => {
            Some(FailureKind::CouldntVerifyKey)
        }
        ProtocolError::KeyRecovery | ProtocolError::Crypto => Some(FailureKind::FailureToSendKey),
        _ => None,
    }
}

/// Sealed messages over UDP, for the pointer channel.
pub struct DatagramChannel {
    socket: Arc<UdpSocket>,
    key: SessionKey,
}

impl DatagramChannel {
    pub fn new(socket: Arc<UdpSocket>, key: SessionKey) -> Self {
        Self { socket, key }
    }

    /// Local address of the underlying socket.
    pub fn local_addr(&self) -> Result<SocketAddr, ProtocolError> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive and unseal one datagram message.
    ///
    /// Returns `None` for truncated or unauthenticated datagrams; the
    /// channel is lossy and the caller just moves on.
    pub async fn recv_message(&self) -> Result<Option<Message>, ProtocolError> {
        let Some(wire) = frame::recv_datagram(&self.socket).await? else {
            return Ok(None);
        };
        let Some(payload) = self.key.open(&wire) else {
            trace!(len = wire.len(), "dropping unauthenticated datagram");
            return Ok(None);
        };
        Ok(Some(Message::decode(&payload)))
    }

    /// Seal and send one datagram message.
    pub async fn send_message(
        &self,
        target: SocketAddr,
        event: Event,
        fields: &[&[u8]],
    ) -> Result<(), ProtocolError> {
        let mut parts: Vec<&[u8]> = Vec::with_capacity(fields.len() + 1);
        parts.push(event.code());
        parts.extend_from_slice(fields);
        let sealed = self.key.seal(&Message::encode(&parts))?;
        frame::send_datagram(&self.socket, target, &sealed).await
    }
}
