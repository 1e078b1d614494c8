//! Transport framing: length-prefixed byte payloads.
//!
//! Each frame on the wire is:
//!   [4 bytes big-endian length][length bytes of payload]
//!
//! Stream transports write the two parts as one buffer and loop partial
//! reads. Datagram transports send them as two datagrams and trust datagram
//! boundaries; nothing is reassembled.

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UdpSocket;

use crate::error::ProtocolError;

/// Maximum frame payload (8 MiB). Prevents allocation bombs.
pub const MAX_FRAME_LEN: u32 = 8 * 1024 * 1024;

/// Length of the frame header.
pub const HEADER_LEN: usize = 4;

/// Write one frame to a stream transport.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let len = frame_len(payload)?;
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(payload);
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame from a stream transport.
///
/// Returns `Ok(None)` if the peer closed the stream, whether before the
/// header or mid-payload.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    if !fill(reader, &mut header).await? {
        return Ok(None);
    }

    let len = u32::from_be_bytes(header);
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }

    let mut payload = vec![0u8; len as usize];
    if !fill(reader, &mut payload).await? {
        return Ok(None);
    }
    Ok(Some(payload))
}

/// Send one frame as a length datagram followed by a payload datagram.
pub async fn send_datagram(
    socket: &UdpSocket,
    target: SocketAddr,
    payload: &[u8],
) -> Result<(), ProtocolError> {
    let len = frame_len(payload)?;
    socket.send_to(&len.to_be_bytes(), target).await?;
    socket.send_to(payload, target).await?;
    Ok(())
}

/// Receive one frame from a pair of datagrams.
///
/// Returns `Ok(None)` when the pair is malformed (short length datagram or
/// truncated payload); the channel is lossy and the caller just moves on.
pub async fn recv_datagram(socket: &UdpSocket) -> Result<Option<Vec<u8>>, ProtocolError> {
    let mut header = [0u8; HEADER_LEN];
    let (received, _) = socket.recv_from(&mut header).await?;
    if received < HEADER_LEN {
        return Ok(None);
    }

    let len = u32::from_be_bytes(header);
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }

    let mut payload = vec![0u8; len as usize];
    let (received, _) = socket.recv_from(&mut payload).await?;
    if received < payload.len() {
        return Ok(None);
    }
    Ok(Some(payload))
}

fn frame_len(payload: &[u8]) -> Result<u32, ProtocolError> {
    let len = u32::try_from(payload.len()).map_err(|_| ProtocolError::FrameTooLarge {
        len: u32::MAX,
        max: MAX_FRAME_LEN,
    })?;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }
    Ok(len)
}

/// Read until `buf` is full. `Ok(false)` means the peer closed first.
async fn fill<R>(reader: &mut R, buf: &mut [u8]) -> Result<bool, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Ok(false);
        }
        filled += n;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn roundtrip(payload: &[u8]) -> Vec<u8> {
        let (mut client, mut server) = tokio::io::duplex(64 * 1024);
        write_frame(&mut client, payload).await.unwrap();
        read_frame(&mut server).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn roundtrip_empty_frame() {
        assert_eq!(roundtrip(b"").await, b"");
    }

    #[tokio::test]
    async fn roundtrip_single_byte() {
        assert_eq!(roundtrip(b"x").await, b"x");
    }

    #[tokio::test]
    async fn roundtrip_chunk_sized_payload() {
        let payload = vec![0xA5u8; 8192];
        assert_eq!(roundtrip(&payload).await, payload);
    }

    #[tokio::test]
    async fn header_is_big_endian_length() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        write_frame(&mut client, b"hello").await.unwrap();
        let mut wire = [0u8; 9];
        server.read_exact(&mut wire).await.unwrap();
        assert_eq!(&wire[..4], &5u32.to_be_bytes());
        assert_eq!(&wire[4..], b"hello");
    }

    #[tokio::test]
    async fn close_before_header_is_end_of_stream() {
        let (client, mut server) = tokio::io::duplex(1024);
        drop(client);
        assert!(read_frame(&mut server).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn close_mid_payload_is_end_of_stream() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        client.write_all(&10u32.to_be_bytes()).await.unwrap();
        client.write_all(b"abc").await.unwrap();
        drop(client);
        assert!(read_frame(&mut server).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_length_is_a_protocol_violation() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        client
            .write_all(&(MAX_FRAME_LEN + 1).to_be_bytes())
            .await
            .unwrap();
        match read_frame(&mut server).await {
            Err(ProtocolError::FrameTooLarge { len, .. }) => {
                assert_eq!(len, MAX_FRAME_LEN + 1);
            }
            other => panic!("expected FrameTooLarge, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn datagram_roundtrip() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = server.local_addr().unwrap();

        send_datagram(&client, target, b"pointer sample").await.unwrap();
        let got = recv_datagram(&server).await.unwrap().unwrap();
        assert_eq!(got, b"pointer sample");
    }

    #[tokio::test]
    async fn datagram_zero_length_payload() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = server.local_addr().unwrap();

        send_datagram(&client, target, b"").await.unwrap();
        let got = recv_datagram(&server).await.unwrap().unwrap();
        assert!(got.is_empty());
    }
}
