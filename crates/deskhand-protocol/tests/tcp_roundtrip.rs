//! Integration test: handshake and sealed transport roundtrip on loopback.

use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream, UdpSocket};

use deskhand_protocol::message::decode_uint;
use deskhand_protocol::{Connection, DatagramChannel, ProtocolError, SessionKey};
use deskhand_types::{Event, FailureKind, PointerButton, PointerPhase, PointerSample};

#[tokio::test]
async fn handshake_and_sealed_traffic_on_loopback() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server_addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let conn = Connection::new(stream).unwrap();
        conn.accept_handshake().await.unwrap();
        assert!(conn.is_established().await);

        // Serve one request over the sealed channel
        let request = conn.recv_message().await.unwrap().unwrap();
        assert_eq!(request.event(), Some(Event::ListRequest));
        assert_eq!(request.fields(), [b"/tmp".to_vec()]);
        conn.send_message(Event::FileList, &[b"[]"]).await.unwrap();

        // Peer disconnects when it is done
        let end = conn.recv_message().await.unwrap();
        assert!(end.is_none());
    });

    let stream = TcpStream::connect(server_addr).await.unwrap();
    let conn = Connection::new(stream).unwrap();
    conn.request_handshake().await.unwrap();
    assert!(conn.is_established().await);

    conn.send_message(Event::ListRequest, &[b"/tmp"])
        .await
        .unwrap();
    let reply = conn.recv_message().await.unwrap().unwrap();
    assert_eq!(reply.event(), Some(Event::FileList));
    assert_eq!(reply.fields(), [b"[]".to_vec()]);

    conn.disconnect().await;
    server.await.unwrap();
}

#[tokio::test]
async fn garbage_session_secret_is_rejected_with_plaintext_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server_addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let conn = Connection::new(stream).unwrap();
        match conn.accept_handshake().await {
            Err(ProtocolError::KeyRecovery) => {}
            other => panic!("expected KeyRecovery, got {other:?}"),
        }
    });

    let stream = TcpStream::connect(server_addr).await.unwrap();
    let conn = Connection::new(stream).unwrap();

    // Take the public key, then answer with a well-sized but bogus secret
    let offer = conn.recv_message().await.unwrap().unwrap();
    assert_eq!(offer.event(), Some(Event::PublicKey));
    let garbage = vec![0x42u8; 92];
    conn.send_message(Event::SessionSecret, &[&garbage])
        .await
        .unwrap();

    // The rejection arrives in the clear, then the server hangs up
    let error = conn.recv_message().await.unwrap().unwrap();
    assert_eq!(error.event(), Some(Event::Failure));
    assert_eq!(
        FailureKind::from_value(decode_uint(&error.fields()[0])),
        FailureKind::FailureToSendKey
    );
    let end = conn.recv_message().await.unwrap();
    assert!(end.is_none());

    server.await.unwrap();
}

#[tokio::test]
async fn datagram_channel_roundtrip() {
    let key = SessionKey::generate().unwrap();

    let sender = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
    let receiver = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
    let target = receiver.local_addr().unwrap();

    let tx = DatagramChannel::new(sender, key.clone());
    let rx = DatagramChannel::new(receiver, key);

    let sample = PointerSample {
        phase: PointerPhase::Press,
        button: Some(PointerButton::Left),
        x: 500,
        y: 500,
    };
    tx.send_message(target, Event::InputAction, &[&sample.encode()])
        .await
        .unwrap();

    let received = rx.recv_message().await.unwrap().unwrap();
    assert_eq!(received.event(), Some(Event::InputAction));
    let decoded = PointerSample::decode(received.raw()).unwrap();
    assert_eq!(decoded, sample);
}
