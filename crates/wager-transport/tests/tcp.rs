//! Integration tests for the TCP channel.
//!
//! Each test binds a listener on an OS-assigned port and plays the peer
//! from a spawned task, so bytes really cross a socket.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wager_transport::{TcpChannel, TransportError, read_full};

async fn listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("should bind");
    let addr = listener.local_addr().unwrap().to_string();
    (listener, addr)
}

#[tokio::test]
async fn test_write_and_read_full_round_trip() {
    let (listener, addr) = listener().await;

    let peer = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 5];
        sock.read_exact(&mut buf).await.unwrap();
        // Reply in two pieces to exercise the read loop.
        sock.write_all(b"wor").await.unwrap();
        sock.write_all(b"ld").await.unwrap();
        buf
    });

    let mut channel = TcpChannel::open(&addr).await.expect("should connect");
    assert!(channel.id().to_string().starts_with("conn-"));

    let written = channel.write_full(b"hello").await.unwrap();
    assert_eq!(written, 5);

    let mut reply = [0u8; 5];
    let read = channel.read_full(&mut reply).await.unwrap();
    assert_eq!(read, 5);
    assert_eq!(&reply, b"world");

    assert_eq!(&peer.await.unwrap(), b"hello");
}

#[tokio::test]
async fn test_read_full_peer_close_is_end_of_stream() {
    let (listener, addr) = listener().await;

    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        sock.write_all(&[0x03]).await.unwrap();
        // Dropping the socket closes it.
    });

    let mut channel = TcpChannel::open(&addr).await.unwrap();
    let mut buf = [0u8; 4];
    let err = channel.read_full(&mut buf).await.unwrap_err();

    assert!(
        matches!(err, TransportError::EndOfStream { read: 1, expected: 4 }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_close_is_idempotent_and_peer_sees_eof() {
    let (listener, addr) = listener().await;

    let peer = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut rest = Vec::new();
        sock.read_to_end(&mut rest).await.unwrap();
        rest
    });

    let mut channel = TcpChannel::open(&addr).await.unwrap();
    assert!(channel.close().await, "first close releases the socket");
    assert!(!channel.close().await, "second close is a no-op");
    assert!(channel.is_closed());

    // Peer sees a clean EOF with no bytes.
    assert!(peer.await.unwrap().is_empty());

    let err = channel.write_full(b"late").await.unwrap_err();
    assert!(matches!(err, TransportError::Closed));
}

#[tokio::test]
async fn test_lent_reader_reads_on_another_task() {
    let (listener, addr) = listener().await;

    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        sock.write_all(&[1, 2, 3]).await.unwrap();
        let mut hold = [0u8; 1];
        let _ = sock.read(&mut hold).await;
    });

    let mut channel = TcpChannel::open(&addr).await.unwrap();
    let mut reader = channel.take_reader().expect("reader available");
    assert!(channel.take_reader().is_none(), "reader is lent out");

    let (reader, buf) = tokio::spawn(async move {
        let mut buf = [0u8; 3];
        read_full(&mut reader, &mut buf).await.unwrap();
        (reader, buf)
    })
    .await
    .unwrap();
    assert_eq!(buf, [1, 2, 3]);

    channel.restore_reader(reader);
    assert!(channel.take_reader().is_some());
}

#[tokio::test]
async fn test_open_refused_is_connect_error() {
    // Grab a free port, then release it so nothing is listening.
    let (listener, addr) = listener().await;
    drop(listener);

    let err = TcpChannel::open(&addr).await.err().expect("should fail");

    assert!(
        matches!(&err, TransportError::Connect { addr: a, .. } if *a == addr),
        "got {err:?}"
    );
}
