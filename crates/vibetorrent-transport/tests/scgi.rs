//! Integration tests for the SCGI transport.
//!
//! Each test stands up a small fake daemon on a real socket (TCP on an
//! OS-assigned port, or a Unix socket inside a temp dir) and drives
//! `ScgiTransport::round_trip` against it.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use vibetorrent_transport::scgi::{self, ScgiRequest};
use vibetorrent_transport::{ScgiTransport, Transport, TransportError};

const RESPONSE: &str = "<?xml version=\"1.0\"?>\n<methodResponse><params><param><value><string>0.9.8</string></value></param></params></methodResponse>";

/// Binds a TCP listener on a random port and serves exactly one request.
///
/// The handler receives the parsed request and the raw socket so each
/// test decides how (and whether) to answer.
async fn serve_once<F, Fut>(handler: F) -> (String, tokio::task::JoinHandle<ScgiRequest>)
where
    F: FnOnce(ScgiRequest, tokio::net::TcpStream) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("should bind");
    let addr = listener.local_addr().expect("local addr").to_string();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("should accept");
        let request = scgi::read_request(&mut socket).await.expect("framed request");
        handler(request.clone(), socket).await;
        request
    });
    (addr, handle)
}

#[tokio::test]
async fn test_tcp_round_trip_strips_cgi_headers() {
    let (addr, server) = serve_once(|_, mut socket| async move {
        // rTorrent answers SCGI with CGI-style headers before the XML.
        let reply = format!(
            "Status: 200 OK\r\nContent-Type: text/xml\r\nContent-Length: {}\r\n\r\n{RESPONSE}",
            RESPONSE.len()
        );
        // Dribble it out in small pieces so the end marker spans writes.
        for chunk in reply.as_bytes().chunks(7) {
            socket.write_all(chunk).await.expect("write chunk");
            socket.flush().await.expect("flush");
            tokio::task::yield_now().await;
        }
    })
    .await;

    let transport = ScgiTransport::new(addr);
    let body = b"<?xml version=\"1.0\"?><methodCall><methodName>system.client_version</methodName><params></params></methodCall>";
    let response = transport.round_trip(body).await.expect("round trip");

    assert_eq!(response, RESPONSE.as_bytes());

    let request = server.await.expect("server task");
    assert_eq!(request.body, body);
    assert_eq!(request.header("SCGI"), Some("1"));
    assert_eq!(request.header("CONTENT_LENGTH"), Some(body.len().to_string().as_str()));
}

#[tokio::test]
async fn test_tcp_prefixed_endpoint_is_accepted() {
    let (addr, _server) = serve_once(|_, mut socket| async move {
        socket.write_all(RESPONSE.as_bytes()).await.expect("write");
    })
    .await;

    let transport = ScgiTransport::new(format!("tcp://{addr}"));
    let response = transport.round_trip(b"<methodCall/>").await.expect("round trip");
    assert_eq!(response, RESPONSE.as_bytes());
}

#[cfg(unix)]
#[tokio::test]
async fn test_unix_socket_round_trip() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("rpc.socket");
    let listener = tokio::net::UnixListener::bind(&path).expect("should bind");

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("should accept");
        let request = scgi::read_request(&mut socket).await.expect("framed request");
        socket.write_all(RESPONSE.as_bytes()).await.expect("write");
        request
    });

    let transport = ScgiTransport::new(format!("unix://{}", path.display()));
    let response = transport.round_trip(b"hello").await.expect("round trip");
    assert_eq!(response, RESPONSE.as_bytes());

    let request = server.await.expect("server task");
    assert_eq!(request.body, b"hello");
}

#[cfg(unix)]
#[tokio::test]
async fn test_missing_unix_socket_fails_to_connect() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("absent.socket");

    let transport = ScgiTransport::new(format!("unix://{}", path.display()));
    let err = transport.round_trip(b"x").await.unwrap_err();
    assert!(matches!(err, TransportError::ConnectFailed { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_refused_tcp_connect() {
    // Bind then drop so the port is (almost certainly) closed.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("should bind");
    let addr = listener.local_addr().expect("local addr").to_string();
    drop(listener);

    let err = ScgiTransport::new(addr).round_trip(b"x").await.unwrap_err();
    assert!(matches!(err, TransportError::ConnectFailed { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_silent_daemon_hits_read_timeout() {
    let (addr, _server) = serve_once(|_, socket| async move {
        // Hold the socket open without answering.
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(socket);
    })
    .await;

    let transport = ScgiTransport::new(addr).io_timeout(Duration::from_millis(100));
    let err = transport.round_trip(b"x").await.unwrap_err();
    assert!(err.is_timeout());
    assert!(matches!(err, TransportError::ReadTimeout { .. }));
}

#[tokio::test]
async fn test_daemon_hangs_up_mid_response() {
    let (addr, _server) = serve_once(|_, mut socket| async move {
        socket
            .write_all(b"<?xml version=\"1.0\"?><methodResponse><params>")
            .await
            .expect("write");
    })
    .await;

    let err = ScgiTransport::new(addr).round_trip(b"x").await.unwrap_err();
    assert!(matches!(err, TransportError::IncompleteResponse { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_daemon_hangs_up_without_answer() {
    let (addr, _server) = serve_once(|_, socket| async move {
        drop(socket);
    })
    .await;

    let err = ScgiTransport::new(addr).round_trip(b"x").await.unwrap_err();
    assert!(matches!(err, TransportError::ConnectionClosed(_)), "got {err:?}");
}

#[tokio::test]
async fn test_oversized_response_is_rejected() {
    let (addr, _server) = serve_once(|_, mut socket| async move {
        let filler = vec![b'a'; 4096];
        // Ignore write errors: the client hangs up once it gives up.
        let _ = socket.write_all(&filler).await;
    })
    .await;

    let transport = ScgiTransport::new(addr).max_response_bytes(1024);
    let err = transport.round_trip(b"x").await.unwrap_err();
    assert!(matches!(err, TransportError::ResponseTooLarge { limit: 1024 }), "got {err:?}");
}
