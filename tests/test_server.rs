//! End-to-end tests: real connections against the connection handler.

use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use static_server::config::StaticFilesConfig;
use static_server::http::connection::Connection;

const INDEX_BODY: &str = "<html><body>entry document</body></html>";
const CSS_BODY: &str = "body { margin: 0; }";

fn site_root(name: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!(
        "static-server-e2e-{}-{}",
        name,
        std::process::id()
    ));
    fs::remove_dir_all(&root).ok();
    fs::create_dir_all(&root).unwrap();

    fs::write(root.join("index.html"), INDEX_BODY).unwrap();
    fs::write(root.join("style.css"), CSS_BODY).unwrap();

    root
}

async fn spawn_server(root: PathBuf, spa: bool) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((socket, _peer)) = listener.accept().await else {
                break;
            };

            let config = StaticFilesConfig {
                root: root.clone(),
                spa,
                silent: true,
            };

            tokio::spawn(async move {
                let _ = Connection::new(socket, config).run().await;
            });
        }
    });

    addr
}

/// Reads exactly one response (head + Content-Length bytes of body).
async fn read_response(stream: &mut TcpStream) -> (String, Vec<u8>) {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 1024];

    let headers_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = stream.read(&mut tmp).await.unwrap();
        assert!(n > 0, "connection closed before response head completed");
        buf.extend_from_slice(&tmp[..n]);
    };

    let head = String::from_utf8(buf[..headers_end].to_vec()).unwrap();

    let content_length = head
        .lines()
        .find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().unwrap())
        })
        .unwrap_or(0);

    let mut body = buf[headers_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut tmp).await.unwrap();
        assert!(n > 0, "connection closed before response body completed");
        body.extend_from_slice(&tmp[..n]);
    }
    body.truncate(content_length);

    (head, body)
}

async fn assert_closed(stream: &mut TcpStream) {
    let mut tmp = [0u8; 64];
    let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut tmp))
        .await
        .expect("server did not close the connection")
        .unwrap();
    assert_eq!(n, 0, "expected connection close, got more data");
}

#[tokio::test]
async fn test_serves_index_for_root_uri() {
    let addr = spawn_server(site_root("index"), false).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();

    let (head, body) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 200 OK"), "head: {head}");
    assert!(head.contains(&format!("Content-Length: {}", INDEX_BODY.len())));
    assert!(head.contains("Content-Type: text/html"));
    assert_eq!(body, INDEX_BODY.as_bytes());

    assert_closed(&mut stream).await;
}

#[tokio::test]
async fn test_traversal_gets_403_and_close() {
    let addr = spawn_server(site_root("traversal"), false).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /../secrets.txt HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    let (head, _body) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 403 Forbidden"), "head: {head}");

    assert_closed(&mut stream).await;
}

#[tokio::test]
async fn test_missing_file_gets_404_and_close() {
    let addr = spawn_server(site_root("missing"), false).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /does/not/exist HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    let (head, _body) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 404 Not Found"), "head: {head}");

    // Error responses never keep the connection alive
    assert_closed(&mut stream).await;
}

#[tokio::test]
async fn test_http11_keep_alive_across_requests() {
    let addr = spawn_server(site_root("keepalive"), false).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    let (head, body) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 200 OK"));
    assert_eq!(body, INDEX_BODY.as_bytes());

    // Same connection, second request
    stream
        .write_all(b"GET /style.css HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    let (head, body) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 200 OK"));
    assert!(head.contains("Content-Type: text/css"));
    assert_eq!(body, CSS_BODY.as_bytes());
}

#[tokio::test]
async fn test_http10_closes_by_default() {
    let addr = spawn_server(site_root("http10"), false).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.0\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    let (head, body) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.0 200 OK"), "head: {head}");
    assert_eq!(body, INDEX_BODY.as_bytes());

    assert_closed(&mut stream).await;
}

#[tokio::test]
async fn test_http10_explicit_keep_alive_is_mirrored() {
    let addr = spawn_server(site_root("http10keepalive"), false).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.0\r\nHost: localhost\r\nConnection: keep-alive\r\n\r\n")
        .await
        .unwrap();

    let (head, _body) = read_response(&mut stream).await;
    assert!(head.contains("Connection: keep-alive"), "head: {head}");

    // And the connection is actually reusable
    stream
        .write_all(b"GET /style.css HTTP/1.0\r\nHost: localhost\r\nConnection: keep-alive\r\n\r\n")
        .await
        .unwrap();
    let (head, body) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.0 200 OK"));
    assert_eq!(body, CSS_BODY.as_bytes());
}

#[tokio::test]
async fn test_spa_fallback_serves_entry_document() {
    let addr = spawn_server(site_root("spa"), true).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /anything/not/real HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    let (head, body) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 200 OK"), "head: {head}");
    assert_eq!(body, INDEX_BODY.as_bytes());
}

#[tokio::test]
async fn test_spa_existing_asset_not_rewritten() {
    let addr = spawn_server(site_root("spaasset"), true).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /style.css HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    let (head, body) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 200 OK"));
    assert!(head.contains("Content-Type: text/css"));
    assert_eq!(body, CSS_BODY.as_bytes());
}

#[tokio::test]
async fn test_request_body_is_drained_and_framing_kept() {
    let addr = spawn_server(site_root("drain"), false).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();

    // A body the server has no use for, followed by a pipelined request
    stream
        .write_all(
            b"POST / HTTP/1.1\r\nHost: localhost\r\nContent-Length: 11\r\n\r\nignore this\
              GET /style.css HTTP/1.1\r\nHost: localhost\r\n\r\n",
        )
        .await
        .unwrap();

    let (head, body) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 200 OK"));
    assert_eq!(body, INDEX_BODY.as_bytes());

    let (head, body) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 200 OK"));
    assert_eq!(body, CSS_BODY.as_bytes());
}

#[tokio::test]
async fn test_half_close_while_idle_closes_connection() {
    let addr = spawn_server(site_root("halfclose"), false).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();

    // Stop sending without ever issuing a request
    stream.shutdown().await.unwrap();

    assert_closed(&mut stream).await;
}

#[tokio::test]
async fn test_half_close_after_request_still_gets_response() {
    let addr = spawn_server(site_root("halfclose2"), false).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    stream.shutdown().await.unwrap();

    let (head, body) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 200 OK"));
    assert_eq!(body, INDEX_BODY.as_bytes());

    assert_closed(&mut stream).await;
}
