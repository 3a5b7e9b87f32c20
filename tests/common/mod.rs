//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use wirehost::config::{ListenerConfig, ServerConfig};
use wirehost::{HttpServer, RunningServer};

/// One loopback listener on an ephemeral port, no static files, short timeouts.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listeners = vec![ListenerConfig::plain("127.0.0.1:0")];
    config.static_files.enabled = false;
    config.timeouts.read_secs = Some(2);
    config.timeouts.worker_join_secs = 1;
    config.timeouts.listener_join_secs = 2;
    config
}

pub fn test_server() -> HttpServer {
    HttpServer::new(test_config()).unwrap()
}

/// Start `server` and return it with its first bound address.
pub async fn start(server: HttpServer) -> (RunningServer, SocketAddr) {
    let running = server.start().await.unwrap();
    let addr = running.local_addrs()[0];
    (running, addr)
}

/// Send raw bytes and read everything until the server closes.
pub async fn raw_request(addr: SocketAddr, request: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();
    let mut out = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut out))
        .await
        .expect("server did not close the connection")
        .unwrap();
    String::from_utf8_lossy(&out).into_owned()
}

pub async fn get(addr: SocketAddr, path: &str) -> String {
    raw_request(addr, format!("GET {path} HTTP/1.0\r\n\r\n").as_bytes()).await
}

/// HTTP client that ignores proxy settings from the environment.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Split a response into status line, headers block and body.
pub fn split_response(text: &str) -> (&str, &str, &str) {
    let (head, body) = text.split_once("\r\n\r\n").expect("response has no header terminator");
    let (status, headers) = head.split_once("\r\n").unwrap_or((head, ""));
    (status, headers, body)
}

/// Poll `condition` for up to two seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
