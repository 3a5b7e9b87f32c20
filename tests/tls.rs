//! Serving over TLS listeners.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::rustls::crypto::aws_lc_rs;
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName};
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

use wirehost::config::{ServerConfig, TlsConfig};
use wirehost::HttpServer;

mod common;

use common::{eventually, start, test_config};

/// Self-signed `localhost` certificate written under `dir`.
fn write_certificate(dir: &Path) -> (TlsConfig, CertificateDer<'static>) {
    let generated = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let tls = TlsConfig {
        cert_path: dir.join("cert.pem"),
        key_path: dir.join("key.pem"),
    };
    std::fs::write(&tls.cert_path, generated.cert.pem()).unwrap();
    std::fs::write(&tls.key_path, generated.key_pair.serialize_pem()).unwrap();
    (tls, generated.cert.der().clone())
}

fn tls_config(dir: &Path) -> (ServerConfig, CertificateDer<'static>) {
    let (tls, cert) = write_certificate(dir);
    let mut config = test_config();
    config.listeners[0].tls = Some(tls);
    (config, cert)
}

fn connector(cert: CertificateDer<'static>) -> TlsConnector {
    let mut roots = RootCertStore::empty();
    roots.add(cert).unwrap();
    let config = ClientConfig::builder_with_provider(Arc::new(aws_lc_rs::default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

async fn read_after_close(stream: &mut TcpStream) -> usize {
    let mut buf = [0u8; 256];
    tokio::time::timeout(Duration::from_secs(3), stream.read(&mut buf))
        .await
        .expect("connection was not closed")
        .unwrap_or(0)
}

#[tokio::test]
async fn echo_over_tls() {
    let dir = tempfile::tempdir().unwrap();
    let (config, cert) = tls_config(dir.path());
    let mut server = HttpServer::new(config).unwrap();
    server.connect("/echo/:msg", "GET", |_, params| Ok(Some(params[0].clone().into())));
    let (running, addr) = start(server).await;

    let tcp = TcpStream::connect(addr).await.unwrap();
    let server_name = ServerName::try_from("localhost").unwrap();
    let mut stream = connector(cert).connect(server_name, tcp).await.unwrap();
    stream.write_all(b"GET /echo/over%20tls HTTP/1.0\r\n\r\n").await.unwrap();

    let mut out = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut out))
        .await
        .unwrap()
        .unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("HTTP/1.0 200 OK\r\n"), "{text}");
    assert!(text.ends_with("\r\n\r\nover tls"), "{text}");

    running.stop().await;
}

#[tokio::test]
async fn plain_http_on_tls_listener_gets_no_response() {
    let dir = tempfile::tempdir().unwrap();
    let (config, _) = tls_config(dir.path());
    let (running, addr) = start(HttpServer::new(config).unwrap()).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"GET / HTTP/1.0\r\n\r\n").await.unwrap();
    let mut out = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(3), client.read_to_end(&mut out))
        .await
        .expect("connection was not closed");
    assert!(!String::from_utf8_lossy(&out).contains("HTTP/1.0"));
    assert!(eventually(|| running.active_connections() == 0).await);

    running.stop().await;
}

#[tokio::test]
async fn silent_client_is_closed_after_read_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let (mut config, _) = tls_config(dir.path());
    config.timeouts.read_secs = Some(1);
    let (running, addr) = start(HttpServer::new(config).unwrap()).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    assert!(eventually(|| running.active_connections() == 1).await);

    let started = Instant::now();
    assert_eq!(read_after_close(&mut client).await, 0);
    assert!(started.elapsed() >= Duration::from_millis(500), "closed after {:?}", started.elapsed());
    assert!(eventually(|| running.active_connections() == 0).await);

    running.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_closes_connection_during_handshake() {
    let dir = tempfile::tempdir().unwrap();
    let (mut config, _) = tls_config(dir.path());
    config.timeouts.read_secs = None;
    let (running, addr) = start(HttpServer::new(config).unwrap()).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    assert!(eventually(|| running.active_connections() == 1).await);

    let started = Instant::now();
    running.stop().await;
    assert!(started.elapsed() < Duration::from_secs(1), "stop took {:?}", started.elapsed());

    assert_eq!(read_after_close(&mut client).await, 0);
    assert!(TcpStream::connect(addr).await.is_err());
}
