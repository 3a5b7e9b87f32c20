//! End-to-end tests over real loopback sockets.

use std::fs;
use std::time::{Duration, Instant};

use wirehost::config::ListenerConfig;
use wirehost::{HttpServer, Response};

mod common;

use common::{get, http_client, raw_request, split_response, start, test_config, test_server};

#[tokio::test]
async fn echo_route_returns_decoded_parameter() {
    let mut server = test_server();
    server.connect("/echo/:msg", "GET", |_, params| Ok(Some(params[0].clone().into())));
    let (running, addr) = start(server).await;

    let text = get(addr, "/echo/hello%20world").await;
    assert_eq!(text, "HTTP/1.0 200 OK\r\nContent-Type: text/html\r\n\r\nhello world");

    running.stop().await;
}

#[tokio::test]
async fn conventional_client_can_talk_to_the_server() {
    let mut server = test_server();
    server.connect("/items/:id/:rev", "GET", |_, params| {
        Ok(Some(Response::new(format!("{{\"id\":\"{}\",\"rev\":\"{}\"}}", params[0], params[1]))
            .with_content_type("application/json")))
    });
    let (running, addr) = start(server).await;

    let response = http_client()
        .get(format!("http://{addr}/items/42/3?verbose=1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "application/json");
    assert_eq!(response.text().await.unwrap(), r#"{"id":"42","rev":"3"}"#);

    running.stop().await;
}

#[tokio::test]
async fn unmatched_path_gets_404() {
    let (running, addr) = start(test_server()).await;

    let text = get(addr, "/nothing/here").await;
    let (status, headers, body) = split_response(&text);
    assert_eq!(status, "HTTP/1.0 404 Not Found");
    assert_eq!(headers, "Content-Type: text/html");
    assert!(body.contains("/nothing/here"));

    running.stop().await;
}

#[tokio::test]
async fn custom_not_found_page() {
    let mut server = test_server();
    server.set_not_found_page(|url| format!("<p>no such page: {url}</p>"));
    let (running, addr) = start(server).await;

    let text = get(addr, "/gone").await;
    assert!(text.starts_with("HTTP/1.0 404 Not Found\r\n"));
    assert!(text.ends_with("<p>no such page: /gone</p>"));

    running.stop().await;
}

#[tokio::test]
async fn handler_failures_become_500_and_server_keeps_serving() {
    let mut server = test_server();
    server
        .connect("/fail", "GET", |_, _| Err("database unavailable".into()))
        .connect("/panic", "GET", |_, _| panic!("handler exploded"))
        .connect("/ok", "GET", |_, _| Ok(Some("still alive".into())));
    let (running, addr) = start(server).await;

    let failed = get(addr, "/fail").await;
    assert!(failed.starts_with("HTTP/1.0 500 Internal Server Error\r\n"));
    assert!(!failed.contains("database unavailable"));

    let panicked = get(addr, "/panic").await;
    assert!(panicked.starts_with("HTTP/1.0 500 Internal Server Error\r\n"));
    assert!(!panicked.contains("handler exploded"));

    assert!(get(addr, "/ok").await.ends_with("still alive"));
    running.stop().await;
}

#[tokio::test]
async fn handler_diagnostics_exposed_when_enabled() {
    let mut config = test_config();
    config.diagnostics.expose_handler_errors = true;
    let mut server = HttpServer::new(config).unwrap();
    server.connect("/fail", "GET", |_, _| Err("database unavailable".into()));
    let (running, addr) = start(server).await;

    let text = get(addr, "/fail").await;
    assert!(text.contains("database unavailable"));

    running.stop().await;
}

#[tokio::test]
async fn post_body_reaches_handler() {
    let mut server = test_server();
    server.connect("/upper", "POST", |body, _| {
        Ok(Some(String::from_utf8_lossy(body).to_uppercase().into()))
    });
    let (running, addr) = start(server).await;

    let text = raw_request(addr, b"POST /upper HTTP/1.0\r\nContent-Length: 11\r\n\r\nhello world").await;
    assert!(text.ends_with("\r\n\r\nHELLO WORLD"));

    running.stop().await;
}

#[tokio::test]
async fn default_handler_catches_unmatched_method_paths() {
    let mut server = test_server();
    server.set_default_handler("PUT", |path, headers, body| {
        let agent = headers.get("user-agent").unwrap_or("-");
        Ok(Some(format!("{path} {agent} {}", body.len()).into()))
    });
    let (running, addr) = start(server).await;

    let text = raw_request(
        addr,
        b"PUT /any/path?x=1 HTTP/1.0\r\nUser-Agent: tester\r\nContent-Length: 3\r\n\r\nabc",
    )
    .await;
    assert!(text.ends_with("\r\n\r\n/any/path tester 3"));

    running.stop().await;
}

#[tokio::test]
async fn malformed_request_is_closed_without_response() {
    let (running, addr) = start(test_server()).await;

    assert_eq!(raw_request(addr, b"GARBAGE\r\n\r\n").await, "");
    assert_eq!(raw_request(addr, b"GET /x HTTP/1.0\r\nContent-Length: many\r\n\r\n").await, "");

    running.stop().await;
}

#[tokio::test]
async fn oversized_body_is_refused() {
    let mut config = test_config();
    config.limits.max_body_bytes = 8;
    let mut server = HttpServer::new(config).unwrap();
    server.connect("/upload", "POST", |_, _| Ok(Some("stored".into())));
    let (running, addr) = start(server).await;

    let text = raw_request(addr, b"POST /upload HTTP/1.0\r\nContent-Length: 9\r\n\r\n").await;
    assert_eq!(text, "");

    running.stop().await;
}

#[tokio::test]
async fn every_listener_serves_the_same_routes() {
    let mut config = test_config();
    config.listeners.push(ListenerConfig::plain("127.0.0.1:0"));
    let mut server = HttpServer::new(config).unwrap();
    server.connect("/ping", "GET", |_, _| Ok(Some("pong".into())));
    let running = server.start().await.unwrap();

    for addr in running.local_addrs() {
        assert!(get(addr, "/ping").await.ends_with("pong"));
    }

    running.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_handlers_run_concurrently() {
    let mut server = test_server();
    server.connect("/slow", "GET", |_, _| {
        std::thread::sleep(Duration::from_millis(300));
        Ok(Some("done".into()))
    });
    let (running, addr) = start(server).await;

    let started = Instant::now();
    let requests: Vec<_> = (0..8).map(|_| tokio::spawn(get(addr, "/slow"))).collect();
    for request in requests {
        assert!(request.await.unwrap().ends_with("done"));
    }
    assert!(started.elapsed() < Duration::from_millis(2000), "requests were serialized");

    running.stop().await;
}

#[tokio::test]
async fn static_files_and_listing() {
    let site = tempfile::tempdir().unwrap();
    fs::create_dir_all(site.path().join("static/css")).unwrap();
    fs::write(site.path().join("static/css/site.css"), "h1 { color: red }").unwrap();
    fs::write(site.path().join("private.txt"), "hidden").unwrap();

    let mut config = test_config();
    config.static_files.enabled = true;
    config.static_files.root = site.path().to_path_buf();
    let (running, addr) = start(HttpServer::new(config).unwrap()).await;

    let css = get(addr, "/static/css/site.css").await;
    assert_eq!(css, "HTTP/1.0 200 OK\r\nContent-Type: text/css\r\n\r\nh1 { color: red }");

    let listing = get(addr, "/static/css/").await;
    assert!(listing.contains("Index of /static/css/"));
    assert!(listing.contains("site.css"));
    assert!(listing.contains(&format!("Server at {addr}")));

    let redirect = get(addr, "/static/css").await;
    assert!(redirect.contains("URL=/static/css/"));

    assert!(get(addr, "/private.txt").await.starts_with("HTTP/1.0 404 Not Found"));

    running.stop().await;
}

#[tokio::test]
async fn docs_pages_list_routes() {
    let mut server = test_server();
    server.connect_documented("/echo/:msg", "GET", "Echo a message", |_, p| Ok(Some(p[0].clone().into())));
    let (running, addr) = start(server).await;

    let body = http_client()
        .get(format!("http://{addr}/docs/json/"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    let patterns: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["pattern"].as_str().unwrap())
        .collect();
    assert_eq!(patterns, ["/echo/:msg", "/docs/", "/docs/json/"]);

    let html = get(addr, "/docs/").await;
    assert!(html.contains("Echo a message"));

    running.stop().await;
}
