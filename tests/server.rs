//! Relay endpoint over real HTTP.

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use ajax_relay::{RelayConfig, RelayServer, Shutdown};
use common::*;
use tokio::net::TcpListener;

async fn start_server(config: RelayConfig) -> (SocketAddr, Shutdown, tokio::task::JoinHandle<()>) {
    let server = RelayServer::new(config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let handle = tokio::spawn(async move {
        server.run(listener, rx).await.unwrap();
    });
    (addr, shutdown, handle)
}

fn query(pairs: &[(&str, &str)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

#[tokio::test]
async fn test_relay_call_streams_script() {
    let upstream =
        start_simple_upstream(&["Content-Type: text/plain; charset=utf-8"], b"hi").await;
    let (addr, shutdown, _handle) = start_server(RelayConfig::default()).await;

    let target = upstream.url("/data");
    let q = query(&[
        ("object", "window.ajax[3]"),
        ("url", target.as_str()),
        ("method", "get"),
        ("header0k", "X-Trace"),
        ("header0v", "abc"),
    ]);
    let res = reqwest::get(format!("http://{addr}/proxy.js?{q}")).await.unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(
        res.headers()["content-type"],
        "text/javascript; charset=UTF-8"
    );
    assert!(res.headers().contains_key("x-request-id"));

    let body = res.text().await.unwrap();
    assert!(body.starts_with("window.ajax[3].status = 200;\n"));
    assert!(body.contains("window.ajax[3].responseText += \"hi\";\n"));
    assert!(body.ends_with(
        "window.ajax[3].readyState = window.ajax[3].DONE;\nwindow.ajax[3]._onreadystatechangeWrapper();\n"
    ));

    let request = upstream.last_request().to_ascii_lowercase();
    assert!(request.contains("x-trace: abc\r\n"));
    assert!(request.contains("x-forwarded-for: 127.0.0.1\r\n"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_failures_still_answer_200() {
    let (addr, shutdown, _handle) = start_server(RelayConfig::default()).await;

    let q = query(&[("object", "req"), ("url", "http://127.0.0.1:1/"), ("method", "PATCH")]);
    let res = reqwest::get(format!("http://{addr}/proxy.js?{q}")).await.unwrap();

    assert_eq!(res.status(), 200);
    let body = res.text().await.unwrap();
    assert!(body.starts_with("req.status = 501;\n"));
    assert!(body.ends_with("req._onreadystatechangeWrapper();\n"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_missing_object_is_bad_request() {
    let (addr, shutdown, _handle) = start_server(RelayConfig::default()).await;

    let q = query(&[("url", "http://127.0.0.1:1/"), ("method", "GET")]);
    let res = reqwest::get(format!("http://{addr}/proxy.js?{q}")).await.unwrap();
    assert_eq!(res.status(), 400);

    let q = query(&[("object", "alert(1)"), ("method", "GET")]);
    let res = reqwest::get(format!("http://{addr}/proxy.js?{q}")).await.unwrap();
    assert_eq!(res.status(), 400);

    shutdown.trigger();
}

#[tokio::test]
async fn test_client_request_id_is_echoed() {
    let (addr, shutdown, _handle) = start_server(RelayConfig::default()).await;

    let res = reqwest::Client::new()
        .get(format!("http://{addr}/proxy.js?object=req"))
        .header("x-request-id", "trace-42")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "trace-42");

    shutdown.trigger();
}

#[tokio::test]
async fn test_custom_endpoint_path() {
    let mut config = RelayConfig::default();
    config.relay.path = "/relay".to_string();
    let (addr, shutdown, _handle) = start_server(config).await;

    let res = reqwest::get(format!("http://{addr}/proxy.js?object=req")).await.unwrap();
    assert_eq!(res.status(), 404);
    let res = reqwest::get(format!("http://{addr}/relay?object=req")).await.unwrap();
    assert_eq!(res.status(), 200);

    shutdown.trigger();
}

#[tokio::test]
async fn test_graceful_shutdown() {
    let (_addr, shutdown, handle) = start_server(RelayConfig::default()).await;

    assert_eq!(shutdown.trigger(), 1);
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap();
}
