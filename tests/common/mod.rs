//! Shared utilities for relay integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ajax_relay::relay::{
    ClientOptions, RelayEngine, RelayOutcome, RequestCandidate, RequestValidator, ScriptWriter,
};
use ajax_relay::security::{ForwardingPolicy, UrlPolicy};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_stream::StreamExt;

pub const TEST_AGENT: &str = "relay-test/1.0";

/// One step of a scripted upstream reply.
#[derive(Clone)]
pub enum Step {
    Send(Vec<u8>),
    Pause(Duration),
    /// Keep the connection open without answering.
    Hang,
}

pub fn send(data: impl AsRef<[u8]>) -> Step {
    Step::Send(data.as_ref().to_vec())
}

pub fn pause(ms: u64) -> Step {
    Step::Pause(Duration::from_millis(ms))
}

/// A scripted upstream that records every request head (and body) it gets.
pub struct MockUpstream {
    pub addr: SocketAddr,
    pub requests: Arc<Mutex<Vec<String>>>,
}

impl MockUpstream {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> String {
        self.requests.lock().unwrap().last().cloned().expect("no request received")
    }
}

/// Start an upstream that plays `script` to every connection.
pub async fn start_upstream(script: Vec<Step>) -> MockUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = requests.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let script = script.clone();
                    let recorded = recorded.clone();
                    tokio::spawn(async move {
                        let request = read_request(&mut socket).await;
                        recorded.lock().unwrap().push(request);
                        for step in script {
                            match step {
                                Step::Send(bytes) => {
                                    if socket.write_all(&bytes).await.is_err() {
                                        return;
                                    }
                                    let _ = socket.flush().await;
                                }
                                Step::Pause(d) => tokio::time::sleep(d).await,
                                Step::Hang => tokio::time::sleep(Duration::from_secs(3600)).await,
                            }
                        }
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockUpstream { addr, requests }
}

/// Plain `200 OK` upstream with a fixed body and extra header lines.
pub async fn start_simple_upstream(headers: &[&str], body: &[u8]) -> MockUpstream {
    start_upstream(vec![send(response_bytes("200 OK", headers, body))]).await
}

pub fn response_bytes(status_line: &str, headers: &[&str], body: &[u8]) -> Vec<u8> {
    let mut out = format!("HTTP/1.1 {status_line}\r\n");
    for h in headers {
        out.push_str(h);
        out.push_str("\r\n");
    }
    out.push_str(&format!("Content-Length: {}\r\nConnection: close\r\n\r\n", body.len()));
    let mut bytes = out.into_bytes();
    bytes.extend_from_slice(body);
    bytes
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        if let Some(end) = find(&buf, b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let length = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                return String::from_utf8_lossy(&buf[..end + 4 + length]).into_owned();
            }
        }
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return String::from_utf8_lossy(&buf).into_owned(),
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub fn engine() -> RelayEngine {
    engine_with(RequestValidator::default(), Some(Duration::from_secs(5)))
}

pub fn engine_with(validator: RequestValidator, request_timeout: Option<Duration>) -> RelayEngine {
    let options = ClientOptions {
        connect_timeout: Some(Duration::from_secs(2)),
        request_timeout,
        max_redirects: 10,
    };
    RelayEngine::new(
        validator,
        ForwardingPolicy::new(TEST_AGENT, &[]).unwrap(),
        &options,
    )
    .unwrap()
}

pub fn whitelisted_engine(pattern: &str) -> RelayEngine {
    engine_with(
        RequestValidator::new(UrlPolicy::from_pattern(pattern).unwrap(), false),
        Some(Duration::from_secs(5)),
    )
}

pub fn get(url: &str) -> RequestCandidate {
    RequestCandidate {
        url: Some(url.to_string()),
        method: Some("GET".to_string()),
        ..Default::default()
    }
}

/// Everything one relay operation produced.
pub struct Captured {
    pub outcome: RelayOutcome,
    /// Flushed batches in order.
    pub batches: Vec<String>,
}

impl Captured {
    pub fn text(&self) -> String {
        self.batches.concat()
    }

    pub fn lines(&self) -> Vec<String> {
        self.text().lines().map(str::to_string).collect()
    }

    pub fn count(&self, line: &str) -> usize {
        self.lines().iter().filter(|l| *l == line).count()
    }
}

/// Run one relay operation for object `req` and collect its output.
pub async fn run_relay(engine: &RelayEngine, candidate: RequestCandidate) -> Captured {
    let (mut writer, stream) = ScriptWriter::channel("req", 16);
    let (outcome, batches) = tokio::join!(
        async move { engine.relay(candidate, &mut writer).await },
        stream
            .map(|b| String::from_utf8(b.unwrap().to_vec()).unwrap())
            .collect::<Vec<_>>(),
    );
    Captured { outcome, batches }
}

/// Assert that `expected` lines occur in `lines` in this order.
pub fn assert_in_order(lines: &[String], expected: &[&str]) {
    let mut pos = 0;
    for want in expected {
        match lines[pos..].iter().position(|l| l == want) {
            Some(i) => pos += i + 1,
            None => panic!("missing {want:?} (in order) in output:\n{}", lines.join("\n")),
        }
    }
}
