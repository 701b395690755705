//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::StatusCode;
use resource_proxy::config::AppConfig;
use resource_proxy::http::PROXY_VIEW_PATH;
use resource_proxy::{HttpServer, Shutdown};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

#[allow(dead_code)]
pub const API_KEY: &str = "test-key";

/// A request as seen by the mock upstream.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
}

#[allow(dead_code)]
impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_head(&self) -> bool {
        self.method == "HEAD"
    }
}

/// Canned upstream response.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    content_length: Option<u64>,
    delay: Duration,
}

#[allow(dead_code)]
impl MockResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
            content_length: Some(0),
            delay: Duration::ZERO,
        }
    }

    /// Body with a matching `Content-Length`.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self.content_length = Some(self.body.len() as u64);
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Declare a length regardless of the body actually sent.
    pub fn declared_length(mut self, length: u64) -> Self {
        self.content_length = Some(length);
        self
    }

    /// No `Content-Length`; the body ends when the connection closes.
    pub fn without_length(mut self) -> Self {
        self.content_length = None;
        self
    }

    /// Wait before answering.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Programmable upstream on a raw TCP listener, one request per connection.
#[allow(dead_code)]
pub struct MockUpstream {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

#[allow(dead_code)]
impl MockUpstream {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&RecordedRequest) -> MockResponse + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler = Arc::new(handler);

        let recorded = requests.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let handler = handler.clone();
                let recorded = recorded.clone();
                tokio::spawn(async move {
                    if let Some((socket, request)) = read_request(socket).await {
                        recorded.lock().unwrap().push(request.clone());
                        let response = handler(&request);
                        write_response(socket, &request, response).await;
                    }
                });
            }
        });

        Self { addr, requests }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.method).collect()
    }
}

async fn read_request(socket: TcpStream) -> Option<(TcpStream, RecordedRequest)> {
    let mut reader = BufReader::new(socket);
    let mut line = String::new();
    reader.read_line(&mut line).await.ok()?;

    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut headers = Vec::new();
    loop {
        line.clear();
        reader.read_line(&mut line).await.ok()?;
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }

    Some((
        reader.into_inner(),
        RecordedRequest {
            method,
            path,
            headers,
        },
    ))
}

async fn write_response(mut socket: TcpStream, request: &RecordedRequest, response: MockResponse) {
    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    let reason = StatusCode::from_u16(response.status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown");
    let mut head = format!("HTTP/1.1 {} {}\r\n", response.status, reason);
    for (name, value) in &response.headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    if let Some(length) = response.content_length {
        head.push_str(&format!("Content-Length: {}\r\n", length));
    }
    head.push_str("Connection: close\r\n\r\n");

    let _ = socket.write_all(head.as_bytes()).await;
    if !request.is_head() {
        let _ = socket.write_all(&response.body).await;
    }
    let _ = socket.shutdown().await;
}

/// Configuration accepting [`API_KEY`].
#[allow(dead_code)]
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.auth.api_keys = vec![API_KEY.to_string()];
    config
}

/// A running proxy on an ephemeral port. Shut down on drop.
#[allow(dead_code)]
pub struct TestProxy {
    pub addr: SocketAddr,
    pub config_updates: mpsc::UnboundedSender<AppConfig>,
    client: reqwest::Client,
    shutdown: Shutdown,
}

#[allow(dead_code)]
impl TestProxy {
    pub async fn start(config: AppConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = HttpServer::new(config).unwrap();
        let shutdown = Shutdown::new();
        let signal = shutdown.subscribe();
        let (config_updates, updates_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let _ = server.run(listener, updates_rx, signal).await;
        });

        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        Self {
            addr,
            config_updates,
            client,
            shutdown,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}{}", self.addr, PROXY_VIEW_PATH)
    }

    /// Authenticated proxy request for `target`.
    pub fn proxy(&self, target: &str) -> reqwest::RequestBuilder {
        self.anonymous(target).bearer_auth(API_KEY)
    }

    /// Unauthenticated proxy request for `target`.
    pub fn anonymous(&self, target: &str) -> reqwest::RequestBuilder {
        self.client.get(self.endpoint()).query(&[("url", target)])
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}
