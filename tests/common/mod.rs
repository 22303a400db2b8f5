//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tower::ServiceExt;

use portfolio_messages::config::ServiceConfig;
use portfolio_messages::lifecycle::Shutdown;
use portfolio_messages::messages::InMemoryMessageStore;
use portfolio_messages::notification::{MailError, MailMessage, MailTransport};
use portfolio_messages::{build_router, AppState, HttpServer};

pub const ADMIN_KEY: &str = "test-admin-key";

/// Defaults with a known admin key.
pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.admin.api_key = ADMIN_KEY.to_string();
    config
}

/// Transport that plays back scripted results, then succeeds.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<(), MailError>>>,
    fallback: Mutex<Option<MailError>>,
    sent: Mutex<Vec<MailMessage>>,
    calls: Mutex<u32>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<(), MailError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        })
    }

    /// Every call fails with `error` until the script is replaced.
    pub fn failing(error: MailError) -> Arc<Self> {
        let transport = Self::new(Vec::new());
        transport.fail_with(Some(error));
        transport
    }

    pub fn fail_with(&self, error: Option<MailError>) {
        *self.fallback.lock().unwrap() = error;
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }

    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for ScriptedTransport {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        *self.calls.lock().unwrap() += 1;
        let result = match self.script.lock().unwrap().pop_front() {
            Some(result) => result,
            None => match self.fallback.lock().unwrap().clone() {
                Some(error) => Err(error),
                None => Ok(()),
            },
        };
        if result.is_ok() {
            self.sent.lock().unwrap().push(message.clone());
        }
        result
    }
}

/// Build the application router around `transport`.
pub fn app(config: ServiceConfig, transport: Option<Arc<dyn MailTransport>>) -> (Router, AppState) {
    let state = AppState::from_config(
        config,
        transport,
        Arc::new(InMemoryMessageStore::new()),
        Arc::new(Shutdown::new()),
    );
    (build_router(state.clone()), state)
}

pub fn contact_form(client: &str) -> Request<Body> {
    Request::post("/api/messages")
        .header("content-type", "application/json")
        .header("x-forwarded-for", client)
        .body(Body::from(
            serde_json::json!({
                "senderName": "Ada Lovelace",
                "senderEmail": "ada@example.com",
                "subject": "Project enquiry",
                "message": "Are you available for a short engagement?",
            })
            .to_string(),
        ))
        .unwrap()
}

pub fn admin_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {ADMIN_KEY}"))
        .body(Body::empty())
        .unwrap()
}

pub async fn send(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn json_body(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Serve the application on an ephemeral port.
pub async fn spawn_server(state: AppState, shutdown: &Shutdown) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(state);
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });
    addr
}

/// A request received by the mock relay.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub head: String,
    pub body: String,
}

impl RelayRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }
}

/// Start a programmable mock mail relay on an ephemeral port.
pub async fn start_programmable_relay<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(RelayRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        let (status, body) = f(request).await;
                        let reason = StatusCode::from_u16(status)
                            .ok()
                            .and_then(|s| s.canonical_reason())
                            .unwrap_or("Unknown");
                        let response = format!(
                            "HTTP/1.1 {status} {reason}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                            body.len(),
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<RelayRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while buf.len() < head_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let end = buf.len().min(head_end + content_length);
    Some(RelayRequest {
        head,
        body: String::from_utf8_lossy(&buf[head_end..end]).to_string(),
    })
}
