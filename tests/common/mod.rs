//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Notify;

use storefront_session::config::ClientConfig;
use storefront_session::http::{ApiRequest, ApiResponse, Transport};
use storefront_session::session::{CredentialStore, MemoryCredentialStore};
use storefront_session::{RequestPipeline, SessionCoordinator, TransportError};

pub const REFRESH_PATH: &str = "/auth/refresh-token";

/// How the mock answers refresh calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    Succeed,
    Fail,
    Expired,
}

/// One call seen by the mock, with the bearer token it carried.
#[derive(Debug, Clone)]
pub struct Call {
    pub path: String,
    pub token: Option<String>,
}

/// Scripted in-process storefront API.
///
/// Tokens are valid only if they equal the current `valid_token`; refresh
/// rotates it. Refresh calls can be held on a gate to widen the window in
/// which other requests pile up behind them.
pub struct MockTransport {
    credentials: Arc<dyn CredentialStore>,
    valid_token: Mutex<Option<String>>,
    calls: Mutex<Vec<Call>>,
    refreshes: AtomicUsize,
    refresh_mode: Mutex<RefreshMode>,
    refresh_gate: Mutex<Option<Arc<Notify>>>,
    always_expired: AtomicBool,
    reauth_required: AtomicBool,
    logout_fails: AtomicBool,
    role: Mutex<String>,
}

impl MockTransport {
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            credentials,
            valid_token: Mutex::new(Some("tok-0".to_string())),
            calls: Mutex::new(Vec::new()),
            refreshes: AtomicUsize::new(0),
            refresh_mode: Mutex::new(RefreshMode::Succeed),
            refresh_gate: Mutex::new(None),
            always_expired: AtomicBool::new(false),
            reauth_required: AtomicBool::new(false),
            logout_fails: AtomicBool::new(false),
            role: Mutex::new("customer".to_string()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.path == path).count()
    }

    pub fn refresh_calls(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Invalidate every token handed out so far.
    pub fn expire_tokens(&self) {
        *self.valid_token.lock().unwrap() = None;
    }

    pub fn set_refresh_mode(&self, mode: RefreshMode) {
        *self.refresh_mode.lock().unwrap() = mode;
    }

    pub fn set_always_expired(&self, on: bool) {
        self.always_expired.store(on, Ordering::SeqCst);
    }

    pub fn set_reauth_required(&self, on: bool) {
        self.reauth_required.store(on, Ordering::SeqCst);
    }

    pub fn set_logout_fails(&self, on: bool) {
        self.logout_fails.store(on, Ordering::SeqCst);
    }

    pub fn set_role(&self, role: &str) {
        *self.role.lock().unwrap() = role.to_string();
    }

    /// Hold refresh calls until [`release_refresh`](Self::release_refresh).
    pub fn gate_refresh(&self) {
        *self.refresh_gate.lock().unwrap() = Some(Arc::new(Notify::new()));
    }

    pub fn release_refresh(&self) {
        if let Some(gate) = self.refresh_gate.lock().unwrap().take() {
            gate.notify_waiters();
            gate.notify_one();
        }
    }

    fn token_is_valid(&self, token: Option<&str>) -> bool {
        let valid = self.valid_token.lock().unwrap();
        matches!((token, valid.as_deref()), (Some(t), Some(v)) if t == v)
    }

    async fn refresh(&self) -> ApiResponse {
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        let gate = self.refresh_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let mode = *self.refresh_mode.lock().unwrap();
        match mode {
            RefreshMode::Succeed => {
                let token = format!("tok-{}", n);
                *self.valid_token.lock().unwrap() = Some(token.clone());
                ApiResponse::new(200, json!({"success": true, "token": token}))
            }
            RefreshMode::Fail => ApiResponse::new(500, json!({"success": false, "message": "refresh backend down"})),
            RefreshMode::Expired => ApiResponse::new(401, json!({"code": "TOKEN_EXPIRED"})),
        }
    }

    fn login(&self, body: Option<&Value>) -> ApiResponse {
        let password = body.and_then(|b| b.get("password")).and_then(Value::as_str);
        if password != Some("secret") {
            return ApiResponse::new(401, json!({"success": false, "message": "invalid credentials"}));
        }
        let token = "login-token".to_string();
        *self.valid_token.lock().unwrap() = Some(token.clone());
        ApiResponse::new(200, json!({"success": true, "token": token}))
    }

    fn route(&self, path: &str) -> ApiResponse {
        if path == "/auth/me" {
            let role = self.role.lock().unwrap().clone();
            return ApiResponse::new(
                200,
                json!({"success": true, "user": {"id": 7, "email": "ada@example.com", "role": role}}),
            );
        }
        if path == "/auth/logout" {
            if self.logout_fails.load(Ordering::SeqCst) {
                return ApiResponse::new(503, json!({"message": "unavailable"}));
            }
            return ApiResponse::new(200, json!({"success": true}));
        }
        if path == "/fail" {
            return ApiResponse::new(500, json!({"message": "boom"}));
        }
        if let Some(id) = path.strip_prefix("/products/") {
            return ApiResponse::new(200, json!({"id": id, "name": format!("Product {}", id)}));
        }
        ApiResponse::new(404, json!({"message": "not found"}))
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let token = self.credentials.token();
        self.calls.lock().unwrap().push(Call {
            path: request.path.clone(),
            token: token.clone(),
        });

        match request.path.as_str() {
            REFRESH_PATH => return Ok(self.refresh().await),
            "/auth/login" => return Ok(self.login(request.body.as_ref())),
            "/offline" => return Err(TransportError::Connect("connection refused".into())),
            _ => {}
        }

        if self.reauth_required.load(Ordering::SeqCst) {
            return Ok(ApiResponse::new(401, json!({"code": "REFRESH_TOKEN_EXPIRED"})));
        }
        if self.always_expired.load(Ordering::SeqCst) || !self.token_is_valid(token.as_deref()) {
            return Ok(ApiResponse::new(401, json!({"code": "TOKEN_EXPIRED"})));
        }
        Ok(self.route(&request.path))
    }
}

/// Pipeline over a mock whose current token is already stale.
pub fn stale_pipeline() -> (RequestPipeline, Arc<MockTransport>) {
    let store: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::with_token("stale"));
    let mock = Arc::new(MockTransport::new(store.clone()));
    let pipeline = RequestPipeline::new(&ClientConfig::default(), mock.clone(), store);
    (pipeline, mock)
}

/// Coordinator over a mock with no stored credential.
pub fn logged_out_session() -> (SessionCoordinator, Arc<MockTransport>) {
    let config = ClientConfig::default();
    let store: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::new());
    let mock = Arc::new(MockTransport::new(store.clone()));
    let pipeline = RequestPipeline::new(&config, mock.clone(), store);
    (SessionCoordinator::new(pipeline, &config), mock)
}

/// Poll `condition` until it holds, yielding to other tasks in between.
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// A request as seen by the programmable backend.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub request_id: Option<String>,
}

/// Start a programmable HTTP backend on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(SeenRequest) -> Fut + Send + Sync + 'static,
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
                        let Some(seen) = read_request(&mut socket).await else {
                            return;
                        };
                        let (status, body) = f(seen).await;
                        let response_str = format!(
                            "HTTP/1.1 {} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<SeenRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();

    let mut authorization = None;
    let mut request_id = None;
    let mut content_length = 0usize;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            let value = value.trim().to_string();
            match name.trim().to_ascii_lowercase().as_str() {
                "authorization" => authorization = Some(value),
                "x-request-id" => request_id = Some(value),
                "content-length" => content_length = value.parse().unwrap_or(0),
                _ => {}
            }
        }
    }

    let mut remaining = content_length.saturating_sub(buf.len() - header_end);
    while remaining > 0 {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        remaining = remaining.saturating_sub(n);
    }

    Some(SeenRequest { method, path, authorization, request_id })
}
