//! Outbound request description.
//!
//! # Responsibilities
//! - Describe one re-issuable API call (method, path, query, JSON body)
//! - Carry a unique request ID for tracing
//! - Carry the one-shot retry marker that stops refresh loops
//!
//! # Design Decisions
//! - Requests are plain data (`Clone`); replaying is sending the same value again
//! - Credentials are not stored on the request; the transport injects the
//!   current token at send time, so a replay picks up a refreshed token

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Unique identifier attached to every outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// What role a request plays in the session protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestKind {
    /// Ordinary application call; eligible for refresh-and-replay.
    #[default]
    Normal,
    /// The token refresh call itself; never triggers recursive refresh.
    Refresh,
}

/// One outbound API call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub id: RequestId,
    pub method: Method,
    /// Path relative to the configured base URL.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub kind: RequestKind,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            id: RequestId::new(),
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            kind: RequestKind::Normal,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, serde_json::Error> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub(crate) fn refresh(path: impl Into<String>) -> Self {
        let mut req = Self::post(path);
        req.kind = RequestKind::Refresh;
        req
    }

    /// Whether this request already went through one refresh-and-replay.
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    /// Set the retry marker. Once set it is never cleared.
    pub(crate) fn mark_retried(&mut self) {
        self.retried = true;
    }

    pub fn is_refresh(&self) -> bool {
        self.kind == RequestKind::Refresh
    }
}
