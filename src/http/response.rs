//! Decoded API response.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// A response received from the API, with its body decoded as JSON.
///
/// Non-JSON bodies are carried as a JSON string; empty bodies as `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// String value of a top-level body field, if present.
    pub fn field_str(&self, field: &str) -> Option<&str> {
        self.body.get(field).and_then(Value::as_str)
    }

    /// The `success` flag used by the auth endpoints. Missing means success.
    pub fn success_flag(&self) -> bool {
        self.body.get("success").and_then(Value::as_bool).unwrap_or(true)
    }

    /// Deserialize the body into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.body)
    }

    /// Decode raw bytes the way every transport should.
    pub fn from_bytes(status: u16, bytes: &[u8]) -> Self {
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
        };
        Self { status, body }
    }
}
