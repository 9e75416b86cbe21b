//! Transport boundary.
//!
//! The pipeline only needs two things from a transport: a structured outcome
//! that separates "no response" from "response with status + body", and the
//! ability to send the same [`ApiRequest`] again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::Client;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult, TransportError};
use crate::http::request::{ApiRequest, X_REQUEST_ID};
use crate::http::response::ApiResponse;
use crate::session::credentials::CredentialStore;

/// Anything that can carry an [`ApiRequest`] to the API.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// reqwest-backed transport with bearer-token injection.
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
    credentials: Arc<dyn CredentialStore>,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig, credentials: Arc<dyn CredentialStore>) -> ClientResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .user_agent(config.api.user_agent.clone())
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {}", e)))?;

        url::Url::parse(&config.api.base_url)
            .map_err(|e| ClientError::Config(format!("invalid base URL '{}': {}", config.api.base_url, e)))?;

        Ok(Self {
            client,
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), self.url_for(&request.path))
            .header(X_REQUEST_ID, request.id.to_string());

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = self.credentials.token() {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => builder = builder.header(AUTHORIZATION, value),
                Err(_) => tracing::warn!(request_id = %request.id, "Stored token is not a valid header value, sending without it"),
            }
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;

        Ok(ApiResponse::from_bytes(status, &bytes))
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::credentials::MemoryCredentialStore;

    #[test]
    fn test_url_join() {
        let mut config = ClientConfig::default();
        config.api.base_url = "http://shop.local/api/".into();
        let transport =
            ReqwestTransport::new(&config, Arc::new(MemoryCredentialStore::new())).unwrap();
        assert_eq!(transport.url_for("/products/1"), "http://shop.local/api/products/1");
        assert_eq!(transport.url_for("cart"), "http://shop.local/api/cart");
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let mut config = ClientConfig::default();
        config.api.base_url = "not a url".into();
        let result = ReqwestTransport::new(&config, Arc::new(MemoryCredentialStore::new()));
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let mut config = ClientConfig::default();
        // Port 9 (discard) on localhost is almost never listening.
        config.api.base_url = "http://127.0.0.1:9".into();
        config.timeouts.connect_secs = 1;
        config.timeouts.request_secs = 2;
        let transport =
            ReqwestTransport::new(&config, Arc::new(MemoryCredentialStore::new())).unwrap();

        let result = transport.send(&ApiRequest::get("/products")).await;
        assert!(result.is_err());
    }
}
