//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the session client.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the session client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Storefront API location.
    pub api: ApiConfig,

    /// Logical endpoint paths, relative to `api.base_url`.
    pub endpoints: EndpointConfig,

    /// How expired-credential faults are recognised.
    pub auth: AuthConfig,

    /// Transport timeouts.
    pub timeouts: TimeoutConfig,

    /// Where the access token is persisted.
    pub credentials: CredentialConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Storefront API location.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every endpoint path is appended to.
    pub base_url: String,

    /// User-Agent sent with every request.
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            user_agent: concat!("storefront-session/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Endpoint paths consumed by the session coordinator and the refresh cycle.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub login: String,
    pub logout: String,
    pub refresh: String,
    pub identity: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            login: "/auth/login".to_string(),
            logout: "/auth/logout".to_string(),
            refresh: "/auth/refresh-token".to_string(),
            identity: "/auth/me".to_string(),
        }
    }
}

/// Authentication fault recognition.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Status code carried by credential faults.
    pub unauthorized_status: u16,

    /// Body field holding the machine-readable fault code.
    pub code_field: String,

    /// Code meaning "a refresh will fix this".
    pub expired_code: String,

    /// Code meaning "nothing will fix this, log in again".
    pub reauth_code: String,

    /// Body field holding the token in login/refresh responses.
    pub token_field: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            unauthorized_status: 401,
            code_field: "code".to_string(),
            expired_code: "TOKEN_EXPIRED".to_string(),
            reauth_code: "REFRESH_TOKEN_EXPIRED".to_string(),
            token_field: "token".to_string(),
        }
    }
}

/// Timeout configuration for outbound calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Credential store backend.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    File,
}

/// Credential persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CredentialConfig {
    /// Which store to use.
    pub store: StoreKind,

    /// Path of the token file (required for the `file` store).
    pub path: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
