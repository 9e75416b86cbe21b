//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, status is a client error)
//! - Detect ambiguous fault codes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use url::Url;

use crate::config::schema::{ClientConfig, StoreKind};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.api.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            "api.base_url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("api.base_url", e.to_string())),
    }

    let endpoints = [
        ("endpoints.login", &config.endpoints.login),
        ("endpoints.logout", &config.endpoints.logout),
        ("endpoints.refresh", &config.endpoints.refresh),
        ("endpoints.identity", &config.endpoints.identity),
    ];
    for (field, path) in endpoints {
        if !path.starts_with('/') {
            errors.push(ValidationError::new(field, "must start with '/'"));
        }
    }

    let auth = &config.auth;
    if !(400..=499).contains(&auth.unauthorized_status) {
        errors.push(ValidationError::new(
            "auth.unauthorized_status",
            "must be a 4xx status",
        ));
    }
    if auth.code_field.is_empty() {
        errors.push(ValidationError::new("auth.code_field", "must not be empty"));
    }
    if auth.expired_code.is_empty() {
        errors.push(ValidationError::new("auth.expired_code", "must not be empty"));
    }
    if auth.reauth_code.is_empty() {
        errors.push(ValidationError::new("auth.reauth_code", "must not be empty"));
    }
    if auth.expired_code == auth.reauth_code {
        errors.push(ValidationError::new(
            "auth.reauth_code",
            "must differ from auth.expired_code",
        ));
    }
    if auth.token_field.is_empty() {
        errors.push(ValidationError::new("auth.token_field", "must not be empty"));
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be > 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }

    if config.credentials.store == StoreKind::File
        && config.credentials.path.as_deref().map_or(true, str::is_empty)
    {
        errors.push(ValidationError::new(
            "credentials.path",
            "required when store = \"file\"",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
