//! Post-response fault classification.

use serde_json::Value;

use crate::config::AuthConfig;
use crate::error::{ClientError, TransportError};
use crate::http::response::ApiResponse;

/// Why a call did not produce a usable response.
#[derive(Debug, Clone)]
pub enum Fault {
    /// Rejected by the pre-send guard; never sent.
    Aborted,
    /// No response received.
    Network(TransportError),
    /// Non-2xx response that needs no special handling.
    Api { status: u16, payload: Value },
    /// Access token expired; a refresh should fix it.
    CredentialExpired { status: u16, payload: Value },
    /// Every credential exhausted; only a new login helps.
    ReauthRequired { status: u16, payload: Value },
}

impl Fault {
    pub fn is_credential_expired(&self) -> bool {
        matches!(self, Fault::CredentialExpired { .. })
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Fault::Aborted => "aborted",
            Fault::Network(_) => "network_error",
            Fault::Api { .. } => "api_error",
            Fault::CredentialExpired { .. } => "credential_expired",
            Fault::ReauthRequired { .. } => "reauth_required",
        }
    }
}

impl From<Fault> for ClientError {
    fn from(fault: Fault) -> Self {
        match fault {
            Fault::Aborted => ClientError::Aborted,
            Fault::Network(e) => ClientError::Network(e),
            Fault::Api { status, payload } => ClientError::Api { status, payload },
            Fault::ReauthRequired { status, payload } => ClientError::ReauthRequired { status, payload },
            // Only reaches a caller when recovery is not allowed for this request.
            Fault::CredentialExpired { payload, .. } => {
                ClientError::AuthExpired(format!("credential expired again after refresh: {}", payload))
            }
        }
    }
}

/// Sorts transport outcomes into pass-through responses and faults.
#[derive(Debug, Clone)]
pub struct FaultClassifier {
    unauthorized_status: u16,
    code_field: String,
    expired_code: String,
    reauth_code: String,
}

impl FaultClassifier {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            unauthorized_status: config.unauthorized_status,
            code_field: config.code_field.clone(),
            expired_code: config.expired_code.clone(),
            reauth_code: config.reauth_code.clone(),
        }
    }

    pub fn classify(&self, outcome: Result<ApiResponse, TransportError>) -> Result<ApiResponse, Fault> {
        let response = outcome.map_err(Fault::Network)?;
        if response.is_success() {
            return Ok(response);
        }

        let ApiResponse { status, body } = response;
        if status == self.unauthorized_status {
            let code = body.get(&self.code_field).and_then(Value::as_str);
            if code == Some(self.expired_code.as_str()) {
                return Err(Fault::CredentialExpired { status, payload: body });
            }
            if code == Some(self.reauth_code.as_str()) {
                return Err(Fault::ReauthRequired { status, payload: body });
            }
        }
        Err(Fault::Api { status, payload: body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classifier() -> FaultClassifier {
        FaultClassifier::new(&AuthConfig::default())
    }

    #[test]
    fn test_success_passes_through() {
        let resp = ApiResponse::new(201, json!({"id": 9}));
        assert_eq!(classifier().classify(Ok(resp.clone())).unwrap(), resp);
    }

    #[test]
    fn test_transport_failure_is_network() {
        let fault = classifier().classify(Err(TransportError::Timeout)).unwrap_err();
        assert!(matches!(fault, Fault::Network(TransportError::Timeout)));
    }

    #[test]
    fn test_expired_vs_reauth_vs_plain_401() {
        let c = classifier();

        let expired = c.classify(Ok(ApiResponse::new(401, json!({"code": "TOKEN_EXPIRED"}))));
        assert!(expired.unwrap_err().is_credential_expired());

        let reauth = c.classify(Ok(ApiResponse::new(401, json!({"code": "REFRESH_TOKEN_EXPIRED"}))));
        assert!(matches!(reauth.unwrap_err(), Fault::ReauthRequired { status: 401, .. }));

        let plain = c.classify(Ok(ApiResponse::new(401, json!({"message": "bad password"}))));
        assert!(matches!(plain.unwrap_err(), Fault::Api { status: 401, .. }));
    }

    #[test]
    fn test_expired_code_needs_unauthorized_status() {
        let fault = classifier()
            .classify(Ok(ApiResponse::new(403, json!({"code": "TOKEN_EXPIRED"}))))
            .unwrap_err();
        assert!(matches!(fault, Fault::Api { status: 403, .. }));
    }

    #[test]
    fn test_fault_to_client_error() {
        let err: ClientError = Fault::CredentialExpired { status: 401, payload: json!({}) }.into();
        assert!(matches!(err, ClientError::AuthExpired(_)));
        let err: ClientError = Fault::Aborted.into();
        assert!(matches!(err, ClientError::Aborted));
    }
}
