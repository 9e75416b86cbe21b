//! Session coordinator: owns the current identity.

use std::sync::{Arc, Weak};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, watch, Mutex};

use crate::config::{ClientConfig, EndpointConfig};
use crate::error::{ClientError, ClientResult};
use crate::http::request::ApiRequest;
use crate::http::response::ApiResponse;
use crate::pipeline::RequestPipeline;
use crate::session::credentials::CredentialStore;
use crate::session::identity::{Identity, SessionSnapshot, SessionState};

/// Login form payload.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

struct CoordinatorInner {
    pipeline: RequestPipeline,
    endpoints: EndpointConfig,
    token_field: String,
    state: watch::Sender<SessionSnapshot>,
    /// Held for the duration of an identity fetch.
    fetching: Mutex<()>,
}

impl CoordinatorInner {
    fn publish(&self, snapshot: SessionSnapshot) {
        self.state.send_replace(snapshot);
    }

    /// Move between states without touching the identity.
    fn transition(&self, from: SessionState, to: SessionState) {
        self.state.send_if_modified(|s| {
            if s.state == from {
                s.state = to;
                true
            } else {
                false
            }
        });
    }

    /// Drop identity and credential together.
    fn clear_local(&self) {
        self.publish(SessionSnapshot::anonymous());
        if let Err(e) = self.pipeline.credentials().clear() {
            tracing::warn!(error = %e, "Failed to clear persisted credential");
        }
    }

    /// A refresh failed somewhere in the pipeline; drop a session that relied on it.
    fn expire(&self, error: &ClientError) {
        let state = self.state.borrow().state;
        if matches!(state, SessionState::Authenticated | SessionState::Refreshing) {
            tracing::info!(error = %error, "Token refresh failed, clearing session");
            self.clear_local();
        }
    }

    fn persist_token(&self, response: &ApiResponse) {
        if let Some(token) = response.field_str(&self.token_field) {
            if let Err(e) = self.pipeline.credentials().store(token) {
                tracing::warn!(error = %e, "Failed to persist credential");
            }
        }
    }
}

/// Clear the coordinator's session whenever the pipeline reports a failed
/// refresh, including refreshes started by ordinary requests.
async fn follow_refresh_failures(mut failures: broadcast::Receiver<ClientError>, inner: Weak<CoordinatorInner>) {
    loop {
        match failures.recv().await {
            Ok(error) => match inner.upgrade() {
                Some(inner) => inner.expire(&error),
                None => break,
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Refresh failure notifications lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Owns `Identity` and the login / logout / refresh operations.
///
/// Clones share state. Identity is only ever written here; everyone else
/// reads it through [`identity`](Self::identity) or [`subscribe`](Self::subscribe).
#[derive(Clone)]
pub struct SessionCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl SessionCoordinator {
    pub fn new(pipeline: RequestPipeline, config: &ClientConfig) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::anonymous());
        let failures = pipeline.subscribe_refresh_failures();
        let inner = Arc::new(CoordinatorInner {
            pipeline,
            endpoints: config.endpoints.clone(),
            token_field: config.auth.token_field.clone(),
            state,
            fetching: Mutex::new(()),
        });

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(follow_refresh_failures(failures, Arc::downgrade(&inner)));
            }
            Err(_) => tracing::warn!("No tokio runtime, pipeline refresh failures will not clear the session"),
        }

        Self { inner }
    }

    pub fn pipeline(&self) -> &RequestPipeline {
        &self.inner.pipeline
    }

    /// Reactive view of the session.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.borrow().clone()
    }

    pub fn identity(&self) -> Identity {
        self.inner.state.borrow().identity.clone()
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().state
    }

    /// Log in, persist the credential and load the identity.
    pub async fn login(&self, credentials: &Credentials) -> ClientResult<Identity> {
        self.inner.transition(SessionState::Anonymous, SessionState::Loading);

        let result = self
            .inner
            .pipeline
            .post_json(&self.inner.endpoints.login, credentials)
            .await
            .and_then(|response| {
                if response.success_flag() {
                    Ok(response)
                } else {
                    Err(ClientError::Api { status: response.status, payload: response.body })
                }
            });

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                tracing::info!(error = %e, "Login failed");
                self.inner.transition(SessionState::Loading, SessionState::Anonymous);
                return Err(e);
            }
        };

        self.inner.persist_token(&response);
        tracing::info!("Login accepted, loading identity");
        self.fetch_identity().await
    }

    /// Best-effort server logout; local state is cleared regardless.
    pub async fn logout(&self) -> ClientResult<()> {
        let result = self
            .inner
            .pipeline
            .execute(ApiRequest::post(self.inner.endpoints.logout.as_str()))
            .await;

        self.inner.clear_local();

        match result {
            Ok(_) => {
                tracing::info!("Logged out");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Server logout failed, local session cleared anyway");
                Err(e)
            }
        }
    }

    /// Load the current user.
    ///
    /// Waits out a refresh in flight before fetching. If another fetch is
    /// already running, waits for it and returns the identity it settled on.
    /// Never returns while the session is `Loading`.
    pub async fn fetch_identity(&self) -> ClientResult<Identity> {
        let _fetching = match self.inner.fetching.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::debug!("Identity fetch already in flight, waiting for it");
                let guard = self.inner.fetching.lock().await;
                // Still loading means that fetch was cancelled or a login
                // started after it settled; fetch again.
                if self.state() != SessionState::Loading {
                    return Ok(self.identity());
                }
                guard
            }
        };

        self.inner.transition(SessionState::Anonymous, SessionState::Loading);

        if let Err(e) = self.inner.pipeline.wait_for_refresh().await {
            // The fetch below settles it with whatever credential is stored now.
            tracing::debug!(error = %e, "Refresh in flight failed");
        }

        let observer = self.inner.clone();
        let result = self
            .inner
            .pipeline
            .execute_observed(ApiRequest::get(self.inner.endpoints.identity.as_str()), move || {
                observer.transition(SessionState::Authenticated, SessionState::Refreshing);
            })
            .await;

        let user = match result {
            Ok(response) => match extract_user(&response) {
                Some(user) => user,
                None => {
                    self.inner.publish(SessionSnapshot::anonymous());
                    return Err(ClientError::Api { status: response.status, payload: response.body });
                }
            },
            Err(e) => {
                tracing::info!(error = %e, "Identity fetch failed, clearing identity");
                if e.requires_login() {
                    self.inner.clear_local();
                } else {
                    self.inner.publish(SessionSnapshot::anonymous());
                }
                return Err(e);
            }
        };

        let identity = Identity::authenticated(user);
        tracing::debug!(role = ?identity.role(), "Identity loaded");
        self.inner.publish(SessionSnapshot::authenticated(identity.clone()));
        Ok(identity)
    }

    /// Proactively renew the session, joining any refresh already in flight.
    pub async fn refresh_session(&self) -> ClientResult<()> {
        self.inner.transition(SessionState::Authenticated, SessionState::Refreshing);

        match self.inner.pipeline.refresh_session().await {
            Ok(()) => {
                self.inner.transition(SessionState::Refreshing, SessionState::Authenticated);
                Ok(())
            }
            Err(ClientError::Aborted) => {
                self.inner.transition(SessionState::Refreshing, SessionState::Authenticated);
                Err(ClientError::Aborted)
            }
            Err(e) => {
                tracing::info!(error = %e, "Session refresh failed, clearing identity");
                self.inner.clear_local();
                Err(e)
            }
        }
    }

    /// Resume a persisted session, if there is one.
    pub async fn restore(&self) -> ClientResult<Option<Identity>> {
        if self.inner.pipeline.credentials().token().is_none() {
            return Ok(None);
        }
        self.fetch_identity().await.map(Some)
    }
}

/// The profile in an identity response: `{success, user}` or a bare profile.
fn extract_user(response: &ApiResponse) -> Option<Value> {
    if !response.success_flag() {
        return None;
    }
    match response.body.get("user") {
        Some(Value::Null) => None,
        Some(user) => Some(user.clone()),
        None if response.body.is_object() => Some(response.body.clone()),
        None => None,
    }
}

impl std::fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("state", &self.state())
            .field("pipeline", &self.inner.pipeline)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_user() {
        let wrapped = ApiResponse::new(200, json!({"success": true, "user": {"id": 1}}));
        assert_eq!(extract_user(&wrapped), Some(json!({"id": 1})));

        let bare = ApiResponse::new(200, json!({"id": 2, "role": "admin"}));
        assert_eq!(extract_user(&bare), Some(json!({"id": 2, "role": "admin"})));

        let null_user = ApiResponse::new(200, json!({"success": true, "user": null}));
        assert_eq!(extract_user(&null_user), None);

        let failed = ApiResponse::new(200, json!({"success": false}));
        assert_eq!(extract_user(&failed), None);
    }

    #[test]
    fn test_construction_outside_runtime() {
        let config = ClientConfig::default();
        let pipeline = RequestPipeline::from_config(&config).unwrap();
        let session = SessionCoordinator::new(pipeline, &config);
        assert_eq!(session.snapshot(), SessionSnapshot::anonymous());
    }
}
