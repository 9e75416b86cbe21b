//! The request pipeline every outbound call goes through.

use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::http::request::ApiRequest;
use crate::http::response::ApiResponse;
use crate::http::transport::{ReqwestTransport, Transport};
use crate::observability::metrics;
use crate::pipeline::classify::{Fault, FaultClassifier};
use crate::pipeline::refresh::{CycleGuard, Join, PendingRequest, RefreshCycle, Resume};
use crate::pipeline::unload::UnloadGuard;
use crate::session::credentials::{open_store, CredentialStore};

struct PipelineInner {
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialStore>,
    classifier: FaultClassifier,
    refresh_path: String,
    token_field: String,
    cycle: Arc<RefreshCycle>,
    unload: Arc<UnloadGuard>,
    refresh_failures: broadcast::Sender<ClientError>,
}

/// Authenticated HTTP client.
///
/// Cheap to clone; clones share the transport, the credential store and the
/// refresh cycle.
#[derive(Clone)]
pub struct RequestPipeline {
    inner: Arc<PipelineInner>,
}

impl RequestPipeline {
    pub fn new(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        let (refresh_failures, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(PipelineInner {
                transport,
                credentials,
                classifier: FaultClassifier::new(&config.auth),
                refresh_path: config.endpoints.refresh.clone(),
                token_field: config.auth.token_field.clone(),
                cycle: Arc::new(RefreshCycle::new()),
                unload: Arc::new(UnloadGuard::new()),
                refresh_failures,
            }),
        }
    }

    /// Build a pipeline backed by reqwest and the configured credential store.
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        let credentials = open_store(&config.credentials)
            .map_err(|e| ClientError::Config(format!("credential store: {}", e)))?;
        let transport = ReqwestTransport::new(config, credentials.clone())?;
        Ok(Self::new(config, Arc::new(transport), credentials))
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.inner.credentials
    }

    /// Handle for firing the unload signal.
    pub fn unload_guard(&self) -> Arc<UnloadGuard> {
        self.inner.unload.clone()
    }

    /// Whether a token refresh is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        self.inner.cycle.is_in_progress()
    }

    /// Callers currently waiting on the in-flight refresh.
    pub fn queued_requests(&self) -> usize {
        self.inner.cycle.queue_len()
    }

    /// Every failed refresh, with the error its waiters were rejected with.
    ///
    /// Aborted refreshes are not reported.
    pub fn subscribe_refresh_failures(&self) -> broadcast::Receiver<ClientError> {
        self.inner.refresh_failures.subscribe()
    }

    /// Number of refresh calls this pipeline has dispatched.
    pub fn refresh_count(&self) -> u64 {
        self.inner.cycle.cycles_started()
    }

    /// Send a request, transparently healing one expired-credential fault.
    pub async fn execute(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        self.execute_observed(request, || {}).await
    }

    /// Like [`execute`](Self::execute), but `on_expired` runs if the request
    /// enters the refresh-and-replay protocol.
    pub async fn execute_observed<F>(&self, mut request: ApiRequest, on_expired: F) -> ClientResult<ApiResponse>
    where
        F: FnOnce() + Send,
    {
        match self.dispatch(&request).await {
            Ok(response) => Ok(response),
            Err(fault) if fault.is_credential_expired() && !request.is_retried() && !request.is_refresh() => {
                // Mark before anything else so a second expiry fails fast.
                request.mark_retried();
                on_expired();
                self.recover(request).await
            }
            Err(fault) => {
                if fault.is_credential_expired() {
                    tracing::warn!(request_id = %request.id, path = %request.path, "Credential expired on retried request, giving up");
                }
                Err(fault.into())
            }
        }
    }

    /// Send and decode a JSON body.
    pub async fn execute_json<T: DeserializeOwned>(&self, request: ApiRequest) -> ClientResult<T> {
        let response = self.execute(request).await?;
        response.decode().map_err(|e| ClientError::Decode(e.to_string()))
    }

    pub async fn get(&self, path: impl Into<String>) -> ClientResult<ApiResponse> {
        self.execute(ApiRequest::get(path)).await
    }

    pub async fn post_json<B: Serialize>(&self, path: impl Into<String>, body: &B) -> ClientResult<ApiResponse> {
        let request = ApiRequest::post(path)
            .json(body)
            .map_err(|e| ClientError::Encode(e.to_string()))?;
        self.execute(request).await
    }

    /// Renew the session proactively, sharing any refresh already in flight.
    pub async fn refresh_session(&self) -> ClientResult<()> {
        if self.inner.unload.is_unloading() {
            return Err(ClientError::Aborted);
        }
        let (pending, rx) = PendingRequest::new(Resume::Notify);
        self.join_cycle(pending);
        settle(rx.await).map(|_| ())
    }

    /// Wait for the refresh in flight, if any, without starting one.
    pub async fn wait_for_refresh(&self) -> ClientResult<()> {
        let (pending, rx) = PendingRequest::new(Resume::Notify);
        match self.inner.cycle.follow(pending) {
            Ok(depth) => {
                metrics::record_queue_depth(depth);
                tracing::debug!(queue_depth = depth, "Waiting for in-flight refresh");
                settle(rx.await).map(|_| ())
            }
            Err(_) => Ok(()),
        }
    }

    /// Pre-send guard, transport call, classification.
    async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse, Fault> {
        if self.inner.unload.is_unloading() {
            tracing::debug!(request_id = %request.id, path = %request.path, "Request rejected, client unloading");
            metrics::record_request("aborted");
            return Err(Fault::Aborted);
        }

        tracing::debug!(
            request_id = %request.id,
            method = %request.method,
            path = %request.path,
            retried = request.is_retried(),
            "Sending request"
        );

        let outcome = self.inner.transport.send(request).await;
        let classified = self.inner.classifier.classify(outcome);

        match &classified {
            Ok(response) => {
                tracing::debug!(request_id = %request.id, status = response.status, "Request succeeded");
                metrics::record_request("success");
            }
            Err(fault) => {
                tracing::debug!(request_id = %request.id, path = %request.path, fault = fault.label(), "Request failed");
                metrics::record_request(fault.label());
            }
        }
        classified
    }

    async fn recover(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        let (pending, rx) = PendingRequest::new(Resume::Replay(request));
        self.join_cycle(pending);
        settle(rx.await)
    }

    fn join_cycle(&self, pending: PendingRequest) {
        let (join, depth) = self.inner.cycle.join(pending);
        metrics::record_queue_depth(depth);
        match join {
            Join::Lead => {
                tracing::info!("Credential expired, starting token refresh");
                let pipeline = self.clone();
                tokio::spawn(async move { pipeline.run_cycle().await });
            }
            Join::Follow => {
                tracing::debug!(queue_depth = depth, "Refresh in flight, request queued");
            }
        }
    }

    /// Leader side of the cycle: one refresh call, then fan out the result.
    async fn run_cycle(self) {
        let guard = CycleGuard::new(self.inner.cycle.clone());
        let started = Instant::now();
        let outcome = self.refresh_token().await;
        let waiters = guard.complete();
        metrics::record_queue_depth(0);

        match outcome {
            Ok(response) => {
                metrics::record_refresh("success", started.elapsed());
                tracing::info!(replaying = waiters.len(), "Token refreshed");
                let mut replays = Vec::with_capacity(waiters.len());
                for pending in waiters {
                    let PendingRequest { resume, resolution } = pending;
                    match resume {
                        Resume::Replay(request) => {
                            metrics::record_replayed();
                            let pipeline = self.clone();
                            replays.push(async move {
                                let result = pipeline.execute(request).await;
                                let _ = resolution.send(result);
                            });
                        }
                        Resume::Notify => {
                            let _ = resolution.send(Ok(response.clone()));
                        }
                    }
                }
                // join_all polls in queue order, so each replay is handed to
                // the transport before the one queued behind it.
                join_all(replays).await;
            }
            Err(error) => {
                metrics::record_refresh("failure", started.elapsed());
                tracing::warn!(error = %error, rejecting = waiters.len(), "Token refresh failed");
                let surfaced = match error {
                    ClientError::Aborted => ClientError::Aborted,
                    other => ClientError::AuthExpired(other.to_string()),
                };
                for pending in waiters {
                    pending.reject(surfaced.clone());
                }
                if !matches!(surfaced, ClientError::Aborted) {
                    let _ = self.inner.refresh_failures.send(surfaced);
                }
            }
        }
    }

    /// The refresh primitive. Persists the new token on success.
    async fn refresh_token(&self) -> ClientResult<ApiResponse> {
        let request = ApiRequest::refresh(self.inner.refresh_path.as_str());
        let response = match self.dispatch(&request).await {
            Ok(response) => response,
            Err(Fault::Aborted) => return Err(ClientError::Aborted),
            Err(fault) => return Err(ClientError::RefreshFailed(ClientError::from(fault).to_string())),
        };

        if !response.success_flag() {
            return Err(ClientError::RefreshFailed("refresh endpoint reported failure".to_string()));
        }

        match response.field_str(&self.inner.token_field) {
            Some(token) => {
                if let Err(e) = self.inner.credentials.store(token) {
                    tracing::warn!(error = %e, "Failed to persist refreshed token");
                }
            }
            // Cookie-based deployments refresh without echoing the token.
            None => tracing::debug!("Refresh response carried no token"),
        }
        Ok(response)
    }
}

fn settle(
    received: Result<ClientResult<ApiResponse>, tokio::sync::oneshot::error::RecvError>,
) -> ClientResult<ApiResponse> {
    received.unwrap_or_else(|_| Err(ClientError::Interrupted("waiter dropped before settling".to_string())))
}

impl std::fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("refresh_path", &self.inner.refresh_path)
            .field("refreshing", &self.is_refreshing())
            .field("unloading", &self.inner.unload.is_unloading())
            .finish()
    }
}
