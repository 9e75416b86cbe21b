//! OS signal handling.
//!
//! Ctrl-C is this client's "page unload": once it fires, the pipeline stops
//! sending, including any refresh call that would otherwise race the exit.

use std::sync::Arc;

use crate::pipeline::UnloadGuard;

/// Fire `guard` when the process receives Ctrl-C.
pub fn unload_on_ctrl_c(guard: Arc<UnloadGuard>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => guard.trigger(),
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C"),
        }
    })
}
