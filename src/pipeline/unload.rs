//! Teardown signal for the pre-send guard.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

/// Irreversible "host is unloading" flag.
///
/// Once triggered, every request (refresh calls included) fails fast with
/// `Aborted` instead of racing the teardown. Long-running tasks can also
/// subscribe to be told when it happens.
pub struct UnloadGuard {
    unloading: AtomicBool,
    tx: broadcast::Sender<()>,
}

impl UnloadGuard {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            unloading: AtomicBool::new(false),
            tx,
        }
    }

    /// Fire the unload signal. Subsequent calls are no-ops.
    pub fn trigger(&self) {
        if !self.unloading.swap(true, Ordering::SeqCst) {
            tracing::info!("Unload signal received, rejecting new requests");
            let _ = self.tx.send(());
        }
    }

    pub fn is_unloading(&self) -> bool {
        self.unloading.load(Ordering::SeqCst)
    }

    /// Subscribe to the unload signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }
}

impl Default for UnloadGuard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_is_sticky_and_broadcast() {
        let guard = UnloadGuard::new();
        let mut rx = guard.subscribe();
        assert!(!guard.is_unloading());

        guard.trigger();
        guard.trigger();

        assert!(guard.is_unloading());
        assert!(rx.recv().await.is_ok());
        // Only one notification is ever sent.
        assert!(rx.try_recv().is_err());
    }
}
