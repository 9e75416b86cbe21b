//! Single-flight refresh cycle.
//!
//! # Design Decisions
//! - One `RefreshCycle` per pipeline, shared by every clone of it
//! - "Is a refresh running?" and "start one" happen under a single lock, so
//!   exactly one caller becomes the leader no matter how many threads race
//! - Waiters are queued in arrival order and drained in the same locked
//!   transition that clears `in_progress`
//! - A drop guard performs the reset even if the cycle task is cancelled

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;

use crate::error::{ClientError, ClientResult};
use crate::http::request::ApiRequest;
use crate::http::response::ApiResponse;

/// What to do for a waiter once the refresh succeeds.
#[derive(Debug)]
pub(crate) enum Resume {
    /// Re-send this request with the new credential.
    Replay(ApiRequest),
    /// Just report the refresh outcome (proactive session refresh).
    Notify,
}

/// A caller suspended until the shared refresh completes.
#[derive(Debug)]
pub(crate) struct PendingRequest {
    pub resume: Resume,
    pub resolution: oneshot::Sender<ClientResult<ApiResponse>>,
}

impl PendingRequest {
    pub fn new(resume: Resume) -> (Self, oneshot::Receiver<ClientResult<ApiResponse>>) {
        let (resolution, rx) = oneshot::channel();
        (Self { resume, resolution }, rx)
    }

    /// Settle this waiter with a failure.
    pub fn reject(self, error: ClientError) {
        let _ = self.resolution.send(Err(error));
    }
}

/// Outcome of joining the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Join {
    /// Caller must dispatch the refresh call.
    Lead,
    /// A refresh is already in flight; the caller was queued behind it.
    Follow,
}

#[derive(Debug, Default)]
struct CycleState {
    in_progress: bool,
    queue: VecDeque<PendingRequest>,
    cycles_started: u64,
}

/// Shared state of the token renewal in flight, if any.
#[derive(Debug, Default)]
pub struct RefreshCycle {
    state: Mutex<CycleState>,
}

impl RefreshCycle {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CycleState> {
        // Every transition leaves the state consistent, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_in_progress(&self) -> bool {
        self.lock().in_progress
    }

    pub fn queue_len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Number of refresh calls dispatched over the cycle's lifetime.
    pub fn cycles_started(&self) -> u64 {
        self.lock().cycles_started
    }

    /// Queue `pending` and, if nothing is in flight, claim leadership.
    pub(crate) fn join(&self, pending: PendingRequest) -> (Join, usize) {
        let mut state = self.lock();
        state.queue.push_back(pending);
        let depth = state.queue.len();
        if state.in_progress {
            (Join::Follow, depth)
        } else {
            state.in_progress = true;
            state.cycles_started += 1;
            (Join::Lead, depth)
        }
    }

    /// Queue `pending` behind the cycle in flight. Hands it back if there is none.
    pub(crate) fn follow(&self, pending: PendingRequest) -> Result<usize, PendingRequest> {
        let mut state = self.lock();
        if !state.in_progress {
            return Err(pending);
        }
        state.queue.push_back(pending);
        Ok(state.queue.len())
    }

    /// End the cycle: clear `in_progress` and take every waiter, atomically.
    pub(crate) fn finish(&self) -> VecDeque<PendingRequest> {
        let mut state = self.lock();
        state.in_progress = false;
        std::mem::take(&mut state.queue)
    }
}

/// Ends the cycle on drop if the leader never got to complete it.
pub(crate) struct CycleGuard {
    cycle: Arc<RefreshCycle>,
    completed: bool,
}

impl CycleGuard {
    pub fn new(cycle: Arc<RefreshCycle>) -> Self {
        Self { cycle, completed: false }
    }

    /// Finish the cycle normally, handing back the waiters in arrival order.
    pub fn complete(mut self) -> VecDeque<PendingRequest> {
        self.completed = true;
        self.cycle.finish()
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        let abandoned = self.cycle.finish();
        if !abandoned.is_empty() {
            tracing::warn!(queued = abandoned.len(), "Refresh cycle abandoned, rejecting queued requests");
        }
        for pending in abandoned {
            pending.reject(ClientError::Interrupted("refresh cycle abandoned".to_string()));
        }
    }
}
