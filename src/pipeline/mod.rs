//! Request pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! Application call
//!     → unload.rs (pre-send guard: Aborted if tearing down)
//!     → transport (send)
//!     → classify.rs (success / network / api / expired / reauth)
//!     → On expired credential, first time only:
//!         refresh.rs (join the single-flight cycle)
//!         → leader dispatches one refresh call
//!         → success: replay every waiter in arrival order, from one task
//!         → failure: reject every waiter with AuthExpired, then
//!           broadcast the failure to subscribers (the session coordinator)
//! ```
//!
//! # Design Decisions
//! - At most one refresh call in flight per pipeline
//! - A request is replayed at most once (retry marker)
//! - The refresh call itself never triggers a refresh
//! - The cycle runs in its own task; dropping a caller's future never strands others

pub mod classify;
pub mod client;
pub mod refresh;
pub mod unload;

pub use classify::{Fault, FaultClassifier};
pub use client::RequestPipeline;
pub use refresh::RefreshCycle;
pub use unload::UnloadGuard;
