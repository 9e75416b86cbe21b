//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT → UnloadGuard::trigger → every new request fails with Aborted
//! ```

pub mod signals;

pub use signals::unload_on_ctrl_c;
