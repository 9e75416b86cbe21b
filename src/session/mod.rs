//! Session subsystem.
//!
//! # Data Flow
//! ```text
//! UI
//!     → coordinator.rs (login / logout / fetch_identity / refresh_session)
//!     → RequestPipeline (all network I/O, including refresh)
//!     → credentials.rs (persist / clear the access token)
//!     → identity.rs (SessionSnapshot published on a watch channel)
//! ```
//!
//! # Design Decisions
//! - User and role change in one publish; no half-updated identity is observable
//! - The coordinator never implements refresh itself; it calls the pipeline
//! - Identity fetches are skipped while any refresh is in flight

pub mod coordinator;
pub mod credentials;
pub mod identity;

pub use coordinator::{Credentials, SessionCoordinator};
pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use identity::{Identity, Role, SessionSnapshot, SessionState};
