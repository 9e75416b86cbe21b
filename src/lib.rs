//! Authenticated HTTP session client for the storefront API.
//!
//! Every outbound call goes through a [`RequestPipeline`], which heals
//! expired access tokens with a single shared refresh and replays the
//! requests that were waiting on it. The [`SessionCoordinator`] owns the
//! logged-in identity on top of that pipeline.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod session;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult, TransportError};
pub use http::{ApiRequest, ApiResponse, Transport};
pub use pipeline::RequestPipeline;
pub use session::{Credentials, Identity, Role, SessionCoordinator, SessionState};
