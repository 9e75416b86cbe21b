//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Application call
//!     → request.rs (method, path, body, request ID, retry marker)
//!     → transport.rs (inject bearer token, send, decode body)
//!     → response.rs (status + JSON body)
//!     → handed back to the pipeline for fault classification
//! ```

pub mod request;
pub mod response;
pub mod transport;

pub use request::{ApiRequest, RequestId, RequestKind, X_REQUEST_ID};
pub use response::ApiResponse;
pub use transport::{ReqwestTransport, Transport};
