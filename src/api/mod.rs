//! HTTP API.
//!
//! Exposes the enquiry workflow as JSON endpoints under `/api/`, protected
//! by a middleware stack: Rate Limit → Auth → Audit.
//!
//! `api_router()` returns a `Router` that can be mounted on any axum server;
//! `start_server_on()` binds and serves it.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::api_router;
pub use server::{start_server_on, ApiServer};
pub use types::ApiContext;
