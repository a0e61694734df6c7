//! # sl-api
//!
//! HTTP edge for Stacklight.
//!
//! Provides the request-observation middleware (request ids, client
//! metadata, body inspection with redaction), the client log ingestion
//! endpoint, and the server assembly.

pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{ApiError, ErrorResponse};
pub use server::{ApiServer, ApiServerConfig};
pub use state::AppState;
