//! HTTP Inbound Adapter
//!
//! Axum-based HTTP server that drives the transaction service.

mod handlers;
mod server;

pub use handlers::{
    ApiError, AppState, IDEMPOTENCY_KEY_HEADER, REQUEST_TIMEOUT_HEADER, request_context,
    status_for,
};
pub use server::HttpServer;
