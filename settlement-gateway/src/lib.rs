//! # Settlement Gateway
//!
//! Adapters for the `SettlementGateway` port.
//!
//! - `HttpSettlementGateway` - forwards each transaction as JSON to
//!   `POST {base_url}/transactions` on the settlement service
//! - `RecordingGateway` - acknowledges in-process and remembers what it saw;
//!   used for local runs and tests, and can be told to fail or stall

mod http;
mod recording;

pub use http::HttpSettlementGateway;
pub use recording::RecordingGateway;
