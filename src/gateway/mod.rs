//! Gateway module - REST API access
//!
//! Layers, leaves first:
//! - transport: one HTTP exchange (reqwest in production)
//! - client: retry with exponential backoff, allowed-status handling
//! - payloads: typed request bodies
//! - operations: authorize / initialize / settle / cancel / credit / increase

pub mod client;
pub mod operations;
pub mod payloads;
pub mod transport;

pub use client::{Endpoint, GatewayClient, GatewayResponse, RetryPolicy};
pub use operations::{AuthorizeOutcome, InitializedTransaction, TransactionOperations};
pub use transport::{HttpTransport, ReqwestTransport};
