//! Aggregated transaction statistics for XRP-Ledger-protocol networks.
//!
//! Connects to each configured network over a WebSocket transport that
//! multiplexes concurrent calls and demultiplexes push events, walks a
//! window of recently validated ledgers, tallies transaction result codes
//! and transaction types, and publishes the result both in-process and
//! through a shared on-disk store readable by an independent consumer
//! process.

pub mod aggregate;
pub mod de;
pub mod error;
pub mod fetch;
pub mod network;
pub mod protocol;
pub mod service;
pub mod snapshot;
pub mod store;
pub mod transport;

// Re-export commonly used types for convenience
pub use aggregate::{Aggregate, CategoryShare};
pub use error::Error;
pub use network::{Network, RefreshMode};
pub use service::{ServiceConfig, StatsService};
pub use snapshot::Snapshot;
pub use store::SharedStore;
pub use transport::{WsClient, WsConfig};
