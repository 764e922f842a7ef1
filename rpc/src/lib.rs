//! Development bounty ledger service.
//!
//! Serves a [`bounty_ledger::DevChain`] over JSON-RPC:
//! - `POST /` with `{"action": ..}` for every ledger read and write
//! - `GET /health` for liveness
//! - `GET /metrics` for Prometheus
//!
//! A background task produces a block on a fixed interval, moving submitted
//! transactions from pending to confirmed or failed.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod server;
pub mod service;
pub mod shutdown;

pub use config::{GenesisAllocation, ServerConfig};
pub use error::RpcError;
pub use metrics::LedgerMetrics;
pub use server::{router, RpcServer};
pub use service::LedgerService;
pub use shutdown::{ShutdownController, ShutdownSignal};
