//! commkit: communicator core for a message-passing runtime
//!
//! This crate keeps track of communicators and the endpoint tables behind them: it derives
//! a new communicator's tables from existing ones (sharing them when nothing changes),
//! runs creation and destruction hooks, resolves incoming context ids, disables
//! any-source receives after process failures and dispatches non-blocking gathers to
//! the configured or selected algorithm.

pub mod coll;
pub mod comm;
pub mod config;
pub mod context;
pub mod core;
pub mod error;
pub mod transport;
pub mod vcrt;

// Re-exports for convenience
pub use coll::*;
pub use comm::*;
pub use config::*;
pub use context::*;
pub use crate::core::*;
pub use error::*;
pub use transport::LocalTransport;
pub use vcrt::*;
