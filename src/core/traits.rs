//! Collaborator traits for commkit.

use crate::coll::{Request, Schedule};
use crate::core::types::Endpoint;
use crate::error::Result;

/// Endpoint primitives of the point-to-point transport.
pub trait Transport: Send + Sync {
    /// Create a new handle to the same peer as `ep`.
    fn dup_endpoint(&self, ep: &Endpoint) -> Result<Endpoint> {
        Ok(ep.clone())
    }
    /// Drop one table reference to `ep`.
    fn release_endpoint(&self, ep: &Endpoint) -> Result<()>;
    /// Drop one table reference to `ep` and shut the connection down.
    fn disconnect_endpoint(&self, ep: &Endpoint) -> Result<()>;
}

/// Asynchronous progress engine.
pub trait Progress: Send + Sync {
    /// Wake blocked waiters so pending operations are re-evaluated.
    fn signal_completion(&self);
    /// Hand a built schedule to the engine and get back its request.
    fn start(&self, sched: Schedule) -> Result<Request>;
    /// Drive progress until `req` completes.
    fn wait(&self, req: &Request) -> Result<()>;
}
