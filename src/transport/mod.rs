//! Transport and progress backends.
//!
//! [`LocalTransport`] is an in-process implementation of both collaborator traits. It
//! moves no data: it keeps counters of every call, closes connections on disconnect and
//! completes requests when they are waited on. Embedders without a network and the test
//! suite use it directly.
//!
//! With the `mpi` feature, [`MpiBootstrap`] derives the bootstrap process group from
//! the MPI world communicator.

#[cfg(feature = "mpi")]
pub mod mpi_bootstrap;
#[cfg(feature = "mpi")]
pub use mpi_bootstrap::MpiBootstrap;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tracing::trace;

use crate::coll::{Request, RequestKind, Schedule};
use crate::core::traits::{Progress, Transport};
use crate::core::types::{Endpoint, VcState};
use crate::error::Result;

/// Snapshot of [`LocalTransport`] counters.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub dups: usize,
    pub released: usize,
    pub disconnected: usize,
    pub signals: usize,
    pub started: usize,
    pub waits: usize,
}

#[derive(Debug)]
pub struct LocalTransport {
    dups: AtomicUsize,
    released: AtomicUsize,
    disconnected: AtomicUsize,
    signals: AtomicUsize,
    started: AtomicUsize,
    waits: AtomicUsize,
    next_request: AtomicU64,
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalTransport {
    pub fn new() -> Self {
        Self {
            dups: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
            disconnected: AtomicUsize::new(0),
            signals: AtomicUsize::new(0),
            started: AtomicUsize::new(0),
            waits: AtomicUsize::new(0),
            next_request: AtomicU64::new(1),
        }
    }

    pub fn stats(&self) -> TransportStats {
        TransportStats {
            dups: self.dups.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            disconnected: self.disconnected.load(Ordering::Relaxed),
            signals: self.signals.load(Ordering::Relaxed),
            started: self.started.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
        }
    }

    /// Fresh request id; ids are never reused.
    pub fn next_request_id(&self) -> u64 {
        self.next_request.fetch_add(1, Ordering::Relaxed)
    }
}

impl Transport for LocalTransport {
    fn dup_endpoint(&self, ep: &Endpoint) -> Result<Endpoint> {
        self.dups.fetch_add(1, Ordering::Relaxed);
        Ok(ep.clone())
    }

    fn release_endpoint(&self, ep: &Endpoint) -> Result<()> {
        self.released.fetch_add(1, Ordering::Relaxed);
        trace!(lpid = ep.lpid(), "released endpoint");
        Ok(())
    }

    fn disconnect_endpoint(&self, ep: &Endpoint) -> Result<()> {
        self.disconnected.fetch_add(1, Ordering::Relaxed);
        ep.vc().set_state(VcState::Closed);
        trace!(lpid = ep.lpid(), "closed connection");
        Ok(())
    }
}

impl Progress for LocalTransport {
    fn signal_completion(&self) {
        self.signals.fetch_add(1, Ordering::Relaxed);
    }

    fn start(&self, sched: Schedule) -> Result<Request> {
        self.started.fetch_add(1, Ordering::Relaxed);
        let req = Request::new(self.next_request_id(), RequestKind::Sched { steps: sched.len() });
        trace!(id = req.id(), steps = sched.len(), "started schedule");
        Ok(req)
    }

    fn wait(&self, req: &Request) -> Result<()> {
        self.waits.fetch_add(1, Ordering::Relaxed);
        req.complete();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::types::VirtualConnection;

    #[test]
    fn disconnect_closes_the_connection() {
        let t = LocalTransport::new();
        let vc = Arc::new(VirtualConnection::new(3));
        let ep = Endpoint::new(vc.clone());
        t.release_endpoint(&ep).unwrap();
        assert_eq!(vc.state(), VcState::Active);
        t.disconnect_endpoint(&ep).unwrap();
        assert_eq!(vc.state(), VcState::Closed);
        assert_eq!(t.stats(), TransportStats { released: 1, disconnected: 1, ..Default::default() });
    }

    #[test]
    fn started_schedule_completes_on_wait() {
        let t = LocalTransport::new();
        let mut s = Schedule::new();
        s.barrier();
        let a = t.start(s.clone()).unwrap();
        let b = t.start(s).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.kind(), RequestKind::Sched { steps: 1 });
        assert!(!a.is_complete());
        t.wait(&a).unwrap();
        assert!(a.is_complete());
    }
}
