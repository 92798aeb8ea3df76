//! Endpoint tables (rank to endpoint maps).
//!
//! An [`EndpointTable`] maps the ranks of one communicator (or of one side of an
//! intercommunicator) to the endpoints through which those ranks are reached. Tables are
//! built once through a [`VcrtBuilder`] and are immutable afterwards, which is what lets
//! several communicators share one table by reference.
//!
//! Sharing is tracked by an explicit reference count: [`EndpointTable::add_ref`] hands out
//! another holder, [`EndpointTable::release`] gives one back, and the last release returns
//! every endpoint to the transport, either plainly or through the disconnect path.

pub mod derive;

pub use derive::{TableSlot, dup_table};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;

use crate::core::traits::Transport;
use crate::core::types::{Endpoint, VirtualConnection};
use crate::error::Result;

/// Shared handle to a committed endpoint table.
pub type VcrtRef = Arc<EndpointTable>;

/// Immutable, reference-counted rank to endpoint table.
#[derive(Debug)]
pub struct EndpointTable {
    slots: Vec<Endpoint>,
    refs: AtomicUsize,
}

impl EndpointTable {
    /// Wraps a complete list of endpoints into a table with one reference.
    pub fn from_endpoints(slots: Vec<Endpoint>) -> VcrtRef {
        Arc::new(EndpointTable { slots, refs: AtomicUsize::new(1) })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, rank: usize) -> Option<&Endpoint> {
        self.slots.get(rank)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Endpoint> {
        self.slots.iter()
    }

    /// Number of holders still referencing this table.
    pub fn ref_count(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }

    /// True once the last holder released the table.
    pub fn is_released(&self) -> bool {
        self.ref_count() == 0
    }

    /// Linear scan for a slot that goes through connection `vc`.
    pub fn contains(&self, vc: &Arc<VirtualConnection>) -> bool {
        self.slots.iter().any(|ep| ep.is_connection(vc))
    }

    /// Registers another holder and returns the same table.
    pub fn add_ref(self: &Arc<Self>) -> VcrtRef {
        let prev = self.refs.fetch_add(1, Ordering::AcqRel);
        assert!(prev > 0, "add_ref on a released endpoint table");
        Arc::clone(self)
    }

    /// Drops one holder. Returns true if this was the last one, in which case every
    /// endpoint was handed back to `transport` (disconnected when `disconnected`).
    pub fn release(&self, disconnected: bool, transport: &dyn Transport) -> Result<bool> {
        let prev = self.refs.fetch_sub(1, Ordering::AcqRel);
        assert!(prev > 0, "endpoint table released more times than referenced");
        if prev > 1 {
            return Ok(false);
        }
        trace!(size = self.slots.len(), disconnected, "freeing endpoint table");
        for ep in &self.slots {
            if disconnected {
                transport.disconnect_endpoint(ep)?;
            } else {
                transport.release_endpoint(ep)?;
            }
        }
        Ok(true)
    }
}

/// Table under construction; every slot must be filled before [`VcrtBuilder::freeze`].
#[derive(Debug)]
pub struct VcrtBuilder {
    slots: Vec<Option<Endpoint>>,
}

impl VcrtBuilder {
    /// A table with `size` empty slots.
    pub fn create(size: usize) -> Self {
        Self { slots: vec![None; size] }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn set(&mut self, rank: usize, ep: Endpoint) {
        assert!(rank < self.slots.len(), "slot {rank} outside table of size {}", self.slots.len());
        self.slots[rank] = Some(ep);
    }

    /// Gives back the endpoints filled so far when construction is abandoned.
    pub fn abandon(self, transport: &dyn Transport) -> Result<()> {
        for ep in self.slots.iter().flatten() {
            transport.release_endpoint(ep)?;
        }
        Ok(())
    }

    /// Finishes construction.
    ///
    /// # Panics
    /// Panics if any slot was left empty.
    pub fn freeze(self) -> VcrtRef {
        let size = self.slots.len();
        let slots = self
            .slots
            .into_iter()
            .enumerate()
            .map(|(i, ep)| match ep {
                Some(ep) => ep,
                None => panic!("endpoint table slot {i} of {size} left unfilled"),
            })
            .collect();
        EndpointTable::from_endpoints(slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ProcessGroup;
    use crate::transport::LocalTransport;

    fn table(pg: &ProcessGroup) -> VcrtRef {
        let eps = pg.connections().iter().cloned().map(Endpoint::new).collect();
        EndpointTable::from_endpoints(eps)
    }

    #[test]
    fn shared_table_frees_on_last_release() {
        let pg = ProcessGroup::new(0, 4);
        let transport = LocalTransport::new();
        let t = table(&pg);
        let shared = t.add_ref();
        assert!(Arc::ptr_eq(&t, &shared));
        assert_eq!(t.ref_count(), 2);

        assert!(!t.release(false, &transport).unwrap());
        assert_eq!(transport.stats().released, 0);
        assert!(shared.release(false, &transport).unwrap());
        assert_eq!(transport.stats().released, 4);
        assert!(t.is_released());
    }

    #[test]
    fn disconnect_release_closes_connections() {
        let pg = ProcessGroup::new(0, 2);
        let transport = LocalTransport::new();
        let t = table(&pg);
        assert!(t.release(true, &transport).unwrap());
        assert_eq!(transport.stats().disconnected, 2);
        assert_eq!(transport.stats().released, 0);
    }

    #[test]
    #[should_panic(expected = "left unfilled")]
    fn freeze_rejects_holes() {
        let pg = ProcessGroup::new(0, 2);
        let mut b = VcrtBuilder::create(2);
        b.set(0, Endpoint::new(pg.vc(0).unwrap().clone()));
        let _ = b.freeze();
    }
}
