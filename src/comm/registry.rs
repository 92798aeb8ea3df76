//! Set of live communicators.

use std::sync::Arc;

use tracing::trace;

use crate::comm::Communicator;
use crate::core::types::ContextId;

/// Live communicators, most recently added first.
#[derive(Debug, Default)]
pub struct CommRegistry {
    // Stored oldest-first; iteration reverses.
    comms: Vec<Arc<Communicator>>,
}

impl CommRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.comms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comms.is_empty()
    }

    pub fn add(&mut self, comm: Arc<Communicator>) {
        self.comms.push(comm);
    }

    /// Removes `comm` by identity. Returns false if it was not registered.
    pub fn remove(&mut self, comm: &Communicator) -> bool {
        match self.comms.iter().position(|c| std::ptr::eq(c.as_ref(), comm)) {
            Some(i) => {
                self.comms.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, comm: &Communicator) -> bool {
        self.comms.iter().any(|c| std::ptr::eq(c.as_ref(), comm))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Communicator>> {
        self.comms.iter().rev()
    }

    /// Resolves an incoming context id to the live communicator that owns it.
    ///
    /// A communicator owns its context id and collective id, and both ids of its node
    /// and node-roots sub-communicators. `None` means the id is unknown to this process,
    /// which the message-matching layer treats as fatal.
    pub fn find_by_context_id(&self, id: ContextId) -> Option<&Arc<Communicator>> {
        let found = self.iter().find(|c| c.owns_context_id(id));
        if let Some(c) = found {
            trace!(query = %id, owner = %c.context_id(), "found matching context id");
        }
        found
    }
}
