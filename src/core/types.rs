//! Identifiers and endpoint handles.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Context identifier of a communicator, as carried in message envelopes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub u32);

impl ContextId {
    /// Distance between a communicator's point-to-point id and its collective id.
    pub const COLL_OFFSET: u32 = 1;

    /// The id used for collective traffic on the same communicator. Wraps at the top of
    /// the id space.
    pub fn coll(self) -> ContextId {
        ContextId(self.0.wrapping_add(Self::COLL_OFFSET))
    }

    /// Returns true if `id` is either this id or its collective variant.
    pub fn matches(self, id: ContextId) -> bool {
        self == id || self.coll() == id
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Connection state of a virtual connection.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum VcState {
    Active = 0,
    /// All table references were released.
    Inactive = 1,
    /// Closed through the disconnect path.
    Closed = 2,
}

/// Per-peer connection owned by the bootstrap process group.
#[derive(Debug)]
pub struct VirtualConnection {
    lpid: usize,
    state: AtomicU8,
}

impl VirtualConnection {
    pub fn new(lpid: usize) -> Self {
        Self { lpid, state: AtomicU8::new(VcState::Active as u8) }
    }

    /// Local process id of the peer.
    pub fn lpid(&self) -> usize {
        self.lpid
    }

    pub fn state(&self) -> VcState {
        match self.state.load(Ordering::Acquire) {
            0 => VcState::Active,
            1 => VcState::Inactive,
            _ => VcState::Closed,
        }
    }

    pub fn set_state(&self, state: VcState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Handle through which one peer is reached.
///
/// Two endpoints are the same connection when they point at the same
/// [`VirtualConnection`]; duplicating an endpoint yields a new handle to the same one.
#[derive(Clone, Debug)]
pub struct Endpoint(Arc<VirtualConnection>);

impl Endpoint {
    pub fn new(vc: Arc<VirtualConnection>) -> Self {
        Endpoint(vc)
    }

    pub fn vc(&self) -> &Arc<VirtualConnection> {
        &self.0
    }

    pub fn lpid(&self) -> usize {
        self.0.lpid()
    }

    /// Identity comparison on the underlying connection.
    pub fn same_connection(&self, other: &Endpoint) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_connection(&self, vc: &Arc<VirtualConnection>) -> bool {
        Arc::ptr_eq(&self.0, vc)
    }
}

/// Bootstrap process group: this process's rank and one connection per process.
#[derive(Debug)]
pub struct ProcessGroup {
    rank: usize,
    vct: Vec<Arc<VirtualConnection>>,
}

impl ProcessGroup {
    /// Builds a group of `size` processes in which this process has rank `rank`.
    ///
    /// # Panics
    /// Panics if `rank >= size`.
    pub fn new(rank: usize, size: usize) -> Self {
        assert!(rank < size, "bootstrap rank {rank} outside group of size {size}");
        let vct = (0..size).map(|lpid| Arc::new(VirtualConnection::new(lpid))).collect();
        Self { rank, vct }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.vct.len()
    }

    /// Connection to the process with local process id `lpid`.
    pub fn vc(&self, lpid: usize) -> Option<&Arc<VirtualConnection>> {
        self.vct.get(lpid)
    }

    pub fn connections(&self) -> &[Arc<VirtualConnection>] {
        &self.vct
    }
}

/// A set of processes named by local process id, e.g. newly failed processes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Group {
    lpids: Vec<usize>,
}

impl Group {
    pub fn new(lpids: Vec<usize>) -> Self {
        Self { lpids }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lpids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lpids.is_empty()
    }

    pub fn lpids(&self) -> &[usize] {
        &self.lpids
    }
}

impl FromIterator<usize> for Group {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Group { lpids: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coll_context_id_is_offset() {
        let id = ContextId(0x40);
        assert_eq!(id.coll(), ContextId(0x41));
        assert!(id.matches(ContextId(0x40)));
        assert!(id.matches(ContextId(0x41)));
        assert!(!id.matches(ContextId(0x42)));
    }

    #[test]
    fn coll_id_wraps_at_top_of_id_space() {
        let top = ContextId(u32::MAX);
        assert_eq!(top.coll(), ContextId(0));
        assert!(top.matches(ContextId(0)));
        assert!(!top.matches(ContextId(1)));
    }

    #[test]
    fn endpoint_identity_follows_connection() {
        let pg = ProcessGroup::new(0, 3);
        let a = Endpoint::new(pg.vc(1).unwrap().clone());
        let b = a.clone();
        let c = Endpoint::new(pg.vc(2).unwrap().clone());
        assert!(a.same_connection(&b));
        assert!(!a.same_connection(&c));
        assert_eq!(c.lpid(), 2);
    }
}
