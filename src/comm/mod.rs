//! Communicators and their lifecycle.
//!
//! A [`Communicator`] is a communication context: a context id, one group of ranks
//! (intracomm) or two (intercomm), and the endpoint tables that map those ranks to
//! peers. Communicators are created with their mappers attached, committed through
//! [`crate::context::RuntimeContext::commit`] (which builds the tables, runs the creation
//! hooks and registers them) and finally destroyed through
//! [`crate::context::RuntimeContext::destroy`].
//!
//! Submodules:
//! - [`mapper`]: derivation rules for endpoint tables.
//! - [`lifecycle`]: pre-commit, post-commit and destroy phases.
//! - [`hooks`]: creation/destruction callbacks.
//! - [`registry`]: the set of live communicators.
//! - [`failure`]: any-source invalidation after process failures.

pub mod failure;
pub mod hooks;
pub mod lifecycle;
pub mod mapper;
pub mod registry;

pub use hooks::{CommHook, HookRegistry};
pub use mapper::{CommMapper, MapDir, MapKind};
pub use registry::CommRegistry;

use std::sync::atomic::{AtomicIsize, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::core::types::{ContextId, Endpoint};
use crate::vcrt::VcrtRef;

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct CommFlags: u32 {
        /// Receives from any source may be posted.
        const ANY_SOURCE_ENABLED = 0b0_0001;
        /// Freed through disconnect; endpoints are closed on release.
        const DISCONNECTED       = 0b0_0010;
        const COMMITTED          = 0b0_0100;
        const DESTROYED          = 0b0_1000;
        /// Creation failed and its tables were given back; the object cannot be committed.
        const CREATE_FAILED      = 0b1_0000;
    }
}

/// Single group or two groups.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommKind {
    Intra,
    Inter,
}

/// Communicators whose tables come straight from the bootstrap process group.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Builtin {
    World,
    SelfComm,
    /// Internal duplicate of world; shares world's table.
    WorldInternal,
}

#[derive(Debug)]
pub struct Communicator {
    context_id: ContextId,
    kind: CommKind,
    rank: usize,
    local_size: usize,
    remote_size: usize,
    builtin: Option<Builtin>,
    mappers: Mutex<Vec<CommMapper>>,
    /// Intracomm: all ranks. Intercomm: the remote group.
    vcrt: OnceLock<VcrtRef>,
    /// Intercomm only: the local group.
    local_vcrt: OnceLock<VcrtRef>,
    flags: AtomicU32,
    last_ack_rank: AtomicIsize,
    node_comm: Option<Arc<Communicator>>,
    node_roots_comm: Option<Arc<Communicator>>,
    local_comm: Option<Arc<Communicator>>,
}

impl Communicator {
    fn new(context_id: ContextId, kind: CommKind, rank: usize, local_size: usize, remote_size: usize) -> Self {
        Self {
            context_id,
            kind,
            rank,
            local_size,
            remote_size,
            builtin: None,
            mappers: Mutex::new(Vec::new()),
            vcrt: OnceLock::new(),
            local_vcrt: OnceLock::new(),
            flags: AtomicU32::new(0),
            last_ack_rank: AtomicIsize::new(-1),
            node_comm: None,
            node_roots_comm: None,
            local_comm: None,
        }
    }

    /// Intracommunicator of `size` ranks in which this process is `rank`.
    pub fn intra(context_id: ContextId, rank: usize, size: usize) -> Self {
        Self::new(context_id, CommKind::Intra, rank, size, size)
    }

    /// Intercommunicator between a local group of `local_size` ranks (this process is
    /// `rank` there) and a remote group of `remote_size` ranks.
    pub fn inter(context_id: ContextId, rank: usize, local_size: usize, remote_size: usize) -> Self {
        Self::new(context_id, CommKind::Inter, rank, local_size, remote_size)
    }

    pub(crate) fn builtin(which: Builtin, context_id: ContextId, rank: usize, size: usize) -> Self {
        let mut comm = Self::intra(context_id, rank, size);
        comm.builtin = Some(which);
        comm
    }

    /// Appends a mapper; mapper order fixes table offsets.
    pub fn with_mapper(mut self, mapper: CommMapper) -> Self {
        self.mappers.get_mut().unwrap_or_else(PoisonError::into_inner).push(mapper);
        self
    }

    pub fn with_node_comm(mut self, comm: Arc<Communicator>) -> Self {
        self.node_comm = Some(comm);
        self
    }

    pub fn with_node_roots_comm(mut self, comm: Arc<Communicator>) -> Self {
        self.node_roots_comm = Some(comm);
        self
    }

    /// Attaches the local intracomm of an intercomm; it receives the local table at commit.
    pub fn with_local_comm(mut self, comm: Arc<Communicator>) -> Self {
        self.local_comm = Some(comm);
        self
    }

    pub fn context_id(&self) -> ContextId {
        self.context_id
    }

    pub fn kind(&self) -> CommKind {
        self.kind
    }

    pub fn is_intercomm(&self) -> bool {
        self.kind == CommKind::Inter
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn local_size(&self) -> usize {
        self.local_size
    }

    pub fn remote_size(&self) -> usize {
        self.remote_size
    }

    pub fn builtin_kind(&self) -> Option<Builtin> {
        self.builtin
    }

    /// World or its internal duplicate: contains every process.
    pub fn is_world(&self) -> bool {
        matches!(self.builtin, Some(Builtin::World | Builtin::WorldInternal))
    }

    pub fn node_comm(&self) -> Option<&Arc<Communicator>> {
        self.node_comm.as_ref()
    }

    pub fn node_roots_comm(&self) -> Option<&Arc<Communicator>> {
        self.node_roots_comm.as_ref()
    }

    pub fn local_comm(&self) -> Option<&Arc<Communicator>> {
        self.local_comm.as_ref()
    }

    /// Main table: all ranks of an intracomm, remote group of an intercomm. `None` before
    /// construction and after a failed creation.
    pub fn vcrt(&self) -> Option<&VcrtRef> {
        self.vcrt.get().filter(|_| !self.creation_failed())
    }

    /// Local group table of an intercomm.
    pub fn local_vcrt(&self) -> Option<&VcrtRef> {
        self.local_vcrt.get().filter(|_| !self.creation_failed())
    }

    /// Endpoint of `rank` through the main table.
    pub fn endpoint(&self, rank: usize) -> Option<&Endpoint> {
        self.vcrt().and_then(|t| t.get(rank))
    }

    /// Endpoint of local `rank` of an intercomm.
    pub fn local_endpoint(&self, rank: usize) -> Option<&Endpoint> {
        self.local_vcrt().and_then(|t| t.get(rank))
    }

    pub fn flags(&self) -> CommFlags {
        CommFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }

    pub fn any_source_enabled(&self) -> bool {
        self.flags().contains(CommFlags::ANY_SOURCE_ENABLED)
    }

    pub fn is_disconnected(&self) -> bool {
        self.flags().contains(CommFlags::DISCONNECTED)
    }

    pub fn is_committed(&self) -> bool {
        self.flags().contains(CommFlags::COMMITTED)
    }

    /// A failed creation leaves the object unusable; build a new communicator instead.
    pub fn creation_failed(&self) -> bool {
        self.flags().contains(CommFlags::CREATE_FAILED)
    }

    /// Selects the disconnect path for the table release at destroy.
    pub fn mark_disconnected(&self) {
        self.set_flags(CommFlags::DISCONNECTED);
    }

    /// Last failed rank acknowledged by the application, if any.
    pub fn last_acked_failure(&self) -> Option<usize> {
        usize::try_from(self.last_ack_rank.load(Ordering::Acquire)).ok()
    }

    pub fn ack_failures(&self, rank: usize) {
        self.last_ack_rank.store(rank as isize, Ordering::Release);
    }

    /// True if `id` is this communicator's context id or collective id, or either id
    /// of its node or node-roots sub-communicator.
    pub fn owns_context_id(&self, id: ContextId) -> bool {
        self.context_id.matches(id)
            || self.node_comm.as_ref().is_some_and(|c| c.context_id.matches(id))
            || self.node_roots_comm.as_ref().is_some_and(|c| c.context_id.matches(id))
    }

    pub(crate) fn set_flags(&self, flags: CommFlags) {
        self.flags.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    pub(crate) fn clear_flags(&self, flags: CommFlags) {
        self.flags.fetch_and(!flags.bits(), Ordering::AcqRel);
    }

    /// Clears any-source eligibility; returns false if it was already cleared.
    pub(crate) fn disable_any_source(&self) -> bool {
        let prev = self.flags.fetch_and(!CommFlags::ANY_SOURCE_ENABLED.bits(), Ordering::AcqRel);
        CommFlags::from_bits_truncate(prev).contains(CommFlags::ANY_SOURCE_ENABLED)
    }

    pub(crate) fn reset_last_ack(&self) {
        self.last_ack_rank.store(-1, Ordering::Release);
    }

    pub(crate) fn take_mappers(&self) -> Vec<CommMapper> {
        std::mem::take(&mut *self.mappers.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub(crate) fn with_mappers<R>(&self, f: impl FnOnce(&[CommMapper]) -> R) -> R {
        let guard = self.mappers.lock().unwrap_or_else(PoisonError::into_inner);
        f(guard.as_slice())
    }

    pub(crate) fn install_vcrt(&self, table: VcrtRef) {
        if self.vcrt.set(table).is_err() {
            panic!("endpoint table of communicator {} installed twice", self.context_id);
        }
    }

    pub(crate) fn install_local_vcrt(&self, table: VcrtRef) {
        if self.local_vcrt.set(table).is_err() {
            panic!("local endpoint table of communicator {} installed twice", self.context_id);
        }
    }
}
