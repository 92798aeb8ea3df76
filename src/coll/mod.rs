//! Non-blocking collective dispatch.
//!
//! A collective call is described by its operands ([`GatherArgs`]) and the issuing
//! communicator. The dispatcher in [`igather`] picks an algorithm, either one forced by
//! [`crate::config::CollOptions`] or one chosen by a [`selector::CollSelector`], and
//! returns a [`Request`] without waiting for data movement. Algorithms either fill a
//! [`Schedule`] that the progress engine starts, or are transport-native and hand back
//! their own request.

pub mod igather;
pub mod selector;

pub use igather::{CollDispatch, GatherAlgorithms};
pub use selector::{Algorithm, CollSelector, SelectionRule, TableSelector};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::comm::Communicator;

/// Opaque user buffer handle; never dereferenced here.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Buffer(pub usize);

impl Buffer {
    pub const NULL: Buffer = Buffer(0);
}

/// Element type, reduced to what dispatch needs: its size in bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Datatype {
    size: usize,
}

impl Datatype {
    pub const BYTE: Datatype = Datatype { size: 1 };
    pub const INT: Datatype = Datatype { size: 4 };
    pub const DOUBLE: Datatype = Datatype { size: 8 };

    pub const fn new(size: usize) -> Self {
        Self { size }
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

/// Root argument of a rooted collective.
///
/// On an intercomm the root group passes [`Root::Root`] at the root process and
/// [`Root::ProcNull`] everywhere else; the other group passes the root's rank.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Root {
    Rank(usize),
    Root,
    ProcNull,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollKind {
    Igather,
}

/// Operands of one gather call.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GatherArgs {
    pub sendbuf: Buffer,
    pub sendcount: usize,
    pub sendtype: Datatype,
    pub recvbuf: Buffer,
    pub recvcount: usize,
    pub recvtype: Datatype,
    pub root: Root,
}

impl GatherArgs {
    /// Whether this process receives the gathered data.
    pub fn is_root(&self, comm: &Communicator) -> bool {
        match self.root {
            Root::Rank(r) => !comm.is_intercomm() && r == comm.rank(),
            Root::Root => true,
            Root::ProcNull => false,
        }
    }

    /// Bytes contributed (or, at the root, received per peer) by this process.
    /// Saturates at `usize::MAX`.
    pub fn msg_size(&self, comm: &Communicator) -> usize {
        if self.is_root(comm) {
            self.recvcount.saturating_mul(self.recvtype.size())
        } else {
            self.sendcount.saturating_mul(self.sendtype.size())
        }
    }
}

/// Operand description of a collective call.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CollArgs {
    Igather(GatherArgs),
}

/// One collective invocation as seen by the selector.
#[derive(Copy, Clone, Debug)]
pub struct CollSignature<'a> {
    pub comm: &'a Communicator,
    pub args: CollArgs,
}

impl CollSignature<'_> {
    pub fn coll(&self) -> CollKind {
        match self.args {
            CollArgs::Igather(_) => CollKind::Igather,
        }
    }

    pub fn msg_size(&self) -> usize {
        match &self.args {
            CollArgs::Igather(a) => a.msg_size(self.comm),
        }
    }
}

/// One step of a collective schedule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SchedStep {
    Send { peer: usize, buf: Buffer, count: usize, dtype: Datatype },
    Recv { peer: usize, buf: Buffer, count: usize, dtype: Datatype },
    /// Later steps wait for all earlier ones.
    Barrier,
}

/// Ordered steps built by a schedule-based algorithm.
#[derive(Clone, Debug, Default)]
pub struct Schedule {
    steps: Vec<SchedStep>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&mut self, peer: usize, buf: Buffer, count: usize, dtype: Datatype) {
        self.steps.push(SchedStep::Send { peer, buf, count, dtype });
    }

    pub fn recv(&mut self, peer: usize, buf: Buffer, count: usize, dtype: Datatype) {
        self.steps.push(SchedStep::Recv { peer, buf, count, dtype });
    }

    pub fn barrier(&mut self) {
        self.steps.push(SchedStep::Barrier);
    }

    pub fn steps(&self) -> &[SchedStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RequestKind {
    /// Nothing to do; complete on creation.
    Null,
    /// Started schedule with this many steps.
    Sched { steps: usize },
    /// Returned by a transport-native algorithm.
    Native,
    /// Returned by a device-override implementation.
    Device,
}

#[derive(Debug)]
struct RequestInner {
    id: u64,
    kind: RequestKind,
    complete: AtomicBool,
}

/// Handle to an in-flight non-blocking collective.
#[derive(Clone, Debug)]
pub struct Request {
    inner: Arc<RequestInner>,
}

impl Request {
    pub fn new(id: u64, kind: RequestKind) -> Self {
        let complete = AtomicBool::new(kind == RequestKind::Null);
        Self { inner: Arc::new(RequestInner { id, kind, complete }) }
    }

    /// An already complete request.
    pub fn null() -> Self {
        Self::new(0, RequestKind::Null)
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn kind(&self) -> RequestKind {
        self.inner.kind
    }

    pub fn is_complete(&self) -> bool {
        self.inner.complete.load(Ordering::Acquire)
    }

    /// Marks completion; called by the progress engine.
    pub fn complete(&self) {
        self.inner.complete.store(true, Ordering::Release);
    }
}
