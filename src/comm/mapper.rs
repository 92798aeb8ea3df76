//! Mappers: how a new communicator's endpoint tables are derived from existing ones.
//!
//! A communicator under construction carries an ordered list of [`CommMapper`]s. Each
//! names a source communicator, which of the source's groups it reads (local or remote),
//! which of the destination's groups it writes, and which ranks it takes. The order of the
//! list fixes the offset of every mapper's slice in the destination table.

use std::sync::Arc;

use crate::comm::{CommKind, Communicator};

/// Source group to destination group.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MapDir {
    LocalToLocal,
    LocalToRemote,
    RemoteToLocal,
    RemoteToRemote,
}

impl MapDir {
    /// Reads the source's local group.
    pub fn from_local(self) -> bool {
        matches!(self, MapDir::LocalToLocal | MapDir::LocalToRemote)
    }

    /// Writes the destination's local group.
    pub fn to_local(self) -> bool {
        matches!(self, MapDir::LocalToLocal | MapDir::RemoteToLocal)
    }
}

/// Which ranks of the source group are taken.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MapKind {
    /// The whole source group, in rank order.
    Dup,
    /// `mapping[i]` is the source rank placed at destination slot `i`.
    Irregular(Vec<usize>),
}

/// One contribution to a derived communicator's endpoint table.
#[derive(Clone, Debug)]
pub struct CommMapper {
    src: Arc<Communicator>,
    kind: MapKind,
    dir: MapDir,
}

impl CommMapper {
    /// Takes the whole source group selected by `dir`.
    pub fn dup(src: Arc<Communicator>, dir: MapDir) -> Self {
        Self { src, kind: MapKind::Dup, dir }
    }

    /// Takes the listed ranks of the source group selected by `dir`.
    pub fn irregular(src: Arc<Communicator>, mapping: Vec<usize>, dir: MapDir) -> Self {
        Self { src, kind: MapKind::Irregular(mapping), dir }
    }

    pub fn src(&self) -> &Arc<Communicator> {
        &self.src
    }

    pub fn kind(&self) -> &MapKind {
        &self.kind
    }

    pub fn dir(&self) -> MapDir {
        self.dir
    }

    /// Size of the source group this mapper reads.
    pub fn src_size(&self) -> usize {
        if self.dir.from_local() { self.src.local_size() } else { self.src.remote_size() }
    }

    /// Number of destination slots this mapper fills.
    pub fn size(&self) -> usize {
        match &self.kind {
            MapKind::Irregular(mapping) => mapping.len(),
            MapKind::Dup => self.src_size(),
        }
    }

    /// Checks the direction against both communicator kinds.
    ///
    /// # Panics
    /// An intracomm source has no remote group to read from and an intracomm
    /// destination has no remote group to write to; either combination panics.
    pub fn check_dirs(&self, dest_kind: CommKind) {
        if self.src.kind() == CommKind::Intra {
            assert!(
                self.dir.from_local(),
                "mapper direction {:?} reads the remote group of an intracomm",
                self.dir
            );
        }
        if dest_kind == CommKind::Intra {
            assert!(
                self.dir.to_local(),
                "mapper direction {:?} writes the remote group of an intracomm",
                self.dir
            );
        }
    }
}
