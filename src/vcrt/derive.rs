// Derivation of a communicator's endpoint table from a source table.

use tracing::trace;

use crate::comm::mapper::{CommMapper, MapKind};
use crate::core::traits::Transport;
use crate::error::Result;
use crate::vcrt::{VcrtBuilder, VcrtRef};

/// Destination table of a communicator while its mappers are being applied.
#[derive(Debug, Default)]
pub enum TableSlot {
    #[default]
    Empty,
    /// Reference to a source table taken over unchanged.
    Shared(VcrtRef),
    /// Fresh table receiving slices from one or more mappers.
    Building(VcrtBuilder),
}

impl TableSlot {
    pub fn is_empty(&self) -> bool {
        matches!(self, TableSlot::Empty)
    }

    /// Drops whatever the slot holds after a failed construction.
    pub fn abandon(self, transport: &dyn Transport) -> Result<()> {
        match self {
            TableSlot::Empty => Ok(()),
            TableSlot::Shared(t) => t.release(false, transport).map(|_| ()),
            TableSlot::Building(b) => b.abandon(transport),
        }
    }

    /// Completes the slot, `None` if no mapper contributed.
    pub fn finish(self) -> Option<VcrtRef> {
        match self {
            TableSlot::Empty => None,
            TableSlot::Shared(t) => Some(t),
            TableSlot::Building(b) => Some(b.freeze()),
        }
    }
}

/// Whether `mapper` reproduces the first `src_size` ranks of its source exactly, so a
/// destination table of `total` slots can be the source table itself.
fn can_share(mapper: &CommMapper, src_size: usize, total: usize) -> bool {
    match mapper.kind() {
        MapKind::Dup => src_size == total,
        MapKind::Irregular(mapping) => {
            src_size == total
                && mapping.len() == total
                && mapping.iter().enumerate().all(|(i, &r)| r == i)
        }
    }
}

/// Applies one mapper: copies its slice of `src` into `dest` starting at `offset`, where
/// `dest` ends up holding `total` slots.
///
/// A destination that would be identical to the source shares the source table instead
/// of copying it. Otherwise the first contributing mapper allocates the table and every
/// mapper duplicates its endpoints into its own range.
pub fn dup_table(
    src: &VcrtRef,
    dest: &mut TableSlot,
    mapper: &CommMapper,
    src_size: usize,
    total: usize,
    offset: usize,
    transport: &dyn Transport,
) -> Result<()> {
    if mapper.size() == 0 {
        return Ok(());
    }

    if can_share(mapper, src_size, total) {
        assert!(dest.is_empty(), "shared endpoint table would overwrite another contribution");
        trace!(size = total, "sharing source endpoint table");
        *dest = TableSlot::Shared(src.add_ref());
        return Ok(());
    }

    if dest.is_empty() {
        *dest = TableSlot::Building(VcrtBuilder::create(total));
    }
    let builder = match dest {
        TableSlot::Building(b) => b,
        _ => panic!("endpoint table slice at offset {offset} targets a shared table"),
    };

    match mapper.kind() {
        MapKind::Dup => {
            for i in 0..src_size {
                let ep = source_endpoint(src, i);
                builder.set(i + offset, transport.dup_endpoint(ep)?);
            }
        }
        MapKind::Irregular(mapping) => {
            for (i, &r) in mapping.iter().enumerate() {
                let ep = source_endpoint(src, r);
                builder.set(i + offset, transport.dup_endpoint(ep)?);
            }
        }
    }
    trace!(offset, len = mapper.size(), total, "copied endpoint slice");
    Ok(())
}

fn source_endpoint(src: &VcrtRef, rank: usize) -> &crate::core::types::Endpoint {
    match src.get(rank) {
        Some(ep) => ep,
        None => panic!("mapper references rank {rank} outside source table of size {}", src.len()),
    }
}
