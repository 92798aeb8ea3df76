//! Any-source invalidation after process failures.
//!
//! Once a communicator may contain a failed process, a receive from any source on it
//! can no longer be matched unambiguously, so such receives are disabled. Disabling is
//! monotonic: nothing in this module turns any-source back on.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::comm::{CommRegistry, Communicator};
use crate::core::traits::Progress;
use crate::core::types::{Group, ProcessGroup};

/// True iff a member of `group` is also a member of `comm`.
///
/// World and its internal duplicate contain every process and always intersect. For
/// other communicators each failed process is looked up in the bootstrap group and the
/// communicator's tables are scanned for its connection; this is linear in the group
/// size times the communicator size, which assumes failure groups are small.
///
/// An intercomm is scanned through both its remote (main) table and its local table, so
/// a failure inside the local group counts as well. A remote-only scan would miss it.
pub fn nonempty_intersection(comm: &Communicator, group: &Group, pg: &ProcessGroup) -> bool {
    if comm.is_world() {
        trace!(context_id = %comm.context_id(), "comm is world");
        return true;
    }
    group.lpids().iter().filter_map(|&lpid| pg.vc(lpid)).any(|vc| {
        comm.vcrt().is_some_and(|t| t.contains(vc))
            || (comm.is_intercomm() && comm.local_vcrt().is_some_and(|t| t.contains(vc)))
    })
}

/// Disables any-source receives on every registered communicator that contains a
/// process of `failed`, then wakes the progress engine.
///
/// Returns the number of communicators disabled by this call.
pub fn handle_failed_procs(
    registry: &CommRegistry,
    failed: &Group,
    pg: &ProcessGroup,
    progress: &dyn Progress,
) -> usize {
    let candidates: Vec<&Arc<Communicator>> = registry.iter().filter(|c| c.any_source_enabled()).collect();

    #[cfg(feature = "rayon")]
    let hits: Vec<bool> = {
        use rayon::prelude::*;
        candidates.par_iter().map(|c| nonempty_intersection(c, failed, pg)).collect()
    };
    #[cfg(not(feature = "rayon"))]
    let hits: Vec<bool> = candidates.iter().map(|c| nonempty_intersection(c, failed, pg)).collect();

    let mut disabled = 0;
    for (comm, hit) in candidates.into_iter().zip(hits) {
        if hit && comm.disable_any_source() {
            debug!(context_id = %comm.context_id(), "disabling any-source on communicator");
            disabled += 1;
        }
    }

    progress.signal_completion();
    disabled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::lifecycle::{BuildEnv, build_tables};
    use crate::comm::{Builtin, CommFlags, CommMapper, MapDir};
    use crate::core::types::ContextId;
    use crate::transport::LocalTransport;

    #[test]
    fn world_always_intersects() {
        let pg = ProcessGroup::new(0, 2);
        let w = Communicator::builtin(Builtin::World, ContextId(0), 0, 2);
        assert!(nonempty_intersection(&w, &Group::empty(), &pg));
    }

    #[test]
    fn intercomm_local_group_counts_as_membership() {
        let pg = ProcessGroup::new(0, 4);
        let t = LocalTransport::new();
        let w = Arc::new(Communicator::builtin(Builtin::World, ContextId(0), 0, 4));
        build_tables(&w, &BuildEnv { pg: &pg, world: None, transport: &t }).unwrap();
        let ic = Communicator::inter(ContextId(8), 0, 1, 1)
            .with_mapper(CommMapper::irregular(w.clone(), vec![0], MapDir::LocalToLocal))
            .with_mapper(CommMapper::irregular(w.clone(), vec![3], MapDir::LocalToRemote));
        build_tables(&ic, &BuildEnv { pg: &pg, world: Some(&w), transport: &t }).unwrap();

        assert!(nonempty_intersection(&ic, &Group::new(vec![0]), &pg));
        assert!(nonempty_intersection(&ic, &Group::new(vec![3]), &pg));
        assert!(!nonempty_intersection(&ic, &Group::new(vec![1, 2]), &pg));
    }

    #[test]
    fn signals_progress_even_without_hits() {
        let pg = ProcessGroup::new(0, 2);
        let t = LocalTransport::new();
        let reg = CommRegistry::new();
        assert_eq!(handle_failed_procs(&reg, &Group::new(vec![1]), &pg, &t), 0);
        assert_eq!(t.stats().signals, 1);
    }

    #[test]
    fn already_disabled_communicators_are_skipped() {
        let pg = ProcessGroup::new(0, 2);
        let t = LocalTransport::new();
        let mut reg = CommRegistry::new();
        let w = Arc::new(Communicator::builtin(Builtin::World, ContextId(0), 0, 2));
        reg.add(w.clone());
        assert_eq!(handle_failed_procs(&reg, &Group::empty(), &pg, &t), 0);

        w.set_flags(CommFlags::ANY_SOURCE_ENABLED);
        assert_eq!(handle_failed_procs(&reg, &Group::empty(), &pg, &t), 1);
        assert_eq!(handle_failed_procs(&reg, &Group::new(vec![1]), &pg, &t), 0);
        assert!(!w.any_source_enabled());
    }
}
