//! Commit and destroy phases of a communicator.
//!
//! Pre-commit builds the endpoint tables from the communicator's mappers (or from the
//! bootstrap process group for the builtin communicators) and runs the creation hooks.
//! A failed pre-commit gives back every endpoint it took and marks the communicator
//! [`CommFlags::CREATE_FAILED`]. Post-commit hands an intercomm's local table to its
//! local sub-communicator and drops the mapper list. Destroy runs the destruction hooks
//! and releases the tables. Registration in the [`crate::comm::CommRegistry`] is done by
//! the runtime context around these phases.
//!
//! # Table routing
//!
//! Mappers writing the destination's local group are applied first, in list order, each
//! at the cumulative offset of the ones before it. Mappers writing the remote group are
//! applied second with their own offsets. The table read and the table written depend on
//! the communicator kinds:
//!
//! | source | destination | local-group mapper writes | remote-group mapper writes |
//! |--------|-------------|---------------------------|----------------------------|
//! | intra  | intra       | main table                | (invalid)                  |
//! | inter  | intra       | main table                | (invalid)                  |
//! | intra  | inter       | local table               | main table                 |
//! | inter  | inter       | local table               | main table                 |
//!
//! A mapper reading the local group of an intercomm reads its local table; every other
//! mapper reads the source's main table.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::comm::hooks::HookRegistry;
use crate::comm::mapper::CommMapper;
use crate::comm::{Builtin, CommFlags, CommKind, Communicator};
use crate::core::traits::Transport;
use crate::core::types::{Endpoint, ProcessGroup, VirtualConnection};
use crate::error::{CommError, Result};
use crate::vcrt::{TableSlot, VcrtBuilder, VcrtRef, dup_table};

/// What table construction needs besides the communicator itself.
pub struct BuildEnv<'a> {
    pub pg: &'a ProcessGroup,
    /// Committed world communicator, needed by its internal duplicate.
    pub world: Option<&'a Arc<Communicator>>,
    pub transport: &'a dyn Transport,
}

fn source_table(mapper: &CommMapper) -> &VcrtRef {
    let src = mapper.src();
    let table = if mapper.dir().from_local() && src.is_intercomm() {
        src.local_vcrt()
    } else {
        src.vcrt()
    };
    match table {
        Some(t) => t,
        None => panic!("source communicator {} has no endpoint table", src.context_id()),
    }
}

/// One fresh endpoint per connection, in order. A failed duplication gives back the
/// endpoints taken so far.
fn table_from_connections(vcs: &[Arc<VirtualConnection>], transport: &dyn Transport) -> Result<VcrtRef> {
    let mut b = VcrtBuilder::create(vcs.len());
    for (p, vc) in vcs.iter().enumerate() {
        match transport.dup_endpoint(&Endpoint::new(Arc::clone(vc))) {
            Ok(ep) => b.set(p, ep),
            Err(e) => {
                if let Err(err) = b.abandon(transport) {
                    warn!(error = %err, "failed to give back endpoints of an abandoned table");
                }
                return Err(e);
            }
        }
    }
    Ok(b.freeze())
}

/// Fills the builtin communicators' tables from the bootstrap process group.
fn build_builtin(comm: &Communicator, which: Builtin, env: &BuildEnv<'_>) -> Result<()> {
    match which {
        Builtin::World => {
            comm.install_vcrt(table_from_connections(env.pg.connections(), env.transport)?);
        }
        Builtin::SelfComm => {
            let own = std::slice::from_ref(&env.pg.connections()[env.pg.rank()]);
            comm.install_vcrt(table_from_connections(own, env.transport)?);
        }
        Builtin::WorldInternal => {
            let world_table = env.world.and_then(|w| w.vcrt());
            match world_table {
                Some(t) => comm.install_vcrt(t.add_ref()),
                None => panic!("internal world communicator committed before world"),
            }
        }
    }
    Ok(())
}

/// Applies `mappers` to `main`/`local`; on error the caller abandons both slots.
fn apply_mappers(
    comm: &Communicator,
    mappers: &[CommMapper],
    main: &mut TableSlot,
    local: &mut TableSlot,
    transport: &dyn Transport,
) -> Result<()> {
    for m in mappers {
        m.check_dirs(comm.kind());
    }

    let total: usize = mappers.iter().filter(|m| m.dir().to_local()).map(CommMapper::size).sum();
    let mut offset = 0;
    for m in mappers.iter().filter(|m| m.dir().to_local()) {
        let dest = match (m.src().kind(), comm.kind()) {
            (CommKind::Intra, CommKind::Intra) => &mut *main,
            (CommKind::Inter, CommKind::Intra) => &mut *main,
            (CommKind::Intra, CommKind::Inter) => &mut *local,
            (CommKind::Inter, CommKind::Inter) => &mut *local,
        };
        dup_table(source_table(m), dest, m, m.src_size(), total, offset, transport)?;
        offset += m.size();
    }

    let total: usize = mappers.iter().filter(|m| !m.dir().to_local()).map(CommMapper::size).sum();
    let mut offset = 0;
    for m in mappers.iter().filter(|m| !m.dir().to_local()) {
        assert_eq!(comm.kind(), CommKind::Inter, "remote-group mapper on an intracomm");
        dup_table(source_table(m), main, m, m.src_size(), total, offset, transport)?;
        offset += m.size();
    }
    Ok(())
}

/// Builds and installs the communicator's endpoint tables.
pub fn build_tables(comm: &Communicator, env: &BuildEnv<'_>) -> Result<()> {
    if let Some(which) = comm.builtin_kind() {
        build_builtin(comm, which, env)?;
    }

    let mut main = TableSlot::Empty;
    let mut local = TableSlot::Empty;
    let applied =
        comm.with_mappers(|mappers| apply_mappers(comm, mappers, &mut main, &mut local, env.transport));
    if let Err(e) = applied {
        for (slot, name) in [(main, "main"), (local, "local")] {
            if let Err(err) = slot.abandon(env.transport) {
                warn!(context_id = %comm.context_id(), table = name, error = %err, "failed to abandon endpoint table");
            }
        }
        return Err(e);
    }
    if let Some(t) = main.finish() {
        comm.install_vcrt(t);
    }
    if let Some(t) = local.finish() {
        comm.install_local_vcrt(t);
    }

    check_table_sizes(comm);
    Ok(())
}

fn check_table_sizes(comm: &Communicator) {
    let main = match comm.vcrt() {
        Some(t) => t,
        None => panic!("communicator {} has no endpoint table after construction", comm.context_id()),
    };
    assert_eq!(
        main.len(),
        comm.remote_size(),
        "endpoint table of communicator {} does not match its size",
        comm.context_id()
    );
    if comm.is_intercomm() {
        let local = match comm.local_vcrt() {
            Some(t) => t,
            None => panic!("intercomm {} has no local endpoint table", comm.context_id()),
        };
        assert_eq!(local.len(), comm.local_size(), "local endpoint table of {} does not match", comm.context_id());
    }
}

/// Releases the communicator's tables, closing endpoints if it was disconnected.
///
/// Both tables of an intercomm are released even if the first release fails; the first
/// error is returned.
pub fn release_tables(comm: &Communicator, transport: &dyn Transport) -> Result<()> {
    let disconnected = comm.is_disconnected();
    let main = comm.vcrt().map_or(Ok(false), |t| t.release(disconnected, transport));
    let local = match comm.local_vcrt() {
        Some(t) if comm.is_intercomm() => t.release(disconnected, transport),
        _ => Ok(false),
    };
    main.and(local).map(|_| ())
}

/// Gives back the tables of a communicator whose creation failed and poisons it.
fn abort_creation(comm: &Communicator, transport: &dyn Transport, err: CommError) -> CommError {
    if let Err(cleanup) = release_tables(comm, transport) {
        warn!(context_id = %comm.context_id(), error = %cleanup, "failed to release tables of an aborted communicator");
    }
    comm.set_flags(CommFlags::CREATE_FAILED);
    err
}

/// Resets creation state, builds the tables and runs the creation hooks.
///
/// On failure every endpoint taken here is given back, the communicator is marked
/// [`CommFlags::CREATE_FAILED`] and the original error is returned as is.
pub fn pre_commit(comm: &Communicator, env: &BuildEnv<'_>, hooks: &mut HookRegistry) -> Result<()> {
    comm.set_flags(CommFlags::ANY_SOURCE_ENABLED);
    comm.clear_flags(CommFlags::DISCONNECTED);
    comm.reset_last_ack();

    if let Err(e) = build_tables(comm, env) {
        comm.set_flags(CommFlags::CREATE_FAILED);
        return Err(e);
    }
    if let Err(e) = hooks.run_create_hooks(comm) {
        return Err(abort_creation(comm, env.transport, e));
    }
    Ok(())
}

/// Finishes a successful creation: the local sub-communicator of an intercomm takes a
/// reference to the local table and the mapper list is dropped.
pub fn post_commit(comm: &Communicator) {
    if comm.is_intercomm() {
        if let (Some(sub), Some(t)) = (comm.local_comm(), comm.local_vcrt()) {
            sub.install_vcrt(t.add_ref());
        }
    }
    drop(comm.take_mappers());
    comm.set_flags(CommFlags::COMMITTED);
    debug!(
        context_id = %comm.context_id(),
        kind = ?comm.kind(),
        local_size = comm.local_size(),
        remote_size = comm.remote_size(),
        "committed communicator"
    );
}

/// Runs the destruction hooks and releases the tables.
pub fn destroy(comm: &Communicator, hooks: &mut HookRegistry, transport: &dyn Transport) -> Result<()> {
    hooks.run_destroy_hooks(comm)?;
    release_tables(comm, transport)?;
    comm.set_flags(CommFlags::DESTROYED);
    debug!(context_id = %comm.context_id(), disconnected = comm.is_disconnected(), "destroyed communicator");
    Ok(())
}
