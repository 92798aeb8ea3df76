//! Context id resolution tests for commkit
//!
//! The message-matching layer resolves an incoming context id to the live communicator
//! that owns it. A communicator owns its own id and collective id, and both ids of its
//! node-local and node-roots sub-communicators.

mod common;

use std::sync::Arc;

use commkit::comm::{CommMapper, Communicator, MapDir};
use commkit::core::types::ContextId;

/// Six registered communicators, each with both sub-communicators: every owned id
/// resolves to its owner, and nothing else resolves.
#[test]
fn every_owned_id_resolves_to_its_owner() {
    let mut fx = common::runtime(4);
    let world = fx.ctx.world().clone();

    let mut owners = Vec::new();
    for i in 0..6u32 {
        let base = 0x100 + 0x10 * i;
        let node = Arc::new(Communicator::intra(ContextId(0x400 + 0x10 * i), 0, 2));
        let roots = Arc::new(Communicator::intra(ContextId(0x800 + 0x10 * i), 0, 2));
        let comm = Communicator::intra(ContextId(base), 0, 4)
            .with_mapper(CommMapper::dup(world.clone(), MapDir::LocalToLocal))
            .with_node_comm(node)
            .with_node_roots_comm(roots);
        owners.push(fx.ctx.commit(Arc::new(comm)).unwrap());
    }

    for (i, owner) in owners.iter().enumerate() {
        let i = i as u32;
        let ids = [
            0x100 + 0x10 * i,
            0x101 + 0x10 * i,
            0x400 + 0x10 * i,
            0x401 + 0x10 * i,
            0x800 + 0x10 * i,
            0x801 + 0x10 * i,
        ];
        for id in ids {
            let hit = fx.ctx.find_by_context_id(ContextId(id)).unwrap();
            assert!(Arc::ptr_eq(hit, owner), "id {id:#x}");
        }
        assert!(fx.ctx.find_by_context_id(ContextId(0x102 + 0x10 * i)).is_none());
    }

    assert!(Arc::ptr_eq(fx.ctx.find_by_context_id(ContextId(1)).unwrap(), fx.ctx.world()));
}

/// Destroyed communicators no longer resolve.
#[test]
fn destroyed_communicator_stops_resolving() {
    let mut fx = common::runtime(2);
    let world = fx.ctx.world().clone();
    let comm = fx
        .ctx
        .commit(Arc::new(
            Communicator::intra(ContextId(0x100), 0, 2).with_mapper(CommMapper::dup(world, MapDir::LocalToLocal)),
        ))
        .unwrap();
    assert!(fx.ctx.find_by_context_id(ContextId(0x101)).is_some());
    fx.ctx.destroy(&comm).unwrap();
    assert!(fx.ctx.find_by_context_id(ContextId(0x101)).is_none());
}
