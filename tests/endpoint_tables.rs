//! Endpoint table derivation tests for commkit
//!
//! These tests commit communicators derived from `world` and `self` through mappers and
//! check the resulting endpoint tables:
//!
//! - exact duplicates (full-size `Dup`, identity `Irregular`) share the source table and
//!   only bump its reference count;
//! - every other mapper copies endpoints, element `i` coming from `mapping[i]`;
//! - slices land at the cumulative offset of the mappers before them.
//!
//! Random mappings come from `rand` (seeded shuffles) and `proptest`.

mod common;

use std::sync::Arc;

use commkit::comm::{CommMapper, Communicator, MapDir};
use commkit::core::types::{ContextId, Endpoint};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

fn lpids(comm: &Communicator) -> Vec<usize> {
    comm.vcrt().unwrap().iter().map(Endpoint::lpid).collect()
}

/// A full-size duplicate of world is world's own table, and destroying it gives back
/// exactly one reference.
#[test]
fn dup_shares_source_table() {
    let mut fx = common::runtime(5);
    let world = fx.ctx.world().clone();
    let before = world.vcrt().unwrap().ref_count();
    let dups_before = fx.transport.stats().dups;

    let dup = Arc::new(
        Communicator::intra(ContextId(64), 0, 5).with_mapper(CommMapper::dup(world.clone(), MapDir::LocalToLocal)),
    );
    let dup = fx.ctx.commit(dup).unwrap();

    assert!(Arc::ptr_eq(dup.vcrt().unwrap(), world.vcrt().unwrap()));
    assert_eq!(world.vcrt().unwrap().ref_count(), before + 1);
    assert_eq!(fx.transport.stats().dups, dups_before);

    fx.ctx.destroy(&dup).unwrap();
    assert_eq!(world.vcrt().unwrap().ref_count(), before);
    assert_eq!(fx.transport.stats().released, 0);
}

/// An identity mapping over the whole source takes the same sharing path.
#[test]
fn identity_irregular_shares_source_table() {
    let mut fx = common::runtime(4);
    let world = fx.ctx.world().clone();
    let before = world.vcrt().unwrap().ref_count();

    let comm = Arc::new(
        Communicator::intra(ContextId(64), 0, 4)
            .with_mapper(CommMapper::irregular(world.clone(), vec![0, 1, 2, 3], MapDir::LocalToLocal)),
    );
    let comm = fx.ctx.commit(comm).unwrap();
    assert!(Arc::ptr_eq(comm.vcrt().unwrap(), world.vcrt().unwrap()));
    assert_eq!(world.vcrt().unwrap().ref_count(), before + 1);
}

/// A permutation copies every endpoint from the permuted source rank.
#[test]
fn permuted_irregular_copies_elements() {
    let mut fx = common::runtime(16);
    let world = fx.ctx.world().clone();
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for round in 0..8u32 {
        let mut mapping: Vec<usize> = (0..16).collect();
        mapping.shuffle(&mut rng);
        if mapping.iter().enumerate().all(|(i, &r)| i == r) {
            mapping.swap(0, 1);
        }

        let comm = Arc::new(
            Communicator::intra(ContextId(64 + 16 * round), 0, 16)
                .with_mapper(CommMapper::irregular(world.clone(), mapping.clone(), MapDir::LocalToLocal)),
        );
        let comm = fx.ctx.commit(comm).unwrap();
        assert!(!Arc::ptr_eq(comm.vcrt().unwrap(), world.vcrt().unwrap()));
        for (i, &r) in mapping.iter().enumerate() {
            assert!(comm.endpoint(i).unwrap().same_connection(world.endpoint(r).unwrap()));
        }
        fx.ctx.destroy(&comm).unwrap();
    }
}

/// Mappers contributing 2, 3 and 1 ranks occupy `[0, 1]`, `[2, 4]` and `[5]`.
#[test]
fn offsets_follow_mapper_order() {
    let mut fx = common::runtime(8);
    let world = fx.ctx.world().clone();
    let self_comm = fx.ctx.self_comm().clone();

    let comm = Arc::new(
        Communicator::intra(ContextId(64), 0, 6)
            .with_mapper(CommMapper::irregular(world.clone(), vec![7, 6], MapDir::LocalToLocal))
            .with_mapper(CommMapper::irregular(world.clone(), vec![5, 4, 3], MapDir::LocalToLocal))
            .with_mapper(CommMapper::dup(self_comm, MapDir::LocalToLocal)),
    );
    let comm = fx.ctx.commit(comm).unwrap();
    assert_eq!(lpids(&comm), vec![7, 6, 5, 4, 3, 0]);
}

/// Intercomm tables: local-group mappers fill the local table, remote-group mappers the
/// main table, each pass with its own offsets.
#[test]
fn intercomm_passes_have_separate_offsets() {
    let mut fx = common::runtime(6);
    let world = fx.ctx.world().clone();

    let ic = Arc::new(
        Communicator::inter(ContextId(64), 1, 2, 4)
            .with_mapper(CommMapper::irregular(world.clone(), vec![4, 5], MapDir::LocalToLocal))
            .with_mapper(CommMapper::irregular(world.clone(), vec![0, 1], MapDir::LocalToRemote))
            .with_mapper(CommMapper::irregular(world.clone(), vec![2, 3], MapDir::LocalToRemote)),
    );
    let ic = fx.ctx.commit(ic).unwrap();
    assert_eq!(lpids(&ic), vec![0, 1, 2, 3]);
    let local: Vec<_> = ic.local_vcrt().unwrap().iter().map(Endpoint::lpid).collect();
    assert_eq!(local, vec![4, 5]);
}

/// Mapper list is dropped once the communicator is committed.
#[test]
fn mappers_are_released_after_commit() {
    let mut fx = common::runtime(3);
    let world = fx.ctx.world().clone();
    let strong_before = Arc::strong_count(&world);
    let comm = Arc::new(
        Communicator::intra(ContextId(64), 0, 2)
            .with_mapper(CommMapper::irregular(world.clone(), vec![2, 1], MapDir::LocalToLocal)),
    );
    assert_eq!(Arc::strong_count(&world), strong_before + 1);
    fx.ctx.commit(comm).unwrap();
    assert_eq!(Arc::strong_count(&world), strong_before);
}

proptest! {
    /// Any list of irregular mappers lays its slices out back to back.
    #[test]
    fn prop_slices_are_contiguous(mappings in prop::collection::vec(prop::collection::vec(0usize..8, 1..4), 1..5)) {
        let mut fx = common::runtime(8);
        let world = fx.ctx.world().clone();
        let total: usize = mappings.iter().map(Vec::len).sum();

        let mut comm = Communicator::intra(ContextId(64), 0, total);
        for m in &mappings {
            comm = comm.with_mapper(CommMapper::irregular(world.clone(), m.clone(), MapDir::LocalToLocal));
        }
        let comm = fx.ctx.commit(Arc::new(comm)).unwrap();

        let expected: Vec<usize> = mappings.concat();
        prop_assert_eq!(lpids(&comm), expected);
    }
}
