//! Bootstrap process group from an MPI launch.
//!
//! The MPI universe is initialized once and kept alive for as long as the bootstrap
//! lives; dropping it finalizes MPI.

use mpi::environment::Universe;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use crate::core::types::ProcessGroup;
use crate::error::{CommError, Result};

pub struct MpiBootstrap {
    _universe: Universe,
    world: SimpleCommunicator,
    rank: usize,
    size: usize,
}

impl MpiBootstrap {
    /// Initializes MPI and reads this process's rank and the job size.
    pub fn new() -> Result<Self> {
        let universe = mpi::initialize().ok_or_else(|| CommError::Transport("MPI already initialized".into()))?;
        let world = universe.world();
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        Ok(MpiBootstrap { _universe: universe, world, rank, size })
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn world(&self) -> &SimpleCommunicator {
        &self.world
    }

    /// One connection per process of the MPI world.
    pub fn process_group(&self) -> ProcessGroup {
        ProcessGroup::new(self.rank, self.size)
    }
}
