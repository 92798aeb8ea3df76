//! Non-blocking gather dispatch.
//!
//! Routing, in order:
//! 1. device override (all collectives, or per collective under `percoll`);
//! 2. the algorithm forced by [`CollOptions`] for the communicator kind;
//! 3. `auto`: the [`CollSelector`] picks an [`Algorithm`].
//!
//! Schedule-based algorithms only fill a [`Schedule`]; the dispatcher starts it on the
//! progress engine, so every path hands back exactly one [`Request`].

use tracing::debug;

use crate::coll::selector::{Algorithm, CollSelector};
use crate::coll::{CollArgs, CollKind, CollSignature, GatherArgs, Request, Root, Schedule};
use crate::comm::{CommKind, Communicator};
use crate::config::{CollOptions, IgatherInterAlgorithm, IgatherIntraAlgorithm};
use crate::core::traits::Progress;
use crate::error::Result;

/// Gather algorithm bodies supplied by the transport layer.
pub trait GatherAlgorithms: Send + Sync {
    /// Transport-native tree gather with fan-out `k`.
    fn intra_gentran_tree(&self, args: &GatherArgs, comm: &Communicator, k: usize) -> Result<Request>;
    fn intra_sched_binomial(&self, args: &GatherArgs, comm: &Communicator, sched: &mut Schedule) -> Result<()>;
    /// Remote group gathers locally, then one message crosses to the root.
    fn inter_sched_short(&self, args: &GatherArgs, comm: &Communicator, sched: &mut Schedule) -> Result<()>;
    /// Every remote process sends straight to the root.
    fn inter_sched_long(&self, args: &GatherArgs, comm: &Communicator, sched: &mut Schedule) -> Result<()>;
    /// Device-level override of the whole collective.
    fn device_igather(&self, args: &GatherArgs, comm: &Communicator) -> Result<Request>;
}

/// Borrowed view of everything a collective call needs.
#[derive(Clone, Copy)]
pub struct CollDispatch<'a> {
    pub options: &'a CollOptions,
    pub selector: &'a dyn CollSelector,
    pub algorithms: &'a dyn GatherAlgorithms,
    pub progress: &'a dyn Progress,
}

impl<'a> CollDispatch<'a> {
    pub fn new(
        options: &'a CollOptions,
        selector: &'a dyn CollSelector,
        algorithms: &'a dyn GatherAlgorithms,
        progress: &'a dyn Progress,
    ) -> Self {
        Self { options, selector, algorithms, progress }
    }

    /// Starts a gather and returns its request without waiting for completion.
    pub fn igather(&self, args: &GatherArgs, comm: &Communicator) -> Result<Request> {
        if self.options.device_override(CollKind::Igather) {
            debug!(context_id = %comm.context_id(), "igather delegated to device");
            return self.algorithms.device_igather(args, comm);
        }
        self.igather_impl(args, comm)
    }

    /// Blocking gather: [`igather`](Self::igather) followed by a wait.
    pub fn gather(&self, args: &GatherArgs, comm: &Communicator) -> Result<()> {
        let req = self.igather(args, comm)?;
        if !req.is_complete() {
            self.progress.wait(&req)?;
        }
        Ok(())
    }

    /// Algorithm-level entry point; never consults the device override.
    pub fn igather_impl(&self, args: &GatherArgs, comm: &Communicator) -> Result<Request> {
        let forced = match comm.kind() {
            CommKind::Intra => match self.options.igather_intra_algorithm {
                IgatherIntraAlgorithm::GentranTree => {
                    Some(Algorithm::IgatherIntraGentranTree { k: self.options.igather_tree_kval })
                }
                IgatherIntraAlgorithm::SchedBinomial => Some(Algorithm::IgatherIntraSchedBinomial),
                IgatherIntraAlgorithm::SchedAuto => Some(Algorithm::IgatherIntraSchedAuto),
                IgatherIntraAlgorithm::Auto => None,
            },
            CommKind::Inter => match self.options.igather_inter_algorithm {
                IgatherInterAlgorithm::SchedLong => Some(Algorithm::IgatherInterSchedLong),
                IgatherInterAlgorithm::SchedShort => Some(Algorithm::IgatherInterSchedShort),
                IgatherInterAlgorithm::SchedAuto => Some(Algorithm::IgatherInterSchedAuto),
                IgatherInterAlgorithm::Auto => None,
            },
        };
        match forced {
            Some(algorithm) => self.run(algorithm, args, comm),
            None => self.allcomm_auto(args, comm),
        }
    }

    /// Asks the selector for an algorithm and runs it.
    ///
    /// # Panics
    /// If the selector has no algorithm for the call.
    pub fn allcomm_auto(&self, args: &GatherArgs, comm: &Communicator) -> Result<Request> {
        let sig = CollSignature { comm, args: CollArgs::Igather(*args) };
        let Some(algorithm) = self.selector.search(&sig) else {
            panic!("selector returned no igather algorithm for communicator {}", comm.context_id());
        };
        self.run(algorithm, args, comm)
    }

    fn run(&self, algorithm: Algorithm, args: &GatherArgs, comm: &Communicator) -> Result<Request> {
        assert!(
            algorithm.coll() == CollKind::Igather && algorithm.comm_kind() == comm.kind(),
            "algorithm {algorithm:?} cannot run igather on a {:?} communicator",
            comm.kind()
        );
        debug!(context_id = %comm.context_id(), ?algorithm, "igather algorithm selected");

        let algs = self.algorithms;
        match algorithm {
            Algorithm::IgatherIntraGentranTree { k } => algs.intra_gentran_tree(args, comm, k),
            Algorithm::IgatherIntraSchedAuto => self.sched(|s| self.intra_sched_auto(args, comm, s)),
            Algorithm::IgatherIntraSchedBinomial => self.sched(|s| algs.intra_sched_binomial(args, comm, s)),
            Algorithm::IgatherInterSchedAuto => self.sched(|s| self.inter_sched_auto(args, comm, s)),
            Algorithm::IgatherInterSchedLong => self.sched(|s| algs.inter_sched_long(args, comm, s)),
            Algorithm::IgatherInterSchedShort => self.sched(|s| algs.inter_sched_short(args, comm, s)),
        }
    }

    /// Builds a schedule and starts it. An empty schedule completes on the spot.
    fn sched(&self, build: impl FnOnce(&mut Schedule) -> Result<()>) -> Result<Request> {
        let mut sched = Schedule::new();
        build(&mut sched)?;
        if sched.is_empty() {
            return Ok(Request::null());
        }
        self.progress.start(sched)
    }

    /// Schedule-level auto for either communicator kind.
    pub fn sched_auto(&self, args: &GatherArgs, comm: &Communicator, sched: &mut Schedule) -> Result<()> {
        match comm.kind() {
            CommKind::Intra => self.intra_sched_auto(args, comm, sched),
            CommKind::Inter => self.inter_sched_auto(args, comm, sched),
        }
    }

    pub fn intra_sched_auto(&self, args: &GatherArgs, comm: &Communicator, sched: &mut Schedule) -> Result<()> {
        self.algorithms.intra_sched_binomial(args, comm, sched)
    }

    /// Short algorithm strictly below the configured byte threshold, long from it on.
    /// Non-root processes of the root group have nothing to do. The byte count saturates,
    /// so oversized messages take the long algorithm.
    pub fn inter_sched_auto(&self, args: &GatherArgs, comm: &Communicator, sched: &mut Schedule) -> Result<()> {
        let nbytes = match args.root {
            Root::ProcNull => return Ok(()),
            Root::Root => args.recvtype.size().saturating_mul(args.recvcount).saturating_mul(comm.remote_size()),
            Root::Rank(_) => args.sendtype.size().saturating_mul(args.sendcount).saturating_mul(comm.local_size()),
        };
        if nbytes < self.options.gather_inter_short_msg_size {
            self.algorithms.inter_sched_short(args, comm, sched)
        } else {
            self.algorithms.inter_sched_long(args, comm, sched)
        }
    }
}
