//! Runtime context for the communicator core.
//!
//! The context owns what an MPI runtime would keep in globals (registry, hook lists,
//! collaborators, configuration) and exposes the lifecycle, failure and collective
//! entry points on top of it.
//!
//! # Example
//! ```rust,ignore
//! let transport = Arc::new(LocalTransport::new());
//! let services = Services { transport: transport.clone(), progress: transport, algorithms };
//! let mut ctx = RuntimeContext::init(ProcessGroup::new(0, 4), services, CollOptions::from_env()?, OffloadConfig::from_env()?)?;
//! let dup = ctx.commit(Arc::new(
//!     Communicator::intra(ContextId(64), 0, 4).with_mapper(CommMapper::dup(ctx.world().clone(), MapDir::LocalToLocal)),
//! ))?;
//! ctx.destroy(&dup)?;
//! ctx.finalize()?;
//! ```

pub mod runtime;
pub use runtime::{RuntimeContext, Services};
