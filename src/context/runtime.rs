//! Runtime context: the process-wide state of the communicator core.
//!
//! Everything that would otherwise be global lives in one [`RuntimeContext`] owned by
//! the embedding application: the communicator registry, the hook lists, the
//! collaborators and the static configuration. Callers serialize mutating calls
//! (`&mut self`); committed communicators can be read from any thread.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::coll::{CollDispatch, CollSelector, GatherAlgorithms, GatherArgs, Request, TableSelector};
use crate::comm::failure::handle_failed_procs;
use crate::comm::hooks::HookId;
use crate::comm::lifecycle::{self, BuildEnv};
use crate::comm::{Builtin, CommHook, CommRegistry, Communicator, HookRegistry};
use crate::config::{CollOptions, OffloadConfig};
use crate::core::traits::{Progress, Transport};
use crate::core::types::{ContextId, Group, ProcessGroup};
use crate::error::{CommError, Result};

pub const WORLD_CONTEXT_ID: ContextId = ContextId(0);
pub const SELF_CONTEXT_ID: ContextId = ContextId(16);
pub const ICOMM_WORLD_CONTEXT_ID: ContextId = ContextId(32);

/// External collaborators of the runtime.
#[derive(Clone)]
pub struct Services {
    pub transport: Arc<dyn Transport>,
    pub progress: Arc<dyn Progress>,
    pub algorithms: Arc<dyn GatherAlgorithms>,
}

pub struct RuntimeContext {
    pg: ProcessGroup,
    services: Services,
    options: CollOptions,
    offload: OffloadConfig,
    selector: Box<dyn CollSelector>,
    registry: CommRegistry,
    hooks: HookRegistry,
    world: Arc<Communicator>,
    self_comm: Arc<Communicator>,
    icomm_world: Arc<Communicator>,
}

impl std::fmt::Debug for RuntimeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeContext")
            .field("rank", &self.pg.rank())
            .field("size", &self.pg.size())
            .field("options", &self.options)
            .field("registered", &self.registry.len())
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl RuntimeContext {
    /// Validates the configuration, loads the selector and commits `world`, `self` and
    /// the internal world duplicate.
    pub fn init(pg: ProcessGroup, services: Services, options: CollOptions, offload: OffloadConfig) -> Result<Self> {
        options.validate()?;
        let selector: Box<dyn CollSelector> = match &options.coll_selection_tuning_json_file {
            Some(path) => Box::new(load_selector(path)?),
            None => Box::new(TableSelector::default()),
        };

        let (rank, size) = (pg.rank(), pg.size());
        let world = Arc::new(Communicator::builtin(Builtin::World, WORLD_CONTEXT_ID, rank, size));
        let self_comm = Arc::new(Communicator::builtin(Builtin::SelfComm, SELF_CONTEXT_ID, 0, 1));
        let icomm_world = Arc::new(Communicator::builtin(Builtin::WorldInternal, ICOMM_WORLD_CONTEXT_ID, rank, size));

        let mut ctx = Self {
            pg,
            services,
            options,
            offload,
            selector,
            registry: CommRegistry::new(),
            hooks: HookRegistry::new(),
            world: Arc::clone(&world),
            self_comm: Arc::clone(&self_comm),
            icomm_world: Arc::clone(&icomm_world),
        };
        ctx.commit(world)?;
        ctx.commit(self_comm)?;
        ctx.commit(icomm_world)?;
        debug!(rank, size, "runtime initialized");
        Ok(ctx)
    }

    /// Builds the communicator's tables, runs the creation hooks and registers it.
    ///
    /// On error nothing is registered and the communicator cannot be committed again;
    /// a later attempt returns [`CommError::AlreadyCommitted`].
    pub fn commit(&mut self, comm: Arc<Communicator>) -> Result<Arc<Communicator>> {
        if comm.is_committed() || comm.creation_failed() || self.registry.contains(&comm) {
            return Err(CommError::AlreadyCommitted(comm.context_id().0));
        }
        let env = BuildEnv { pg: &self.pg, world: Some(&self.world), transport: self.services.transport.as_ref() };
        lifecycle::pre_commit(&comm, &env, &mut self.hooks)?;
        lifecycle::post_commit(&comm);
        self.registry.add(Arc::clone(&comm));
        Ok(comm)
    }

    /// Runs the destruction hooks, releases the tables and unregisters the communicator.
    ///
    /// A failing destruction hook leaves the communicator registered.
    pub fn destroy(&mut self, comm: &Arc<Communicator>) -> Result<()> {
        if !self.registry.contains(comm) {
            return Err(CommError::NotRegistered(comm.context_id().0));
        }
        lifecycle::destroy(comm, &mut self.hooks, self.services.transport.as_ref())?;
        self.registry.remove(comm);
        Ok(())
    }

    /// Destroys the builtin communicators and tears the hook lists down.
    pub fn finalize(mut self) -> Result<()> {
        for comm in [Arc::clone(&self.icomm_world), Arc::clone(&self.self_comm), Arc::clone(&self.world)] {
            self.destroy(&comm)?;
        }
        if !self.registry.is_empty() {
            warn!(leaked = self.registry.len(), "communicators still registered at finalize");
        }
        self.hooks.teardown();
        Ok(())
    }

    pub fn register_create_hook(&mut self, hook: impl CommHook + 'static) -> HookId {
        self.hooks.register_create_hook(hook)
    }

    pub fn register_destroy_hook(&mut self, hook: impl CommHook + 'static) -> HookId {
        self.hooks.register_destroy_hook(hook)
    }

    pub fn deregister_hook(&mut self, id: HookId) -> bool {
        self.hooks.deregister(id)
    }

    /// Disables any-source receives on every communicator containing a process of `failed`.
    pub fn handle_failed_procs(&self, failed: &Group) -> usize {
        handle_failed_procs(&self.registry, failed, &self.pg, self.services.progress.as_ref())
    }

    pub fn find_by_context_id(&self, id: ContextId) -> Option<&Arc<Communicator>> {
        self.registry.find_by_context_id(id)
    }

    pub fn set_selector(&mut self, selector: impl CollSelector + 'static) {
        self.selector = Box::new(selector);
    }

    pub fn dispatch(&self) -> CollDispatch<'_> {
        CollDispatch::new(
            &self.options,
            self.selector.as_ref(),
            self.services.algorithms.as_ref(),
            self.services.progress.as_ref(),
        )
    }

    pub fn igather(&self, args: &GatherArgs, comm: &Communicator) -> Result<Request> {
        self.dispatch().igather(args, comm)
    }

    pub fn gather(&self, args: &GatherArgs, comm: &Communicator) -> Result<()> {
        self.dispatch().gather(args, comm)
    }

    /// Offload library variables to export, given the current process environment.
    pub fn offload_env_defaults(&self) -> Vec<(String, String)> {
        self.offload.env_defaults(|var| std::env::var(var).ok())
    }

    pub fn world(&self) -> &Arc<Communicator> {
        &self.world
    }

    pub fn self_comm(&self) -> &Arc<Communicator> {
        &self.self_comm
    }

    pub fn icomm_world(&self) -> &Arc<Communicator> {
        &self.icomm_world
    }

    pub fn registry(&self) -> &CommRegistry {
        &self.registry
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn options(&self) -> &CollOptions {
        &self.options
    }

    pub fn offload(&self) -> &OffloadConfig {
        &self.offload
    }

    pub fn process_group(&self) -> &ProcessGroup {
        &self.pg
    }

    pub fn transport(&self) -> &dyn Transport {
        self.services.transport.as_ref()
    }
}

fn load_selector(path: &Path) -> Result<TableSelector> {
    let selector = TableSelector::from_file(path)?;
    debug!(path = %path.display(), rules = selector.rules().len(), "loaded selector tuning file");
    Ok(selector)
}
