//! Creation and destruction hooks.
//!
//! Cross-cutting features (failure tracking, collective offload) observe communicator
//! birth and death by registering hooks here instead of being called by the lifecycle
//! code directly. Hooks run in registration order; the first failing hook stops the pass
//! and its error is returned unchanged.

use tracing::debug;

use crate::comm::Communicator;
use crate::error::Result;

/// Callback run on communicator creation or destruction.
///
/// Any state the callback needs is captured by the implementor.
pub trait CommHook: Send {
    fn call(&mut self, comm: &Communicator) -> Result<()>;
}

impl<F> CommHook for F
where
    F: FnMut(&Communicator) -> Result<()> + Send,
{
    fn call(&mut self, comm: &Communicator) -> Result<()> {
        self(comm)
    }
}

/// Handle returned at registration, used to deregister.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct HookId(u64);

struct HookEntry {
    id: HookId,
    hook: Box<dyn CommHook>,
}

/// Ordered creation and destruction hook lists.
#[derive(Default)]
pub struct HookRegistry {
    create: Vec<HookEntry>,
    destroy: Vec<HookEntry>,
    next_id: u64,
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("create", &self.create.len())
            .field("destroy", &self.destroy.len())
            .finish()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> HookId {
        self.next_id += 1;
        HookId(self.next_id)
    }

    pub fn register_create_hook(&mut self, hook: impl CommHook + 'static) -> HookId {
        let id = self.next_id();
        self.create.push(HookEntry { id, hook: Box::new(hook) });
        id
    }

    pub fn register_destroy_hook(&mut self, hook: impl CommHook + 'static) -> HookId {
        let id = self.next_id();
        self.destroy.push(HookEntry { id, hook: Box::new(hook) });
        id
    }

    /// Removes a hook from whichever list holds it. Returns false for unknown ids.
    pub fn deregister(&mut self, id: HookId) -> bool {
        let before = self.create.len() + self.destroy.len();
        self.create.retain(|e| e.id != id);
        self.destroy.retain(|e| e.id != id);
        before != self.create.len() + self.destroy.len()
    }

    pub fn create_hook_count(&self) -> usize {
        self.create.len()
    }

    pub fn destroy_hook_count(&self) -> usize {
        self.destroy.len()
    }

    pub fn run_create_hooks(&mut self, comm: &Communicator) -> Result<()> {
        for entry in &mut self.create {
            entry.hook.call(comm)?;
        }
        Ok(())
    }

    pub fn run_destroy_hooks(&mut self, comm: &Communicator) -> Result<()> {
        for entry in &mut self.destroy {
            entry.hook.call(comm)?;
        }
        Ok(())
    }

    /// Drops every hook in both lists.
    pub fn teardown(&mut self) {
        debug!(create = self.create.len(), destroy = self.destroy.len(), "tearing down communicator hooks");
        self.create.clear();
        self.destroy.clear();
    }
}
