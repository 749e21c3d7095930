//! Executor handle over a shared process registry

use crate::execution::ProcessRegistry;
use nix::unistd::Pid;
use reexec_channel::InterprocessFuture;
use reexec_core::Result;
use reexec_message::Work;
use std::sync::Arc;

/// Cheap, cloneable executor that runs each piece of work in a new process
///
/// All clones share one [`ProcessRegistry`]; the registry reaps its workers when
/// the last clone is dropped.
#[derive(Debug, Clone)]
pub struct NewProcessExecutor {
    registry: Arc<ProcessRegistry>,
}

impl NewProcessExecutor {
    pub fn new(registry: Arc<ProcessRegistry>) -> Self {
        Self { registry }
    }

    /// One-way call: fire and forget
    pub fn execute<W: Work>(&self, work: W) -> Result<Pid> {
        self.registry.execute(work)
    }

    /// Two-way call: the future yields `work`'s output or its failure
    pub fn twoway_execute<W: Work>(&self, work: W) -> Result<InterprocessFuture<W::Output>> {
        self.registry.twoway_execute(work)
    }

    /// Block until every worker spawned through this executor has exited
    pub fn wait(&self) -> Result<()> {
        self.registry.wait()
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }
}

impl Default for NewProcessExecutor {
    fn default() -> Self {
        Self::new(Arc::new(ProcessRegistry::new()))
    }
}
