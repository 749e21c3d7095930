//! Process registry: spawns workers and reaps them

use crate::execution::spawn::{ExecutorConfig, InheritedFd, spawn_image};
use log::{debug, info, warn};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{Pid, pipe2};
use reexec_channel::InterprocessFuture;
use reexec_core::{ExecError, Result};
use reexec_message::{ActiveMessage, Work};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Tracks every process spawned through it and reaps them all on
/// [`wait`](ProcessRegistry::wait) or when dropped
///
/// Safe to share between threads; only the tracked list is locked, spawning
/// itself runs concurrently.
#[derive(Debug)]
pub struct ProcessRegistry {
    config: ExecutorConfig,
    processes: Mutex<Vec<Pid>>,
}

impl ProcessRegistry {
    /// Registry that re-executes the running binary
    pub fn new() -> Self {
        Self::with_config(ExecutorConfig::default())
    }

    pub fn with_config(config: ExecutorConfig) -> Self {
        Self {
            config,
            processes: Mutex::new(Vec::new()),
        }
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run `work` in a new process, discarding its result
    pub fn execute<W: Work>(&self, work: W) -> Result<Pid> {
        let message = ActiveMessage::new(&work)?;
        self.dispatch(&message, &[])
    }

    /// Run `work` in a new process and return a future for its result
    pub fn twoway_execute<W: Work>(&self, work: W) -> Result<InterprocessFuture<W::Output>> {
        let (read_end, write_end) = pipe2(OFlag::O_CLOEXEC)
            .map_err(|e| ExecError::Spawn(format!("pipe2 failed: {}", e)))?;

        let reply = InheritedFd::new(write_end)?;
        let message = ActiveMessage::with_reply(&work, reply.target())?;
        let pid = self.dispatch(&message, &[&reply])?;

        // The child holds the only write end from here on.
        drop(reply);

        Ok(InterprocessFuture::from_fd(read_end).with_origin(pid))
    }

    fn dispatch(&self, message: &ActiveMessage, inherited: &[&InheritedFd]) -> Result<Pid> {
        let record = message.to_text()?;
        let program = self.config.resolve_program()?;
        let env = self.config.prepare_environment(&record);

        let pid = spawn_image(&program, &env, inherited).inspect_err(|e| {
            warn!("Failed to spawn worker for '{}': {}", message.tag(), e);
        })?;

        info!(
            "Spawned worker {} for '{}' ({})",
            pid,
            message.tag(),
            if message.reply().is_some() {
                "two-way"
            } else {
                "one-way"
            }
        );

        self.lock().push(pid);
        Ok(pid)
    }

    /// Pids spawned and not yet reaped, in spawn order
    pub fn tracked(&self) -> Vec<Pid> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Block until every tracked process has exited, then forget them
    ///
    /// The lock is held for the whole reap so no pid can be added mid-drain.
    /// Every pid is waited on even if an earlier one fails; the first error is
    /// returned.
    pub fn wait(&self) -> Result<()> {
        let mut processes = self.lock();
        let mut first_error = None;

        for pid in processes.drain(..) {
            match wait_for_child(pid) {
                Ok(Some(status)) => debug!("Reaped worker {} (status {})", pid, status),
                Ok(None) => warn!("Worker {} was already reaped elsewhere", pid),
                Err(e) => {
                    warn!("Failed to reap worker {}: {}", pid, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Reap every tracked process and consume the registry
    pub fn shutdown(self) -> Result<()> {
        self.wait()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Pid>> {
        self.processes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProcessRegistry {
    fn drop(&mut self) {
        if let Err(e) = self.wait() {
            warn!("Error while reaping workers on drop: {}", e);
        }
    }
}

/// Builder for [`ProcessRegistry`]
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    config: ExecutorConfig,
}

impl RegistryBuilder {
    /// Spawn `program` instead of the running executable
    pub fn program(mut self, program: impl Into<PathBuf>) -> Self {
        self.config.program = Some(program.into());
        self
    }

    /// Set an environment variable in every spawned process
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.env.push((key.into(), value.into()));
        self
    }

    /// Start children from an empty environment instead of a copy of this one
    pub fn inherit_env(mut self, inherit: bool) -> Self {
        self.config.inherit_env = inherit;
        self
    }

    pub fn build(self) -> ProcessRegistry {
        ProcessRegistry::with_config(self.config)
    }
}

/// Wait for a child and return its exit status (128 + signal when killed)
///
/// `Ok(None)` means the child is no longer ours to reap.
fn wait_for_child(pid: Pid) -> Result<Option<i32>> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, status)) => return Ok(Some(status)),
            Ok(WaitStatus::Signaled(_, signal, _)) => return Ok(Some(128 + signal as i32)),
            Ok(_) => continue,
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => return Ok(None),
            Err(e) => return Err(ExecError::Wait(format!("waitpid {} failed: {}", pid, e))),
        }
    }
}
