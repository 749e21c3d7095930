//! Table of work kinds a process knows how to activate

use crate::message::ActiveMessage;
use crate::reply::run_and_reply;
use crate::work::Work;
use log::{debug, error, warn};
use reexec_channel::InterprocessPromise;
use reexec_core::{ExecError, InterprocessException, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::File;
use nix::fcntl::{FcntlArg, FdFlag, fcntl};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::panic::{self, AssertUnwindSafe};

type OneWayFn = fn(Value) -> Result<()>;
type TwoWayFn = fn(Value, OwnedFd) -> Result<()>;

#[derive(Clone, Copy)]
struct Activator {
    type_name: &'static str,
    one_way: OneWayFn,
    two_way: TwoWayFn,
}

/// Registry of [`Work`] kinds, keyed by tag
///
/// A spawned process can only run work whose kind it has registered, so the
/// catalog handed to the startup hook must be built the same way in every
/// process image.
#[derive(Clone, Default)]
pub struct Catalog {
    activators: HashMap<&'static str, Activator>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `W`, keeping the first registration if its tag is taken
    pub fn register<W: Work>(mut self) -> Self {
        if let Err(e) = self.try_register::<W>() {
            warn!("{}", e);
        }
        self
    }

    /// Register `W`; fails if its tag already belongs to another type
    pub fn try_register<W: Work>(&mut self) -> Result<()> {
        let type_name = std::any::type_name::<W>();

        match self.activators.entry(W::TAG) {
            Entry::Occupied(existing) if existing.get().type_name != type_name => {
                Err(ExecError::Registration(format!(
                    "tag '{}' already registered for {}, refusing {}",
                    W::TAG,
                    existing.get().type_name,
                    type_name
                )))
            }
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(Activator {
                    type_name,
                    one_way: activate_one_way::<W>,
                    two_way: activate_two_way::<W>,
                });
                Ok(())
            }
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.activators.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.activators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activators.is_empty()
    }

    /// Registered tags, sorted
    pub fn tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<_> = self.activators.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    /// Invoke the work carried by `message`
    ///
    /// One-way results are discarded. Two-way results are written to the reply
    /// descriptor, which this call takes ownership of and closes.
    pub fn activate(&self, message: ActiveMessage) -> Result<()> {
        let reply = message.reply().map(claim_reply_descriptor).transpose()?;

        let Some(activator) = self.activators.get(message.tag()).copied() else {
            if let Some(reply) = reply {
                report_undecodable(
                    reply,
                    format!("unknown work '{}'", message.tag()),
                );
            }
            return Err(ExecError::UnknownWork(message.tag().to_string()));
        };

        debug!(
            "Activating '{}' ({})",
            message.tag(),
            if reply.is_some() { "two-way" } else { "one-way" }
        );

        let payload = message.payload().clone();
        match reply {
            Some(reply) => (activator.two_way)(payload, reply),
            None => (activator.one_way)(payload),
        }
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog").field("tags", &self.tags()).finish()
    }
}

/// Take ownership of an inherited descriptor after checking it is open
fn claim_reply_descriptor(fd: RawFd) -> Result<OwnedFd> {
    // SAFETY: F_GETFD only inspects the descriptor table entry.
    if fd < 0 || unsafe { libc::fcntl(fd, libc::F_GETFD) } == -1 {
        return Err(ExecError::Decode(format!(
            "reply descriptor {} is not open in process {}",
            fd,
            std::process::id()
        )));
    }

    // SAFETY: the descriptor is open and was handed to this process for
    // exclusive use by the spawning side; nothing else in this image owns it.
    let owned = unsafe { OwnedFd::from_raw_fd(fd) };

    // The spawn cleared close-on-exec; anything this worker starts must not
    // hold the caller's pipe open.
    fcntl(owned.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC)).map_err(|e| {
        ExecError::Decode(format!("cannot mark reply descriptor {} close-on-exec: {}", fd, e))
    })?;

    Ok(owned)
}

/// Best-effort failure report for a two-way message that cannot be decoded
fn report_undecodable(reply: OwnedFd, description: String) {
    let promise = InterprocessPromise::<Value, File>::new(File::from(reply));
    if let Err(e) = promise.set_exception(InterprocessException::error(description)) {
        warn!("Could not report decode failure to caller: {}", e);
    }
}

fn decode_payload<W: Work>(payload: Value) -> Result<W> {
    serde_json::from_value(payload)
        .map_err(|e| ExecError::Decode(format!("work '{}': {}", W::TAG, e)))
}

fn activate_one_way<W: Work>(payload: Value) -> Result<()> {
    let work = decode_payload::<W>(payload)?;

    match panic::catch_unwind(AssertUnwindSafe(move || work.run())) {
        Ok(Ok(_)) => debug!("One-way work '{}' finished", W::TAG),
        Ok(Err(e)) => {
            // Workers run before any logger is installed.
            warn!("One-way work '{}' failed: {}", W::TAG, e);
            eprintln!(
                "reexec worker {}: one-way work '{}' failed: {}",
                std::process::id(),
                W::TAG,
                e
            );
        }
        Err(payload) => error!(
            "One-way work '{}' panicked: {}",
            W::TAG,
            InterprocessException::from_panic(payload.as_ref())
        ),
    }

    Ok(())
}

fn activate_two_way<W: Work>(payload: Value, reply: OwnedFd) -> Result<()> {
    let work = match decode_payload::<W>(payload) {
        Ok(work) => work,
        Err(e) => {
            report_undecodable(reply, e.to_string());
            return Err(e);
        }
    };

    run_and_reply(work, File::from(reply))
}
