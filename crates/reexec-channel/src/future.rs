//! Read side of the result channel

use crate::outcome::Outcome;
use log::debug;
use nix::unistd::Pid;
use reexec_core::{ExecError, Result};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::Read;
use std::marker::PhantomData;
use std::os::fd::OwnedFd;

/// Read-once handle to an outcome produced in another process
///
/// [`get`](InterprocessFuture::get) blocks until the writer closes its end of the
/// stream. There is no timeout; callers that need one run `get` on a thread of
/// their own.
pub struct InterprocessFuture<T, R: Read = File> {
    stream: R,
    origin: Option<Pid>,
    _value: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> InterprocessFuture<T, File> {
    /// Wrap the read end of a pipe
    pub fn from_fd(fd: OwnedFd) -> Self {
        Self::new(File::from(fd))
    }
}

impl<T: DeserializeOwned, R: Read> InterprocessFuture<T, R> {
    /// Bind a future to an open, readable stream
    pub fn new(stream: R) -> Self {
        Self {
            stream,
            origin: None,
            _value: PhantomData,
        }
    }

    /// Record the process expected to fulfil this future
    pub fn with_origin(mut self, pid: Pid) -> Self {
        self.origin = Some(pid);
        self
    }

    /// Process expected to fulfil this future, when known
    pub fn origin(&self) -> Option<Pid> {
        self.origin
    }

    /// Block until the outcome arrives and return it
    ///
    /// A remote failure becomes [`ExecError::Remote`]. End-of-stream with no bytes
    /// becomes [`ExecError::ChannelClosed`]: the producer exited without reporting.
    pub fn get(mut self) -> Result<T> {
        let mut bytes = Vec::new();
        self.stream.read_to_end(&mut bytes)?;

        if bytes.is_empty() {
            debug!(
                "Future from {:?} observed end-of-stream with no outcome",
                self.origin
            );
            return Err(ExecError::ChannelClosed);
        }

        let outcome: Outcome<T> = serde_json::from_slice(&bytes).map_err(|e| {
            ExecError::Decode(format!("outcome of {} bytes: {}", bytes.len(), e))
        })?;

        outcome.into_result()
    }
}
