//! Write side of the result channel

use crate::outcome::Outcome;
use log::debug;
use reexec_core::{ExecError, InterprocessException, Result};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::marker::PhantomData;

/// Write-once handle that delivers an [`Outcome`] into a byte stream
///
/// Setting a value or an exception consumes the promise, so at most one outcome
/// is ever written. The stream is handed back afterwards; the caller closes it
/// (usually by dropping it) so the reading side observes end-of-stream.
pub struct InterprocessPromise<T, W: Write = File> {
    stream: W,
    _value: PhantomData<fn(T)>,
}

impl<T: Serialize, W: Write> InterprocessPromise<T, W> {
    /// Bind a promise to an open, writable stream
    pub fn new(stream: W) -> Self {
        Self {
            stream,
            _value: PhantomData,
        }
    }

    /// Deliver a successful value
    pub fn set_value(self, value: T) -> Result<W> {
        self.deliver(&Outcome::Success(value))
    }

    /// Deliver a failure
    pub fn set_exception(self, exception: InterprocessException) -> Result<W> {
        self.deliver(&Outcome::Failure(exception))
    }

    /// Deliver a prepared outcome
    pub fn set_outcome(self, outcome: Outcome<T>) -> Result<W> {
        self.deliver(&outcome)
    }

    fn deliver(mut self, outcome: &Outcome<T>) -> Result<W> {
        let bytes = serde_json::to_vec(outcome)
            .map_err(|e| ExecError::Encode(format!("outcome: {}", e)))?;

        self.stream.write_all(&bytes)?;
        self.stream.flush()?;

        debug!(
            "Promise delivered {} outcome ({} bytes)",
            if outcome.is_success() { "success" } else { "failure" },
            bytes.len()
        );

        Ok(self.stream)
    }
}
