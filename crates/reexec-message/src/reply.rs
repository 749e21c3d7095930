//! Two-way adapter: run work and answer through a promise

use crate::work::Work;
use log::debug;
use reexec_channel::InterprocessPromise;
use reexec_core::{InterprocessException, Result};
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};

/// Run `work` and deliver its outcome into `stream`
///
/// A returned error is reported with its `Display` text; a panic is reported
/// with its message, or as an unknown failure tagged with this process id when
/// the payload carries none. `stream` is dropped, and so closed, on every path.
pub fn run_and_reply<W: Work, S: Write>(work: W, stream: S) -> Result<()> {
    let promise = InterprocessPromise::<W::Output, S>::new(stream);

    let delivered = match panic::catch_unwind(AssertUnwindSafe(move || work.run())) {
        Ok(Ok(value)) => promise.set_value(value),
        Ok(Err(e)) => promise.set_exception(InterprocessException::error(e.to_string())),
        Err(payload) => {
            promise.set_exception(InterprocessException::from_panic(payload.as_ref()))
        }
    };

    debug!("Reply for '{}' delivered: {}", W::TAG, delivered.is_ok());
    delivered.map(drop)
}
