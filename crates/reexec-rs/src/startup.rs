//! Startup hook for spawned workers
//!
//! Every binary that spawns work through a [`ProcessRegistry`](crate::ProcessRegistry)
//! is also the binary its workers run, so `main` must begin with:
//!
//! ```ignore
//! fn main() {
//!     reexec_rs::bootstrap(&catalog());
//!     // normal startup
//! }
//! ```
//!
//! In a worker, [`bootstrap`] runs the active message from the environment and
//! exits; it only returns in a process that was started normally.

use log::{debug, error};
use reexec_core::{BOOTSTRAP_VAR, ExecError, Result, this_process};
use reexec_message::{ActiveMessage, Catalog};
use std::ffi::OsString;
use std::io::Write;
use std::process::exit;
use std::sync::Once;
use std::sync::atomic::{AtomicU8, Ordering};

/// Exit status of a worker whose active message could not be decoded or run
pub const EXIT_DECODE_FAILURE: i32 = 70;

const IDLE: u8 = 0;
const NORMAL: u8 = 1;
const INTERCEPTED: u8 = 2;

static HOOK: Once = Once::new();
static STATE: AtomicU8 = AtomicU8::new(IDLE);

/// Where the startup check left this process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Startup {
    /// The check has not run yet
    Idle,
    /// No bootstrap record; the process runs its own `main`
    Normal,
    /// The process is a worker running its active message
    Intercepted,
}

/// Current state of the startup check
pub fn state() -> Startup {
    match STATE.load(Ordering::Acquire) {
        IDLE => Startup::Idle,
        NORMAL => Startup::Normal,
        _ => Startup::Intercepted,
    }
}

/// Run the active message this process was spawned for, if any
///
/// Checks the environment once per process. When a bootstrap record is present
/// the message is activated and the process exits with status 0, or with
/// [`EXIT_DECODE_FAILURE`] if the record cannot be decoded. Otherwise this
/// returns [`Startup::Normal`], now and on every later call.
pub fn bootstrap(catalog: &Catalog) -> Startup {
    HOOK.call_once(|| match std::env::var_os(BOOTSTRAP_VAR) {
        Some(record) => {
            STATE.store(INTERCEPTED, Ordering::Release);
            intercept(record, catalog)
        }
        None => STATE.store(NORMAL, Ordering::Release),
    });

    state()
}

fn intercept(record: OsString, catalog: &Catalog) -> ! {
    let result = record
        .into_string()
        .map_err(|_| ExecError::Decode("bootstrap record is not valid UTF-8".to_string()))
        .and_then(|text| run_record(&text, catalog));

    let _ = std::io::stdout().flush();

    match result {
        Ok(()) => exit(0),
        Err(e) => {
            // The hook runs before main has installed any logger.
            error!("Worker {} failed to activate: {}", this_process::get_id(), e);
            eprintln!("reexec worker {}: {}", this_process::get_id(), e);
            exit(EXIT_DECODE_FAILURE)
        }
    }
}

/// Decode a bootstrap record and activate it
pub fn run_record(text: &str, catalog: &Catalog) -> Result<()> {
    let message = ActiveMessage::from_text(text)?;
    debug!(
        "Worker {} activating '{}'",
        this_process::get_id(),
        message.tag()
    );
    message.activate(catalog)
}
