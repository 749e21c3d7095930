//! Queries about the running process
//!
//! The executor re-executes the image it is running from and hands the child a
//! copy of its own environment. The executable path is resolved once; the
//! environment is read again on every call.

use crate::error::{ExecError, Result};
use log::debug;
use nix::unistd::{Pid, getpid};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static FILENAME: OnceLock<PathBuf> = OnceLock::new();

/// Process id of the running process
pub fn get_id() -> Pid {
    getpid()
}

/// Snapshot of the environment, in the order the process received it
pub fn environment() -> Vec<(OsString, OsString)> {
    std::env::vars_os().collect()
}

/// Absolute path of the executable image backing this process
///
/// Resolved once and cached; a failure here is an [`ExecError::Environment`].
pub fn filename() -> Result<&'static Path> {
    if let Some(path) = FILENAME.get() {
        return Ok(path.as_path());
    }

    let path = std::fs::read_link("/proc/self/exe")
        .or_else(|_| std::env::current_exe())
        .map_err(|e| ExecError::Environment(format!("cannot resolve executable path: {}", e)))?;

    debug!("Executable image resolved to {}", path.display());
    Ok(FILENAME.get_or_init(|| path).as_path())
}
