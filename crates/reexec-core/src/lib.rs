//! reexec-core: shared types and process queries for reexec
//!
//! This crate provides the foundational pieces used by all reexec sub-crates:
//! - Error taxonomy and Result alias
//! - The exception record that carries a failure across a process boundary
//! - Queries about the running process (pid, executable, environment)

pub mod error;
pub mod this_process;

pub use error::{ExecError, FailureKind, InterprocessException, Result};

/// Environment variable carrying a text-encoded active message into a spawned process
pub const BOOTSTRAP_VAR: &str = "EXECUTE_ACTIVE_MESSAGE_BEFORE_MAIN";
