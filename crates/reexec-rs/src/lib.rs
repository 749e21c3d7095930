//! reexec-rs: run work in re-executed copies of the current binary
//!
//! A [`ProcessRegistry`] spawns the running executable with an active message in
//! its environment. The child's `main` calls [`bootstrap`] first, which runs the
//! message and exits before any of the program's own startup happens.
//!
//! - **One-way**: [`ProcessRegistry::execute`] returns the child's pid
//! - **Two-way**: [`ProcessRegistry::twoway_execute`] returns an
//!   [`InterprocessFuture`] that yields the work's output or its failure
//!
//! # Example
//!
//! ```ignore
//! use reexec_rs::{Catalog, ProcessRegistry, Work, bootstrap};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Answer;
//!
//! impl Work for Answer {
//!     const TAG: &'static str = "answer";
//!     type Output = i32;
//!     type Error = std::convert::Infallible;
//!
//!     fn run(self) -> Result<i32, Self::Error> {
//!         Ok(13)
//!     }
//! }
//!
//! fn main() -> reexec_rs::Result<()> {
//!     bootstrap(&Catalog::new().register::<Answer>());
//!
//!     let registry = ProcessRegistry::new();
//!     let future = registry.twoway_execute(Answer)?;
//!     assert_eq!(future.get()?, 13);
//!     registry.wait()
//! }
//! ```

pub mod execution;
pub mod executor;
pub mod startup;

// Re-export sub-crate types for convenience
pub use reexec_channel::{
    self as channel, FutureListener, InterprocessFuture, InterprocessPromise, Outcome,
    connect_promise, listen,
};
pub use reexec_core::{
    self as core, BOOTSTRAP_VAR, ExecError, FailureKind, InterprocessException, Result,
    this_process,
};
pub use reexec_message::{ActiveMessage, Catalog, Work, run_and_reply};

pub use execution::{ExecutorConfig, ProcessRegistry, RegistryBuilder};
pub use executor::NewProcessExecutor;
pub use startup::{EXIT_DECODE_FAILURE, Startup, bootstrap};
