//! Execution layer: spawning workers and tracking them
//!
//! This module handles re-executing the running binary with an active message
//! in its environment, handing a reply descriptor to two-way workers, and
//! reaping every worker it started.
//!
//! # Features
//!
//! - **Self re-exec**: the child runs the same image as the parent
//! - **Environment handoff**: one bootstrap variable per child
//! - **Descriptor handoff**: only the reply pipe's write end crosses into the child
//! - **Reaping**: every tracked pid is waited on exactly once

pub mod registry;
pub mod spawn;

pub use registry::{ProcessRegistry, RegistryBuilder};
pub use spawn::{ExecutorConfig, InheritedFd, set_variable, spawn_image};
