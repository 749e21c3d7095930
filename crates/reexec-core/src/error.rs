//! Error types for reexec operations

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for reexec operations
pub type Result<T> = std::result::Result<T, ExecError>;

/// Errors that can occur while dispatching work to another process
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Spawn error: {0}")]
    Spawn(String),

    #[error("Environment error: {0}")]
    Environment(String),

    #[error("Remote failure: {0}")]
    Remote(#[from] InterprocessException),

    #[error("Channel closed before an outcome was written")]
    ChannelClosed,

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Registration error: {0}")]
    Registration(String),

    #[error("Unknown work tag: {0}")]
    UnknownWork(String),

    #[error("Wait error: {0}")]
    Wait(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ExecError {
    /// Remote exception carried by this error, if the failure happened in another process
    pub fn remote(&self) -> Option<&InterprocessException> {
        match self {
            ExecError::Remote(exception) => Some(exception),
            _ => None,
        }
    }

    /// True when the producing process went away without reporting an outcome
    pub fn is_channel_closed(&self) -> bool {
        matches!(self, ExecError::ChannelClosed)
    }
}

/// How a remote failure was recognized at the point of catch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The work returned an error value
    Error,
    /// The work panicked with a message
    Panic,
    /// The work failed with a payload that carries no description
    Unknown,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Error => "error",
            FailureKind::Panic => "panic",
            FailureKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A failure raised in a spawned process, reduced to what can cross a process boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterprocessException {
    pub kind: FailureKind,
    pub description: String,
    /// Process the failure originated in
    pub pid: u32,
}

impl InterprocessException {
    pub fn new(kind: FailureKind, description: impl Into<String>, pid: u32) -> Self {
        Self {
            kind,
            description: description.into(),
            pid,
        }
    }

    /// Failure returned as an error value by the work
    pub fn error(description: impl Into<String>) -> Self {
        Self::new(FailureKind::Error, description, std::process::id())
    }

    /// Failure with no usable description, tagged with the current process id
    pub fn unknown() -> Self {
        let pid = std::process::id();
        Self::new(FailureKind::Unknown, format!("Exception in process {}", pid), pid)
    }

    /// Convert a caught panic payload. `&str` and `String` payloads keep their
    /// message; anything else degrades to [`InterprocessException::unknown`].
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned());

        match message {
            Some(message) => Self::new(FailureKind::Panic, message, std::process::id()),
            None => Self::unknown(),
        }
    }
}

impl fmt::Display for InterprocessException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} in process {}: {}",
            self.kind, self.pid, self.description
        )
    }
}

impl std::error::Error for InterprocessException {}

impl From<serde_json::Error> for ExecError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            ExecError::Io(err.into())
        } else {
            ExecError::Decode(err.to_string())
        }
    }
}
