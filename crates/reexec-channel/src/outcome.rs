//! Wire record exchanged between a promise and its future

use reexec_core::{ExecError, InterprocessException, Result};
use serde::{Deserialize, Serialize};

/// The single outcome a promise delivers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Outcome<T> {
    Success(T),
    Failure(InterprocessException),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Turn the outcome into a local result, re-raising a remote failure
    pub fn into_result(self) -> Result<T> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(exception) => Err(ExecError::Remote(exception)),
        }
    }
}

impl<T, E: std::fmt::Display> From<std::result::Result<T, E>> for Outcome<T> {
    fn from(result: std::result::Result<T, E>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(e) => Outcome::Failure(InterprocessException::error(e.to_string())),
        }
    }
}
