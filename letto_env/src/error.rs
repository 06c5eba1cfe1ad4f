//! Error types for the Letto environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// A spawned task was cancelled before it produced a result
    #[error("Task cancelled: {0}")]
    TaskCancelled(String),
}

impl EnvError {
    /// Creates a cancellation error for the named task.
    pub fn cancelled(task: impl std::fmt::Display) -> Self {
        Self::TaskCancelled(task.to_string())
    }
}
