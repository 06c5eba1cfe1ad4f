//! Error types for the simulator and console front end.

use crate::plan::PlanError;
use letto_core::{ConfigError, PersistError};
use thiserror::Error;

/// Errors that stop a run before it produces a report.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("Storage error: {0}")]
    Storage(#[from] PersistError),

    #[error("Store already holds draw results under {0}; use an empty store for ceremony runs")]
    StoreInUse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
