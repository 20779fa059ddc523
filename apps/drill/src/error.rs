//! Error handling for the drill driver

use construe_core::MasteryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DrillError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Mastery error: {0}")]
    Mastery(#[from] MasteryError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad command: {0}")]
    Command(String),
}

pub type Result<T> = std::result::Result<T, DrillError>;
