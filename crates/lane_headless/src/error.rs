//! Error types for the headless runner.

use std::io;
use std::path::Path;

use lane_core::config::SimConfig;
use lane_core::error::SimError;
use thiserror::Error;

/// Errors raised while loading or driving a match.
#[derive(Debug, Error)]
pub enum HeadlessError {
    /// Reading input or writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The simulation rejected the configuration or a command.
    #[error(transparent)]
    Sim(#[from] SimError),

    /// A response could not be encoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Two runs that should agree did not.
    #[error("Determinism check failed: {0}")]
    Divergence(String),
}

/// Result alias for the headless runner.
pub type Result<T> = std::result::Result<T, HeadlessError>;

/// Load a match configuration from a RON file.
pub fn load_config(path: &Path) -> Result<SimConfig> {
    let text = std::fs::read_to_string(path)?;
    Ok(SimConfig::from_ron_str(&text)?)
}
