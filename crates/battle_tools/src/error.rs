//! Error types for the tools.

use std::path::PathBuf;

use battle_core::error::BattleError;
use thiserror::Error;

/// Result type alias using [`ToolError`].
pub type Result<T> = std::result::Result<T, ToolError>;

/// Errors raised by the tools.
#[derive(Debug, Error)]
pub enum ToolError {
    /// A file or directory could not be read.
    #[error("Failed to read '{path}': {source}")]
    Io {
        /// Path being read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The core rejected the input.
    #[error(transparent)]
    Battle(#[from] BattleError),

    /// A report could not be encoded.
    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}
