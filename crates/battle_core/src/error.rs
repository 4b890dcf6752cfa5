//! Error types for the battle core.

use thiserror::Error;

use crate::components::EntityId;

/// Result type alias using [`BattleError`].
pub type Result<T> = std::result::Result<T, BattleError>;

/// Top-level error type for the battle core.
///
/// Expected outcomes of queries (no path, no open position, no receivers)
/// are not errors; they are reported through sentinel values or empty results.
#[derive(Debug, Error)]
pub enum BattleError {
    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Grid dimensions or scale are unusable.
    #[error("Invalid grid configuration: {0}")]
    InvalidGridConfig(String),

    /// A position lies outside the configured board.
    #[error("Position ({q}, {r}) is outside the grid")]
    PositionOutOfBounds {
        /// Axial q coordinate.
        q: i32,
        /// Axial r coordinate.
        r: i32,
    },

    /// Config or scenario parsing error.
    #[error("Failed to parse '{path}': {message}")]
    DataParseError {
        /// Source of the text that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Snapshot serialization error.
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Invalid battle state.
    #[error("Invalid battle state: {0}")]
    InvalidState(String),
}
