//! Engine error types.
//!
//! Every error is scoped to the statement or operation that raised it; none of
//! them is meant to take down a running session.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for engine operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur while loading a schema or running a statement.
#[derive(Debug, Error)]
pub enum DbError {
    /// I/O error while touching segment, counter or sentinel files.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// The schema file could not be read or decoded.
    #[error("configuration error in {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    /// No table with this name exists in the catalog.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// The statement text does not fit any supported shape.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// The leading keyword is not INSERT, SELECT or DELETE.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// `>` or `<` was applied to text that is not an integer.
    #[error("cannot compare {column}: '{left}' and '{right}' must both be integers")]
    NumericComparison {
        column: String,
        left: String,
        right: String,
    },
}

impl DbError {
    /// Shorthand for a syntax error.
    pub fn syntax(msg: impl Into<String>) -> Self {
        DbError::Syntax(msg.into())
    }
}
