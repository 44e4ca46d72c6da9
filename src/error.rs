//! Error types for the segrob crate.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SegrobError>;

/// All error kinds surfaced by the library.
///
/// No error is recovered inside the core: the matcher and the search
/// orchestrator propagate upward, and the CLI prints the message and exits
/// non-zero.
#[derive(Debug, Error)]
pub enum SegrobError {
    /// A document, sentence or topic does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An integer id outside the valid range of its repository.
    #[error("{what} {id} out of range (0-{max})")]
    OutOfRange {
        what: &'static str,
        id: i64,
        max: i64,
    },

    /// Expression parsing violations.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Filesystem I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON or schema drift.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Database failure not refined into another kind.
    #[error("database error: {0}")]
    Db(sqlx::Error),

    /// Duplicate title (or other uniqueness violation) on write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Operation not supported by the backend.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// An indexed search was requested for an expression without any
    /// positive lemma to anchor candidate retrieval.
    #[error("expression must contain at least one positive lemma for indexed search")]
    NoLemma,

    /// Command line argument validation failed.
    #[error("usage: {0}")]
    Usage(String),
}

/// Violations of the positional expression grammar.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// The first field of an expression can not be a number: a `near`
    /// distance always refers to the item that follows it, and the first
    /// item has nothing to be near to.
    #[error("first expression field can not be a number")]
    LeadingInteger,

    /// Two integer fields in a row: the first `near` was never attached
    /// to an item.
    #[error("can not parse two consecutive numbers in the expression")]
    ConsecutiveIntegers,
}

impl From<sqlx::Error> for SegrobError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => SegrobError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                SegrobError::Conflict(db.message().to_string())
            }
            _ => SegrobError::Db(err),
        }
    }
}
