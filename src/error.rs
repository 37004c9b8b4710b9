use std::path::PathBuf;
use thiserror::Error;

/// Failure to read or map a single document. The indexer treats these as
/// per-file warnings and keeps going.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// Failure of a whole indexing run. Nothing is committed when one of these
/// is returned.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("{what} not found: {}", path.display())]
    MissingPath { what: &'static str, path: PathBuf },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("cannot walk quest directory: {0}")]
    Walk(#[from] walkdir::Error),
}

impl IndexError {
    /// True when the store rejected a row because of a UNIQUE or foreign key
    /// constraint, which is what a non-forced re-run over an existing index
    /// runs into.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            IndexError::Database(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}
