//! Error types for Cubby.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Message shown to end users when the real cause must stay hidden.
pub const DEFAULT_SAFE_MESSAGE: &str = "Something went wrong. Please try again later.";

/// Common error type for Cubby.
#[derive(Error, Debug)]
pub enum CubbyError {
    /// Database error.
    ///
    /// Errors from sqlx that are not a recognised constraint violation
    /// end up here.
    #[error("database error: {0}")]
    Database(String),

    /// Database connection error.
    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    /// I/O error without path context (config and log files, background tasks).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Storage filesystem error, wrapped with the operation and the offending path.
    #[error("{op} {}: {source}", path.display())]
    Filesystem {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A directory, file, or the bytes behind an existing file row are missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate sibling name or duplicate root.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Empty name, malformed path segment, missing filename.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Dangling parent reference.
    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// The relational commit failed after a physical write already happened.
    #[error("inconsistent state: {0}")]
    InconsistentState(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl CubbyError {
    /// Wrap a raw I/O error with the operation and path it happened on.
    pub fn filesystem(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        CubbyError::Filesystem {
            op,
            path: path.into(),
            source,
        }
    }

    /// The message that can be shown to the caller's end user.
    ///
    /// Domain errors carry a message written for users. Infrastructure
    /// errors are replaced by [`DEFAULT_SAFE_MESSAGE`].
    pub fn safe_message(&self) -> &str {
        match self {
            CubbyError::NotFound(msg)
            | CubbyError::Conflict(msg)
            | CubbyError::InvalidInput(msg)
            | CubbyError::ForeignKeyViolation(msg) => msg,
            _ => DEFAULT_SAFE_MESSAGE,
        }
    }

    /// Whether this error carries a message meant for end users.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            CubbyError::NotFound(_)
                | CubbyError::Conflict(_)
                | CubbyError::InvalidInput(_)
                | CubbyError::ForeignKeyViolation(_)
        )
    }

    /// Whether this is a filesystem error for a path that does not exist.
    pub fn is_missing_path(&self) -> bool {
        matches!(
            self,
            CubbyError::Filesystem { source, .. } if source.kind() == io::ErrorKind::NotFound
        )
    }
}

impl From<sqlx::Error> for CubbyError {
    fn from(e: sqlx::Error) -> Self {
        CubbyError::Database(e.to_string())
    }
}

/// Result type alias for Cubby operations.
pub type Result<T> = std::result::Result<T, CubbyError>;
