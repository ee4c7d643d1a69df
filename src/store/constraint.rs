//! Classification of SQLite constraint failures.

use sqlx::error::ErrorKind;

use crate::CubbyError;

/// A schema constraint that rejected a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// `(parent_id, name)` already taken among sibling directories.
    UniqueSiblingName,
    /// The owner already has a root directory.
    UniqueRoot,
    /// `(directory_id, name)` already taken among files.
    UniqueFileName,
    /// Generated id collided with an existing row.
    PrimaryKey,
    /// A referenced directory does not exist.
    ForeignKey,
}

impl Constraint {
    /// Work out which constraint an sqlx error reports, if any.
    pub fn classify(err: &sqlx::Error) -> Option<Self> {
        let sqlx::Error::Database(db_err) = err else {
            return None;
        };
        let message = db_err.message();

        let unique = matches!(db_err.kind(), ErrorKind::UniqueViolation)
            || message.starts_with("UNIQUE constraint failed");
        let foreign = matches!(db_err.kind(), ErrorKind::ForeignKeyViolation)
            || message.starts_with("FOREIGN KEY constraint failed");

        if foreign {
            return Some(Constraint::ForeignKey);
        }
        if !unique {
            return None;
        }

        // SQLite names the columns, not the constraint.
        if message.contains("directories.parent_id, directories.name") {
            Some(Constraint::UniqueSiblingName)
        } else if message.contains("directories.owner, directories.name") {
            Some(Constraint::UniqueRoot)
        } else if message.contains("files.directory_id, files.name") {
            Some(Constraint::UniqueFileName)
        } else {
            Some(Constraint::PrimaryKey)
        }
    }
}

/// Translate an sqlx error. Recognised constraint failures go through
/// `map`; everything else becomes [`CubbyError::Database`].
pub fn translate(err: sqlx::Error, map: impl FnOnce(Constraint) -> CubbyError) -> CubbyError {
    match Constraint::classify(&err) {
        Some(constraint) => map(constraint),
        None => err.into(),
    }
}
