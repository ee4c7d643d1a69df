//! Relational side of the storage engine.
//!
//! [`TreeStore`] holds the queries for directory rows, file rows and the
//! ancestry closure table. Every query takes a `&mut SqliteConnection`, so
//! the same call works against a pooled connection or inside a
//! [`UnitOfWork`].

mod constraint;
mod directory;
mod file;

pub use constraint::{translate, Constraint};
pub use directory::{AncestryRow, DirectoryRow, NewDirectory};
pub use file::{FileRow, NewFile};

use sqlx::{Sqlite, SqliteConnection, Transaction};
use tracing::debug;

use crate::{CubbyError, Database, Result};

/// Stateless query set over the `directories`, `ancestry` and `files`
/// tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeStore;

/// One relational transaction.
///
/// Dropping a unit of work without committing rolls it back.
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

impl UnitOfWork {
    /// Begin a transaction on the database pool.
    pub async fn begin(db: &Database) -> Result<Self> {
        let tx = db.begin().await?;
        Ok(Self { tx })
    }

    /// Connection to run staged statements on.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    /// Make every staged write durable.
    ///
    /// Callers may already have touched the filesystem, so a failure here
    /// is [`CubbyError::InconsistentState`].
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(|e| {
            debug!(error = %e, "commit failed");
            CubbyError::InconsistentState(format!("committing transaction: {e}"))
        })
    }

    /// Discard every staged write.
    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork").finish()
    }
}
