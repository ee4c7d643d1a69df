//! Test helpers for integration tests.
//!
//! Provides a throwaway storage root plus a database, wired the way the
//! binary wires them.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use cubby::{Database, DirectoryService, FileService, FilesystemMirror};

/// How long to wait for a detached cleanup task.
pub const CLEANUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Temporary storage root and database for one test.
pub struct TestStorage {
    pub temp_dir: TempDir,
    pub db: Arc<Database>,
    pub mirror: FilesystemMirror,
}

impl TestStorage {
    /// Storage backed by an in-memory database.
    pub async fn in_memory() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().await.unwrap();
        Self::with_db(temp_dir, db)
    }

    /// Storage backed by a WAL database file, so several connections
    /// really do run at once.
    pub async fn on_disk() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open(temp_dir.path().join("cubby.db"))
            .await
            .unwrap();
        Self::with_db(temp_dir, db)
    }

    /// Storage with a database the caller opened inside `temp_dir`.
    pub fn with_db(temp_dir: TempDir, db: Database) -> Self {
        let mirror = FilesystemMirror::new(temp_dir.path().join("storage"), 0o700, 0o600);
        let storage = Self {
            temp_dir,
            db: Arc::new(db),
            mirror,
        };
        storage.directories().setup_root().unwrap();
        storage
    }

    pub fn directories(&self) -> DirectoryService<'_> {
        DirectoryService::new(&self.db, &self.mirror)
    }

    pub fn files(&self) -> FileService<'_> {
        FileService::new(&self.db, &self.mirror)
    }

    /// Physical directory of the user's root.
    pub async fn root_path(&self, user_id: &str) -> PathBuf {
        let directories = self.directories();
        let root = directories.ensure_user_root(user_id).await.unwrap();
        directories.filesystem_path(user_id, &root.id).await.unwrap()
    }
}

/// Number of entries directly inside `path`.
pub fn entry_count(path: &Path) -> usize {
    fs::read_dir(path).unwrap().count()
}

/// Wait until `path` holds exactly `expected` entries.
///
/// Returns the last count seen.
pub async fn wait_for_entry_count(path: &Path, expected: usize) -> usize {
    let deadline = tokio::time::Instant::now() + CLEANUP_TIMEOUT;
    loop {
        let count = entry_count(path);
        if count == expected || tokio::time::Instant::now() >= deadline {
            return count;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
