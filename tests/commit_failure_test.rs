//! Compensation when the relational commit fails after the filesystem
//! write already happened.
//!
//! A second connection keeps a read transaction open on a rollback-journal
//! database. The service's writer can stage rows but cannot take the
//! exclusive lock COMMIT needs, and with no busy timeout the commit fails
//! at once.

mod common;

use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use tempfile::TempDir;

use cubby::service::WRITE_FAILED_MESSAGE;
use cubby::{CubbyError, Database, UploadRequest};

use common::{entry_count, wait_for_entry_count, TestStorage};

fn options(path: &std::path::Path) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Delete)
        .busy_timeout(Duration::ZERO)
}

async fn setup() -> (TestStorage, Database) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("cubby.db");

    let writer = Database::open_with_options(options(&db_path), 1)
        .await
        .unwrap();
    let reader = Database::open_with_options(options(&db_path), 1)
        .await
        .unwrap();

    (TestStorage::with_db(temp_dir, writer), reader)
}

/// Open a read transaction and keep its shared lock.
async fn hold_shared_lock(reader: &Database) -> sqlx::Transaction<'static, sqlx::Sqlite> {
    let mut tx = reader.begin().await.unwrap();
    let _: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM directories")
        .fetch_one(&mut *tx)
        .await
        .unwrap();
    tx
}

#[tokio::test]
async fn test_directory_commit_failure_removes_orphan() {
    let (storage, reader) = setup().await;
    let directories = storage.directories();
    let root_path = storage.root_path("u1").await;

    let lock = hold_shared_lock(&reader).await;
    let err = directories
        .create_by_parent("u1", "docs", None)
        .await
        .unwrap_err();
    lock.rollback().await.unwrap();

    assert!(matches!(err, CubbyError::InconsistentState(_)));
    assert_eq!(wait_for_entry_count(&root_path, 0).await, 0);

    // Nothing was recorded, so the name is still free.
    let docs = directories.create_by_parent("u1", "docs", None).await.unwrap();
    assert_eq!(docs.path, "/docs");
    assert_eq!(entry_count(&root_path), 1);
}

#[tokio::test]
async fn test_file_commit_failure_removes_orphan() {
    let (storage, reader) = setup().await;
    let files = storage.files();
    let root_path = storage.root_path("u1").await;

    let lock = hold_shared_lock(&reader).await;
    let results = files
        .save_batch("u1", None, vec![UploadRequest::from_bytes("a.txt", "0123456789")])
        .await
        .unwrap();
    lock.rollback().await.unwrap();

    assert!(matches!(
        results[0].error,
        Some(CubbyError::InconsistentState(_))
    ));
    assert_eq!(results[0].message(), WRITE_FAILED_MESSAGE);
    assert_eq!(results[0].info.name, "a.txt");
    assert_eq!(results[0].info.size, 10);
    assert_eq!(wait_for_entry_count(&root_path, 0).await, 0);

    let result = files.info_path("u1", "/a.txt").await;
    assert!(matches!(result, Err(CubbyError::NotFound(_))));
}
