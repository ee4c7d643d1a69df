//! File rows.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use super::constraint::{translate, Constraint};
use super::TreeStore;
use crate::{CubbyError, Result};

/// A row of the `files` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct FileRow {
    pub id: String,
    pub owner: String,
    pub directory_id: String,
    pub name: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Data for inserting a file row.
#[derive(Debug, Clone)]
pub struct NewFile<'a> {
    pub id: &'a str,
    pub owner: &'a str,
    pub directory_id: &'a str,
    pub name: &'a str,
    pub uploaded_at: DateTime<Utc>,
}

const FILE_COLUMNS: &str = "id, owner, directory_id, name, uploaded_at";

impl TreeStore {
    /// Insert a file row.
    ///
    /// A name already used in the directory is [`CubbyError::Conflict`];
    /// a missing directory is [`CubbyError::ForeignKeyViolation`].
    pub async fn insert_file(conn: &mut SqliteConnection, file: &NewFile<'_>) -> Result<()> {
        sqlx::query(
            "INSERT INTO files (id, owner, directory_id, name, uploaded_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(file.id)
        .bind(file.owner)
        .bind(file.directory_id)
        .bind(file.name)
        .bind(file.uploaded_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            translate(e, |constraint| match constraint {
                Constraint::ForeignKey => CubbyError::ForeignKeyViolation(format!(
                    "Directory \"{}\" does not exist",
                    file.directory_id
                )),
                _ => CubbyError::Conflict(format!("File \"{}\" already exists", file.name)),
            })
        })?;

        Ok(())
    }

    /// Look up a file by name inside a directory.
    pub async fn select_file_by_owner_directory_name(
        conn: &mut SqliteConnection,
        owner: &str,
        directory_id: &str,
        name: &str,
    ) -> Result<Option<FileRow>> {
        let row = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE owner = ? AND directory_id = ? AND name = ?"
        ))
        .bind(owner)
        .bind(directory_id)
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row)
    }

    /// Look up a file by id, only if it belongs to `owner`.
    pub async fn select_file_by_id_owner(
        conn: &mut SqliteConnection,
        id: &str,
        owner: &str,
    ) -> Result<Option<FileRow>> {
        let row = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE id = ? AND owner = ?"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewDirectory;
    use crate::Database;

    async fn setup() -> Database {
        let db = Database::open_in_memory().await.unwrap();
        {
            let mut conn = db.acquire().await.unwrap();
            TreeStore::insert_directory(
                &mut conn,
                &NewDirectory {
                    id: "r1",
                    owner: "u1",
                    name: "root",
                    parent_id: None,
                    created_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        }
        db
    }

    fn new_file<'a>(id: &'a str, name: &'a str, directory_id: &'a str) -> NewFile<'a> {
        NewFile {
            id,
            owner: "u1",
            directory_id,
            name,
            uploaded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_select_file() {
        let db = setup().await;
        let mut conn = db.acquire().await.unwrap();

        TreeStore::insert_file(&mut conn, &new_file("f1", "a.txt", "r1"))
            .await
            .unwrap();

        let by_name = TreeStore::select_file_by_owner_directory_name(&mut conn, "u1", "r1", "a.txt")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_name.id, "f1");
        assert_eq!(by_name.directory_id, "r1");

        let by_id = TreeStore::select_file_by_id_owner(&mut conn, "f1", "u1")
            .await
            .unwrap();
        assert_eq!(by_id, Some(by_name));
    }

    #[tokio::test]
    async fn test_select_file_is_owner_scoped() {
        let db = setup().await;
        let mut conn = db.acquire().await.unwrap();

        TreeStore::insert_file(&mut conn, &new_file("f1", "a.txt", "r1"))
            .await
            .unwrap();

        assert!(TreeStore::select_file_by_id_owner(&mut conn, "f1", "u2")
            .await
            .unwrap()
            .is_none());
        assert!(
            TreeStore::select_file_by_owner_directory_name(&mut conn, "u2", "r1", "a.txt")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_duplicate_file_name_is_conflict() {
        let db = setup().await;
        let mut conn = db.acquire().await.unwrap();

        TreeStore::insert_file(&mut conn, &new_file("f1", "a.txt", "r1"))
            .await
            .unwrap();
        let err = TreeStore::insert_file(&mut conn, &new_file("f2", "a.txt", "r1"))
            .await
            .unwrap_err();

        assert!(matches!(err, CubbyError::Conflict(_)));
        assert_eq!(err.safe_message(), "File \"a.txt\" already exists");
    }

    #[tokio::test]
    async fn test_missing_directory_is_foreign_key_violation() {
        let db = setup().await;
        let mut conn = db.acquire().await.unwrap();

        let err = TreeStore::insert_file(&mut conn, &new_file("f1", "a.txt", "missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, CubbyError::ForeignKeyViolation(_)));
    }
}
