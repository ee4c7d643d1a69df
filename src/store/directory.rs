//! Directory rows and the ancestry closure table.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use super::constraint::{translate, Constraint};
use super::TreeStore;
use crate::{CubbyError, Result};

/// A row of the `directories` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct DirectoryRow {
    pub id: String,
    pub owner: String,
    pub name: String,
    /// `None` only for the owner's root.
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_write: Option<DateTime<Utc>>,
}

/// Data for inserting a directory row.
#[derive(Debug, Clone)]
pub struct NewDirectory<'a> {
    pub id: &'a str,
    pub owner: &'a str,
    pub name: &'a str,
    pub parent_id: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}

/// A row of the `ancestry` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AncestryRow {
    pub ancestor_id: String,
    pub descendant_id: String,
    pub depth: i64,
}

const DIRECTORY_COLUMNS: &str = "id, owner, name, parent_id, created_at, updated_at, last_write";

impl TreeStore {
    /// Insert a directory row.
    ///
    /// Constraint failures come back as domain errors:
    /// a taken sibling name or a second root is [`CubbyError::Conflict`],
    /// a dangling parent is [`CubbyError::ForeignKeyViolation`].
    pub async fn insert_directory(conn: &mut SqliteConnection, dir: &NewDirectory<'_>) -> Result<()> {
        sqlx::query(
            "INSERT INTO directories (id, owner, name, parent_id, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(dir.id)
        .bind(dir.owner)
        .bind(dir.name)
        .bind(dir.parent_id)
        .bind(dir.created_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            translate(e, |constraint| match constraint {
                Constraint::UniqueRoot => {
                    CubbyError::Conflict("Root directory already exists".to_string())
                }
                Constraint::ForeignKey => CubbyError::ForeignKeyViolation(format!(
                    "Directory \"{}\" does not exist",
                    dir.parent_id.unwrap_or_default()
                )),
                _ => CubbyError::Conflict(format!("Directory \"{}\" already exists", dir.name)),
            })
        })?;

        Ok(())
    }

    /// Insert the depth-0 edge from a directory to itself.
    pub async fn insert_self_edge(conn: &mut SqliteConnection, id: &str) -> Result<()> {
        sqlx::query("INSERT INTO ancestry (ancestor_id, descendant_id, depth) VALUES (?, ?, 0)")
            .bind(id)
            .bind(id)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                translate(e, |constraint| match constraint {
                    Constraint::ForeignKey => {
                        CubbyError::ForeignKeyViolation(format!("Directory \"{id}\" does not exist"))
                    }
                    _ => CubbyError::Conflict(format!("Ancestry for \"{id}\" already exists")),
                })
            })?;

        Ok(())
    }

    /// Give `child_id` a copy of every ancestor edge of `parent_id`, one
    /// level deeper.
    ///
    /// Returns the number of edges inserted, which equals the depth of
    /// the child.
    pub async fn insert_ancestor_edges(
        conn: &mut SqliteConnection,
        parent_id: &str,
        child_id: &str,
    ) -> Result<u64> {
        let result = sqlx::query(
            "INSERT INTO ancestry (ancestor_id, descendant_id, depth)
             SELECT ancestor_id, ?, depth + 1 FROM ancestry WHERE descendant_id = ?",
        )
        .bind(child_id)
        .bind(parent_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            translate(e, |constraint| match constraint {
                Constraint::ForeignKey => CubbyError::ForeignKeyViolation(format!(
                    "Directory \"{child_id}\" does not exist"
                )),
                _ => CubbyError::Conflict(format!("Ancestry for \"{child_id}\" already exists")),
            })
        })?;

        Ok(result.rows_affected())
    }

    /// Look up a directory by name under a given parent.
    pub async fn select_directory_by_owner_name_parent(
        conn: &mut SqliteConnection,
        owner: &str,
        name: &str,
        parent_id: &str,
    ) -> Result<Option<DirectoryRow>> {
        let row = sqlx::query_as::<_, DirectoryRow>(&format!(
            "SELECT {DIRECTORY_COLUMNS} FROM directories
             WHERE owner = ? AND name = ? AND parent_id = ?"
        ))
        .bind(owner)
        .bind(name)
        .bind(parent_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row)
    }

    /// Look up the owner's root directory.
    pub async fn select_user_root(
        conn: &mut SqliteConnection,
        owner: &str,
    ) -> Result<Option<DirectoryRow>> {
        let row = sqlx::query_as::<_, DirectoryRow>(&format!(
            "SELECT {DIRECTORY_COLUMNS} FROM directories
             WHERE owner = ? AND name = 'root' AND parent_id IS NULL"
        ))
        .bind(owner)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row)
    }

    /// Look up a directory by id, only if it belongs to `owner`.
    pub async fn select_directory_by_id_owner(
        conn: &mut SqliteConnection,
        id: &str,
        owner: &str,
    ) -> Result<Option<DirectoryRow>> {
        let row = sqlx::query_as::<_, DirectoryRow>(&format!(
            "SELECT {DIRECTORY_COLUMNS} FROM directories WHERE id = ? AND owner = ?"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row)
    }

    /// Every ancestry edge ending at `descendant_id`, root first.
    pub async fn select_ancestry(
        conn: &mut SqliteConnection,
        descendant_id: &str,
    ) -> Result<Vec<AncestryRow>> {
        let rows = sqlx::query_as::<_, AncestryRow>(
            "SELECT ancestor_id, descendant_id, depth FROM ancestry
             WHERE descendant_id = ? ORDER BY depth DESC",
        )
        .bind(descendant_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows)
    }

    /// Names on the path from the root down to `descendant_id`, both ends
    /// included.
    pub async fn select_ancestor_names(
        conn: &mut SqliteConnection,
        descendant_id: &str,
    ) -> Result<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT d.name FROM ancestry a
             JOIN directories d ON d.id = a.ancestor_id
             WHERE a.descendant_id = ? ORDER BY a.depth DESC",
        )
        .bind(descendant_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(names)
    }

    /// Ids on the path from the root down to `descendant_id`, both ends
    /// included.
    pub async fn select_ancestor_ids(
        conn: &mut SqliteConnection,
        descendant_id: &str,
    ) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT ancestor_id FROM ancestry WHERE descendant_id = ? ORDER BY depth DESC",
        )
        .bind(descendant_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn new_dir<'a>(id: &'a str, name: &'a str, parent_id: Option<&'a str>) -> NewDirectory<'a> {
        NewDirectory {
            id,
            owner: "u1",
            name,
            parent_id,
            created_at: Utc::now(),
        }
    }

    async fn insert_with_edges(
        conn: &mut SqliteConnection,
        id: &str,
        name: &str,
        parent_id: Option<&str>,
    ) {
        TreeStore::insert_directory(conn, &new_dir(id, name, parent_id))
            .await
            .unwrap();
        TreeStore::insert_self_edge(conn, id).await.unwrap();
        if let Some(parent_id) = parent_id {
            TreeStore::insert_ancestor_edges(conn, parent_id, id)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_insert_and_select_root() {
        let db = Database::open_in_memory().await.unwrap();
        let mut conn = db.acquire().await.unwrap();

        insert_with_edges(&mut conn, "r1", "root", None).await;

        let root = TreeStore::select_user_root(&mut conn, "u1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(root.id, "r1");
        assert_eq!(root.name, "root");
        assert!(root.parent_id.is_none());
        assert!(root.updated_at.is_none());
        assert!(root.last_write.is_none());

        assert!(TreeStore::select_user_root(&mut conn, "u2")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_root_is_conflict() {
        let db = Database::open_in_memory().await.unwrap();
        let mut conn = db.acquire().await.unwrap();

        insert_with_edges(&mut conn, "r1", "root", None).await;
        let result = TreeStore::insert_directory(&mut conn, &new_dir("r2", "root", None)).await;
        assert!(matches!(result, Err(CubbyError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_duplicate_sibling_is_conflict() {
        let db = Database::open_in_memory().await.unwrap();
        let mut conn = db.acquire().await.unwrap();

        insert_with_edges(&mut conn, "r1", "root", None).await;
        insert_with_edges(&mut conn, "d1", "docs", Some("r1")).await;

        let err = TreeStore::insert_directory(&mut conn, &new_dir("d2", "docs", Some("r1")))
            .await
            .unwrap_err();
        assert!(matches!(err, CubbyError::Conflict(_)));
        assert_eq!(err.safe_message(), "Directory \"docs\" already exists");
    }

    #[tokio::test]
    async fn test_dangling_parent_is_foreign_key_violation() {
        let db = Database::open_in_memory().await.unwrap();
        let mut conn = db.acquire().await.unwrap();

        let err = TreeStore::insert_directory(&mut conn, &new_dir("d1", "docs", Some("nope")))
            .await
            .unwrap_err();
        assert!(matches!(err, CubbyError::ForeignKeyViolation(_)));
        assert_eq!(err.safe_message(), "Directory \"nope\" does not exist");
    }

    #[tokio::test]
    async fn test_ancestry_depths() {
        let db = Database::open_in_memory().await.unwrap();
        let mut conn = db.acquire().await.unwrap();

        insert_with_edges(&mut conn, "r1", "root", None).await;
        insert_with_edges(&mut conn, "d1", "a", Some("r1")).await;
        insert_with_edges(&mut conn, "d2", "b", Some("d1")).await;
        insert_with_edges(&mut conn, "d3", "c", Some("d2")).await;

        let rows = TreeStore::select_ancestry(&mut conn, "d3").await.unwrap();
        assert_eq!(rows.len(), 4);
        let depths: Vec<i64> = rows.iter().map(|r| r.depth).collect();
        assert_eq!(depths, vec![3, 2, 1, 0]);
        assert_eq!(rows[0].ancestor_id, "r1");
        assert_eq!(rows[3].ancestor_id, "d3");

        let names = TreeStore::select_ancestor_names(&mut conn, "d3")
            .await
            .unwrap();
        assert_eq!(names, vec!["root", "a", "b", "c"]);

        let ids = TreeStore::select_ancestor_ids(&mut conn, "d3").await.unwrap();
        assert_eq!(ids, vec!["r1", "d1", "d2", "d3"]);
    }

    #[tokio::test]
    async fn test_insert_ancestor_edges_returns_depth() {
        let db = Database::open_in_memory().await.unwrap();
        let mut conn = db.acquire().await.unwrap();

        insert_with_edges(&mut conn, "r1", "root", None).await;
        insert_with_edges(&mut conn, "d1", "a", Some("r1")).await;

        TreeStore::insert_directory(&mut conn, &new_dir("d2", "b", Some("d1")))
            .await
            .unwrap();
        TreeStore::insert_self_edge(&mut conn, "d2").await.unwrap();
        let inserted = TreeStore::insert_ancestor_edges(&mut conn, "d1", "d2")
            .await
            .unwrap();
        assert_eq!(inserted, 2);
    }

    #[tokio::test]
    async fn test_select_by_owner_name_parent() {
        let db = Database::open_in_memory().await.unwrap();
        let mut conn = db.acquire().await.unwrap();

        insert_with_edges(&mut conn, "r1", "root", None).await;
        insert_with_edges(&mut conn, "d1", "docs", Some("r1")).await;

        let found = TreeStore::select_directory_by_owner_name_parent(&mut conn, "u1", "docs", "r1")
            .await
            .unwrap();
        assert_eq!(found.map(|d| d.id), Some("d1".to_string()));

        let other_owner =
            TreeStore::select_directory_by_owner_name_parent(&mut conn, "u2", "docs", "r1")
                .await
                .unwrap();
        assert!(other_owner.is_none());
    }

    #[tokio::test]
    async fn test_select_by_id_owner_is_scoped() {
        let db = Database::open_in_memory().await.unwrap();
        let mut conn = db.acquire().await.unwrap();

        insert_with_edges(&mut conn, "r1", "root", None).await;

        assert!(TreeStore::select_directory_by_id_owner(&mut conn, "r1", "u1")
            .await
            .unwrap()
            .is_some());
        assert!(TreeStore::select_directory_by_id_owner(&mut conn, "r1", "u2")
            .await
            .unwrap()
            .is_none());
    }
}
