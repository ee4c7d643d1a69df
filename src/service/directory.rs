//! Directory creation and per-user root provisioning.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::{abandon, cleanup, validate_name};
use crate::mirror::FilesystemMirror;
use crate::path::PathResolver;
use crate::store::{DirectoryRow, NewDirectory, TreeStore, UnitOfWork};
use crate::{CubbyError, Database, Result};

/// Name every user's root directory carries in the tree.
pub const ROOT_NAME: &str = "root";

/// A directory as seen by callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dir {
    pub id: String,
    pub owner: String,
    pub name: String,
    /// Name-based path, `/` for the root.
    pub path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_write: Option<DateTime<Utc>>,
}

impl Dir {
    fn from_row(row: DirectoryRow, path: String) -> Self {
        Self {
            id: row.id,
            owner: row.owner,
            name: row.name,
            path,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_write: row.last_write,
        }
    }
}

/// Directory service.
pub struct DirectoryService<'a> {
    db: &'a Database,
    mirror: &'a FilesystemMirror,
}

impl<'a> DirectoryService<'a> {
    /// Create a new DirectoryService.
    pub fn new(db: &'a Database, mirror: &'a FilesystemMirror) -> Self {
        Self { db, mirror }
    }

    fn resolver(&self) -> PathResolver<'a> {
        PathResolver::new(self.mirror.root())
    }

    /// Make sure the storage root exists. Call once before anything else.
    pub fn setup_root(&self) -> Result<()> {
        self.mirror.ensure_root()
    }

    /// Return the user's root directory, creating it on first use.
    ///
    /// Concurrent first calls race on the unique-root constraint. The
    /// loser is rejected before it touches the filesystem and returns the
    /// winner's root.
    pub async fn ensure_user_root(&self, user_id: &str) -> Result<Dir> {
        if let Some(root) = self.select_root(user_id).await? {
            return Ok(root);
        }

        match self.write(user_id, ROOT_NAME, None).await {
            Ok(root) => {
                info!(user_id, root_id = %root.id, "created user root directory");
                Ok(root)
            }
            Err(CubbyError::Conflict(_)) => {
                debug!(user_id, "user root created concurrently");
                self.select_root(user_id).await?.ok_or_else(|| {
                    CubbyError::InconsistentState(format!(
                        "root directory for user {user_id} conflicted but cannot be found"
                    ))
                })
            }
            Err(e) => {
                error!(user_id, error = %e, "creating user root directory");
                Err(e)
            }
        }
    }

    /// Create `name` under `parent_id`, or under the user's root when no
    /// parent is given.
    pub async fn create_by_parent(
        &self,
        user_id: &str,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<Dir> {
        validate_name("Directory", name)?;
        let root = self.ensure_user_root(user_id).await?;

        let parent_id = match parent_id.filter(|id| !id.is_empty()) {
            None => root.id,
            Some(id) => {
                Uuid::parse_str(id).map_err(|_| {
                    CubbyError::InvalidInput(format!("\"{id}\" is not a valid directory ID"))
                })?;
                id.to_string()
            }
        };

        self.write(user_id, name, Some(&parent_id)).await
    }

    /// Create `name` inside the existing directory at `path`.
    ///
    /// Only the last level is created; every segment of `path` must exist.
    pub async fn create_by_path(&self, user_id: &str, name: &str, path: &str) -> Result<Dir> {
        validate_name("Directory", name)?;
        let root = self.ensure_user_root(user_id).await?;

        let parent_id = {
            let mut conn = self.db.acquire().await?;
            self.resolver()
                .find_directory(&mut conn, user_id, &root.id, path)
                .await?
        };

        self.write(user_id, name, Some(&parent_id)).await
    }

    /// Best-effort recursive removal of a physical directory.
    ///
    /// The relational rows are left untouched.
    pub fn remove(&self, fs_path: &Path) {
        cleanup::remove_directory(self.mirror, fs_path);
    }

    /// Physical location of one of the user's directories.
    pub async fn filesystem_path(&self, user_id: &str, directory_id: &str) -> Result<PathBuf> {
        let mut conn = self.db.acquire().await?;
        if TreeStore::select_directory_by_id_owner(&mut conn, directory_id, user_id)
            .await?
            .is_none()
        {
            return Err(CubbyError::NotFound(format!(
                "Directory \"{directory_id}\" does not exist"
            )));
        }
        self.resolver()
            .resolve_filesystem_path(&mut conn, directory_id)
            .await
    }

    async fn select_root(&self, user_id: &str) -> Result<Option<Dir>> {
        let mut conn = self.db.acquire().await?;
        let row = TreeStore::select_user_root(&mut conn, user_id).await?;
        Ok(row.map(|row| Dir::from_row(row, "/".to_string())))
    }

    /// Create one directory row and its physical directory.
    async fn write(&self, user_id: &str, name: &str, parent_id: Option<&str>) -> Result<Dir> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();

        let mut uow = UnitOfWork::begin(self.db).await?;
        let new_dir = NewDirectory {
            id: &id,
            owner: user_id,
            name,
            parent_id,
            created_at,
        };
        let staged = self.stage(uow.conn(), &new_dir).await;
        let (path, fs_path) = match staged {
            Ok(staged) => staged,
            Err(e) => {
                abandon(uow).await;
                return Err(e);
            }
        };

        if let Err(e) = uow.commit().await {
            error!(
                directory_id = %id,
                path = %fs_path.display(),
                error = %e,
                "commit failed after creating directory, scheduling removal"
            );
            cleanup::spawn_remove_directory(self.mirror.clone(), fs_path);
            return Err(e);
        }

        debug!(user_id, directory_id = %id, %path, "created directory");
        Ok(Dir {
            id,
            owner: user_id.to_string(),
            name: name.to_string(),
            path,
            created_at,
            updated_at: None,
            last_write: None,
        })
    }

    /// Stage the rows, then create the physical directory.
    ///
    /// Returns the user path and the filesystem path.
    async fn stage(
        &self,
        conn: &mut SqliteConnection,
        dir: &NewDirectory<'_>,
    ) -> Result<(String, PathBuf)> {
        TreeStore::insert_directory(conn, dir).await?;

        if let Some(parent_id) = dir.parent_id {
            // Another user's directory is as good as missing.
            if TreeStore::select_directory_by_id_owner(conn, parent_id, dir.owner)
                .await?
                .is_none()
            {
                return Err(CubbyError::ForeignKeyViolation(format!(
                    "Directory \"{parent_id}\" does not exist"
                )));
            }
        }

        TreeStore::insert_self_edge(conn, dir.id).await?;
        if let Some(parent_id) = dir.parent_id {
            TreeStore::insert_ancestor_edges(conn, parent_id, dir.id).await?;
        }

        let resolver = self.resolver();
        let path = resolver.resolve_user_path(conn, dir.id).await?;
        let fs_path = resolver.resolve_filesystem_path(conn, dir.id).await?;

        self.mirror.create_directory(&fs_path)?;
        Ok((path, fs_path))
    }
}
