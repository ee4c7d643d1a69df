//! Translation between user-facing paths and internal ids.
//!
//! A user path is built from directory names (`/docs/report.txt`). A
//! filesystem path is built from ids under the storage root
//! (`<root>/<root-id>/<docs-id>/<file-id>`). The user's root directory is
//! named `root` in the tree but never appears in a user path.

use std::path::{Path, PathBuf};

use sqlx::SqliteConnection;

use crate::store::TreeStore;
use crate::{CubbyError, Result};

/// Lexically clean a user path into its segments.
///
/// Empty and `.` segments are dropped and `..` removes the previous
/// segment. A `..` that would climb above the root is rejected.
/// `""`, `"/"` and `"."` all clean to no segments, meaning the root.
pub fn clean_path(path: &str) -> Result<Vec<String>> {
    let mut segments: Vec<String> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(CubbyError::InvalidInput(format!(
                        "Path \"{path}\" leads outside your root directory"
                    )));
                }
            }
            name => segments.push(name.to_string()),
        }
    }
    Ok(segments)
}

/// Append `name` to a directory's user path.
pub fn join_user_path(dir_path: &str, name: &str) -> String {
    if dir_path.ends_with('/') {
        format!("{dir_path}{name}")
    } else {
        format!("{dir_path}/{name}")
    }
}

/// Resolves paths for one storage root.
#[derive(Debug, Clone, Copy)]
pub struct PathResolver<'a> {
    root: &'a Path,
}

impl<'a> PathResolver<'a> {
    /// Create a resolver for the given storage root.
    pub fn new(root: &'a Path) -> Self {
        Self { root }
    }

    /// Walk `path` down from `root_id` and return the id of the directory
    /// it names.
    ///
    /// Missing segments are never created. The error names the path up to
    /// and including the first segment that does not exist.
    pub async fn find_directory(
        &self,
        conn: &mut SqliteConnection,
        user_id: &str,
        root_id: &str,
        path: &str,
    ) -> Result<String> {
        let segments = clean_path(path)?;
        walk(conn, user_id, root_id, &segments).await
    }

    /// Return the id of the file named by `path`.
    ///
    /// The last segment is the file name; everything before it must be an
    /// existing directory.
    pub async fn find_file(
        &self,
        conn: &mut SqliteConnection,
        user_id: &str,
        root_id: &str,
        path: &str,
    ) -> Result<String> {
        let segments = clean_path(path)?;
        let Some((file_name, dir_segments)) = segments.split_last() else {
            return Err(CubbyError::InvalidInput(format!(
                "Path \"{path}\" does not name a file"
            )));
        };
        if path.ends_with('/') {
            return Err(CubbyError::InvalidInput(format!(
                "Path \"{path}\" does not name a file"
            )));
        }

        let directory_id = walk(conn, user_id, root_id, dir_segments).await?;
        let file = TreeStore::select_file_by_owner_directory_name(
            conn,
            user_id,
            &directory_id,
            file_name,
        )
        .await?;

        file.map(|f| f.id).ok_or_else(|| {
            CubbyError::NotFound(format!("File \"{}\" does not exist", segments.join("/")))
        })
    }

    /// Name-based path of a directory: `/` for the root, `/a/b` below it.
    pub async fn resolve_user_path(
        &self,
        conn: &mut SqliteConnection,
        directory_id: &str,
    ) -> Result<String> {
        let names = TreeStore::select_ancestor_names(conn, directory_id).await?;
        if names.is_empty() {
            return Err(missing_directory(directory_id));
        }

        // First entry is the synthetic root.
        Ok(format!("/{}", names[1..].join("/")))
    }

    /// Id-based location of a directory under the storage root.
    pub async fn resolve_filesystem_path(
        &self,
        conn: &mut SqliteConnection,
        directory_id: &str,
    ) -> Result<PathBuf> {
        let ids = TreeStore::select_ancestor_ids(conn, directory_id).await?;
        if ids.is_empty() {
            return Err(missing_directory(directory_id));
        }

        let mut path = self.root.to_path_buf();
        path.extend(ids);
        Ok(path)
    }

    /// Location of a file's bytes: its directory's filesystem path plus
    /// the file id.
    pub async fn resolve_file_path(
        &self,
        conn: &mut SqliteConnection,
        directory_id: &str,
        file_id: &str,
    ) -> Result<PathBuf> {
        let dir = self.resolve_filesystem_path(conn, directory_id).await?;
        Ok(dir.join(file_id))
    }
}

async fn walk(
    conn: &mut SqliteConnection,
    user_id: &str,
    root_id: &str,
    segments: &[String],
) -> Result<String> {
    let mut directory_id = root_id.to_string();
    for (i, name) in segments.iter().enumerate() {
        let dir =
            TreeStore::select_directory_by_owner_name_parent(conn, user_id, name, &directory_id)
                .await?;
        match dir {
            Some(dir) => directory_id = dir.id,
            None => {
                return Err(CubbyError::NotFound(format!(
                    "Directory \"{}\" does not exist",
                    segments[..=i].join("/")
                )))
            }
        }
    }
    Ok(directory_id)
}

fn missing_directory(directory_id: &str) -> CubbyError {
    CubbyError::NotFound(format!("Directory \"{directory_id}\" does not exist"))
}
