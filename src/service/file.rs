//! Batch file ingestion and file metadata.

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::{abandon, cleanup, validate_name, DirectoryService};
use crate::mirror::FilesystemMirror;
use crate::path::{join_user_path, PathResolver};
use crate::store::{FileRow, NewFile, TreeStore, UnitOfWork};
use crate::{CubbyError, Database, Result};

/// Message for a failed upload whose cause must stay hidden.
pub const WRITE_FAILED_MESSAGE: &str = "Problem writing the file to the server";

/// Metadata for a stored file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileInfo {
    pub id: String,
    pub owner_id: String,
    pub directory_id: String,
    pub name: String,
    /// Name-based path, e.g. `/docs/report.txt`.
    pub path: String,
    /// Live size read from disk.
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    /// Id-based location of the bytes.
    #[serde(skip)]
    pub fs_path: PathBuf,
}

impl FileInfo {
    /// Info carrying only what the caller sent, for a failed upload.
    fn placeholder(name: String, size: u64) -> Self {
        Self {
            name,
            size,
            ..Default::default()
        }
    }
}

/// One file to ingest.
pub struct UploadRequest {
    /// User-visible file name.
    pub filename: String,
    /// Size declared by the sender. The stored size is what was read.
    pub size: u64,
    pub source: Box<dyn Read + Send>,
}

impl UploadRequest {
    /// Upload an in-memory buffer.
    pub fn from_bytes(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        Self {
            filename: filename.into(),
            size: bytes.len() as u64,
            source: Box::new(Cursor::new(bytes)),
        }
    }

    /// Upload from any reader, with the size the sender announced.
    pub fn from_reader(
        filename: impl Into<String>,
        size: u64,
        reader: impl Read + Send + 'static,
    ) -> Self {
        Self {
            filename: filename.into(),
            size,
            source: Box::new(reader),
        }
    }
}

impl std::fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadRequest")
            .field("filename", &self.filename)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Outcome of one file in a batch.
///
/// `info.name` and `info.size` are always set, even on failure.
#[derive(Debug)]
pub struct BatchSave {
    pub info: FileInfo,
    pub error: Option<CubbyError>,
}

impl BatchSave {
    /// Whether this file was stored.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Status line suitable for showing to the user.
    pub fn message(&self) -> &str {
        match &self.error {
            Some(e) if e.is_user_facing() => e.safe_message(),
            Some(_) => WRITE_FAILED_MESSAGE,
            None => "Success",
        }
    }
}

/// File service.
pub struct FileService<'a> {
    db: &'a Database,
    mirror: &'a FilesystemMirror,
    directories: DirectoryService<'a>,
}

impl<'a> FileService<'a> {
    /// Create a new FileService.
    pub fn new(db: &'a Database, mirror: &'a FilesystemMirror) -> Self {
        Self {
            db,
            mirror,
            directories: DirectoryService::new(db, mirror),
        }
    }

    fn resolver(&self) -> PathResolver<'a> {
        PathResolver::new(self.mirror.root())
    }

    /// Store every upload in `directory_id`, or in the user's root when no
    /// directory is given.
    ///
    /// Fails as a whole only when the target directory cannot be used.
    /// After that each file succeeds or fails on its own and the results
    /// come back in upload order.
    pub async fn save_batch(
        &self,
        user_id: &str,
        directory_id: Option<&str>,
        uploads: Vec<UploadRequest>,
    ) -> Result<Vec<BatchSave>> {
        let root = self.directories.ensure_user_root(user_id).await?;

        let directory_id = match directory_id.filter(|id| !id.is_empty()) {
            None => root.id,
            Some(id) => {
                let mut conn = self.db.acquire().await?;
                TreeStore::select_directory_by_id_owner(&mut conn, id, user_id)
                    .await?
                    .map(|dir| dir.id)
                    .ok_or_else(|| {
                        CubbyError::NotFound(format!("Directory \"{id}\" does not exist"))
                    })?
            }
        };

        Ok(self.save_all(user_id, &directory_id, uploads).await)
    }

    /// Store every upload in the existing directory at `path`.
    pub async fn save_batch_path(
        &self,
        user_id: &str,
        path: &str,
        uploads: Vec<UploadRequest>,
    ) -> Result<Vec<BatchSave>> {
        let root = self.directories.ensure_user_root(user_id).await?;

        let directory_id = {
            let mut conn = self.db.acquire().await?;
            self.resolver()
                .find_directory(&mut conn, user_id, &root.id, path)
                .await?
        };

        Ok(self.save_all(user_id, &directory_id, uploads).await)
    }

    /// Metadata for one of the user's files.
    ///
    /// A row whose bytes are gone from disk is reported as not found.
    pub async fn info(&self, user_id: &str, file_id: &str) -> Result<FileInfo> {
        let mut conn = self.db.acquire().await?;
        let row = TreeStore::select_file_by_id_owner(&mut conn, file_id, user_id)
            .await?
            .ok_or_else(file_not_found)?;
        self.describe(&mut conn, row).await
    }

    /// Metadata for the user's file at `path`.
    pub async fn info_path(&self, user_id: &str, path: &str) -> Result<FileInfo> {
        let root = self.directories.ensure_user_root(user_id).await?;

        let mut conn = self.db.acquire().await?;
        let file_id = self
            .resolver()
            .find_file(&mut conn, user_id, &root.id, path)
            .await?;
        let row = TreeStore::select_file_by_id_owner(&mut conn, &file_id, user_id)
            .await?
            .ok_or_else(file_not_found)?;
        self.describe(&mut conn, row).await
    }

    /// Metadata plus a handle to read the bytes.
    pub async fn open(&self, user_id: &str, file_id: &str) -> Result<(FileInfo, File)> {
        let info = self.info(user_id, file_id).await?;
        let file = self.open_bytes(&info)?;
        Ok((info, file))
    }

    /// Like [`open`](Self::open), addressed by path.
    pub async fn open_path(&self, user_id: &str, path: &str) -> Result<(FileInfo, File)> {
        let info = self.info_path(user_id, path).await?;
        let file = self.open_bytes(&info)?;
        Ok((info, file))
    }

    async fn save_all(
        &self,
        user_id: &str,
        directory_id: &str,
        uploads: Vec<UploadRequest>,
    ) -> Vec<BatchSave> {
        let mut results = Vec::with_capacity(uploads.len());

        for upload in uploads {
            let name = upload.filename.clone();
            let size = upload.size;

            let result = match self.write(user_id, directory_id, upload).await {
                Ok(info) => BatchSave { info, error: None },
                Err(e) => {
                    warn!(user_id, directory_id, file_name = %name, error = %e, "saving file");
                    BatchSave {
                        info: FileInfo::placeholder(name, size),
                        error: Some(e),
                    }
                }
            };
            results.push(result);
        }

        results
    }

    /// Receive one upload, then record it and move its bytes into place.
    ///
    /// The bytes land in the staging area before the unit of work begins,
    /// so the write lock is only held for the row insert and a rename.
    async fn write(
        &self,
        user_id: &str,
        directory_id: &str,
        upload: UploadRequest,
    ) -> Result<FileInfo> {
        validate_name("File", &upload.filename)?;
        let UploadRequest {
            filename, source, ..
        } = upload;

        let id = Uuid::new_v4().to_string();
        let uploaded_at = Utc::now();
        let (staged_path, size) = self.receive(&id, source).await?;

        let new_file = NewFile {
            id: &id,
            owner: user_id,
            directory_id,
            name: &filename,
            uploaded_at,
        };

        let mut uow = match UnitOfWork::begin(self.db).await {
            Ok(uow) => uow,
            Err(e) => {
                cleanup::spawn_remove_file(self.mirror.clone(), staged_path);
                return Err(e);
            }
        };

        let staged = self.stage(uow.conn(), &new_file).await;
        let placed = staged.and_then(|(path, fs_path)| {
            self.mirror.rename(&staged_path, &fs_path)?;
            Ok((path, fs_path))
        });
        let (path, fs_path) = match placed {
            Ok(placed) => placed,
            Err(e) => {
                abandon(uow).await;
                cleanup::spawn_remove_file(self.mirror.clone(), staged_path);
                return Err(e);
            }
        };

        if let Err(e) = uow.commit().await {
            error!(
                file_id = %id,
                path = %fs_path.display(),
                error = %e,
                "commit failed after writing file, scheduling removal"
            );
            cleanup::spawn_remove_file(self.mirror.clone(), fs_path);
            return Err(e);
        }

        debug!(user_id, file_id = %id, %path, size, "stored file");
        Ok(FileInfo {
            id,
            owner_id: user_id.to_string(),
            directory_id: directory_id.to_string(),
            name: filename,
            path,
            size,
            uploaded_at,
            fs_path,
        })
    }

    /// Copy an upload into the staging area on the blocking pool.
    ///
    /// Returns the staged path and the number of bytes copied. A partial
    /// copy is removed before the error is returned.
    async fn receive(
        &self,
        id: &str,
        mut source: Box<dyn Read + Send>,
    ) -> Result<(PathBuf, u64)> {
        let mirror = self.mirror.clone();
        let staged_path = mirror.staging_path(id);

        tokio::task::spawn_blocking(move || -> Result<(PathBuf, u64)> {
            mirror.ensure_staging()?;
            let mut file = mirror.create_file(&staged_path)?;
            match mirror.write_all(&mut file, &mut *source, &staged_path) {
                Ok(size) => Ok((staged_path, size)),
                Err(e) => {
                    drop(file);
                    cleanup::remove_file(&mirror, &staged_path);
                    Err(e)
                }
            }
        })
        .await
        .map_err(|e| CubbyError::Io(e.into()))?
    }

    /// Stage the file row and work out where it lives.
    ///
    /// Returns the user path and the filesystem path.
    async fn stage(
        &self,
        conn: &mut SqliteConnection,
        file: &NewFile<'_>,
    ) -> Result<(String, PathBuf)> {
        TreeStore::insert_file(conn, file).await?;

        let resolver = self.resolver();
        let dir_path = resolver.resolve_user_path(conn, file.directory_id).await?;
        let fs_path = resolver
            .resolve_file_path(conn, file.directory_id, file.id)
            .await?;
        Ok((join_user_path(&dir_path, file.name), fs_path))
    }

    async fn describe(&self, conn: &mut SqliteConnection, row: FileRow) -> Result<FileInfo> {
        let resolver = self.resolver();
        let dir_path = resolver.resolve_user_path(conn, &row.directory_id).await?;
        let fs_path = resolver
            .resolve_file_path(conn, &row.directory_id, &row.id)
            .await?;

        let size = self.mirror.stat(&fs_path).map_err(|e| {
            if e.is_missing_path() {
                warn!(file_id = %row.id, path = %fs_path.display(), "file row has no bytes on disk");
                file_not_found()
            } else {
                e
            }
        })?;

        Ok(FileInfo {
            path: join_user_path(&dir_path, &row.name),
            id: row.id,
            owner_id: row.owner,
            directory_id: row.directory_id,
            name: row.name,
            size,
            uploaded_at: row.uploaded_at,
            fs_path,
        })
    }

    fn open_bytes(&self, info: &FileInfo) -> Result<File> {
        self.mirror.open(&info.fs_path).map_err(|e| {
            if e.is_missing_path() {
                file_not_found()
            } else {
                e
            }
        })
    }
}

fn file_not_found() -> CubbyError {
    CubbyError::NotFound("File not found".to_string())
}
