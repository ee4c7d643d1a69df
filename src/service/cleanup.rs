//! Compensating deletes.
//!
//! These undo a physical write whose relational half never became
//! durable. They run on tokio's blocking pool, detached from the request,
//! and only log when they fail.

use std::path::{Path, PathBuf};

use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::mirror::FilesystemMirror;

/// Recursively remove a directory, logging any failure.
pub fn remove_directory(mirror: &FilesystemMirror, path: &Path) {
    match mirror.remove_directory_tree(path) {
        Ok(()) => debug!(path = %path.display(), "removed directory"),
        Err(e) => error!(path = %path.display(), error = %e, "removing directory"),
    }
}

/// Remove a single file, logging any failure.
pub fn remove_file(mirror: &FilesystemMirror, path: &Path) {
    match mirror.remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed file"),
        Err(e) => error!(path = %path.display(), error = %e, "removing file"),
    }
}

/// Schedule [`remove_directory`] in the background.
///
/// Dropping the handle leaves the task running.
pub fn spawn_remove_directory(mirror: FilesystemMirror, path: PathBuf) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || remove_directory(&mirror, &path))
}

/// Schedule [`remove_file`] in the background.
pub fn spawn_remove_file(mirror: FilesystemMirror, path: PathBuf) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || remove_file(&mirror, &path))
}
