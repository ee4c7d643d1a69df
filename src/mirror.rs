//! Physical storage for Cubby.
//!
//! The mirror is a thin synchronous wrapper over the local filesystem.
//! Every entry is addressed by opaque ids, never by user-chosen names:
//!
//! ```text
//! {root}/
//! ├── .staging/                                      uploads in flight
//! └── 1b4e28ba-2fa1-11d2-883f-0016d3cca427/          user root
//!     ├── 6fa459ea-ee8a-3ca4-894e-db77e160355e       file bytes
//!     └── 886313e1-3b8a-5372-9b90-0c9aee199e5d/      subdirectory
//! ```
//!
//! Nothing here is transactional. The only way to undo a call is the
//! explicit inverse call.

use std::fs::{self, DirBuilder, File, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::config::StorageConfig;
use crate::{CubbyError, Result};

/// Directory under the root that holds uploads not yet moved into a tree.
pub const STAGING_DIR: &str = ".staging";

/// Filesystem side of the storage engine.
#[derive(Debug, Clone)]
pub struct FilesystemMirror {
    root: PathBuf,
    dir_mode: u32,
    file_mode: u32,
}

impl FilesystemMirror {
    /// Create a mirror rooted at `root`. Nothing is touched on disk until
    /// [`ensure_root`](Self::ensure_root) is called.
    pub fn new(root: impl Into<PathBuf>, dir_mode: u32, file_mode: u32) -> Self {
        Self {
            root: root.into(),
            dir_mode,
            file_mode,
        }
    }

    /// Create a mirror from the `[storage]` section.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.path, config.dir_mode, config.file_mode)
    }

    /// Storage root every user tree lives under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the storage root if it is absent. Idempotent.
    pub fn ensure_root(&self) -> Result<()> {
        self.dir_builder()
            .recursive(true)
            .create(&self.root)
            .map_err(|e| CubbyError::filesystem("creating storage root", &self.root, e))
    }

    /// Create a single directory. The parent must already exist.
    pub fn create_directory(&self, path: &Path) -> Result<()> {
        self.dir_builder()
            .create(path)
            .map_err(|e| CubbyError::filesystem("creating directory", path, e))
    }

    /// Remove a directory and everything below it.
    ///
    /// A path that is already gone counts as removed.
    pub fn remove_directory_tree(&self, path: &Path) -> Result<()> {
        match fs::remove_dir_all(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CubbyError::filesystem("removing directory", path, e)),
        }
    }

    /// Create a new file for writing. Fails if anything already exists at
    /// `path`; existing bytes are never truncated.
    pub fn create_file(&self, path: &Path) -> Result<File> {
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(self.file_mode);
        }

        options
            .open(path)
            .map_err(|e| CubbyError::filesystem("creating file", path, e))
    }

    /// Copy `source` into `file` and flush it to disk.
    ///
    /// Returns the number of bytes written. `path` is only used for error
    /// context.
    pub fn write_all(&self, file: &mut File, source: &mut dyn Read, path: &Path) -> Result<u64> {
        let written =
            io::copy(source, file).map_err(|e| CubbyError::filesystem("writing file", path, e))?;
        file.sync_all()
            .map_err(|e| CubbyError::filesystem("syncing file", path, e))?;
        Ok(written)
    }

    /// Where the upload with the given id is received before it is
    /// moved into its directory.
    pub fn staging_path(&self, id: &str) -> PathBuf {
        self.root.join(STAGING_DIR).join(id)
    }

    /// Create the staging directory if it is absent.
    pub fn ensure_staging(&self) -> Result<()> {
        let dir = self.root.join(STAGING_DIR);
        self.dir_builder()
            .recursive(true)
            .create(&dir)
            .map_err(|e| CubbyError::filesystem("creating staging directory", &dir, e))
    }

    /// Move a staged file to its final location. Both paths must be on
    /// the storage root's filesystem.
    pub fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to).map_err(|e| CubbyError::filesystem("moving file", to, e))
    }

    /// Remove a single file. A file that is already gone counts as removed.
    pub fn remove_file(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CubbyError::filesystem("removing file", path, e)),
        }
    }

    /// Live size of the file at `path`.
    pub fn stat(&self, path: &Path) -> Result<u64> {
        fs::metadata(path)
            .map(|m| m.len())
            .map_err(|e| CubbyError::filesystem("reading file info", path, e))
    }

    /// Open the file at `path` for reading.
    pub fn open(&self, path: &Path) -> Result<File> {
        File::open(path).map_err(|e| CubbyError::filesystem("opening file", path, e))
    }

    fn dir_builder(&self) -> DirBuilder {
        let mut builder = DirBuilder::new();
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(self.dir_mode);
        }
        #[cfg(not(unix))]
        let _ = self.dir_mode;
        builder
    }
}
