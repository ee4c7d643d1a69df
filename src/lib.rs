//! Cubby - per-user hierarchical file storage.
//!
//! Maps name-based user paths such as `/docs/report.txt` onto a directory
//! tree in SQLite and onto id-named files and directories on the local
//! filesystem, keeping the two consistent.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod mirror;
pub mod path;
pub mod service;
pub mod store;

pub use config::Config;
pub use db::Database;
pub use error::{CubbyError, Result};
pub use mirror::FilesystemMirror;
pub use path::PathResolver;
pub use service::{BatchSave, Dir, DirectoryService, FileInfo, FileService, UploadRequest};
pub use store::{TreeStore, UnitOfWork};
