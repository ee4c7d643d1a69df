//! Directory and file services.
//!
//! Both services follow the same write protocol: stage the relational
//! rows in a [`UnitOfWork`], touch the filesystem, then commit. When the
//! commit fails after the filesystem write, the physical artifact is
//! removed by a detached compensating task.

pub mod cleanup;
mod directory;
mod file;

pub use directory::{Dir, DirectoryService, ROOT_NAME};
pub use file::{BatchSave, FileInfo, FileService, UploadRequest, WRITE_FAILED_MESSAGE};

use tracing::warn;

use crate::store::UnitOfWork;
use crate::{CubbyError, Result};

/// Reject names that cannot be a single tree entry.
///
/// `kind` is "Directory" or "File" and only shapes the message.
pub(crate) fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CubbyError::InvalidInput(format!(
            "{kind} name cannot be empty"
        )));
    }
    if name == "." || name == ".." || name.contains('/') || name.contains('\0') {
        return Err(CubbyError::InvalidInput(format!(
            "{kind} name \"{name}\" is not allowed"
        )));
    }
    Ok(())
}

/// Roll back a unit of work whose staged writes were rejected.
///
/// The caller already has the error that matters, so a failed rollback is
/// only logged.
pub(crate) async fn abandon(uow: UnitOfWork) {
    if let Err(e) = uow.rollback().await {
        warn!(error = %e, "rollback failed");
    }
}
