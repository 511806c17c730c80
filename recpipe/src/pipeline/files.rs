//! Move-on-success / delete-on-failure helpers for derived files.
//!
//! Pipelines write to a hidden name and only rename to the public name once
//! every stage succeeded, so a half-written deliverable is never visible.

use std::io::ErrorKind;
use std::path::Path;

use tokio::fs;
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Rename a finished hidden output to its public name.
///
/// Returns `Ok(true)` when the file was moved. A second call after a
/// successful move finds the hidden file gone and the public file present;
/// it is a no-op and returns `Ok(false)`.
pub async fn finalize(hidden: &Path, public: &Path) -> Result<bool> {
    match fs::rename(hidden, public).await {
        Ok(()) => {
            info!(from = %hidden.display(), to = %public.display(), "Finalized output");
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            if fs::try_exists(public).await.unwrap_or(false) {
                debug!(path = %public.display(), "Output already finalized");
                Ok(false)
            } else {
                Err(Error::io_path("finalizing", hidden, e))
            }
        }
        Err(e) => Err(Error::io_path("finalizing", hidden, e)),
    }
}

/// Delete a file, treating "already gone" as success.
///
/// Other failures are logged and swallowed so the remaining cleanup proceeds.
/// Returns whether a file was actually removed.
pub async fn remove_quietly(path: &Path) -> bool {
    match fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "Removed file");
            true
        }
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove file");
            false
        }
    }
}

/// Drop the hidden output of a failed run.
pub async fn discard(hidden: &Path) {
    if remove_quietly(hidden).await {
        info!(path = %hidden.display(), "Discarded incomplete output");
    }
}
