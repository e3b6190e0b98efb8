//! Async file cleanup
//!
//! Recursive directory removal is blocking filesystem work; [`remove_tree`]
//! offloads it to the blocking thread pool so runtime worker threads keep
//! serving other tasks. Removal is idempotent: an absent path counts as
//! success, so repeated cleanup of the same workspace never fails.

use std::path::PathBuf;

use tokio::task;
use tracing::debug;

use crate::error::{Error, Result};

/// Recursively delete the directory tree at `path`
///
/// Runs on the blocking thread pool. An absent path is success, so cleanup
/// can be retried or raced without bookkeeping. Symbolic links inside the
/// tree are removed, never followed. Dropping the returned future does not
/// cancel a removal already under way; the worker thread runs to completion.
///
/// # Errors
///
/// [`Error::Filesystem`] when the tree cannot be removed, for example when
/// `path` exists but is not a directory, carrying the path and the
/// underlying io error.
pub async fn remove_tree(path: impl Into<PathBuf>) -> Result<()> {
    let path = path.into();
    let requested = path.clone();
    let (path, removed) = task::spawn_blocking(move || match std::fs::remove_dir_all(&path) {
        Ok(()) => Ok((path, true)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok((path, false)),
        Err(e) => Err(Error::Filesystem { path, source: e }),
    })
    .await
    .map_err(|e| Error::Filesystem {
        path: requested,
        source: std::io::Error::other(e),
    })??;

    if removed {
        debug!(?path, "removed directory tree");
    } else {
        debug!(?path, "path already absent, nothing to remove");
    }
    Ok(())
}
