//! Per-run workspace directories.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::io::config::WorkspaceConfig;

/// Create a fresh, uniquely named directory for one run.
///
/// The directory outlives the returned value; finalize (or the controller on
/// a fatal error) removes it with [`remove_workspace`].
pub fn create_workspace(cfg: &WorkspaceConfig) -> Result<PathBuf> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(&cfg.prefix);
    let dir = match &cfg.parent_dir {
        Some(parent) => {
            fs::create_dir_all(parent)
                .with_context(|| format!("create workspace parent {}", parent.display()))?;
            builder.tempdir_in(parent)
        }
        None => builder.tempdir(),
    }
    .context("create workspace directory")?;
    let path = dir.keep();
    debug!(path = %path.display(), "workspace created");
    Ok(path)
}

/// Recursively delete a workspace. A directory that is already gone is not an error.
pub fn remove_workspace(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            debug!(path = %path.display(), "workspace removed");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("remove workspace {}", path.display())),
    }
}
