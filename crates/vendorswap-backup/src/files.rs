use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info};

use crate::fs_utils::{ensure_parent_dir, remove_file_if_exists, unused_path};
use crate::layout::StateLayout;
use crate::unit::{BackupKind, Restorable};

/// Content of a file as it was before the conversion touched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestorableFile {
    path: PathBuf,
    backup_path: Option<PathBuf>,
}

impl RestorableFile {
    /// Copy the current content of `path` into the backup area.
    ///
    /// A file that does not exist is recorded as such and restores as a
    /// no-op; pair it with [`MissingFile`] to remove a file created later.
    pub fn capture(layout: &StateLayout, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_absolute() {
            return Err(anyhow!(
                "backup path must be absolute: {}",
                path.display()
            ));
        }
        if path.is_dir() {
            return Err(anyhow!(
                "backup path must be a file, not a directory: {}",
                path.display()
            ));
        }
        if !path.is_file() {
            info!("{} does not exist, nothing to back up", path.display());
            return Ok(Self {
                path,
                backup_path: None,
            });
        }

        let backup_path = unused_path(&layout.hashed_backup_path(&path));
        ensure_parent_dir(&backup_path)?;
        fs::copy(&path, &backup_path).with_context(|| {
            format!(
                "failed to back up {} to {}",
                path.display(),
                backup_path.display()
            )
        })?;
        debug!("copied {} to {}", path.display(), backup_path.display());

        Ok(Self {
            path,
            backup_path: Some(backup_path),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> Option<&Path> {
        self.backup_path.as_deref()
    }
}

impl Restorable for RestorableFile {
    fn kind(&self) -> BackupKind {
        BackupKind::File
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    fn restore(&mut self) -> Result<()> {
        let Some(backup_path) = &self.backup_path else {
            info!("{} was not backed up, nothing to restore", self.path.display());
            return Ok(());
        };

        ensure_parent_dir(&self.path)?;
        // Copying replaces content and permission bits.
        fs::copy(backup_path, &self.path).with_context(|| {
            format!(
                "failed to restore {} from {}",
                self.path.display(),
                backup_path.display()
            )
        })?;
        remove_file_if_exists(backup_path).with_context(|| {
            format!("failed to remove backup copy {}", backup_path.display())
        })?;
        info!("restored {}", self.path.display());
        self.backup_path = None;
        Ok(())
    }
}

/// A file that was absent before the conversion; restoring removes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingFile {
    path: PathBuf,
    absent_at_capture: bool,
}

impl MissingFile {
    pub fn capture(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let absent_at_capture = !path.exists();
        if absent_at_capture {
            info!("marking {} as missing before conversion", path.display());
        } else {
            debug!("{} already exists, it will not be removed", path.display());
        }
        Self {
            path,
            absent_at_capture,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Restorable for MissingFile {
    fn kind(&self) -> BackupKind {
        BackupKind::MissingFile
    }

    fn describe(&self) -> String {
        format!("missing file {}", self.path.display())
    }

    fn restore(&mut self) -> Result<()> {
        if !self.absent_at_capture {
            return Ok(());
        }
        if !self.path.is_file() {
            info!("{} was not created during conversion", self.path.display());
            return Ok(());
        }
        fs::remove_file(&self.path)
            .with_context(|| format!("failed to remove {}", self.path.display()))?;
        info!("removed {} created during conversion", self.path.display());
        Ok(())
    }
}
