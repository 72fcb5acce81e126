use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

pub const DEFAULT_STATE_DIR: &str = "/var/lib/vendorswap";

/// Paths under the state directory that survive a single run: backups,
/// journal, lock, run marker, audit trail, reports and the log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLayout {
    root: PathBuf,
}

impl StateLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.root.join("backup")
    }

    pub fn package_archive_dir(&self) -> PathBuf {
        self.backup_dir().join("packages")
    }

    /// Files are grouped by a digest of their parent directory, so two
    /// files with the same name in different directories never collide.
    pub fn hashed_backup_dir(&self, original: &Path) -> PathBuf {
        let parent = original
            .parent()
            .map(|parent| parent.to_string_lossy().into_owned())
            .unwrap_or_default();
        let digest = Sha256::digest(parent.as_bytes());
        self.backup_dir().join(hex::encode(digest))
    }

    pub fn hashed_backup_path(&self, original: &Path) -> PathBuf {
        let dir = self.hashed_backup_dir(original);
        match original.file_name() {
            Some(name) => dir.join(name),
            None => dir.join("unnamed"),
        }
    }

    pub fn journal_path(&self) -> PathBuf {
        self.root.join("backup.journal")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join("vendorswap.lock")
    }

    pub fn run_metadata_path(&self) -> PathBuf {
        self.root.join("run.json")
    }

    pub fn audit_path(&self) -> PathBuf {
        self.root.join("audit.jsonl")
    }

    pub fn report_json_path(&self, stem: &str) -> PathBuf {
        self.root.join(format!("{stem}.json"))
    }

    pub fn report_text_path(&self, stem: &str) -> PathBuf {
        self.root.join(format!("{stem}.txt"))
    }

    pub fn log_path(&self) -> PathBuf {
        self.root.join("vendorswap.log")
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [
            self.root.clone(),
            self.backup_dir(),
            self.package_archive_dir(),
        ] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}
