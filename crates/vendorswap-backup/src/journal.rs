use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fs_utils::ensure_parent_dir;
use crate::unit::{BackupKind, BackupRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalEventKind {
    Push,
    Restore,
    RestoreFailed,
    Ponr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEvent {
    pub seq: u64,
    pub event: JournalEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<BackupKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

impl JournalEvent {
    pub fn for_record(event: JournalEventKind, record: &BackupRecord) -> Self {
        Self {
            seq: record.seq,
            event,
            kind: Some(record.kind),
            description: Some(record.description.clone()),
            error: None,
            at: Utc::now(),
        }
    }

    pub fn ponr(seq: u64) -> Self {
        Self {
            seq,
            event: JournalEventKind::Ponr,
            kind: None,
            description: None,
            error: None,
            at: Utc::now(),
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Append-only trail of what the backup controller did, one JSON object
/// per line. Kept for the operator; rollback never reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupJournal {
    path: PathBuf,
}

impl BackupJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, event: &JournalEvent) -> Result<()> {
        ensure_parent_dir(&self.path)?;
        let line = serde_json::to_string(event).context("failed to serialize journal event")?;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open backup journal: {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("failed to append backup journal: {}", self.path.display()))?;
        file.write_all(b"\n").with_context(|| {
            format!(
                "failed to append backup journal newline: {}",
                self.path.display()
            )
        })?;
        file.flush()
            .with_context(|| format!("failed to flush backup journal: {}", self.path.display()))?;
        Ok(())
    }

    pub fn read_all(&self) -> Result<Vec<JournalEvent>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read backup journal: {}", self.path.display())
                });
            }
        };

        raw.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .enumerate()
            .map(|(index, line)| {
                serde_json::from_str(line).with_context(|| {
                    format!(
                        "failed parsing backup journal line {} in {}",
                        index + 1,
                        self.path.display()
                    )
                })
            })
            .collect()
    }
}
