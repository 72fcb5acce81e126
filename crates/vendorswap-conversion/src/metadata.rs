use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vendorswap_backup::{remove_file_if_exists, StateLayout};

use crate::state::RunMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Planning,
    Assessing,
    Applying,
    RollingBack,
    Analyzed,
    Converted,
    RolledBack,
    Inhibited,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Assessing => "assessing",
            Self::Applying => "applying",
            Self::RollingBack => "rolling_back",
            Self::Analyzed => "analyzed",
            Self::Converted => "converted",
            Self::RolledBack => "rolled_back",
            Self::Inhibited => "inhibited",
        }
    }

    /// A run that stopped in one of these states may have left the host
    /// half converted.
    pub fn requires_repair(self) -> bool {
        matches!(self, Self::Applying | Self::RollingBack)
    }
}

/// Contents of the active-run marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunMetadata {
    pub run_id: String,
    pub mode: RunMode,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
}

pub fn write_run_metadata(layout: &StateLayout, metadata: &RunMetadata) -> Result<PathBuf> {
    let path = layout.run_metadata_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let raw = serde_json::to_string_pretty(metadata).context("failed to serialize run metadata")?;
    fs::write(&path, format!("{raw}\n"))
        .with_context(|| format!("failed to write run metadata file: {}", path.display()))?;
    Ok(path)
}

pub fn read_run_metadata(layout: &StateLayout) -> Result<Option<RunMetadata>> {
    let path = layout.run_metadata_path();
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| {
                format!("failed to read run metadata file: {}", path.display())
            });
        }
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }

    let metadata = serde_json::from_str(&raw)
        .with_context(|| format!("failed parsing run metadata file: {}", path.display()))?;
    Ok(Some(metadata))
}

pub fn update_run_status(layout: &StateLayout, status: RunStatus) -> Result<()> {
    let mut metadata = read_run_metadata(layout)?
        .ok_or_else(|| anyhow!("run metadata not found in {}", layout.root().display()))?;
    metadata.status = status;
    write_run_metadata(layout, &metadata)?;
    Ok(())
}

pub fn clear_run_metadata(layout: &StateLayout) -> Result<()> {
    let path = layout.run_metadata_path();
    remove_file_if_exists(&path)
        .with_context(|| format!("failed to clear run metadata file: {}", path.display()))
}
