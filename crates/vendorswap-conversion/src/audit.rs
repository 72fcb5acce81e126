use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vendorswap_backup::{PackageIdentity, RollbackSummary};
use vendorswap_core::Severity;

use crate::state::{ConversionState, RunMode};

pub const OBFUSCATION: &str = "*****";
pub const ENV_PREFIX: &str = "VENDORSWAP_";

const SECRET_OPTIONS: [&str; 8] = [
    "--username",
    "--password",
    "--activationkey",
    "--org",
    "-u",
    "-p",
    "-k",
    "-o",
];

/// Replace the values of secret options with asterisks. Handles both
/// `--password secret` and `--password=secret`.
pub fn redact_invocation<S: AsRef<str>>(args: &[S]) -> Vec<String> {
    let mut redacted = Vec::with_capacity(args.len());
    let mut hide_next = false;
    for arg in args {
        let arg = arg.as_ref();
        if hide_next {
            redacted.push(OBFUSCATION.to_string());
            hide_next = false;
            continue;
        }
        if SECRET_OPTIONS.contains(&arg) {
            hide_next = true;
            redacted.push(arg.to_string());
            continue;
        }
        let inline = SECRET_OPTIONS.iter().find(|option| {
            arg.strip_prefix(**option)
                .is_some_and(|rest| rest.starts_with('='))
        });
        match inline {
            Some(option) => redacted.push(format!("{option}={OBFUSCATION}")),
            None => redacted.push(arg.to_string()),
        }
    }
    redacted
}

/// `VENDORSWAP_*` variables from `vars`; values of names mentioning a
/// password or key are masked.
pub fn capture_environment(vars: impl IntoIterator<Item = (String, String)>) -> BTreeMap<String, String> {
    vars.into_iter()
        .filter(|(name, _)| name.starts_with(ENV_PREFIX))
        .map(|(name, value)| {
            let upper = name.to_ascii_uppercase();
            if upper.contains("PASSWORD") || upper.contains("KEY") {
                (name, OBFUSCATION.to_string())
            } else {
                (name, value)
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsIdentity {
    pub id: String,
    pub name: String,
    pub version: String,
}

impl OsIdentity {
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    /// Major component of the version, e.g. `7` for `7.9`.
    pub fn major_version(&self) -> &str {
        self.version.split('.').next().unwrap_or_default()
    }
}

/// Parse `os-release(5)` content.
pub fn parse_os_release(raw: &str) -> Result<OsIdentity> {
    let mut fields = BTreeMap::new();
    for line in raw.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|inner| inner.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|inner| inner.strip_suffix('\''))
            })
            .unwrap_or(value);
        fields.insert(key.trim().to_string(), value.replace("\\\"", "\""));
    }

    let id = fields
        .get("ID")
        .cloned()
        .ok_or_else(|| anyhow!("os-release is missing the ID field"))?;
    let name = fields
        .get("NAME")
        .cloned()
        .unwrap_or_else(|| id.clone());
    let version = fields
        .get("VERSION_ID")
        .cloned()
        .ok_or_else(|| anyhow!("os-release is missing the VERSION_ID field"))?;
    Ok(OsIdentity { id, name, version })
}

/// Read `<sysroot>/etc/os-release`, falling back to `usr/lib/os-release`.
pub fn read_os_release(sysroot: &Path) -> Result<OsIdentity> {
    let candidates = [
        sysroot.join("etc/os-release"),
        sysroot.join("usr/lib/os-release"),
    ];
    for path in &candidates {
        match fs::read_to_string(path) {
            Ok(raw) => {
                return parse_os_release(&raw)
                    .with_context(|| format!("failed parsing {}", path.display()));
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()));
            }
        }
    }
    Err(anyhow!(
        "no os-release file found under {}",
        sysroot.display()
    ))
}

/// One attempted change, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub activity: String,
    #[serde(default)]
    pub packages: Vec<PackageIdentity>,
    #[serde(default)]
    pub invocation: Vec<String>,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ActivityEntry {
    pub fn begin(activity: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            activity: activity.into(),
            packages: Vec::new(),
            invocation: Vec::new(),
            success: false,
            started_at: now,
            finished_at: now,
            detail: None,
        }
    }

    pub fn with_packages(mut self, packages: Vec<PackageIdentity>) -> Self {
        self.packages = packages;
        self
    }

    /// Stored redacted.
    pub fn with_invocation<S: AsRef<str>>(mut self, invocation: &[S]) -> Self {
        self.invocation = redact_invocation(invocation);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn finish(mut self, success: bool) -> Self {
        self.success = success;
        self.finished_at = Utc::now();
        self
    }
}

/// Immutable record of one run, appended to the audit trail after the run
/// ends. Never used for undoing anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub run_id: Uuid,
    pub mode: RunMode,
    pub outcome: ConversionState,
    pub report_status: Severity,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_os: Option<OsIdentity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_os: Option<OsIdentity>,
    pub invocation: Vec<String>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    pub activities: Vec<ActivityEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback: Option<RollbackSummary>,
}

pub fn append_audit_record(path: &Path, record: &AuditRecord) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let line = serde_json::to_string(record).context("failed to serialize audit record")?;

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open audit log: {}", path.display()))?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("failed to append audit log: {}", path.display()))?;
    file.write_all(b"\n")
        .with_context(|| format!("failed to append audit log newline: {}", path.display()))?;
    file.flush()
        .with_context(|| format!("failed to flush audit log: {}", path.display()))?;
    Ok(path.to_path_buf())
}

pub fn read_audit_records(path: &Path) -> Result<Vec<AuditRecord>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read audit log: {}", path.display()));
        }
    };
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line)
                .with_context(|| format!("failed parsing audit log: {}", path.display()))
        })
        .collect()
}
