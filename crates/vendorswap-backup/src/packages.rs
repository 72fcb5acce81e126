use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;
use vendorswap_core::format_sequence;

use crate::unit::{BackupKind, Restorable};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageIdentity {
    pub name: String,
    pub version: String,
    pub arch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl PackageIdentity {
    pub fn nevra(&self) -> String {
        format!("{}-{}.{}", self.name, self.version, self.arch)
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.nevra())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Install,
    Remove,
    InstallArchives,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Remove => "remove",
            Self::InstallArchives => "install_archives",
        }
    }
}

/// One package manager transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionSpec {
    Install(Vec<String>),
    Remove(Vec<String>),
    /// Reinstall from local archives, replacing anything already present.
    InstallArchives(Vec<PathBuf>),
}

impl TransactionSpec {
    pub fn kind(&self) -> TransactionKind {
        match self {
            Self::Install(_) => TransactionKind::Install,
            Self::Remove(_) => TransactionKind::Remove,
            Self::InstallArchives(_) => TransactionKind::InstallArchives,
        }
    }

    pub fn targets(&self) -> Vec<String> {
        match self {
            Self::Install(names) | Self::Remove(names) => names.clone(),
            Self::InstallArchives(paths) => paths
                .iter()
                .map(|path| path.display().to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutcome {
    pub invocation: Vec<String>,
    pub output: String,
}

/// The OS package manager, as far as backups and destructive steps need it.
pub trait PackageBackend: Send + Sync {
    fn run_transaction(&self, spec: &TransactionSpec) -> Result<TransactionOutcome>;

    /// Download archives for `packages` into `dest` and return their paths.
    fn download(&self, packages: &[String], dest: &Path) -> Result<Vec<PathBuf>>;

    /// Installed packages among `names`; unknown names are omitted.
    fn installed(&self, names: &[String]) -> Result<Vec<PackageIdentity>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PackageChange {
    /// Packages about to be removed, with archives to put them back.
    Removed { archives: Vec<PathBuf> },
    /// Packages about to be installed; restore removes them again.
    Installed,
}

/// A set of packages the conversion removes or installs.
#[derive(Clone)]
pub struct RestorablePackageSet {
    backend: Arc<dyn PackageBackend>,
    packages: Vec<PackageIdentity>,
    names: Vec<String>,
    change: PackageChange,
}

impl RestorablePackageSet {
    /// Capture installed packages before removal by downloading their
    /// archives into `archive_dir`. Names that are not installed are dropped.
    pub fn before_removal(
        backend: Arc<dyn PackageBackend>,
        names: &[String],
        archive_dir: &Path,
    ) -> Result<Self> {
        let packages = backend
            .installed(names)
            .context("failed to query installed packages for backup")?;
        let installed_names = packages
            .iter()
            .map(|package| package.name.clone())
            .collect::<Vec<_>>();

        let archives = if installed_names.is_empty() {
            Vec::new()
        } else {
            fs::create_dir_all(archive_dir)
                .with_context(|| format!("failed to create {}", archive_dir.display()))?;
            info!("backing up packages: {}", format_sequence(&installed_names));
            backend
                .download(&installed_names, archive_dir)
                .with_context(|| {
                    format!(
                        "failed to download {} for backup",
                        format_sequence(&installed_names)
                    )
                })?
        };
        if archives.len() < installed_names.len() {
            return Err(anyhow!(
                "backup of {} is incomplete: {} of {} archives downloaded",
                format_sequence(&installed_names),
                archives.len(),
                installed_names.len()
            ));
        }

        Ok(Self {
            backend,
            packages,
            names: installed_names,
            change: PackageChange::Removed { archives },
        })
    }

    /// Record packages about to be installed so rollback can remove them.
    /// Names that are already installed are left out; rollback must never
    /// remove a package the host had before the run.
    pub fn before_install(backend: Arc<dyn PackageBackend>, names: &[String]) -> Result<Self> {
        let present = backend
            .installed(names)
            .context("failed to query installed packages for backup")?
            .into_iter()
            .map(|package| package.name)
            .collect::<Vec<_>>();
        let absent = names
            .iter()
            .filter(|name| !present.contains(name))
            .cloned()
            .collect::<Vec<_>>();
        if !present.is_empty() {
            info!("already installed, not tracked for rollback: {}", format_sequence(&present));
        }
        Ok(Self {
            backend,
            packages: Vec::new(),
            names: absent,
            change: PackageChange::Installed,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn packages(&self) -> &[PackageIdentity] {
        &self.packages
    }

    pub fn archives(&self) -> &[PathBuf] {
        match &self.change {
            PackageChange::Removed { archives } => archives,
            PackageChange::Installed => &[],
        }
    }
}

impl fmt::Debug for RestorablePackageSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestorablePackageSet")
            .field("names", &self.names)
            .field("change", &self.change)
            .finish_non_exhaustive()
    }
}

impl Restorable for RestorablePackageSet {
    fn kind(&self) -> BackupKind {
        BackupKind::PackageSet
    }

    fn describe(&self) -> String {
        let verb = match self.change {
            PackageChange::Removed { .. } => "removed",
            PackageChange::Installed => "installed",
        };
        if self.names.is_empty() {
            format!("{verb} packages (none)")
        } else {
            format!("{verb} packages {}", format_sequence(&self.names))
        }
    }

    fn restore(&mut self) -> Result<()> {
        match &self.change {
            PackageChange::Removed { archives } => {
                if archives.is_empty() {
                    return Ok(());
                }
                info!("reinstalling removed packages: {}", format_sequence(&self.names));
                self.backend
                    .run_transaction(&TransactionSpec::InstallArchives(archives.clone()))
                    .with_context(|| {
                        format!("failed to reinstall {}", format_sequence(&self.names))
                    })?;
            }
            PackageChange::Installed => {
                let present = self
                    .backend
                    .installed(&self.names)
                    .context("failed to query installed packages for rollback")?
                    .into_iter()
                    .map(|package| package.name)
                    .collect::<Vec<_>>();
                if present.is_empty() {
                    info!("none of {} were installed", format_sequence(&self.names));
                    return Ok(());
                }
                info!("removing installed packages: {}", format_sequence(&present));
                self.backend
                    .run_transaction(&TransactionSpec::Remove(present.clone()))
                    .with_context(|| format!("failed to remove {}", format_sequence(&present)))?;
            }
        }
        Ok(())
    }
}
