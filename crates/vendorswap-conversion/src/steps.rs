use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use vendorswap_backup::{
    Credentials, MissingFile, PackageBackend, Registrar, RestorableFile, RestorablePackageSet,
    RestorableRegistration, TransactionSpec,
};
use vendorswap_core::format_sequence;

use crate::audit::ActivityEntry;
use crate::step::{DestructiveStep, StepContext};

/// Snapshot configured files before anything else changes. Files that do
/// not exist yet are recorded so rollback removes them if they appear.
pub struct BackupFilesStep {
    files: Vec<PathBuf>,
}

impl BackupFilesStep {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self { files }
    }
}

impl DestructiveStep for BackupFilesStep {
    fn id(&self) -> &str {
        "BACKUP_FILES"
    }

    fn apply(&self, ctx: &mut StepContext<'_>) -> Result<()> {
        let activity = ActivityEntry::begin("backup_files");
        for path in &self.files {
            if path.exists() {
                let unit = RestorableFile::capture(ctx.layout(), path)?;
                ctx.push(unit);
            } else {
                ctx.push(MissingFile::capture(path));
            }
        }
        let detail = self
            .files
            .iter()
            .map(|path| path.display().to_string())
            .collect::<Vec<_>>();
        ctx.record(
            activity
                .with_detail(format!("backed up {}", format_sequence(&detail)))
                .finish(true),
        );
        Ok(())
    }
}

pub struct RemovePackagesStep {
    backend: Arc<dyn PackageBackend>,
    packages: Vec<String>,
}

impl RemovePackagesStep {
    pub fn new(backend: Arc<dyn PackageBackend>, packages: Vec<String>) -> Self {
        Self { backend, packages }
    }
}

impl DestructiveStep for RemovePackagesStep {
    fn id(&self) -> &str {
        "REMOVE_PACKAGES"
    }

    fn apply(&self, ctx: &mut StepContext<'_>) -> Result<()> {
        let activity = ActivityEntry::begin("remove_packages");
        let unit = RestorablePackageSet::before_removal(
            Arc::clone(&self.backend),
            &self.packages,
            &ctx.layout().package_archive_dir(),
        )?;
        let names = unit.names().to_vec();
        let identities = unit.packages().to_vec();
        if names.is_empty() {
            info!("none of {} are installed", format_sequence(&self.packages));
            ctx.record(
                activity
                    .with_detail("no installed packages to remove")
                    .finish(true),
            );
            return Ok(());
        }
        ctx.push(unit);

        let spec = TransactionSpec::Remove(names.clone());
        let activity = activity.with_packages(identities);
        match self.backend.run_transaction(&spec) {
            Ok(outcome) => {
                info!("removed {}", format_sequence(&names));
                ctx.record(activity.with_invocation(&outcome.invocation).finish(true));
                Ok(())
            }
            Err(err) => {
                ctx.record(activity.with_detail(format!("{err:#}")).finish(false));
                Err(err).with_context(|| format!("failed to remove {}", format_sequence(&names)))
            }
        }
    }
}

pub struct InstallPackagesStep {
    backend: Arc<dyn PackageBackend>,
    packages: Vec<String>,
}

impl InstallPackagesStep {
    pub fn new(backend: Arc<dyn PackageBackend>, packages: Vec<String>) -> Self {
        Self { backend, packages }
    }
}

impl DestructiveStep for InstallPackagesStep {
    fn id(&self) -> &str {
        "INSTALL_PACKAGES"
    }

    fn apply(&self, ctx: &mut StepContext<'_>) -> Result<()> {
        let activity = ActivityEntry::begin("install_packages");
        if self.packages.is_empty() {
            ctx.record(activity.with_detail("no packages to install").finish(true));
            return Ok(());
        }
        let unit = RestorablePackageSet::before_install(Arc::clone(&self.backend), &self.packages)?;
        let names = unit.names().to_vec();
        if names.is_empty() {
            info!("{} already installed", format_sequence(&self.packages));
            ctx.record(
                activity
                    .with_detail("all packages already installed")
                    .finish(true),
            );
            return Ok(());
        }
        ctx.push(unit);

        let spec = TransactionSpec::Install(names.clone());
        match self.backend.run_transaction(&spec) {
            Ok(outcome) => {
                let installed = match self.backend.installed(&names) {
                    Ok(installed) => installed,
                    Err(err) => {
                        warn!("failed to query installed packages for the audit trail: {err:#}");
                        Vec::new()
                    }
                };
                info!("installed {}", format_sequence(&names));
                ctx.record(
                    activity
                        .with_packages(installed)
                        .with_invocation(&outcome.invocation)
                        .finish(true),
                );
                Ok(())
            }
            Err(err) => {
                ctx.record(activity.with_detail(format!("{err:#}")).finish(false));
                Err(err).with_context(|| format!("failed to install {}", format_sequence(&names)))
            }
        }
    }
}

pub struct RegisterSystemStep {
    registrar: Arc<dyn Registrar>,
    credentials: Credentials,
}

impl RegisterSystemStep {
    pub fn new(registrar: Arc<dyn Registrar>, credentials: Credentials) -> Self {
        Self {
            registrar,
            credentials,
        }
    }
}

impl DestructiveStep for RegisterSystemStep {
    fn id(&self) -> &str {
        "REGISTER_SYSTEM"
    }

    fn apply(&self, ctx: &mut StepContext<'_>) -> Result<()> {
        let activity = ActivityEntry::begin("register_system");
        if !self.credentials.is_complete() {
            // Only reachable when the assessment's overridable result was accepted.
            warn!("registration credentials are incomplete; the system is not registered");
            ctx.record(
                activity
                    .with_detail("skipped: registration credentials are incomplete")
                    .finish(true),
            );
            return Ok(());
        }
        let unit = RestorableRegistration::capture(Arc::clone(&self.registrar))?;
        ctx.push(unit);

        match self.registrar.register(&self.credentials) {
            Ok(invocation) => {
                info!("system registered");
                ctx.record(activity.with_invocation(&invocation).finish(true));
                Ok(())
            }
            Err(err) => {
                ctx.record(activity.with_detail(format!("{err:#}")).finish(false));
                Err(err).context("failed to register the system")
            }
        }
    }
}
