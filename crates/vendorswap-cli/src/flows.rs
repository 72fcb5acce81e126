use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use vendorswap_backup::{Credentials, PackageBackend, Registrar, StateLayout, DEFAULT_STATE_DIR};
use vendorswap_conversion::{
    capture_environment, read_os_release, BackupFilesStep, ConversionOutcome, Coordinator,
    CoordinatorError, CoordinatorOptions, InstallPackagesStep, InterruptFlag, OsIdentity,
    PlanSummary, RegisterSystemStep, RemovePackagesStep, RunMode,
};

use crate::checks::{assessment_registry, post_conversion_registry, under_sysroot, RootUserCheck};
use crate::config::Config;
use crate::render::{format_outcome_lines, format_report_lines, OutputStyle, ProgressObserver};
use crate::system::{SubscriptionManager, YumBackend};

/// Everything a run needs beyond the configuration file.
pub struct RunSettings {
    pub state_dir: PathBuf,
    pub sysroot: PathBuf,
    pub allow_overridable: bool,
    pub invocation: Vec<String>,
    pub is_root: bool,
}

impl RunSettings {
    pub fn resolve(
        config: &Config,
        state_dir: Option<PathBuf>,
        sysroot: PathBuf,
        allow_overridable: bool,
        invocation: Vec<String>,
    ) -> Self {
        let state_dir = state_dir
            .or_else(|| config.backup.state_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR));
        Self {
            state_dir,
            sysroot,
            allow_overridable: allow_overridable || config.conversion.allow_overridable,
            invocation,
            is_root: RootUserCheck::detect(),
        }
    }

    pub fn layout(&self) -> StateLayout {
        StateLayout::new(&self.state_dir)
    }
}

/// Target identity; without a configured version the source's major
/// version is kept.
pub fn target_identity(config: &Config, source: Option<&OsIdentity>) -> OsIdentity {
    let version = config
        .conversion
        .target_version
        .clone()
        .or_else(|| source.map(|identity| identity.major_version().to_string()))
        .unwrap_or_default();
    OsIdentity::new(
        config.conversion.target_id.clone(),
        config.conversion.target_name.clone(),
        version,
    )
}

pub fn coordinator_options(config: &Config, settings: &RunSettings, mode: RunMode) -> CoordinatorOptions {
    let source_os = match read_os_release(&settings.sysroot) {
        Ok(identity) => Some(identity),
        Err(err) => {
            warn!("source system not identified: {err:#}");
            None
        }
    };
    let target_os = Some(target_identity(config, source_os.as_ref()));
    CoordinatorOptions {
        mode,
        allow_overridable: settings.allow_overridable,
        executor: vendorswap_actions::ExecutorOptions {
            parallel: config.checks.parallel,
            skip_threshold: config.checks.skip_threshold,
        },
        source_os,
        target_os,
        invocation: settings.invocation.clone(),
        environment: capture_environment(std::env::vars()),
    }
}

/// Assemble the coordinator from configuration. Package and registration
/// steps are only planned when configured.
pub fn build_coordinator<'a>(
    config: &Config,
    settings: &RunSettings,
    mode: RunMode,
    backend: Arc<dyn PackageBackend>,
    registrar: Arc<dyn Registrar>,
    credentials: Credentials,
    interrupt: &'a InterruptFlag,
) -> Coordinator<'a> {
    let mut coordinator = Coordinator::new(
        settings.layout(),
        coordinator_options(config, settings, mode),
        assessment_registry(config, &settings.sysroot, settings.is_root),
        interrupt,
    );
    if !config.backup.files.is_empty() {
        coordinator = coordinator.step(BackupFilesStep::new(backup_paths(
            config,
            &settings.sysroot,
        )));
    }
    if !config.packages.remove.is_empty() {
        coordinator = coordinator.step(RemovePackagesStep::new(
            Arc::clone(&backend),
            config.packages.remove.clone(),
        ));
    }
    if !config.packages.install.is_empty() {
        coordinator = coordinator.step(InstallPackagesStep::new(
            Arc::clone(&backend),
            config.packages.install.clone(),
        ));
    }
    coordinator = coordinator.point_of_no_return();
    if config.registration.enabled {
        coordinator = coordinator.step(RegisterSystemStep::new(registrar, credentials));
    }
    coordinator.post_conversion(post_conversion_registry(config, &settings.sysroot))
}

/// Configured backup files resolved the same way `CHECK_BACKUP_FILES` sees
/// them.
pub fn backup_paths(config: &Config, sysroot: &Path) -> Vec<PathBuf> {
    config
        .backup
        .files
        .iter()
        .map(|file| under_sysroot(sysroot, file))
        .collect()
}

pub fn system_coordinator<'a>(
    config: &Config,
    settings: &RunSettings,
    mode: RunMode,
    credentials: Credentials,
    interrupt: &'a InterruptFlag,
) -> Coordinator<'a> {
    build_coordinator(
        config,
        settings,
        mode,
        Arc::new(YumBackend),
        Arc::new(SubscriptionManager),
        credentials,
        interrupt,
    )
}

pub fn run_plan_command(coordinator: &Coordinator<'_>) -> Result<PlanSummary, CoordinatorError> {
    let plan = coordinator.plan()?;
    info!(
        "plan resolved: {} assessment action(s), {} step entries",
        plan.assessment.len(),
        plan.steps.len()
    );
    Ok(plan)
}

pub fn run_conversion_command(
    coordinator: Coordinator<'_>,
    style: OutputStyle,
) -> Result<ConversionOutcome, CoordinatorError> {
    let total = coordinator.plan()?.assessment.len();
    let observer = ProgressObserver::new(style, total);
    let result = coordinator.run(&observer);
    observer.finish();
    let outcome = result?;

    for line in format_report_lines(&outcome.assessment, style, false) {
        println!("{line}");
    }
    if let Some(report) = &outcome.final_report {
        println!();
        for line in format_report_lines(report, style, false) {
            println!("{line}");
        }
    }
    for line in format_outcome_lines(&outcome, style) {
        println!("{line}");
    }
    Ok(outcome)
}

pub fn sysroot_or_default(sysroot: Option<&Path>) -> PathBuf {
    sysroot
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"))
}
