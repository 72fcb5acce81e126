//! Built-in assessment checks. Every lookup goes through `sysroot` so the
//! checks can be pointed at a mounted image or a test fixture.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use vendorswap_actions::{Action, ActionOutcome, ActionRegistry};
use vendorswap_conversion::read_os_release;
use vendorswap_core::{format_sequence, ActionResult, ResultLevel};

use crate::config::Config;

pub const CHECK_ROOT_USER: &str = "CHECK_ROOT_USER";
pub const CHECK_OS_RELEASE: &str = "CHECK_OS_RELEASE";
pub const READ_ONLY_MOUNTS_MNT: &str = "READ_ONLY_MOUNTS_MNT";
pub const READ_ONLY_MOUNTS_SYS: &str = "READ_ONLY_MOUNTS_SYS";
pub const CHECK_DISK_SPACE: &str = "CHECK_DISK_SPACE";
pub const CHECK_PACKAGE_BACKEND: &str = "CHECK_PACKAGE_BACKEND";
pub const CHECK_BACKUP_FILES: &str = "CHECK_BACKUP_FILES";
pub const CHECK_REGISTRATION_CREDENTIALS: &str = "CHECK_REGISTRATION_CREDENTIALS";
pub const CHECK_TARGET_OS_RELEASE: &str = "CHECK_TARGET_OS_RELEASE";

const PACKAGE_TOOLS: [&str; 3] = ["rpm", "yum", "yumdownloader"];
const TOOL_DIRS: [&str; 4] = ["usr/bin", "bin", "usr/sbin", "sbin"];

/// `path` re-rooted under `sysroot`.
pub fn under_sysroot(sysroot: &Path, path: &Path) -> PathBuf {
    match path.strip_prefix("/") {
        Ok(relative) => sysroot.join(relative),
        Err(_) => sysroot.join(path),
    }
}

pub fn assessment_registry(config: &Config, sysroot: &Path, is_root: bool) -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    registry
        .register(RootUserCheck { is_root })
        .register(OsReleaseCheck {
            id: CHECK_OS_RELEASE,
            sysroot: sysroot.to_path_buf(),
            expected_ids: config.conversion.supported_source_ids.clone(),
        })
        .register(ReadOnlyMountCheck {
            id: READ_ONLY_MOUNTS_MNT,
            sysroot: sysroot.to_path_buf(),
            mount_point: "/mnt",
        })
        .register(ReadOnlyMountCheck {
            id: READ_ONLY_MOUNTS_SYS,
            sysroot: sysroot.to_path_buf(),
            mount_point: "/sys",
        })
        .register(DiskSpaceCheck {
            path: under_sysroot(sysroot, Path::new("/var/lib")),
            min_free_mib: config.checks.min_free_space_mib,
        })
        .register(PackageBackendCheck {
            sysroot: sysroot.to_path_buf(),
        })
        .register(BackupFilesCheck {
            sysroot: sysroot.to_path_buf(),
            files: config.backup.files.clone(),
        })
        .register(RegistrationCredentialsCheck {
            enabled: config.registration.enabled,
            complete: config.registration.credentials().is_complete(),
        });
    registry
}

/// Runs after the destructive phase; its report is the final report.
pub fn post_conversion_registry(config: &Config, sysroot: &Path) -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    registry.register(OsReleaseCheck {
        id: CHECK_TARGET_OS_RELEASE,
        sysroot: sysroot.to_path_buf(),
        expected_ids: vec![config.conversion.target_id.clone()],
    });
    registry
}

pub struct RootUserCheck {
    pub is_root: bool,
}

impl RootUserCheck {
    pub fn detect() -> bool {
        nix::unistd::geteuid().is_root()
    }
}

impl Action for RootUserCheck {
    fn id(&self) -> &str {
        CHECK_ROOT_USER
    }

    fn run(&self, outcome: &mut ActionOutcome) -> Result<()> {
        if !self.is_root {
            outcome.set_result(
                ActionResult::new(ResultLevel::Error, "ROOT_PRIVILEGES_REQUIRED", "Root privileges are required")
                    .with_description("The conversion changes system packages and must run as root.")
                    .with_remediation("Run vendorswap with sudo or as the root user."),
            );
        }
        Ok(())
    }
}

pub struct OsReleaseCheck {
    pub id: &'static str,
    pub sysroot: PathBuf,
    pub expected_ids: Vec<String>,
}

impl Action for OsReleaseCheck {
    fn id(&self) -> &str {
        self.id
    }

    fn run(&self, outcome: &mut ActionOutcome) -> Result<()> {
        let identity = match read_os_release(&self.sysroot) {
            Ok(identity) => identity,
            Err(err) => {
                outcome.set_result(
                    ActionResult::new(ResultLevel::Error, "UNKNOWN_SYSTEM", "Unable to identify the operating system")
                        .with_description("os-release could not be read or is incomplete.")
                        .with_diagnosis(format!("{err:#}")),
                );
                return Ok(());
            }
        };

        if !self.expected_ids.iter().any(|id| id == &identity.id) {
            outcome.set_result(
                ActionResult::new(ResultLevel::Error, "UNSUPPORTED_SYSTEM", "{NAME} {VERSION} is not supported")
                    .with_description("Supported system ids: {SUPPORTED}.")
                    .with_variable("NAME", identity.name.clone())
                    .with_variable("VERSION", identity.version.clone())
                    .with_variable("SUPPORTED", format_sequence(&self.expected_ids)),
            );
            return Ok(());
        }

        outcome.info(
            "SYSTEM_DETECTED",
            &format!("Detected {} {}", identity.name, identity.version),
            &format!("os-release id is {}", identity.id),
        );
        Ok(())
    }
}

pub struct ReadOnlyMountCheck {
    pub id: &'static str,
    pub sysroot: PathBuf,
    pub mount_point: &'static str,
}

/// Whether `mounts` (in `/proc/mounts` format) has `mount_point` mounted
/// read-only.
pub fn is_mounted_read_only(mounts: &str, mount_point: &str) -> bool {
    mounts.lines().any(|line| {
        let fields = line.split_whitespace().collect::<Vec<_>>();
        match fields.as_slice() {
            [_, target, _, options, ..] => {
                *target == mount_point && options.split(',').any(|option| option == "ro")
            }
            _ => false,
        }
    })
}

impl Action for ReadOnlyMountCheck {
    fn id(&self) -> &str {
        self.id
    }

    fn run(&self, outcome: &mut ActionOutcome) -> Result<()> {
        let path = self.sysroot.join("proc/mounts");
        let mounts = match fs::read_to_string(&path) {
            Ok(mounts) => mounts,
            Err(err) => {
                outcome.warning(
                    "MOUNTS_UNAVAILABLE",
                    "Mount table could not be read",
                    &format!("{}: {err}", path.display()),
                );
                return Ok(());
            }
        };
        if is_mounted_read_only(&mounts, self.mount_point) {
            outcome.set_result(
                ActionResult::new(ResultLevel::Error, "MOUNT_POINT_READ_ONLY", "{MOUNT_POINT} is mounted read-only")
                    .with_description("Package scriptlets need to write to {MOUNT_POINT}.")
                    .with_remediation("Remount {MOUNT_POINT} read-write before the conversion.")
                    .with_variable("MOUNT_POINT", self.mount_point),
            );
        }
        Ok(())
    }
}

pub struct DiskSpaceCheck {
    pub path: PathBuf,
    pub min_free_mib: u64,
}

/// Free space available to unprivileged users, in MiB. Measured on the
/// nearest existing ancestor so a not-yet-created state dir still works.
pub fn available_mib(path: &Path) -> Result<u64> {
    let path = path
        .ancestors()
        .find(|candidate| candidate.exists())
        .unwrap_or(path);
    let stats = nix::sys::statvfs::statvfs(path)
        .with_context(|| format!("failed to stat filesystem of {}", path.display()))?;
    let bytes = u64::from(stats.blocks_available()).saturating_mul(u64::from(stats.fragment_size()));
    Ok(bytes / (1024 * 1024))
}

impl Action for DiskSpaceCheck {
    fn id(&self) -> &str {
        CHECK_DISK_SPACE
    }

    fn run(&self, outcome: &mut ActionOutcome) -> Result<()> {
        let available = available_mib(&self.path)?;
        if available < self.min_free_mib {
            outcome.set_result(
                ActionResult::new(ResultLevel::Error, "INSUFFICIENT_DISK_SPACE", "Not enough free space in {PATH}")
                    .with_description("{AVAILABLE} MiB available, at least {REQUIRED} MiB required for backups.")
                    .with_variable("PATH", self.path.display().to_string())
                    .with_variable("AVAILABLE", available.to_string())
                    .with_variable("REQUIRED", self.min_free_mib.to_string()),
            );
        }
        Ok(())
    }
}

pub struct PackageBackendCheck {
    pub sysroot: PathBuf,
}

pub fn find_tool(sysroot: &Path, tool: &str) -> Option<PathBuf> {
    TOOL_DIRS
        .iter()
        .map(|dir| sysroot.join(dir).join(tool))
        .find(|candidate| candidate.is_file())
}

impl Action for PackageBackendCheck {
    fn id(&self) -> &str {
        CHECK_PACKAGE_BACKEND
    }

    fn dependencies(&self) -> Vec<String> {
        vec![CHECK_OS_RELEASE.to_string()]
    }

    fn run(&self, outcome: &mut ActionOutcome) -> Result<()> {
        let missing = PACKAGE_TOOLS
            .into_iter()
            .filter(|tool| find_tool(&self.sysroot, tool).is_none())
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            outcome.set_result(
                ActionResult::new(ResultLevel::Error, "PACKAGE_BACKEND_MISSING", "Package tools are missing")
                    .with_description("Could not find {TOOLS}.")
                    .with_remediation("Install the missing tools, e.g. yum-utils for yumdownloader.")
                    .with_variable("TOOLS", format_sequence(&missing)),
            );
        }
        Ok(())
    }
}

pub struct BackupFilesCheck {
    pub sysroot: PathBuf,
    pub files: Vec<PathBuf>,
}

impl Action for BackupFilesCheck {
    fn id(&self) -> &str {
        CHECK_BACKUP_FILES
    }

    fn dependencies(&self) -> Vec<String> {
        vec![CHECK_DISK_SPACE.to_string()]
    }

    fn run(&self, outcome: &mut ActionOutcome) -> Result<()> {
        for file in &self.files {
            let path = under_sysroot(&self.sysroot, file);
            if path.is_dir() {
                outcome.set_result(
                    ActionResult::new(ResultLevel::Error, "BACKUP_PATH_IS_DIRECTORY", "{PATH} is a directory")
                        .with_description("Only regular files can be backed up.")
                        .with_variable("PATH", file.display().to_string()),
                );
                return Ok(());
            }
            if !path.exists() {
                outcome.warning(
                    "BACKUP_FILE_MISSING",
                    &format!("{} does not exist", file.display()),
                    "It will be removed on rollback if the conversion creates it.",
                );
            }
        }
        Ok(())
    }
}

pub struct RegistrationCredentialsCheck {
    pub enabled: bool,
    pub complete: bool,
}

impl Action for RegistrationCredentialsCheck {
    fn id(&self) -> &str {
        CHECK_REGISTRATION_CREDENTIALS
    }

    fn run(&self, outcome: &mut ActionOutcome) -> Result<()> {
        if !self.enabled {
            outcome.info(
                "REGISTRATION_DISABLED",
                "System registration is disabled",
                "The converted system will not be registered.",
            );
            return Ok(());
        }
        if !self.complete {
            outcome.set_result(
                ActionResult::new(
                    ResultLevel::Overridable,
                    "MISSING_REGISTRATION_CREDENTIALS",
                    "Registration credentials are incomplete",
                )
                .with_description("Registration needs an activation key with an organization, or a username with a password.")
                .with_remediation("Provide credentials or rerun with --allow-overridable to continue without them."),
            );
        }
        Ok(())
    }
}
