use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use clap::Parser;
use vendorswap_actions::{ActionExecutor, ActionRegistry, NoopObserver};
use vendorswap_backup::{
    Credentials, PackageBackend, PackageIdentity, Registrar, TransactionOutcome, TransactionSpec,
};
use vendorswap_conversion::{ConversionState, InterruptFlag, RunMode, PONR_MARKER};
use vendorswap_core::{ResultLevel, Severity};

use super::*;
use crate::checks::*;
use crate::flows::{backup_paths, build_coordinator, target_identity};
use crate::render::{format_outcome_lines, render_status_line, resolve_output_style, OutputStyle};
use crate::system::{find_archive, parse_rpm_query, run_command, SubscriptionManager, YumBackend};

fn run_single(action: impl vendorswap_actions::Action + 'static) -> vendorswap_core::ActionReport {
    let mut registry = ActionRegistry::new();
    registry.register(action);
    let report = ActionExecutor::new(registry)
        .run(&NoopObserver)
        .expect("single action must run");
    let (_, entry) = report
        .into_actions()
        .into_iter()
        .next()
        .expect("report has the action");
    entry
}

fn write_file(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().expect("parent")).expect("must create parent dir");
    fs::write(&path, content).expect("must write fixture");
    path
}

fn centos_sysroot() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("must create temp dir");
    write_file(
        dir.path(),
        "etc/os-release",
        "NAME=\"CentOS Linux\"\nID=\"centos\"\nVERSION_ID=\"7\"\n",
    );
    dir
}

#[test]
fn cli_parses_completions_for_each_supported_shell() {
    let cases = vec![
        ("bash", CliCompletionShell::Bash),
        ("zsh", CliCompletionShell::Zsh),
        ("fish", CliCompletionShell::Fish),
        ("powershell", CliCompletionShell::Powershell),
    ];

    for (shell, expected) in cases {
        let cli = Cli::try_parse_from(["vendorswap", "completions", shell]).expect("command parses");
        match cli.command {
            Commands::Completions { shell } => assert_eq!(shell, expected),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}

#[test]
fn cli_rejects_unsupported_completion_shell() {
    let err = Cli::try_parse_from(["vendorswap", "completions", "elvish"])
        .expect_err("unsupported shell must fail");
    assert!(err.to_string().contains("elvish"));
}

#[test]
fn cli_parses_convert_with_registration_flags() {
    let cli = Cli::try_parse_from([
        "vendorswap",
        "convert",
        "--allow-overridable",
        "-k",
        "key",
        "--org",
        "1234",
        "--state-dir",
        "/tmp/state",
    ])
    .expect("command must parse");
    assert_eq!(cli.state_dir, Some(PathBuf::from("/tmp/state")));
    match cli.command {
        Commands::Convert {
            allow_overridable,
            registration,
        } => {
            assert!(allow_overridable);
            assert_eq!(registration.activation_key.as_deref(), Some("key"));
            assert_eq!(registration.org.as_deref(), Some("1234"));
            assert_eq!(registration.username, None);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn registration_flags_override_configured_values() {
    let mut config = RegistrationConfig {
        enabled: true,
        org: Some("from-config".to_string()),
        username: Some("admin".to_string()),
        ..RegistrationConfig::default()
    };
    RegistrationArgs {
        org: Some("from-cli".to_string()),
        ..RegistrationArgs::default()
    }
    .apply(&mut config);
    assert_eq!(config.org.as_deref(), Some("from-cli"));
    assert_eq!(config.username.as_deref(), Some("admin"));
}

#[test]
fn completion_script_names_the_binary() {
    let mut output = Vec::new();
    write_completions_script(CliCompletionShell::Bash, &mut output).expect("must generate");
    let script = String::from_utf8(output).expect("utf8");
    assert!(script.contains("vendorswap"));
}

#[test]
fn error_exit_codes_distinguish_configuration_problems() {
    let config_err = anyhow::Error::from(ConfigError::Invalid("bad".to_string()));
    assert_eq!(exit_code_for_error(&config_err), ExitCode::FatalConfiguration);
    let repair = anyhow::Error::from(CoordinatorError::RequiresRepair {
        run_id: "x".to_string(),
        status: "applying".to_string(),
    });
    assert_eq!(exit_code_for_error(&repair), ExitCode::FatalConfiguration);
    assert_eq!(exit_code_for_error(&anyhow!("boom")), ExitCode::Failure);
}

#[test]
fn empty_config_uses_defaults() {
    let config = Config::parse("", Path::new("inline.toml")).expect("empty config parses");
    assert_eq!(config, Config::default());
    assert_eq!(config.conversion.target_id, "rhel");
    assert_eq!(config.checks.skip_threshold, Severity::Error);
}

#[test]
fn full_config_parses() {
    let raw = r#"
[conversion]
target_id = "rhel"
target_name = "Red Hat Enterprise Linux"
target_version = "8.10"
allow_overridable = true
supported_source_ids = ["centos"]

[backup]
state_dir = "/srv/vendorswap"
files = ["/etc/yum.repos.d/CentOS-Base.repo"]

[packages]
remove = ["centos-release"]
install = ["redhat-release"]

[registration]
enabled = true
org = "1234"
activation_key = "key"

[checks]
min_free_space_mib = 500
parallel = true
skip_threshold = "OVERRIDABLE"
"#;
    let config = Config::parse(raw, Path::new("inline.toml")).expect("config parses");
    assert_eq!(config.conversion.target_version.as_deref(), Some("8.10"));
    assert_eq!(config.backup.state_dir, Some(PathBuf::from("/srv/vendorswap")));
    assert_eq!(config.packages.remove, vec!["centos-release"]);
    assert!(config.registration.credentials().is_complete());
    assert_eq!(config.checks.skip_threshold, Severity::Overridable);
    assert!(config.checks.parallel);
}

#[test]
fn config_rejects_unknown_keys() {
    let err = Config::parse("[backup]\nfiels = []\n", Path::new("inline.toml"))
        .expect_err("typo must be rejected");
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn config_rejects_relative_backup_paths() {
    let err = Config::parse("[backup]\nfiles = [\"etc/hosts\"]\n", Path::new("inline.toml"))
        .expect_err("relative path must be rejected");
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn explicit_config_must_exist() {
    let dir = tempfile::tempdir().expect("must create temp dir");
    let err = Config::load(Some(&dir.path().join("missing.toml")))
        .expect_err("missing explicit config must fail");
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn root_check_errors_for_unprivileged_user() {
    let entry = run_single(RootUserCheck { is_root: false });
    assert_eq!(entry.result.level, ResultLevel::Error);
    assert_eq!(entry.result.id, "ROOT_PRIVILEGES_REQUIRED");
    let entry = run_single(RootUserCheck { is_root: true });
    assert_eq!(entry.result.level, ResultLevel::Success);
}

#[test]
fn os_release_check_accepts_supported_systems() {
    let sysroot = centos_sysroot();
    let entry = run_single(OsReleaseCheck {
        id: CHECK_OS_RELEASE,
        sysroot: sysroot.path().to_path_buf(),
        expected_ids: vec!["centos".to_string()],
    });
    assert_eq!(entry.result.level, ResultLevel::Success);
    assert_eq!(entry.messages[0].id, "SYSTEM_DETECTED");
}

#[test]
fn os_release_check_rejects_unsupported_systems() {
    let sysroot = centos_sysroot();
    let entry = run_single(OsReleaseCheck {
        id: CHECK_OS_RELEASE,
        sysroot: sysroot.path().to_path_buf(),
        expected_ids: vec!["ol".to_string(), "rocky".to_string()],
    });
    assert_eq!(entry.result.id, "UNSUPPORTED_SYSTEM");
    assert_eq!(entry.result.rendered_title(), "CentOS Linux 7 is not supported");
    assert_eq!(
        entry.result.rendered_description(),
        "Supported system ids: ol and rocky."
    );
}

#[test]
fn os_release_check_reports_unknown_system() {
    let sysroot = tempfile::tempdir().expect("must create temp dir");
    let entry = run_single(OsReleaseCheck {
        id: CHECK_OS_RELEASE,
        sysroot: sysroot.path().to_path_buf(),
        expected_ids: vec!["centos".to_string()],
    });
    assert_eq!(entry.result.id, "UNKNOWN_SYSTEM");
}

#[test]
fn detects_read_only_mounts() {
    let mounts = "sysfs /sys sysfs ro,nosuid,nodev 0 0\n/dev/sda1 /mnt xfs rw,relatime 0 0\n";
    assert!(is_mounted_read_only(mounts, "/sys"));
    assert!(!is_mounted_read_only(mounts, "/mnt"));
    assert!(!is_mounted_read_only("tmpfs /mnt/ro tmpfs rw 0 0\n", "/mnt"));
    assert!(!is_mounted_read_only("garbage\n", "/mnt"));
}

#[test]
fn read_only_mount_check_uses_sysroot_mount_table() {
    let sysroot = tempfile::tempdir().expect("must create temp dir");
    write_file(sysroot.path(), "proc/mounts", "/dev/sdb1 /mnt ext4 ro,relatime 0 0\n");
    let entry = run_single(ReadOnlyMountCheck {
        id: READ_ONLY_MOUNTS_MNT,
        sysroot: sysroot.path().to_path_buf(),
        mount_point: "/mnt",
    });
    assert_eq!(entry.result.id, "MOUNT_POINT_READ_ONLY");
    assert_eq!(entry.result.rendered_title(), "/mnt is mounted read-only");

    let entry = run_single(ReadOnlyMountCheck {
        id: READ_ONLY_MOUNTS_SYS,
        sysroot: sysroot.path().to_path_buf(),
        mount_point: "/sys",
    });
    assert_eq!(entry.result.level, ResultLevel::Success);
}

#[test]
fn missing_mount_table_only_warns() {
    let sysroot = tempfile::tempdir().expect("must create temp dir");
    let entry = run_single(ReadOnlyMountCheck {
        id: READ_ONLY_MOUNTS_MNT,
        sysroot: sysroot.path().to_path_buf(),
        mount_point: "/mnt",
    });
    assert_eq!(entry.result.level, ResultLevel::Success);
    assert_eq!(entry.status(), Severity::Warning);
}

#[test]
fn disk_space_check_compares_against_minimum() {
    let dir = tempfile::tempdir().expect("must create temp dir");
    let entry = run_single(DiskSpaceCheck {
        path: dir.path().join("var/lib"),
        min_free_mib: 0,
    });
    assert_eq!(entry.result.level, ResultLevel::Success);

    let entry = run_single(DiskSpaceCheck {
        path: dir.path().to_path_buf(),
        min_free_mib: u64::MAX,
    });
    assert_eq!(entry.result.id, "INSUFFICIENT_DISK_SPACE");
}

#[test]
fn package_backend_check_lists_missing_tools() {
    let sysroot = tempfile::tempdir().expect("must create temp dir");
    write_file(sysroot.path(), "usr/bin/rpm", "");
    let entry = run_single(PackageBackendCheck {
        sysroot: sysroot.path().to_path_buf(),
    });
    assert_eq!(entry.result.id, "PACKAGE_BACKEND_MISSING");
    assert_eq!(
        entry.result.rendered_description(),
        "Could not find yum and yumdownloader."
    );

    write_file(sysroot.path(), "usr/bin/yum", "");
    write_file(sysroot.path(), "bin/yumdownloader", "");
    let entry = run_single(PackageBackendCheck {
        sysroot: sysroot.path().to_path_buf(),
    });
    assert_eq!(entry.result.level, ResultLevel::Success);
}

#[test]
fn backup_files_check_warns_for_missing_files() {
    let sysroot = tempfile::tempdir().expect("must create temp dir");
    write_file(sysroot.path(), "etc/yum.repos.d/base.repo", "[base]\n");
    let entry = run_single(BackupFilesCheck {
        sysroot: sysroot.path().to_path_buf(),
        files: vec![
            PathBuf::from("/etc/yum.repos.d/base.repo"),
            PathBuf::from("/etc/yum.repos.d/extra.repo"),
        ],
    });
    assert_eq!(entry.result.level, ResultLevel::Success);
    assert_eq!(entry.messages.len(), 1);
    assert_eq!(entry.messages[0].id, "BACKUP_FILE_MISSING");
    assert_eq!(entry.status(), Severity::Warning);
}

#[test]
fn backup_files_check_rejects_directories() {
    let sysroot = tempfile::tempdir().expect("must create temp dir");
    fs::create_dir_all(sysroot.path().join("etc/yum.repos.d")).expect("must create dir");
    let entry = run_single(BackupFilesCheck {
        sysroot: sysroot.path().to_path_buf(),
        files: vec![PathBuf::from("/etc/yum.repos.d")],
    });
    assert_eq!(entry.result.id, "BACKUP_PATH_IS_DIRECTORY");
}

#[test]
fn registration_without_credentials_is_overridable() {
    let entry = run_single(RegistrationCredentialsCheck {
        enabled: true,
        complete: false,
    });
    assert_eq!(entry.result.level, ResultLevel::Overridable);

    let entry = run_single(RegistrationCredentialsCheck {
        enabled: false,
        complete: false,
    });
    assert_eq!(entry.result.level, ResultLevel::Success);
    assert_eq!(entry.messages[0].id, "REGISTRATION_DISABLED");
}

#[test]
fn builtin_assessment_orders_dependencies_first() {
    let sysroot = centos_sysroot();
    let registry = assessment_registry(&Config::default(), sysroot.path(), true);
    let order = registry.plan().expect("graph is valid").order();
    assert_eq!(order.len(), 8);
    let position = |id: &str| {
        order
            .iter()
            .position(|candidate| candidate == id)
            .expect("action is planned")
    };
    assert!(position(CHECK_OS_RELEASE) < position(CHECK_PACKAGE_BACKEND));
    assert!(position(CHECK_DISK_SPACE) < position(CHECK_BACKUP_FILES));
}

#[test]
fn under_sysroot_reroots_absolute_paths() {
    assert_eq!(
        under_sysroot(Path::new("/mnt/image"), Path::new("/etc/os-release")),
        PathBuf::from("/mnt/image/etc/os-release")
    );
    assert_eq!(
        under_sysroot(Path::new("/"), Path::new("/etc/os-release")),
        PathBuf::from("/etc/os-release")
    );
}

#[test]
fn parses_rpm_query_output() {
    let output = "centos-release\t7-9.2009.1.el7.centos\tx86_64\tRSA/SHA256, Wed 04 Nov 2020, Key ID 24c6a8a7f4a80eb5\n\
                  package centos-logos is not installed\n\
                  yum\t3.4.3-168.el7.centos\tnoarch\t(none)\n";
    let packages = parse_rpm_query(output);
    assert_eq!(packages.len(), 2);
    assert_eq!(packages[0].nevra(), "centos-release-7-9.2009.1.el7.centos.x86_64");
    assert!(packages[0].signature.is_some());
    assert_eq!(packages[1].name, "yum");
    assert_eq!(packages[1].signature, None);
}

#[test]
fn finds_downloaded_archive_by_package_name() {
    let files = vec![
        PathBuf::from("/tmp/dl/centos-release-notes-7-1.noarch.rpm"),
        PathBuf::from("/tmp/dl/centos-release-7-9.x86_64.rpm"),
    ];
    assert_eq!(
        find_archive(&files, "centos-release"),
        Some(&PathBuf::from("/tmp/dl/centos-release-7-9.x86_64.rpm"))
    );
    assert_eq!(find_archive(&files, "yum"), None);
}

#[test]
fn transaction_commands_match_package_tools() {
    assert_eq!(
        YumBackend::transaction_command(&TransactionSpec::Remove(vec!["centos-release".to_string()])),
        vec!["rpm", "-e", "--nodeps", "centos-release"]
    );
    assert_eq!(
        YumBackend::transaction_command(&TransactionSpec::InstallArchives(vec![PathBuf::from(
            "/var/lib/vendorswap/backup/packages/a-1.rpm"
        )])),
        vec![
            "rpm",
            "-i",
            "--replacepkgs",
            "/var/lib/vendorswap/backup/packages/a-1.rpm"
        ]
    );
    assert_eq!(
        YumBackend::transaction_command(&TransactionSpec::Install(vec!["redhat-release".to_string()])),
        vec!["yum", "install", "-y", "redhat-release"]
    );
}

#[test]
fn register_command_uses_activation_key_or_password() {
    let by_key = Credentials {
        org: Some("1234".to_string()),
        activation_key: Some("key".to_string()),
        ..Credentials::default()
    };
    assert_eq!(
        SubscriptionManager::register_command(&by_key).expect("complete credentials"),
        vec![
            "subscription-manager",
            "register",
            "--force",
            "--org",
            "1234",
            "--activationkey",
            "key"
        ]
    );
    assert!(SubscriptionManager::register_command(&Credentials::default()).is_err());
}

#[test]
fn collaborator_commands_run_in_their_own_process_group() {
    let script = "read -r pid _ _ _ pgrp _ < /proc/$$/stat; echo \"$pid $pgrp\"";
    let args = vec!["sh".to_string(), "-c".to_string(), script.to_string()];
    let stdout = run_command(&args, "process group query").expect("sh must run");
    let ids = stdout.split_whitespace().collect::<Vec<_>>();
    assert_eq!(ids.len(), 2, "unexpected output {stdout:?}");
    assert_eq!(ids[0], ids[1], "child must lead its own process group");
    assert_ne!(ids[1], std::process::id().to_string());
}

#[test]
fn render_status_line_plain_is_unadorned() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "ok", "conversion finished"),
        "conversion finished"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "warn", "conversion rolled back"),
        "[WARN] conversion rolled back"
    );
}

#[test]
fn resolve_output_style_follows_stdout() {
    assert_eq!(resolve_output_style(true, false), OutputStyle::Rich);
    assert_eq!(resolve_output_style(false, true), OutputStyle::Plain);
}

#[test]
fn plan_lines_show_point_of_no_return() {
    let plan = vendorswap_conversion::PlanSummary {
        assessment: vec!["CHECK_ROOT_USER".to_string()],
        steps: vec![
            "REMOVE_PACKAGES".to_string(),
            PONR_MARKER.to_string(),
            "REGISTER_SYSTEM".to_string(),
        ],
        post_conversion: vec![CHECK_TARGET_OS_RELEASE.to_string()],
    };
    assert_eq!(
        format_plan_lines(&plan),
        vec![
            "assessment:",
            "  1. CHECK_ROOT_USER",
            "destructive steps:",
            "  - REMOVE_PACKAGES",
            "  -- POINT_OF_NO_RETURN --",
            "  - REGISTER_SYSTEM",
            "post-conversion: CHECK_TARGET_OS_RELEASE",
        ]
    );
}

#[test]
fn target_keeps_source_major_version_by_default() {
    let source = vendorswap_conversion::OsIdentity::new("centos", "CentOS Linux", "7.9");
    let target = target_identity(&Config::default(), Some(&source));
    assert_eq!(target.id, "rhel");
    assert_eq!(target.version, "7");
}

#[derive(Default)]
struct FakeBackend {
    installed: Mutex<Vec<String>>,
}

impl PackageBackend for FakeBackend {
    fn run_transaction(&self, spec: &TransactionSpec) -> Result<TransactionOutcome> {
        let mut installed = self.installed.lock().expect("installed lock");
        match spec {
            TransactionSpec::Install(names) => installed.extend(names.iter().cloned()),
            TransactionSpec::Remove(names) => installed.retain(|name| !names.contains(name)),
            TransactionSpec::InstallArchives(_) => return Err(anyhow!("not expected")),
        }
        Ok(TransactionOutcome {
            invocation: YumBackend::transaction_command(spec),
            output: String::new(),
        })
    }

    fn download(&self, packages: &[String], dest: &Path) -> Result<Vec<PathBuf>> {
        packages
            .iter()
            .map(|name| -> Result<PathBuf> {
                let path = dest.join(format!("{name}-1.0-1.noarch.rpm"));
                fs::write(&path, name)?;
                Ok(path)
            })
            .collect()
    }

    fn installed(&self, names: &[String]) -> Result<Vec<PackageIdentity>> {
        let installed = self.installed.lock().expect("installed lock");
        Ok(names
            .iter()
            .filter(|name| installed.contains(name))
            .map(|name| PackageIdentity {
                name: name.clone(),
                version: "1.0-1".to_string(),
                arch: "noarch".to_string(),
                signature: None,
            })
            .collect())
    }
}

struct RefusingRegistrar;

impl Registrar for RefusingRegistrar {
    fn register(&self, _credentials: &Credentials) -> Result<Vec<String>> {
        Err(anyhow!("registration refused"))
    }

    fn unregister(&self) -> Result<()> {
        Ok(())
    }

    fn is_registered(&self) -> Result<bool> {
        Ok(false)
    }
}

/// Registers through the real command construction without running it.
struct CommandLineRegistrar;

impl Registrar for CommandLineRegistrar {
    fn register(&self, credentials: &Credentials) -> Result<Vec<String>> {
        SubscriptionManager::register_command(credentials)
    }

    fn unregister(&self) -> Result<()> {
        Ok(())
    }

    fn is_registered(&self) -> Result<bool> {
        Ok(false)
    }
}

fn fixture_config() -> Config {
    let mut config = Config::default();
    config.packages.remove = vec!["centos-release".to_string()];
    config.packages.install = vec!["redhat-release".to_string()];
    config.checks.min_free_space_mib = 0;
    config
}

fn fixture_settings(sysroot: &Path, state: &Path) -> RunSettings {
    write_file(sysroot, "usr/bin/rpm", "");
    write_file(sysroot, "usr/bin/yum", "");
    write_file(sysroot, "usr/bin/yumdownloader", "");
    RunSettings {
        state_dir: state.to_path_buf(),
        sysroot: sysroot.to_path_buf(),
        allow_overridable: false,
        invocation: vec!["vendorswap".to_string(), "convert".to_string()],
        is_root: true,
    }
}

#[test]
fn configured_steps_are_planned_around_point_of_no_return() {
    let sysroot = centos_sysroot();
    let state = tempfile::tempdir().expect("must create temp dir");
    let mut config = fixture_config();
    config.registration.enabled = true;
    let settings = fixture_settings(sysroot.path(), state.path());
    let flag = InterruptFlag::new();

    let coordinator = build_coordinator(
        &config,
        &settings,
        RunMode::Convert,
        Arc::new(FakeBackend::default()),
        Arc::new(RefusingRegistrar),
        Credentials::default(),
        &flag,
    );
    let plan = coordinator.plan().expect("plan validates");
    assert_eq!(
        plan.steps,
        vec!["REMOVE_PACKAGES", "INSTALL_PACKAGES", PONR_MARKER, "REGISTER_SYSTEM"]
    );
    assert_eq!(plan.post_conversion, vec![CHECK_TARGET_OS_RELEASE]);
}

#[test]
fn failure_after_point_of_no_return_keeps_package_swap() {
    let sysroot = centos_sysroot();
    let state = tempfile::tempdir().expect("must create temp dir");
    let mut config = fixture_config();
    config.registration.enabled = true;
    config.registration.org = Some("1234".to_string());
    config.registration.activation_key = Some("key".to_string());
    let settings = fixture_settings(sysroot.path(), state.path());
    let backend = Arc::new(FakeBackend {
        installed: Mutex::new(vec!["centos-release".to_string()]),
    });
    let flag = InterruptFlag::new();

    let outcome = build_coordinator(
        &config,
        &settings,
        RunMode::Convert,
        backend.clone(),
        Arc::new(RefusingRegistrar),
        config.registration.credentials(),
        &flag,
    )
    .run(&NoopObserver)
    .expect("run must finish");

    assert_eq!(outcome.state, ConversionState::RolledBack);
    let summary = outcome.rollback.as_ref().expect("rollback summary");
    assert_eq!(summary.restored.len(), 1);
    assert_eq!(summary.retained.len(), 2);
    assert_eq!(
        *backend.installed.lock().expect("installed lock"),
        vec!["redhat-release".to_string()]
    );
    let lines = format_outcome_lines(&outcome, OutputStyle::Rich);
    assert!(lines[0].starts_with("[WARN] conversion rolled back"));
    assert_eq!(lines[1], "[STEP] restored 1 backup(s), retained 2");
    assert_eq!(
        lines[2],
        "[WARN] kept past the point of no return: #1 removed packages centos-release"
    );
    assert_eq!(
        lines[3],
        "[WARN] kept past the point of no return: #2 installed packages redhat-release"
    );
}

#[test]
fn analysis_on_fixture_sysroot_passes_without_changes() {
    let sysroot = centos_sysroot();
    let state = tempfile::tempdir().expect("must create temp dir");
    let config = fixture_config();
    let settings = fixture_settings(sysroot.path(), state.path());
    let backend = Arc::new(FakeBackend {
        installed: Mutex::new(vec!["centos-release".to_string()]),
    });
    let flag = InterruptFlag::new();

    let outcome = build_coordinator(
        &config,
        &settings,
        RunMode::Analyze,
        backend.clone(),
        Arc::new(RefusingRegistrar),
        Credentials::default(),
        &flag,
    )
    .run(&NoopObserver)
    .expect("run must finish");

    assert_eq!(outcome.state, ConversionState::Analyzed);
    assert_eq!(outcome.exit_code(), ExitCode::Success);
    assert_eq!(
        *backend.installed.lock().expect("installed lock"),
        vec!["centos-release".to_string()]
    );
    assert!(state.path().join("assessment.json").exists());
}

#[test]
fn accepted_override_for_missing_credentials_converts_without_registering() {
    let sysroot = centos_sysroot();
    let mut config = fixture_config();
    config.registration.enabled = true;
    let flag = InterruptFlag::new();

    let inhibited_state = tempfile::tempdir().expect("must create temp dir");
    let settings = fixture_settings(sysroot.path(), inhibited_state.path());
    let backend = Arc::new(FakeBackend {
        installed: Mutex::new(vec!["centos-release".to_string()]),
    });
    let inhibited = build_coordinator(
        &config,
        &settings,
        RunMode::Convert,
        backend.clone(),
        Arc::new(CommandLineRegistrar),
        config.registration.credentials(),
        &flag,
    )
    .run(&NoopObserver)
    .expect("run must finish");
    assert_eq!(inhibited.state, ConversionState::Inhibited);
    assert_eq!(inhibited.assessment.status(), Severity::Overridable);

    let state = tempfile::tempdir().expect("must create temp dir");
    let mut settings = fixture_settings(sysroot.path(), state.path());
    settings.allow_overridable = true;
    let outcome = build_coordinator(
        &config,
        &settings,
        RunMode::Convert,
        backend.clone(),
        Arc::new(CommandLineRegistrar),
        config.registration.credentials(),
        &flag,
    )
    .run(&NoopObserver)
    .expect("run must finish");

    assert_eq!(outcome.state, ConversionState::Converted);
    assert_eq!(outcome.exit_code(), ExitCode::Success);
    assert_eq!(outcome.assessment.status(), Severity::Overridable);
    assert_eq!(
        *backend.installed.lock().expect("installed lock"),
        vec!["redhat-release".to_string()]
    );
    let register = outcome
        .activities
        .iter()
        .find(|entry| entry.activity == "register_system")
        .expect("registration activity");
    assert!(register.success);
    assert!(register.invocation.is_empty());
    assert!(register
        .detail
        .as_deref()
        .is_some_and(|detail| detail.starts_with("skipped")));
}

#[test]
fn backup_files_step_uses_the_paths_the_check_validated() {
    let sysroot = centos_sysroot();
    let repo = write_file(sysroot.path(), "etc/yum.repos.d/vendor.repo", "[vendor]\n");
    let state = tempfile::tempdir().expect("must create temp dir");
    let mut config = fixture_config();
    config.backup.files = vec![PathBuf::from("/etc/yum.repos.d/vendor.repo")];
    let settings = fixture_settings(sysroot.path(), state.path());
    assert_eq!(backup_paths(&config, sysroot.path()), vec![repo.clone()]);

    let backend = Arc::new(FakeBackend {
        installed: Mutex::new(vec!["centos-release".to_string()]),
    });
    let flag = InterruptFlag::new();
    let outcome = build_coordinator(
        &config,
        &settings,
        RunMode::Convert,
        backend,
        Arc::new(RefusingRegistrar),
        Credentials::default(),
        &flag,
    )
    .run(&NoopObserver)
    .expect("run must finish");

    assert_eq!(outcome.state, ConversionState::Converted);
    let check = outcome
        .assessment
        .get(CHECK_BACKUP_FILES)
        .expect("backup files check ran");
    assert!(check.messages.is_empty());
    let backup = outcome
        .activities
        .iter()
        .find(|entry| entry.activity == "backup_files")
        .expect("backup activity");
    assert_eq!(
        backup.detail.as_deref(),
        Some(format!("backed up {}", repo.display()).as_str())
    );
}
