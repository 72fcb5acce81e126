use std::fs;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{anyhow, Context, Result};
use tracing::debug;
use vendorswap_backup::{
    Credentials, PackageBackend, PackageIdentity, Registrar, TransactionOutcome, TransactionSpec,
};

const RPM_QUERY_FORMAT: &str = "%{NAME}\\t%{VERSION}-%{RELEASE}\\t%{ARCH}\\t%{SIGPGP:pgpsig}\\n";

/// Collaborator commands run in their own process group, so a Ctrl-C on the
/// terminal reaches only our handler and never a package transaction or a
/// restore in progress.
fn collaborator_command(args: &[String], context_message: &str) -> Result<Command> {
    let (program, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("{context_message}: empty command line"))?;
    let mut command = Command::new(program);
    command.args(rest).process_group(0);
    Ok(command)
}

fn spawn(args: &[String], context_message: &str) -> Result<Output> {
    let mut command = collaborator_command(args, context_message)?;
    debug!("running {}", args.join(" "));
    command
        .output()
        .with_context(|| format!("{context_message}: command failed to start"))
}

/// Run `args` and return its stdout; a non-zero exit is an error carrying
/// both output streams.
pub fn run_command(args: &[String], context_message: &str) -> Result<String> {
    let output = spawn(args, context_message)?;
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if output.status.success() {
        return Ok(stdout);
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(anyhow!(
        "{context_message}: status={} stdout='{}' stderr='{}'",
        output.status,
        stdout.trim(),
        stderr.trim()
    ))
}

fn command_line<I, S>(parts: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    parts.into_iter().map(Into::into).collect()
}

/// Parse `rpm -q --qf` output produced with [`RPM_QUERY_FORMAT`]. Lines for
/// packages that are not installed are ignored.
pub fn parse_rpm_query(output: &str) -> Vec<PackageIdentity> {
    output
        .lines()
        .filter_map(|line| {
            let fields = line.split('\t').collect::<Vec<_>>();
            let [name, version, arch, signature] = fields.as_slice() else {
                return None;
            };
            let signature = match signature.trim() {
                "" | "(none)" => None,
                value => Some(value.to_string()),
            };
            Some(PackageIdentity {
                name: (*name).to_string(),
                version: (*version).to_string(),
                arch: (*arch).to_string(),
                signature,
            })
        })
        .collect()
}

/// Package archive for `name` among downloaded `files`.
pub fn find_archive<'a>(files: &'a [PathBuf], name: &str) -> Option<&'a PathBuf> {
    let prefix = format!("{name}-");
    files.iter().find(|path| {
        path.file_name()
            .and_then(|file| file.to_str())
            .is_some_and(|file| {
                file.ends_with(".rpm")
                    && file
                        .strip_prefix(&prefix)
                        .and_then(|rest| rest.chars().next())
                        .is_some_and(|first| first.is_ascii_digit())
            })
    })
}

/// `rpm` / `yum` / `yumdownloader` backed package transactions.
#[derive(Debug, Default, Clone)]
pub struct YumBackend;

impl YumBackend {
    pub fn transaction_command(spec: &TransactionSpec) -> Vec<String> {
        match spec {
            TransactionSpec::Install(names) => {
                let mut args = command_line(["yum", "install", "-y"]);
                args.extend(names.iter().cloned());
                args
            }
            TransactionSpec::Remove(names) => {
                let mut args = command_line(["rpm", "-e", "--nodeps"]);
                args.extend(names.iter().cloned());
                args
            }
            TransactionSpec::InstallArchives(paths) => {
                let mut args = command_line(["rpm", "-i", "--replacepkgs"]);
                args.extend(paths.iter().map(|path| path.display().to_string()));
                args
            }
        }
    }
}

impl PackageBackend for YumBackend {
    fn run_transaction(&self, spec: &TransactionSpec) -> Result<TransactionOutcome> {
        let invocation = Self::transaction_command(spec);
        let output = run_command(&invocation, &format!("package {} failed", spec.kind().as_str()))?;
        Ok(TransactionOutcome { invocation, output })
    }

    fn download(&self, packages: &[String], dest: &Path) -> Result<Vec<PathBuf>> {
        let mut args = command_line(["yumdownloader", "--destdir"]);
        args.push(dest.display().to_string());
        args.extend(packages.iter().cloned());
        run_command(&args, "package download failed")?;

        let mut files = Vec::new();
        for entry in fs::read_dir(dest)
            .with_context(|| format!("failed to list downloads: {}", dest.display()))?
        {
            files.push(entry?.path());
        }
        packages
            .iter()
            .map(|name| {
                find_archive(&files, name)
                    .cloned()
                    .ok_or_else(|| anyhow!("no downloaded archive for {name} in {}", dest.display()))
            })
            .collect()
    }

    fn installed(&self, names: &[String]) -> Result<Vec<PackageIdentity>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let mut args = command_line(["rpm", "-q", "--qf", RPM_QUERY_FORMAT]);
        args.extend(names.iter().cloned());
        // rpm exits non-zero when any name is missing; the rest still print.
        let output = spawn(&args, "package query failed")?;
        Ok(parse_rpm_query(&String::from_utf8_lossy(&output.stdout)))
    }
}

#[derive(Debug, Default, Clone)]
pub struct SubscriptionManager;

impl SubscriptionManager {
    pub fn register_command(credentials: &Credentials) -> Result<Vec<String>> {
        let mut args = command_line(["subscription-manager", "register", "--force"]);
        match credentials {
            Credentials {
                activation_key: Some(key),
                org: Some(org),
                ..
            } => {
                args.extend(command_line(["--org", org.as_str(), "--activationkey", key.as_str()]));
            }
            Credentials {
                username: Some(username),
                password: Some(password),
                ..
            } => {
                args.extend(command_line([
                    "--username",
                    username.as_str(),
                    "--password",
                    password.as_str(),
                ]));
            }
            _ => return Err(anyhow!("registration credentials are incomplete")),
        }
        Ok(args)
    }
}

impl Registrar for SubscriptionManager {
    fn register(&self, credentials: &Credentials) -> Result<Vec<String>> {
        let args = Self::register_command(credentials)?;
        run_command(&args, "system registration failed")?;
        Ok(args)
    }

    fn unregister(&self) -> Result<()> {
        run_command(
            &command_line(["subscription-manager", "unregister"]),
            "system unregistration failed",
        )?;
        Ok(())
    }

    fn is_registered(&self) -> Result<bool> {
        let output = spawn(
            &command_line(["subscription-manager", "identity"]),
            "registration query failed",
        )?;
        Ok(output.status.success())
    }
}
