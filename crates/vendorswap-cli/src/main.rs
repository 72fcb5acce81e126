mod checks;
mod completion;
mod config;
mod flows;
mod logging;
mod render;
mod system;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::error;
use vendorswap_conversion::{
    install_signal_handlers, CoordinatorError, ExitCode, InterruptFlag, RunMode,
};

use crate::completion::{write_completions_script, CliCompletionShell};
use crate::config::{Config, ConfigError, RegistrationConfig};
use crate::flows::{
    run_conversion_command, run_plan_command, sysroot_or_default, system_coordinator, RunSettings,
};
use crate::logging::init_logging;
use crate::render::{current_output_style, format_plan_lines};

#[derive(Parser, Debug)]
#[command(name = "vendorswap")]
#[command(about = "Convert a running Linux host to another vendor's distribution", long_about = None)]
struct Cli {
    /// Configuration file (default /etc/vendorswap.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory for backups, reports, logs and the audit trail.
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,
    /// Root prefix for /etc and /proc lookups.
    #[arg(long, global = true)]
    sysroot: Option<PathBuf>,
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the assessment only; nothing on the host changes.
    Analyze {
        #[arg(long)]
        allow_overridable: bool,
    },
    Convert {
        #[arg(long)]
        allow_overridable: bool,
        #[command(flatten)]
        registration: RegistrationArgs,
    },
    /// Print the assessment order and destructive steps without running them.
    Plan,
    Completions {
        #[arg(value_enum)]
        shell: CliCompletionShell,
    },
}

#[derive(Args, Debug, Default, Clone, PartialEq, Eq)]
struct RegistrationArgs {
    #[arg(short = 'u', long)]
    username: Option<String>,
    #[arg(short = 'p', long)]
    password: Option<String>,
    #[arg(short = 'k', long = "activationkey")]
    activation_key: Option<String>,
    #[arg(short = 'o', long)]
    org: Option<String>,
}

impl RegistrationArgs {
    /// Command-line values win over the configuration file, field by field.
    fn apply(self, config: &mut RegistrationConfig) {
        let RegistrationArgs {
            username,
            password,
            activation_key,
            org,
        } = self;
        config.username = username.or(config.username.take());
        config.password = password.or(config.password.take());
        config.activation_key = activation_key.or(config.activation_key.take());
        config.org = org.or(config.org.take());
    }
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let code = match run_cli(cli) {
        Ok(code) => code,
        Err(err) => {
            let code = exit_code_for_error(&err);
            error!("{err:#}");
            eprintln!("error: {err:#}");
            code
        }
    };
    std::process::ExitCode::from(u8::try_from(code.code()).unwrap_or(1))
}

fn exit_code_for_error(err: &anyhow::Error) -> ExitCode {
    if let Some(err) = err.downcast_ref::<CoordinatorError>() {
        return err.exit_code();
    }
    if err.downcast_ref::<ConfigError>().is_some() {
        return ExitCode::FatalConfiguration;
    }
    ExitCode::Failure
}

fn run_cli(cli: Cli) -> Result<ExitCode> {
    if let Commands::Completions { shell } = cli.command {
        let mut stdout = std::io::stdout();
        write_completions_script(shell, &mut stdout)?;
        return Ok(ExitCode::Success);
    }

    let mut config = Config::load(cli.config.as_deref())?;
    let sysroot = sysroot_or_default(cli.sysroot.as_deref());
    let invocation = std::env::args().collect::<Vec<_>>();
    let plan_only = matches!(cli.command, Commands::Plan);
    let (mode, allow_overridable, registration) = match cli.command {
        Commands::Analyze { allow_overridable } => {
            (RunMode::Analyze, allow_overridable, RegistrationArgs::default())
        }
        Commands::Convert {
            allow_overridable,
            registration,
        } => (RunMode::Convert, allow_overridable, registration),
        Commands::Plan => (RunMode::Analyze, false, RegistrationArgs::default()),
        Commands::Completions { .. } => return Ok(ExitCode::Success),
    };
    registration.apply(&mut config.registration);

    let settings = RunSettings::resolve(
        &config,
        cli.state_dir,
        sysroot,
        allow_overridable,
        invocation,
    );
    let layout = settings.layout();
    init_logging(&layout.log_path(), cli.debug)?;

    let credentials = config.registration.credentials();
    let interrupt = InterruptFlag::global();
    let coordinator = system_coordinator(&config, &settings, mode, credentials, interrupt);

    if plan_only {
        let plan = run_plan_command(&coordinator)?;
        for line in format_plan_lines(&plan) {
            println!("{line}");
        }
        return Ok(ExitCode::Success);
    }

    install_signal_handlers()?;
    let outcome = run_conversion_command(coordinator, current_output_style())?;
    Ok(outcome.exit_code())
}

#[cfg(test)]
mod tests;
