use thiserror::Error;
use vendorswap_actions::GraphError;
use vendorswap_backup::LockError;

use crate::exit::ExitCode;

/// Failures that end a run before any destructive step starts.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("invalid action graph: {0}")]
    Graph(#[from] GraphError),
    #[error("invalid conversion plan: {0}")]
    InvalidPlan(String),
    #[error(
        "previous run {run_id} stopped while {status}; the system requires repair before another run"
    )]
    RequiresRepair { run_id: String, status: String },
    #[error("interrupted by signal {signal} before any change was made")]
    Interrupted { signal: i32 },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CoordinatorError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Lock(_) | Self::Graph(_) | Self::InvalidPlan(_) | Self::RequiresRepair { .. } => {
                ExitCode::FatalConfiguration
            }
            Self::Interrupted { .. } | Self::Other(_) => ExitCode::Failure,
        }
    }
}
