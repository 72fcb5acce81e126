use std::any::Any;
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, error, info, warn};
use vendorswap_core::{format_sequence, ActionReport, ActionResult, Report, ResultLevel, Severity};

use crate::action::{Action, ActionOutcome};
use crate::error::GraphError;
use crate::registry::{ActionRegistry, ExecutionPlan};

pub const SKIP_RESULT_ID: &str = "SKIP";
pub const UNEXPECTED_ERROR_ID: &str = "UNEXPECTED_ERROR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorOptions {
    /// Run independent actions of the same wave on the rayon pool.
    pub parallel: bool,
    /// Dependents are skipped when a dependency's result reaches this level.
    /// A skipped dependency always skips its dependents.
    pub skip_threshold: Severity,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            parallel: false,
            skip_threshold: Severity::Error,
        }
    }
}

/// Progress hooks; called from worker threads in parallel mode.
pub trait ExecutionObserver: Sync {
    fn action_started(&self, _action_id: &str) {}

    fn action_finished(&self, _action_id: &str, _status: Severity) {}
}

pub struct NoopObserver;

impl ExecutionObserver for NoopObserver {}

/// Runs one registry to completion. Consumed by [`ActionExecutor::run`], so
/// each action executes at most once.
pub struct ActionExecutor {
    registry: ActionRegistry,
    options: ExecutorOptions,
}

impl ActionExecutor {
    pub fn new(registry: ActionRegistry) -> Self {
        Self {
            registry,
            options: ExecutorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExecutorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn plan(&self) -> Result<ExecutionPlan, GraphError> {
        self.registry.plan()
    }

    pub fn run(self, observer: &dyn ExecutionObserver) -> Result<Report, GraphError> {
        let plan = self.registry.plan()?;
        let actions = self.registry.by_id();
        let mut report = Report::new();

        for wave in &plan.waves {
            let mut runnable = Vec::new();
            for action_id in wave {
                let blocking = blocking_dependencies(
                    &plan.dependencies[action_id],
                    &report,
                    self.options.skip_threshold,
                );
                if blocking.is_empty() {
                    runnable.push(action_id);
                    continue;
                }

                let result = skipped_result(&blocking);
                error!("Skipped {action_id}. {}", result.rendered_description());
                observer.action_finished(action_id, Severity::Skip);
                report.insert(action_id.clone(), ActionReport::new(result));
            }

            let finished: Vec<(String, ActionReport)> = if self.options.parallel {
                runnable
                    .par_iter()
                    .map(|action_id| execute_one(&actions[*action_id], observer))
                    .collect()
            } else {
                runnable
                    .iter()
                    .map(|action_id| execute_one(&actions[*action_id], observer))
                    .collect()
            };

            for (action_id, entry) in finished {
                report.insert(action_id, entry);
            }
        }

        Ok(report)
    }
}

fn blocking_dependencies(
    dependencies: &BTreeSet<String>,
    report: &Report,
    threshold: Severity,
) -> Vec<String> {
    dependencies
        .iter()
        .filter(|dependency| {
            report
                .get(dependency)
                .map(|entry| {
                    let level = entry.result.severity();
                    level == Severity::Skip || level >= threshold
                })
                .unwrap_or(true)
        })
        .cloned()
        .collect()
}

fn skipped_result(blocking: &[String]) -> ActionResult {
    let to_be = if blocking.len() > 1 { "were" } else { "was" };
    ActionResult::new(ResultLevel::Skip, SKIP_RESULT_ID, "Skipped")
        .with_description(format!("Skipped because {{DEPENDENCIES}} {to_be} not successful"))
        .with_variable("DEPENDENCIES", format_sequence(blocking))
}

fn execute_one(
    action: &Arc<dyn Action>,
    observer: &dyn ExecutionObserver,
) -> (String, ActionReport) {
    let action_id = action.id().to_string();
    observer.action_started(&action_id);
    debug!("running action {action_id}");

    let mut outcome = ActionOutcome::new();
    let run = panic::catch_unwind(AssertUnwindSafe(|| action.run(&mut outcome)));
    let failure = match run {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(format!("{err:#}")),
        Err(payload) => Some(format!("panicked: {}", panic_message(payload.as_ref()))),
    };
    if let Some(cause) = failure {
        outcome.set_result(unexpected_error_result(&action_id, &cause));
    }

    let entry = outcome.into_report();
    let status = entry.status();
    match entry.result.level {
        ResultLevel::Success => info!("{action_id} has succeeded"),
        ResultLevel::Skip | ResultLevel::Overridable => warn!(
            "({}) {action_id}.{}: {}",
            entry.result.level.severity(),
            entry.result.id,
            entry.result.rendered_title()
        ),
        ResultLevel::Error => error!(
            "(ERROR) {action_id}.{}: {}",
            entry.result.id,
            entry.result.rendered_title()
        ),
    }
    observer.action_finished(&action_id, status);
    (action_id, entry)
}

fn unexpected_error_result(action_id: &str, cause: &str) -> ActionResult {
    ActionResult::new(
        ResultLevel::Error,
        UNEXPECTED_ERROR_ID,
        "Unhandled error in {ACTION_ID}",
    )
    .with_description("An unexpected error was caught while running {ACTION_ID}.")
    .with_diagnosis(cause.to_string())
    .with_remediation("Report this failure together with the log file.")
    .with_variable("ACTION_ID", action_id)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic payload".to_string()
}
