use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{self, AssertUnwindSafe};

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;
use vendorswap_actions::{ActionExecutor, ActionRegistry, ExecutionObserver, ExecutorOptions};
use vendorswap_backup::{BackupController, BackupJournal, ProcessLock, RollbackSummary, StateLayout};
use vendorswap_core::{is_valid_id, Report, Severity};

use crate::audit::{append_audit_record, redact_invocation, ActivityEntry, AuditRecord, OsIdentity};
use crate::error::CoordinatorError;
use crate::exit::ExitCode;
use crate::interrupt::InterruptFlag;
use crate::metadata::{
    clear_run_metadata, read_run_metadata, update_run_status, write_run_metadata, RunMetadata,
    RunStatus,
};
use crate::report_files::{write_report_files, ASSESSMENT_REPORT, POST_CONVERSION_REPORT};
use crate::state::{ConversionState, RunMode};
use crate::step::{DestructiveStep, StepContext};

pub const PONR_MARKER: &str = "POINT_OF_NO_RETURN";

/// Whether an assessment at `status` lets the destructive phase start.
///
/// ERROR always blocks. OVERRIDABLE blocks unless the operator opted in,
/// and only matters when it is the highest severity in the report.
pub fn gate_allows(status: Severity, allow_overridable: bool) -> bool {
    match status {
        Severity::Error => false,
        Severity::Overridable => allow_overridable,
        _ => true,
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    pub mode: RunMode,
    pub allow_overridable: bool,
    pub executor: ExecutorOptions,
    pub source_os: Option<OsIdentity>,
    pub target_os: Option<OsIdentity>,
    pub invocation: Vec<String>,
    pub environment: BTreeMap<String, String>,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            mode: RunMode::Convert,
            allow_overridable: false,
            executor: ExecutorOptions::default(),
            source_os: None,
            target_os: None,
            invocation: Vec::new(),
            environment: BTreeMap::new(),
        }
    }
}

enum PlannedStep {
    Step(Box<dyn DestructiveStep>),
    PointOfNoReturn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub assessment: Vec<String>,
    /// Step ids in order, with [`PONR_MARKER`] where the gate closes.
    pub steps: Vec<String>,
    pub post_conversion: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    pub run_id: Uuid,
    pub mode: RunMode,
    pub state: ConversionState,
    pub assessment: Report,
    pub final_report: Option<Report>,
    pub rollback: Option<RollbackSummary>,
    pub failure: Option<String>,
    pub activities: Vec<ActivityEntry>,
    pub ignored_signals: usize,
}

impl ConversionOutcome {
    pub fn exit_code(&self) -> ExitCode {
        match self.state {
            ConversionState::Converted | ConversionState::Analyzed => ExitCode::Success,
            ConversionState::Inhibited => ExitCode::Inhibited,
            ConversionState::RolledBack => match &self.rollback {
                Some(summary) if !summary.is_complete() => ExitCode::PartialRollback,
                _ => ExitCode::RolledBack,
            },
            ConversionState::NotStarted
            | ConversionState::Assessing
            | ConversionState::Proceeding => ExitCode::Failure,
        }
    }
}

/// Drives one run: assessment, gate, destructive steps with backups, point
/// of no return, rollback on failure or interruption, audit trail.
pub struct Coordinator<'a> {
    layout: StateLayout,
    options: CoordinatorOptions,
    assessment: ActionRegistry,
    steps: Vec<PlannedStep>,
    post_conversion: Option<ActionRegistry>,
    interrupt: &'a InterruptFlag,
}

impl<'a> Coordinator<'a> {
    pub fn new(
        layout: StateLayout,
        options: CoordinatorOptions,
        assessment: ActionRegistry,
        interrupt: &'a InterruptFlag,
    ) -> Self {
        Self {
            layout,
            options,
            assessment,
            steps: Vec::new(),
            post_conversion: None,
            interrupt,
        }
    }

    pub fn step(self, step: impl DestructiveStep + 'static) -> Self {
        self.step_boxed(Box::new(step))
    }

    pub fn step_boxed(mut self, step: Box<dyn DestructiveStep>) -> Self {
        self.steps.push(PlannedStep::Step(step));
        self
    }

    /// Backups pushed before this point are never restored.
    pub fn point_of_no_return(mut self) -> Self {
        self.steps.push(PlannedStep::PointOfNoReturn);
        self
    }

    pub fn post_conversion(mut self, registry: ActionRegistry) -> Self {
        self.post_conversion = Some(registry);
        self
    }

    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    /// Validate the whole run without touching the host.
    pub fn plan(&self) -> Result<PlanSummary, CoordinatorError> {
        let assessment = self.assessment.plan()?.order();
        let post_conversion = match &self.post_conversion {
            Some(registry) => registry.plan()?.order(),
            None => Vec::new(),
        };

        let mut steps = Vec::new();
        let mut seen = BTreeSet::new();
        let mut ponr_marks = 0_usize;
        for planned in &self.steps {
            match planned {
                PlannedStep::PointOfNoReturn => {
                    ponr_marks += 1;
                    steps.push(PONR_MARKER.to_string());
                }
                PlannedStep::Step(step) => {
                    let id = step.id();
                    if !is_valid_id(id) {
                        return Err(CoordinatorError::InvalidPlan(format!(
                            "invalid step id '{id}'"
                        )));
                    }
                    if !seen.insert(id.to_string()) {
                        return Err(CoordinatorError::InvalidPlan(format!(
                            "duplicate step id '{id}'"
                        )));
                    }
                    steps.push(id.to_string());
                }
            }
        }
        if ponr_marks > 1 {
            return Err(CoordinatorError::InvalidPlan(
                "point of no return declared more than once".to_string(),
            ));
        }

        Ok(PlanSummary {
            assessment,
            steps,
            post_conversion,
        })
    }

    pub fn run(self, observer: &dyn ExecutionObserver) -> Result<ConversionOutcome, CoordinatorError> {
        let _lock = ProcessLock::acquire(self.layout.lock_path())?;
        self.layout.ensure_base_dirs()?;
        self.check_previous_run()?;
        self.plan()?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mode = self.options.mode;
        let mut state = ConversionState::NotStarted;
        write_run_metadata(
            &self.layout,
            &RunMetadata {
                run_id: run_id.to_string(),
                mode,
                status: RunStatus::Planning,
                started_at,
            },
        )?;
        info!("starting {} run {run_id}", mode.as_str());

        advance(&mut state, ConversionState::Assessing);
        update_run_status(&self.layout, RunStatus::Assessing)?;
        let assessment = ActionExecutor::new(self.assessment.clone())
            .with_options(self.options.executor)
            .run(observer)?;
        if let Err(err) = write_report_files(&self.layout, ASSESSMENT_REPORT, &assessment, &run_id)
        {
            warn!("failed to write assessment report: {err:#}");
        }

        let status = assessment.status();
        let allowed = gate_allows(status, self.options.allow_overridable);
        if allowed {
            info!("assessment finished with status {status}; conversion may proceed");
        } else {
            error!("assessment finished with status {status}; conversion is inhibited");
        }

        let mut outcome = ConversionOutcome {
            run_id,
            mode,
            state,
            assessment,
            final_report: None,
            rollback: None,
            failure: None,
            activities: Vec::new(),
            ignored_signals: 0,
        };

        if mode == RunMode::Analyze {
            let (next, run_status) = if allowed {
                (ConversionState::Analyzed, RunStatus::Analyzed)
            } else {
                (ConversionState::Inhibited, RunStatus::Inhibited)
            };
            advance(&mut outcome.state, next);
            self.record_status(run_status);
            // An inhibited run leaves no audit record, analysis or not.
            if allowed {
                outcome.activities.push(
                    ActivityEntry::begin("analysis")
                        .with_invocation(&self.options.invocation)
                        .with_detail(format!("assessment status {status}"))
                        .finish(true),
                );
                self.append_audit(&outcome, started_at);
            }
            return Ok(outcome);
        }

        if !allowed {
            advance(&mut outcome.state, ConversionState::Inhibited);
            self.record_status(RunStatus::Inhibited);
            return Ok(outcome);
        }

        if let Some(signal) = self.interrupt.signal() {
            self.record_status(RunStatus::Inhibited);
            return Err(CoordinatorError::Interrupted { signal });
        }

        advance(&mut outcome.state, ConversionState::Proceeding);
        update_run_status(&self.layout, RunStatus::Applying)?;
        let mut controller =
            BackupController::with_journal(BackupJournal::new(self.layout.journal_path()));
        let failure = self.apply_steps(&mut controller, &mut outcome.activities);

        match failure {
            Some(cause) => {
                error!("conversion failed: {cause}; rolling back");
                self.record_status(RunStatus::RollingBack);
                self.interrupt.begin_rollback();
                let summary = controller.rollback();
                self.interrupt.end_rollback();
                if !summary.is_complete() {
                    error!(
                        "{} backup(s) could not be restored; manual remediation is required",
                        summary.failed.len()
                    );
                }
                advance(&mut outcome.state, ConversionState::RolledBack);
                self.record_status(RunStatus::RolledBack);
                outcome.rollback = Some(summary);
                outcome.failure = Some(cause);
            }
            None => {
                advance(&mut outcome.state, ConversionState::Converted);
                self.record_status(RunStatus::Converted);
                outcome.final_report = self.run_post_conversion(observer, &run_id);
                info!("conversion finished");
            }
        }

        outcome.ignored_signals = self.interrupt.ignored_signals();
        self.append_audit(&outcome, started_at);
        Ok(outcome)
    }

    fn check_previous_run(&self) -> Result<(), CoordinatorError> {
        if let Some(previous) = read_run_metadata(&self.layout)? {
            if previous.status.requires_repair() {
                return Err(CoordinatorError::RequiresRepair {
                    run_id: previous.run_id,
                    status: previous.status.as_str().to_string(),
                });
            }
            info!(
                "clearing marker of previous run {} ({})",
                previous.run_id,
                previous.status.as_str()
            );
            clear_run_metadata(&self.layout)?;
        }
        Ok(())
    }

    /// Returns the failure that requires a rollback, if any.
    fn apply_steps(
        &self,
        controller: &mut BackupController,
        activities: &mut Vec<ActivityEntry>,
    ) -> Option<String> {
        for planned in &self.steps {
            if let Some(signal) = self.interrupt.signal() {
                return Some(format!("interrupted by signal {signal}"));
            }
            match planned {
                PlannedStep::PointOfNoReturn => {
                    if let Err(err) = controller.mark_ponr() {
                        return Some(err.to_string());
                    }
                }
                PlannedStep::Step(step) => {
                    let id = step.id().to_string();
                    info!("applying {id}");
                    let mut ctx = StepContext::new(&self.layout, &mut *controller, &mut *activities);
                    let applied = panic::catch_unwind(AssertUnwindSafe(|| step.apply(&mut ctx)));
                    match applied {
                        Ok(Ok(())) => info!("{id} applied"),
                        Ok(Err(err)) => return Some(format!("{id} failed: {err:#}")),
                        Err(payload) => {
                            return Some(format!(
                                "{id} panicked: {}",
                                panic_message(payload.as_ref())
                            ))
                        }
                    }
                }
            }
        }
        self.interrupt
            .signal()
            .map(|signal| format!("interrupted by signal {signal}"))
    }

    fn run_post_conversion(&self, observer: &dyn ExecutionObserver, run_id: &Uuid) -> Option<Report> {
        let registry = self.post_conversion.as_ref()?;
        let report = match ActionExecutor::new(registry.clone())
            .with_options(self.options.executor)
            .run(observer)
        {
            Ok(report) => report,
            Err(err) => {
                error!("post-conversion checks could not run: {err}");
                return None;
            }
        };
        info!("post-conversion checks finished with status {}", report.status());
        if let Err(err) = write_report_files(&self.layout, POST_CONVERSION_REPORT, &report, run_id)
        {
            warn!("failed to write post-conversion report: {err:#}");
        }
        Some(report)
    }

    /// Status updates once the host may have changed; failing to write the
    /// marker must not stop a rollback.
    fn record_status(&self, status: RunStatus) {
        if let Err(err) = update_run_status(&self.layout, status) {
            warn!("failed to record run status {}: {err:#}", status.as_str());
        }
    }

    fn append_audit(&self, outcome: &ConversionOutcome, started_at: chrono::DateTime<Utc>) {
        let record = AuditRecord {
            run_id: outcome.run_id,
            mode: outcome.mode,
            outcome: outcome.state,
            report_status: outcome
                .final_report
                .as_ref()
                .unwrap_or(&outcome.assessment)
                .status(),
            started_at,
            finished_at: Utc::now(),
            source_os: self.options.source_os.clone(),
            target_os: self.options.target_os.clone(),
            invocation: redact_invocation(&self.options.invocation),
            environment: self.options.environment.clone(),
            activities: outcome.activities.clone(),
            rollback: outcome.rollback.clone(),
        };
        match append_audit_record(&self.layout.audit_path(), &record) {
            Ok(path) => info!("audit record written to {}", path.display()),
            Err(err) => error!("failed to write audit record: {err:#}"),
        }
    }
}

fn advance(state: &mut ConversionState, next: ConversionState) {
    debug_assert!(
        state.can_transition_to(next),
        "invalid transition {} -> {}",
        state.as_str(),
        next.as_str()
    );
    info!("state {} -> {}", state.as_str(), next.as_str());
    *state = next;
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
