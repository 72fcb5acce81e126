mod audit;
mod coordinator;
mod error;
mod exit;
mod interrupt;
mod metadata;
mod report_files;
mod state;
mod step;
mod steps;

pub use audit::{
    append_audit_record, capture_environment, parse_os_release, read_audit_records,
    read_os_release, redact_invocation, ActivityEntry, AuditRecord, OsIdentity, ENV_PREFIX,
    OBFUSCATION,
};
pub use coordinator::{
    gate_allows, ConversionOutcome, Coordinator, CoordinatorOptions, PlanSummary, PONR_MARKER,
};
pub use error::CoordinatorError;
pub use exit::ExitCode;
pub use interrupt::{install_signal_handlers, InterruptFlag};
pub use metadata::{
    clear_run_metadata, read_run_metadata, update_run_status, write_run_metadata, RunMetadata,
    RunStatus,
};
pub use report_files::{write_report_files, ASSESSMENT_REPORT, POST_CONVERSION_REPORT};
pub use state::{ConversionState, RunMode};
pub use step::{DestructiveStep, StepContext};
pub use steps::{BackupFilesStep, InstallPackagesStep, RegisterSystemStep, RemovePackagesStep};
