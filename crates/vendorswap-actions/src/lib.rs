mod action;
mod error;
mod executor;
mod order;
mod registry;

pub use action::{Action, ActionOutcome};
pub use error::GraphError;
pub use executor::{
    ActionExecutor, ExecutionObserver, ExecutorOptions, NoopObserver, SKIP_RESULT_ID,
    UNEXPECTED_ERROR_ID,
};
pub use registry::{ActionRegistry, ExecutionPlan};
