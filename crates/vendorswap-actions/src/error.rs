use thiserror::Error;

/// Defects in the declared action graph. Always fatal, always raised before
/// any action runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("duplicate action id: {0}")]
    DuplicateActionId(String),
    #[error("invalid action id '{0}' (expected [A-Z0-9_]+)")]
    InvalidActionId(String),
    #[error("action {action_id} depends on unknown action {dependency}")]
    UnknownDependency {
        action_id: String,
        dependency: String,
    },
    #[error("dependency cycle detected involving: {}", .actions.join(", "))]
    Cycle { actions: Vec<String> },
}
