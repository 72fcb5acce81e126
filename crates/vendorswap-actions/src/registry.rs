use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use vendorswap_core::is_valid_id;

use crate::action::Action;
use crate::error::GraphError;
use crate::order::topo_waves;

/// Explicit list of the actions that make up one run.
///
/// Nothing is discovered implicitly: every action is registered by code,
/// so the graph can be inspected and validated before anything runs.
#[derive(Default, Clone)]
pub struct ActionRegistry {
    actions: Vec<Arc<dyn Action>>,
}

/// Validated run order for a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub waves: Vec<Vec<String>>,
    pub dependencies: BTreeMap<String, BTreeSet<String>>,
}

impl ExecutionPlan {
    pub fn order(&self) -> Vec<String> {
        self.waves.iter().flatten().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, action: impl Action + 'static) -> &mut Self {
        self.actions.push(Arc::new(action));
        self
    }

    pub fn register_shared(&mut self, action: Arc<dyn Action>) -> &mut Self {
        self.actions.push(action);
        self
    }

    pub fn with(mut self, action: impl Action + 'static) -> Self {
        self.register(action);
        self
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.actions
            .iter()
            .map(|action| action.id().to_string())
            .collect()
    }

    /// Check ids and dependencies and compute the run order.
    pub fn plan(&self) -> Result<ExecutionPlan, GraphError> {
        let mut dependencies: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for action in &self.actions {
            let id = action.id();
            if !is_valid_id(id) {
                return Err(GraphError::InvalidActionId(id.to_string()));
            }
            if dependencies.contains_key(id) {
                return Err(GraphError::DuplicateActionId(id.to_string()));
            }
            dependencies.insert(id.to_string(), action.dependencies().into_iter().collect());
        }

        let waves = topo_waves(&dependencies)?;
        Ok(ExecutionPlan {
            waves,
            dependencies,
        })
    }

    pub(crate) fn by_id(&self) -> BTreeMap<String, Arc<dyn Action>> {
        self.actions
            .iter()
            .map(|action| (action.id().to_string(), Arc::clone(action)))
            .collect()
    }
}
