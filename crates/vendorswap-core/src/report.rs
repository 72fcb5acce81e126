use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::diagnostic::{ActionMessage, ActionResult};
use crate::severity::Severity;

/// Everything a single action produced during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionReport {
    pub messages: Vec<ActionMessage>,
    pub result: ActionResult,
}

impl ActionReport {
    pub fn new(result: ActionResult) -> Self {
        Self {
            messages: Vec::new(),
            result,
        }
    }

    pub fn with_messages(result: ActionResult, messages: Vec<ActionMessage>) -> Self {
        Self { messages, result }
    }

    /// Highest severity among the result and all messages.
    pub fn status(&self) -> Severity {
        self.messages
            .iter()
            .map(ActionMessage::severity)
            .chain(std::iter::once(self.result.severity()))
            .max()
            .unwrap_or(Severity::Success)
    }
}

/// One line of a report summary, flattened from messages and results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub action_id: String,
    pub diagnostic_id: String,
    pub severity: Severity,
    pub title: String,
    pub description: String,
}

/// Aggregated outcome of an action run, keyed by action id.
///
/// The overall status is never stored; it is derived from the entries on
/// every call to [`Report::status`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    actions: BTreeMap<String, ActionReport>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_actions(actions: BTreeMap<String, ActionReport>) -> Self {
        Self { actions }
    }

    pub fn insert(&mut self, action_id: impl Into<String>, entry: ActionReport) -> Option<ActionReport> {
        self.actions.insert(action_id.into(), entry)
    }

    pub fn push_message(&mut self, action_id: &str, message: ActionMessage) -> bool {
        match self.actions.get_mut(action_id) {
            Some(entry) => {
                entry.messages.push(message);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, action_id: &str) -> Option<&ActionReport> {
        self.actions.get(action_id)
    }

    pub fn actions(&self) -> &BTreeMap<String, ActionReport> {
        &self.actions
    }

    pub fn into_actions(self) -> BTreeMap<String, ActionReport> {
        self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ActionReport)> {
        self.actions.iter()
    }

    pub fn status(&self) -> Severity {
        self.actions
            .values()
            .map(ActionReport::status)
            .max()
            .unwrap_or(Severity::Success)
    }

    /// Action ids whose terminal result is at or above `min`.
    pub fn actions_with_result_at_least(&self, min: Severity) -> Vec<String> {
        self.actions
            .iter()
            .filter(|(_, entry)| entry.result.severity() >= min)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Flattened messages and results at or above `min`, most severe first.
    pub fn entries_at_least(&self, min: Severity) -> Vec<ReportEntry> {
        let mut entries = Vec::new();
        for (action_id, entry) in &self.actions {
            if entry.result.severity() >= min {
                entries.push(ReportEntry {
                    action_id: action_id.clone(),
                    diagnostic_id: entry.result.id.clone(),
                    severity: entry.result.severity(),
                    title: entry.result.rendered_title(),
                    description: entry.result.rendered_description(),
                });
            }
            for message in &entry.messages {
                if message.severity() >= min {
                    entries.push(ReportEntry {
                        action_id: action_id.clone(),
                        diagnostic_id: message.id.clone(),
                        severity: message.severity(),
                        title: message.rendered_title(),
                        description: message.rendered_description(),
                    });
                }
            }
        }

        entries.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.action_id.cmp(&b.action_id))
                .then_with(|| a.diagnostic_id.cmp(&b.diagnostic_id))
        });
        entries
    }
}
