use anyhow::Result;
use vendorswap_core::{ActionMessage, ActionReport, ActionResult, MessageLevel};

/// A unit of checking or transforming work.
///
/// Implementations report through the [`ActionOutcome`] they are handed.
/// Returning without setting a result means success; returning `Err` (or
/// panicking) is converted into an ERROR result by the executor.
pub trait Action: Send + Sync {
    fn id(&self) -> &str;

    /// Ids of actions that must have finished before this one runs.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    fn run(&self, outcome: &mut ActionOutcome) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct ActionOutcome {
    messages: Vec<ActionMessage>,
    result: Option<ActionResult>,
}

impl ActionOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_message(&mut self, message: ActionMessage) {
        self.messages.push(message);
    }

    pub fn info(&mut self, id: &str, title: &str, description: &str) {
        self.add_message(
            ActionMessage::new(MessageLevel::Info, id, title).with_description(description),
        );
    }

    pub fn warning(&mut self, id: &str, title: &str, description: &str) {
        self.add_message(
            ActionMessage::new(MessageLevel::Warning, id, title).with_description(description),
        );
    }

    /// Later calls replace earlier ones; the last result set wins.
    pub fn set_result(&mut self, result: ActionResult) {
        self.result = Some(result);
    }

    pub fn result(&self) -> Option<&ActionResult> {
        self.result.as_ref()
    }

    pub fn messages(&self) -> &[ActionMessage] {
        &self.messages
    }

    pub fn into_report(self) -> ActionReport {
        ActionReport::with_messages(
            self.result.unwrap_or_else(ActionResult::success),
            self.messages,
        )
    }
}
