use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::severity::{MessageLevel, ResultLevel, Severity};

/// Shared shape of messages and results emitted by an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Diagnostic<L> {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub remediation: String,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    pub level: L,
}

/// Non-terminal diagnostic. An action may emit any number of these.
pub type ActionMessage = Diagnostic<MessageLevel>;

/// Terminal diagnostic. Exactly one per action.
pub type ActionResult = Diagnostic<ResultLevel>;

impl<L: Copy + Into<Severity>> Diagnostic<L> {
    pub fn new(level: L, id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            diagnosis: String::new(),
            remediation: String::new(),
            variables: BTreeMap::new(),
            level,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_diagnosis(mut self, diagnosis: impl Into<String>) -> Self {
        self.diagnosis = diagnosis.into();
        self
    }

    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = remediation.into();
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.level.into()
    }

    pub fn rendered_title(&self) -> String {
        substitute_variables(&self.title, &self.variables)
    }

    pub fn rendered_description(&self) -> String {
        substitute_variables(&self.description, &self.variables)
    }

    pub fn rendered_diagnosis(&self) -> String {
        substitute_variables(&self.diagnosis, &self.variables)
    }

    pub fn rendered_remediation(&self) -> String {
        substitute_variables(&self.remediation, &self.variables)
    }
}

impl ActionResult {
    pub fn success() -> Self {
        Self::new(ResultLevel::Success, "SUCCESS", "")
    }

    pub fn is_success(&self) -> bool {
        self.level == ResultLevel::Success
    }
}

/// Replace `{NAME}` placeholders with values from `variables`.
///
/// Placeholders without a matching variable are left untouched.
pub fn substitute_variables(template: &str, variables: &BTreeMap<String, String>) -> String {
    if variables.is_empty() || !template.contains('{') {
        return template.to_string();
    }

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match variables.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
