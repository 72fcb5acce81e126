use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::is_valid_id;
use crate::report::{ActionReport, Report};
use crate::severity::Severity;

pub const REPORT_FORMAT_VERSION: &str = "1.0";

/// Machine-readable form of a [`Report`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportDocument {
    pub format_version: String,
    pub status: Severity,
    pub actions: BTreeMap<String, ActionReport>,
}

#[derive(Debug, Error)]
pub enum ReportFormatError {
    #[error("failed to parse report document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported report format_version '{0}' (expected {REPORT_FORMAT_VERSION})")]
    UnsupportedVersion(String),
    #[error("invalid action id '{0}' (expected [A-Z0-9_]+)")]
    InvalidActionId(String),
    #[error("invalid diagnostic id '{id}' in action {action_id} (expected [A-Z0-9_]+)")]
    InvalidDiagnosticId { action_id: String, id: String },
    #[error("report status {stored} does not match derived status {derived}")]
    StatusMismatch { stored: Severity, derived: Severity },
}

impl Report {
    pub fn to_document(&self) -> ReportDocument {
        ReportDocument {
            format_version: REPORT_FORMAT_VERSION.to_string(),
            status: self.status(),
            actions: self.actions().clone(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, ReportFormatError> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    pub fn from_json_str(input: &str) -> Result<Self, ReportFormatError> {
        let document: ReportDocument = serde_json::from_str(input)?;
        Self::from_document(document)
    }

    pub fn from_document(document: ReportDocument) -> Result<Self, ReportFormatError> {
        if document.format_version != REPORT_FORMAT_VERSION {
            return Err(ReportFormatError::UnsupportedVersion(
                document.format_version,
            ));
        }

        for (action_id, entry) in &document.actions {
            if !is_valid_id(action_id) {
                return Err(ReportFormatError::InvalidActionId(action_id.clone()));
            }
            let ids = entry
                .messages
                .iter()
                .map(|message| &message.id)
                .chain(std::iter::once(&entry.result.id));
            for id in ids {
                if !is_valid_id(id) {
                    return Err(ReportFormatError::InvalidDiagnosticId {
                        action_id: action_id.clone(),
                        id: id.clone(),
                    });
                }
            }
        }

        let report = Report::from_actions(document.actions);
        let derived = report.status();
        if derived != document.status {
            return Err(ReportFormatError::StatusMismatch {
                stored: document.status,
                derived,
            });
        }
        Ok(report)
    }
}
