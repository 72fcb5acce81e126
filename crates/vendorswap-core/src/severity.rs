use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Overall classification used for status aggregation and gating.
///
/// Ordering is defined by [`Severity::rank`], never by name or code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Skip,
    Overridable,
    Error,
}

// Lowest to highest. New levels must be slotted in here.
const SEVERITY_ORDER: [Severity; 6] = [
    Severity::Success,
    Severity::Info,
    Severity::Warning,
    Severity::Skip,
    Severity::Overridable,
    Severity::Error,
];

impl Severity {
    pub fn all() -> &'static [Severity] {
        &SEVERITY_ORDER
    }

    pub fn rank(self) -> usize {
        match self {
            Self::Success => 0,
            Self::Info => 1,
            Self::Warning => 2,
            Self::Skip => 3,
            Self::Overridable => 4,
            Self::Error => 5,
        }
    }

    /// Numeric status code written to logs.
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Info => 25,
            Self::Warning => 51,
            Self::Skip => 101,
            Self::Overridable => 152,
            Self::Error => 202,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Skip => "SKIP",
            Self::Overridable => "OVERRIDABLE",
            Self::Error => "ERROR",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_uppercase().as_str() {
            "SUCCESS" => Some(Self::Success),
            "INFO" => Some(Self::Info),
            "WARNING" => Some(Self::Warning),
            "SKIP" => Some(Self::Skip),
            "OVERRIDABLE" => Some(Self::Overridable),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }

    /// Heading used when grouping summary entries by severity.
    pub fn summary_header(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Info => "Info",
            Self::Warning => "Warning (Review recommended)",
            Self::Skip => "Skip (Could not be checked due to other failures)",
            Self::Overridable => "Overridable (Review and either fix or ignore the failure)",
            Self::Error => "Error (Must fix before conversion)",
        }
    }
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Levels a non-terminal message may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageLevel {
    Info,
    Warning,
}

/// Levels a terminal result may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResultLevel {
    Success,
    Skip,
    Overridable,
    Error,
}

impl From<MessageLevel> for Severity {
    fn from(value: MessageLevel) -> Self {
        match value {
            MessageLevel::Info => Self::Info,
            MessageLevel::Warning => Self::Warning,
        }
    }
}

impl From<ResultLevel> for Severity {
    fn from(value: ResultLevel) -> Self {
        match value {
            ResultLevel::Success => Self::Success,
            ResultLevel::Skip => Self::Skip,
            ResultLevel::Overridable => Self::Overridable,
            ResultLevel::Error => Self::Error,
        }
    }
}

impl ResultLevel {
    pub fn severity(self) -> Severity {
        self.into()
    }
}

impl MessageLevel {
    pub fn severity(self) -> Severity {
        self.into()
    }
}
