use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Assessment only; nothing on the host is changed.
    Analyze,
    Convert,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Analyze => "analyze",
            Self::Convert => "convert",
        }
    }
}

/// Coordinator lifecycle.
///
/// `NotStarted -> Assessing -> (Inhibited | Proceeding) -> (Converted | RolledBack)`.
/// An analysis run stops at `Analyzed` (or `Inhibited`) and never proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionState {
    NotStarted,
    Assessing,
    Inhibited,
    Analyzed,
    Proceeding,
    Converted,
    RolledBack,
}

impl ConversionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Assessing => "assessing",
            Self::Inhibited => "inhibited",
            Self::Analyzed => "analyzed",
            Self::Proceeding => "proceeding",
            Self::Converted => "converted",
            Self::RolledBack => "rolled_back",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Inhibited | Self::Analyzed | Self::Converted | Self::RolledBack
        )
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: ConversionState) -> bool {
        matches!(
            (self, next),
            (Self::NotStarted, Self::Assessing)
                | (Self::Assessing, Self::Inhibited)
                | (Self::Assessing, Self::Analyzed)
                | (Self::Assessing, Self::Proceeding)
                | (Self::Proceeding, Self::Converted)
                | (Self::Proceeding, Self::RolledBack)
        )
    }
}
