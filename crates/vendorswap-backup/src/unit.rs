use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupKind {
    File,
    MissingFile,
    PackageSet,
    Registration,
}

impl BackupKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::MissingFile => "missing_file",
            Self::PackageSet => "package_set",
            Self::Registration => "registration",
        }
    }
}

/// A single recorded system change that knows how to undo itself.
///
/// Units capture their undo state when constructed. Once pushed onto a
/// [`crate::BackupController`] only the controller calls [`restore`].
///
/// [`restore`]: Restorable::restore
pub trait Restorable: Send {
    fn kind(&self) -> BackupKind;

    fn describe(&self) -> String;

    fn restore(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub seq: u64,
    pub kind: BackupKind,
    pub description: String,
}
