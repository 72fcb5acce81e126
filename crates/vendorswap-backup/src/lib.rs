mod controller;
mod error;
mod files;
mod fs_utils;
mod journal;
mod layout;
mod lock;
mod packages;
mod registration;
mod unit;

pub use controller::{BackupController, RollbackFailure, RollbackSummary};
pub use error::{ControllerError, LockError};
pub use files::{MissingFile, RestorableFile};
pub use fs_utils::remove_file_if_exists;
pub use journal::{BackupJournal, JournalEvent, JournalEventKind};
pub use layout::{StateLayout, DEFAULT_STATE_DIR};
pub use lock::ProcessLock;
pub use packages::{
    PackageBackend, PackageIdentity, RestorablePackageSet, TransactionKind, TransactionOutcome,
    TransactionSpec,
};
pub use registration::{Credentials, Registrar, RestorableRegistration};
pub use unit::{BackupKind, BackupRecord, Restorable};
