use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::ControllerError;
use crate::journal::{BackupJournal, JournalEvent, JournalEventKind};
use crate::unit::{BackupRecord, Restorable};

struct BackupEntry {
    record: BackupRecord,
    unit: Box<dyn Restorable>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackFailure {
    pub record: BackupRecord,
    pub error: String,
}

/// What one [`BackupController::rollback`] call did.
///
/// `restored` and `failed` follow the order units were visited (highest
/// sequence number first). `retained` lists units at or before the point of
/// no return in push order; they were deliberately left in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackSummary {
    pub restored: Vec<BackupRecord>,
    pub failed: Vec<RollbackFailure>,
    pub retained: Vec<BackupRecord>,
}

impl RollbackSummary {
    /// Every unit that was eligible for restore came back cleanly.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn visited(&self) -> Vec<u64> {
        let mut visited = self
            .restored
            .iter()
            .map(|record| record.seq)
            .chain(self.failed.iter().map(|failure| failure.record.seq))
            .collect::<Vec<_>>();
        visited.sort_unstable_by(|left, right| right.cmp(left));
        visited
    }
}

/// LIFO stack of backup units with a one-way point-of-no-return marker.
///
/// Units pushed at or before the marker are retained on rollback; units
/// pushed after it are restored like any other.
#[derive(Default)]
pub struct BackupController {
    entries: Vec<BackupEntry>,
    last_seq: u64,
    ponr: Option<u64>,
    journal: Option<BackupJournal>,
}

impl BackupController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(journal: BackupJournal) -> Self {
        Self {
            journal: Some(journal),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ponr(&self) -> Option<u64> {
        self.ponr
    }

    pub fn records(&self) -> Vec<BackupRecord> {
        self.entries
            .iter()
            .map(|entry| entry.record.clone())
            .collect()
    }

    pub fn push(&mut self, unit: impl Restorable + 'static) -> u64 {
        self.push_boxed(Box::new(unit))
    }

    /// Record a unit and return its sequence number. Bookkeeping only; the
    /// change the unit protects must already have been captured.
    pub fn push_boxed(&mut self, unit: Box<dyn Restorable>) -> u64 {
        self.last_seq += 1;
        let record = BackupRecord {
            seq: self.last_seq,
            kind: unit.kind(),
            description: unit.describe(),
        };
        info!(
            "backup #{} recorded: {} ({})",
            record.seq,
            record.description,
            record.kind.as_str()
        );
        self.journal_event(JournalEvent::for_record(JournalEventKind::Push, &record));
        self.entries.push(BackupEntry { record, unit });
        self.last_seq
    }

    /// Close the gate: units pushed so far will never be restored.
    pub fn mark_ponr(&mut self) -> Result<u64, ControllerError> {
        if let Some(seq) = self.ponr {
            return Err(ControllerError::PonrAlreadyMarked { seq });
        }
        let seq = self.last_seq;
        self.ponr = Some(seq);
        warn!("point of no return reached after backup #{seq}");
        self.journal_event(JournalEvent::ponr(seq));
        Ok(seq)
    }

    /// Restore every unit above the point of no return, newest first.
    ///
    /// A failing (or panicking) restore is logged and recorded and the next
    /// unit is still attempted. Restored units leave the stack, so calling
    /// this again never restores a unit twice.
    pub fn rollback(&mut self) -> RollbackSummary {
        let floor = self.ponr.unwrap_or(0);
        let mut summary = RollbackSummary::default();

        info!("rolling back changes above backup #{floor}");
        while self
            .entries
            .last()
            .is_some_and(|entry| entry.record.seq > floor)
        {
            let Some(mut entry) = self.entries.pop() else {
                break;
            };
            let record = entry.record.clone();
            debug!("restoring backup #{}: {}", record.seq, record.description);

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| entry.unit.restore()));
            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(format!("{err:#}")),
                Err(payload) => Some(format!("panicked: {}", panic_message(payload.as_ref()))),
            };

            match failure {
                None => {
                    info!("restored backup #{}: {}", record.seq, record.description);
                    self.journal_event(JournalEvent::for_record(
                        JournalEventKind::Restore,
                        &record,
                    ));
                    summary.restored.push(record);
                }
                Some(cause) => {
                    error!(
                        "failed to restore backup #{} ({}): {cause}",
                        record.seq, record.description
                    );
                    self.journal_event(
                        JournalEvent::for_record(JournalEventKind::RestoreFailed, &record)
                            .with_error(cause.clone()),
                    );
                    summary.failed.push(RollbackFailure {
                        record,
                        error: cause,
                    });
                }
            }
        }

        summary.retained = self.records();
        for record in &summary.retained {
            warn!(
                "backup #{} retained past point of no return: {}",
                record.seq, record.description
            );
        }
        summary
    }

    fn journal_event(&self, event: JournalEvent) {
        let Some(journal) = &self.journal else {
            return;
        };
        if let Err(err) = journal.append(&event) {
            warn!("backup journal write failed: {err:#}");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic payload".to_string()
}
