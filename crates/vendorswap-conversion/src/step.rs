use anyhow::Result;
use vendorswap_backup::{BackupController, Restorable, StateLayout};

use crate::audit::ActivityEntry;

/// A change to the host made during the conversion phase.
///
/// Implementations push the backup units that undo their change through
/// [`StepContext::push`] before calling the collaborator that makes it.
/// Returning `Err` makes the coordinator roll back.
pub trait DestructiveStep: Send {
    fn id(&self) -> &str;

    fn apply(&self, ctx: &mut StepContext<'_>) -> Result<()>;
}

pub struct StepContext<'a> {
    layout: &'a StateLayout,
    controller: &'a mut BackupController,
    activities: &'a mut Vec<ActivityEntry>,
}

impl<'a> StepContext<'a> {
    pub(crate) fn new(
        layout: &'a StateLayout,
        controller: &'a mut BackupController,
        activities: &'a mut Vec<ActivityEntry>,
    ) -> Self {
        Self {
            layout,
            controller,
            activities,
        }
    }

    pub fn layout(&self) -> &StateLayout {
        self.layout
    }

    pub fn push(&mut self, unit: impl Restorable + 'static) -> u64 {
        self.controller.push(unit)
    }

    pub fn push_boxed(&mut self, unit: Box<dyn Restorable>) -> u64 {
        self.controller.push_boxed(unit)
    }

    pub fn record(&mut self, activity: ActivityEntry) {
        self.activities.push(activity);
    }
}
