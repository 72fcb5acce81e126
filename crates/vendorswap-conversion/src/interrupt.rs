use std::ffi::c_int;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};

use anyhow::{Context, Result};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

static GLOBAL: InterruptFlag = InterruptFlag::new();

const HANDLED_SIGNALS: [Signal; 3] = [Signal::SIGINT, Signal::SIGTERM, Signal::SIGHUP];

/// Interruption state shared between signal handlers and the coordinator.
///
/// Only atomics are touched from [`InterruptFlag::notify`], so it is safe to
/// call from a signal handler. While a rollback is in progress signals are
/// counted and otherwise ignored.
#[derive(Debug)]
pub struct InterruptFlag {
    requested: AtomicBool,
    signal: AtomicI32,
    rollback_in_progress: AtomicBool,
    ignored: AtomicUsize,
}

impl Default for InterruptFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptFlag {
    pub const fn new() -> Self {
        Self {
            requested: AtomicBool::new(false),
            signal: AtomicI32::new(0),
            rollback_in_progress: AtomicBool::new(false),
            ignored: AtomicUsize::new(0),
        }
    }

    /// The flag the installed signal handlers write to.
    pub fn global() -> &'static InterruptFlag {
        &GLOBAL
    }

    pub fn notify(&self, signal: i32) {
        if self.rollback_in_progress.load(Ordering::SeqCst) {
            self.ignored.fetch_add(1, Ordering::SeqCst);
            return;
        }
        self.signal.store(signal, Ordering::SeqCst);
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub fn signal(&self) -> Option<i32> {
        if !self.is_requested() {
            return None;
        }
        Some(self.signal.load(Ordering::SeqCst))
    }

    pub fn begin_rollback(&self) {
        self.rollback_in_progress.store(true, Ordering::SeqCst);
    }

    pub fn end_rollback(&self) {
        self.rollback_in_progress.store(false, Ordering::SeqCst);
    }

    pub fn is_rolling_back(&self) -> bool {
        self.rollback_in_progress.load(Ordering::SeqCst)
    }

    /// Signals that arrived while a rollback was running.
    pub fn ignored_signals(&self) -> usize {
        self.ignored.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.requested.store(false, Ordering::SeqCst);
        self.signal.store(0, Ordering::SeqCst);
        self.rollback_in_progress.store(false, Ordering::SeqCst);
        self.ignored.store(0, Ordering::SeqCst);
    }
}

extern "C" fn record_signal(signal: c_int) {
    GLOBAL.notify(signal);
}

/// Route SIGINT, SIGTERM and SIGHUP to [`InterruptFlag::global`].
///
/// The handler only records the signal; a running collaborator call is left
/// to finish and the coordinator rolls back at its next checkpoint.
pub fn install_signal_handlers() -> Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(record_signal),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    for signal in HANDLED_SIGNALS {
        // SAFETY: the handler only performs atomic stores on a static.
        unsafe { sigaction(signal, &action) }
            .with_context(|| format!("failed to install handler for {signal}"))?;
    }
    Ok(())
}
