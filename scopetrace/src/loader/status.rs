//! Load state shared between the worker and its observers

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

use crate::domain::LoadError;

/// Lifecycle of a [`super::ProfileLoader`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Done,
    Cancelled,
    Failed,
}

impl LoadState {
    fn to_raw(self) -> u8 {
        match self {
            LoadState::Idle => 0,
            LoadState::Loading => 1,
            LoadState::Done => 2,
            LoadState::Cancelled => 3,
            LoadState::Failed => 4,
        }
    }

    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => LoadState::Loading,
            2 => LoadState::Done,
            3 => LoadState::Cancelled,
            4 => LoadState::Failed,
            _ => LoadState::Idle,
        }
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoadState::Idle => "idle",
            LoadState::Loading => "loading",
            LoadState::Done => "done",
            LoadState::Cancelled => "cancelled",
            LoadState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Atomics observed from any thread without blocking the worker
///
/// `total == 0` means the stream length is unknown. `done` is set with
/// `Release` only after the result has been handed off.
#[derive(Debug)]
pub(crate) struct LoadStatus {
    progress: AtomicU64,
    total: AtomicU64,
    done: AtomicBool,
    interrupted: AtomicBool,
    state: AtomicU8,
}

impl LoadStatus {
    pub(crate) fn new() -> Self {
        Self {
            progress: AtomicU64::new(0),
            total: AtomicU64::new(0),
            done: AtomicBool::new(false),
            interrupted: AtomicBool::new(false),
            state: AtomicU8::new(LoadState::Idle.to_raw()),
        }
    }

    /// Reset for a new load
    pub(crate) fn begin(&self, total: Option<u64>) {
        self.progress.store(0, Ordering::Relaxed);
        self.total.store(total.unwrap_or(0), Ordering::Relaxed);
        self.interrupted.store(false, Ordering::Relaxed);
        self.done.store(false, Ordering::Relaxed);
        self.state.store(LoadState::Loading.to_raw(), Ordering::Release);
    }

    pub(crate) fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
    }

    /// Publish bytes processed; never decreases and never exceeds a known total
    pub(crate) fn set_progress(&self, processed: u64) {
        let total = self.total.load(Ordering::Relaxed);
        let value = if total > 0 { processed.min(total) } else { processed };
        self.progress.fetch_max(value, Ordering::Relaxed);
    }

    pub(crate) fn progress(&self) -> u64 {
        self.progress.load(Ordering::Relaxed)
    }

    pub(crate) fn total(&self) -> Option<u64> {
        match self.total.load(Ordering::Relaxed) {
            0 => None,
            total => Some(total),
        }
    }

    pub(crate) fn interrupt(&self) {
        self.interrupted.store(true, Ordering::Release);
    }

    pub(crate) fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Acquire)
    }

    /// # Errors
    /// `Cancelled` once the interrupt flag is raised
    pub(crate) fn check_interrupt(&self) -> Result<(), LoadError> {
        if self.is_interrupted() {
            Err(LoadError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Record the final state and raise `done`
    pub(crate) fn finish(&self, state: LoadState) {
        self.state.store(state.to_raw(), Ordering::Release);
        self.done.store(true, Ordering::Release);
    }

    /// Back to `Idle` after the result was collected
    pub(crate) fn reset(&self) {
        self.done.store(false, Ordering::Relaxed);
        self.interrupted.store(false, Ordering::Relaxed);
        self.state.store(LoadState::Idle.to_raw(), Ordering::Release);
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub(crate) fn state(&self) -> LoadState {
        LoadState::from_raw(self.state.load(Ordering::Acquire))
    }
}
