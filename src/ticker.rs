//! Cooperative cadence engine.
//!
//! Both node loops multiplex several periodic actions on one thread.
//! Instead of a scheduler task, each pass asks the [`Ticker`] whether an
//! action is due; the ticker also tells the loop how long it may sleep
//! before the next action becomes due.
//!
//! ```text
//!   ┌──────────── loop pass ─────────────┐
//!   │ capture / read sensors             │
//!   │ ticker.due(StreamUpload, now)? ──▶ upload
//!   │ ticker.due(FullUpload, now)?   ──▶ upload
//!   │ sleep(ticker.sleep_budget(now))    │
//!   └────────────────────────────────────┘
//! ```
//!
//! A late check never produces a burst: when an action is found due, its
//! last-run becomes `now`, not `last_run + interval`.

use core::fmt;

use log::{debug, info};

use crate::error::{ResourceError, Result};

// ═══════════════════════════════════════════════════════════════
//  Action table
// ═══════════════════════════════════════════════════════════════

/// Maximum number of periodic actions per node (stack-allocated).
const MAX_ACTIONS: usize = 6;

/// Identity of a periodic action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionId {
    /// Camera node: capture + preview pacing.
    FramePreview,
    /// Camera node: low-latency stream upload.
    StreamUpload,
    /// Camera node: periodic full snapshot upload.
    FullUpload,
    /// Sensor node: sensor read / alarm / telemetry pass.
    SensorLoop,
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::FramePreview => "frame-preview",
            Self::StreamUpload => "stream-upload",
            Self::FullUpload => "full-upload",
            Self::SensorLoop => "sensor-loop",
        };
        f.write_str(label)
    }
}

/// One periodic action and its cadence bookkeeping.
#[derive(Debug, Clone, Copy)]
pub struct PeriodicAction {
    pub id: ActionId,
    pub interval_ms: u64,
    /// `None` until the action first runs.
    pub last_run_ms: Option<u64>,
}

impl PeriodicAction {
    fn due_at(&self) -> Option<u64> {
        self.last_run_ms
            .map(|last| last.saturating_add(self.interval_ms))
    }
}

// ═══════════════════════════════════════════════════════════════
//  Ticker
// ═══════════════════════════════════════════════════════════════

/// Per-action due checks without a scheduler thread.
#[derive(Debug, Default)]
pub struct Ticker {
    actions: heapless::Vec<PeriodicAction, MAX_ACTIONS>,
}

impl Ticker {
    pub fn new() -> Self {
        Self {
            actions: heapless::Vec::new(),
        }
    }

    /// Register an action.  Re-registering an id replaces its interval and
    /// keeps its last-run.
    pub fn register(&mut self, id: ActionId, interval_ms: u64) -> Result<()> {
        if let Some(action) = self.actions.iter_mut().find(|a| a.id == id) {
            action.interval_ms = interval_ms;
            return Ok(());
        }
        self.actions
            .push(PeriodicAction {
                id,
                interval_ms,
                last_run_ms: None,
            })
            .map_err(|_| ResourceError::CapacityExceeded)?;
        info!("Ticker: '{}' every {} ms", id, interval_ms);
        Ok(())
    }

    /// Returns `true` and records `now_ms` as the action's last run iff the
    /// action has never run or its interval has elapsed.  Unknown actions
    /// and a clock that appears to run backwards never fire.
    pub fn due(&mut self, id: ActionId, now_ms: u64) -> bool {
        let Some(action) = self.actions.iter_mut().find(|a| a.id == id) else {
            return false;
        };

        let fire = match action.last_run_ms {
            None => true,
            Some(last) if now_ms < last => false,
            Some(last) => now_ms - last >= action.interval_ms,
        };

        if fire {
            action.last_run_ms = Some(now_ms);
            debug!("Ticker: '{}' due at {} ms", id, now_ms);
        }
        fire
    }

    /// Earliest instant at which any action becomes due.  An action that
    /// has never run is due immediately.
    pub fn next_deadline(&self, now_ms: u64) -> Option<u64> {
        self.actions
            .iter()
            .map(|a| a.due_at().unwrap_or(now_ms))
            .min()
    }

    /// How long the loop may sleep before the next deadline, capped at
    /// `max_ms`.
    pub fn sleep_budget(&self, now_ms: u64, max_ms: u64) -> u64 {
        self.next_deadline(now_ms)
            .map_or(max_ms, |deadline| deadline.saturating_sub(now_ms))
            .min(max_ms)
    }

    /// Bookkeeping for an action (for diagnostics and tests).
    pub fn action(&self, id: ActionId) -> Option<&PeriodicAction> {
        self.actions.iter().find(|a| a.id == id)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Loop statistics
// ═══════════════════════════════════════════════════════════════

/// Iteration timing counters for one node loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub iterations: u64,
    /// Passes that took longer than the loop budget (a stalled network
    /// call, usually).
    pub overruns: u64,
    pub worst_ms: u64,
}

impl LoopStats {
    /// Record one pass that took `elapsed_ms` against a `budget_ms` period.
    pub fn record(&mut self, elapsed_ms: u64, budget_ms: u64) {
        self.iterations += 1;
        if elapsed_ms > budget_ms {
            self.overruns += 1;
        }
        self.worst_ms = self.worst_ms.max(elapsed_ms);
    }

    /// Whether this is a pass on which the stats line should be logged.
    pub fn should_report(&self, every: u32) -> bool {
        every != 0 && self.iterations % u64::from(every) == 0
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
