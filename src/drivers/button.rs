//! ISR-fed button debouncer.
//!
//! ## Hardware
//!
//! Active-low momentary switch with pull-up.  The GPIO fires on the falling
//! edge; the ISR calls [`Debouncer::notify_edge`] with the current
//! millisecond timestamp, and the main loop drains the resulting event with
//! [`Debouncer::take_pending`] once per pass.
//!
//! ## Concurrency
//!
//! The ISR is the only writer of the timestamp fields; the pending flag is
//! a single-writer/single-reader handoff (ISR sets, main loop swaps).  All
//! fields are lock-free atomics, so the ISR never blocks.  Timestamps are
//! `u32` milliseconds with wrapping arithmetic: the ESP32 has no 64-bit
//! atomics.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Debounced edge capture shared between the button ISR and the main loop.
///
/// Owned by the main program and handed to the ISR by reference (leaked to
/// `&'static` on device), never a global.
pub struct Debouncer {
    refractory_ms: u32,
    last_accepted_ms: AtomicU32,
    has_accepted: AtomicBool,
    pending: AtomicBool,
    /// Last raw level seen by the ISR (`false` = pressed, active-low).
    raw_level: AtomicBool,
}

impl Debouncer {
    pub const fn new(refractory_ms: u32) -> Self {
        Self {
            refractory_ms,
            last_accepted_ms: AtomicU32::new(0),
            has_accepted: AtomicBool::new(false),
            pending: AtomicBool::new(false),
            raw_level: AtomicBool::new(true),
        }
    }

    /// Refractory window in milliseconds.
    pub fn refractory_ms(&self) -> u32 {
        self.refractory_ms
    }

    /// Record an edge.  Safe to call from interrupt context.
    ///
    /// Returns `true` when the edge is accepted: no edge was accepted
    /// before, or at least `refractory_ms` have passed since the last
    /// accepted one.  Rejected edges change nothing.
    pub fn notify_edge(&self, now_ms: u32) -> bool {
        if self.has_accepted.load(Ordering::Acquire) {
            let last = self.last_accepted_ms.load(Ordering::Relaxed);
            if now_ms.wrapping_sub(last) < self.refractory_ms {
                return false;
            }
        }
        self.last_accepted_ms.store(now_ms, Ordering::Relaxed);
        self.has_accepted.store(true, Ordering::Release);
        self.pending.store(true, Ordering::Release);
        true
    }

    /// Record the pin level sampled in the ISR (diagnostics only; the
    /// interrupt edge itself is what counts as a press).
    pub fn record_level(&self, level_high: bool) {
        self.raw_level.store(level_high, Ordering::Relaxed);
    }

    /// Consume the pending event.  Returns `true` at most once per
    /// accepted edge.
    pub fn take_pending(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// Raw pin level as last seen by the ISR.
    pub fn raw_level(&self) -> bool {
        self.raw_level.load(Ordering::Relaxed)
    }
}
