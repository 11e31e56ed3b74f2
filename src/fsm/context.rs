//! Shared mutable context threaded through every alarm state handler.
//!
//! `AlarmContext` is the blackboard the handlers read from and write to:
//! the evaluation instant, the combined alarm condition, the sustain
//! bookkeeping and the actuator command produced by the last evaluation.

// ---------------------------------------------------------------------------
// Actuator command (written by state handlers; applied by the node loop)
// ---------------------------------------------------------------------------

/// Buzzer and LED command for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlarmOutputs {
    /// Buzzer sounding.  Polarity is the indicator driver's concern.
    pub buzzer: bool,
    pub red: bool,
    pub green: bool,
}

impl AlarmOutputs {
    /// Quiet, green LED on.
    pub const IDLE: Self = Self {
        buzzer: false,
        red: false,
        green: true,
    };

    /// Buzzer on, red LED on.
    pub const ALARM: Self = Self {
        buzzer: true,
        red: true,
        green: false,
    };

    /// Buzzer silenced while the red LED stays lit.
    pub const COOLING: Self = Self {
        buzzer: false,
        red: true,
        green: false,
    };
}

// ---------------------------------------------------------------------------
// AlarmContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
#[derive(Debug, Clone, Copy)]
pub struct AlarmContext {
    /// Instant of the current evaluation (monotonic ms).
    pub now_ms: u64,
    /// Proximity OR brightness, computed before the tick.
    pub condition: bool,
    /// Instant the Active state was last entered.
    pub entered_at_ms: u64,
    /// Minimum time Active is held once entered.
    pub sustain_ms: u64,
    /// Command to apply to the indicator after the tick.
    pub outputs: AlarmOutputs,
}

impl AlarmContext {
    pub fn new(sustain_ms: u64) -> Self {
        Self {
            now_ms: 0,
            condition: false,
            entered_at_ms: 0,
            sustain_ms,
            outputs: AlarmOutputs::IDLE,
        }
    }

    /// Milliseconds since Active was entered.  A clock behind the entry
    /// instant reads as zero, which keeps the alarm held.
    pub fn ms_in_alarm(&self) -> u64 {
        self.now_ms.saturating_sub(self.entered_at_ms)
    }

    pub fn sustain_elapsed(&self) -> bool {
        self.ms_in_alarm() >= self.sustain_ms
    }
}
