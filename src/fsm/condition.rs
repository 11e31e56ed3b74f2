//! Sensor snapshot and the alarm condition derived from it.

use crate::config::SensorNodeConfig;

/// Ultrasonic range result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Distance {
    /// Measured range in centimetres.
    Valid(f32),
    /// Echo timeout or an out-of-range value.
    Invalid,
}

impl Distance {
    /// Sentinel published for an invalid reading.
    pub const WIRE_INVALID: f32 = -1.0;

    /// Classify a raw centimetre value: negative or non-finite is invalid.
    pub fn from_cm(cm: f32) -> Self {
        if cm.is_finite() && cm >= 0.0 {
            Self::Valid(cm)
        } else {
            Self::Invalid
        }
    }

    /// Value carried in the telemetry payload.
    pub fn wire_value(self) -> f32 {
        match self {
            Self::Valid(cm) => cm,
            Self::Invalid => Self::WIRE_INVALID,
        }
    }
}

/// A point-in-time snapshot of node B's sensors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub distance: Distance,
    /// Raw 12-bit light level (0 – 4095).
    pub light: u16,
    pub captured_at_ms: u64,
}

/// Which sub-condition held on an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConditionCause {
    pub proximity: bool,
    pub brightness: bool,
}

impl ConditionCause {
    pub fn any(self) -> bool {
        self.proximity || self.brightness
    }
}

/// Threshold checks feeding the alarm state machine.
#[derive(Debug, Clone, Copy)]
pub struct AlarmEvaluator {
    light_threshold: u16,
    proximity_threshold_cm: f32,
}

impl AlarmEvaluator {
    pub fn new(light_threshold: u16, proximity_threshold_cm: f32) -> Self {
        Self {
            light_threshold,
            proximity_threshold_cm,
        }
    }

    pub fn from_config(config: &SensorNodeConfig) -> Self {
        Self::new(config.light_threshold, config.proximity_threshold_cm)
    }

    /// `0 < d < threshold` on a valid reading.  Invalid never counts.
    pub fn proximity(&self, distance: Distance) -> bool {
        match distance {
            Distance::Valid(cm) => cm > 0.0 && cm < self.proximity_threshold_cm,
            Distance::Invalid => false,
        }
    }

    pub fn brightness(&self, light: u16) -> bool {
        light > self.light_threshold
    }

    pub fn evaluate(&self, reading: &SensorReading) -> ConditionCause {
        ConditionCause {
            proximity: self.proximity(reading.distance),
            brightness: self.brightness(reading.light),
        }
    }
}
