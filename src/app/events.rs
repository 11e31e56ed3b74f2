//! Outbound application events and the telemetry wire payload.
//!
//! The node services emit [`AppEvent`]s through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other side
//! decide what to do with them; on the rig they become prefixed log lines.

use serde::Serialize;

use crate::error::{CommsError, Error, ResourceError, Result};
use crate::fsm::StateId;
use crate::fsm::condition::{ConditionCause, Distance, SensorReading};
use crate::ticker::LoopStats;

use super::ports::{InboundMessage, UploadKind, UploadOutcome};

/// Which firmware image is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Camera,
    Sensor,
}

/// Structured events emitted by the node services.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// A service finished its startup.
    Started(NodeRole),

    // ── camera node ───────────────────────────────────────────
    /// Frame capture failed; preview and uploads skipped this pass.
    CaptureFailed(Error),
    /// Preview refresh failed.
    PreviewFailed(Error),
    /// An upload attempt finished (or was skipped).
    Upload {
        kind: UploadKind,
        bytes: usize,
        outcome: UploadOutcome,
    },
    /// A `GET /take-photo` request was served.
    TriggerServed(UploadOutcome),

    // ── sensor node ───────────────────────────────────────────
    /// One sensor pass and the condition it produced.
    Reading {
        reading: SensorReading,
        cause: ConditionCause,
    },
    /// The alarm machine transitioned.
    AlarmStateChanged { from: StateId, to: StateId },
    /// Indicator outputs could not be written.
    IndicatorFailed(Error),
    /// MQTT session established (after `attempts` tries).
    MqttConnected { attempts: u32 },
    /// An MQTT connect attempt failed; the loop waits and retries.
    MqttRetry { attempt: u32, error: CommsError },
    /// A message arrived on the control topic.
    ControlMessage(InboundMessage),
    /// Telemetry published.
    Telemetry(TelemetryPayload),
    /// Telemetry publish failed; dropped, not retried.
    TelemetryFailed(CommsError),
    /// The debounced button asked node A for a capture.
    RemoteTrigger(core::result::Result<u16, CommsError>),

    /// Periodic loop timing report.
    LoopStats { role: NodeRole, stats: LoopStats },
}

/// MQTT telemetry document.  Field order is the wire order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetryPayload {
    /// Centimetres, `-1.0` for an invalid reading.
    pub distance: f32,
    pub light: u16,
    pub alarm_active: bool,
}

impl TelemetryPayload {
    pub fn new(distance: Distance, light: u16, alarm_active: bool) -> Self {
        Self {
            distance: distance.wire_value(),
            light,
            alarm_active,
        }
    }

    /// Serialise to the JSON bytes published on the sensor topic.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        encode_json(self)
    }
}

fn encode_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|_| ResourceError::EncodeFailed.into())
}
