//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing application events to the ESP-IDF
//! logger (UART in production), one fixed-prefix line per event so the
//! console can be grepped by subsystem.

use log::{info, warn};

use crate::app::events::{AppEvent, NodeRole};
use crate::app::ports::{EventSink, UploadOutcome};

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(role) => {
                let name = match role {
                    NodeRole::Camera => "camera",
                    NodeRole::Sensor => "sensor",
                };
                info!("START | {} node", name);
            }
            AppEvent::CaptureFailed(e) => warn!("CAM | capture failed: {}", e),
            AppEvent::PreviewFailed(e) => warn!("CAM | preview failed: {}", e),
            AppEvent::Upload {
                kind,
                bytes,
                outcome,
            } => match outcome {
                UploadOutcome::Accepted => info!("UPLOAD | {} | {} bytes | ok", kind, bytes),
                other => warn!("UPLOAD | {} | {}", kind, other),
            },
            AppEvent::TriggerServed(outcome) => info!("TRIGGER | served: {}", outcome),
            AppEvent::Reading { reading, cause } => {
                info!(
                    "SENSE | distance={:?} | light={} | proximity={} brightness={}",
                    reading.distance, reading.light, cause.proximity, cause.brightness
                );
            }
            AppEvent::AlarmStateChanged { from, to } => info!("ALARM | {:?} -> {:?}", from, to),
            AppEvent::IndicatorFailed(e) => warn!("ALARM | indicator write failed: {}", e),
            AppEvent::MqttConnected { attempts } => {
                info!("MQTT | connected after {} attempt(s)", attempts);
            }
            AppEvent::MqttRetry { attempt, error } => {
                warn!("MQTT | attempt {} failed: {}", attempt, error);
            }
            AppEvent::ControlMessage(msg) => {
                info!(
                    "MQTT | {} | {}",
                    msg.topic,
                    core::str::from_utf8(&msg.payload).unwrap_or("<binary>")
                );
            }
            AppEvent::Telemetry(t) => {
                info!(
                    "TELEM | distance={:.1}cm | light={} | alarm={}",
                    t.distance, t.light, t.alarm_active
                );
            }
            AppEvent::TelemetryFailed(e) => warn!("TELEM | publish failed: {}", e),
            AppEvent::RemoteTrigger(Ok(status)) => info!("BUTTON | take-photo -> HTTP {}", status),
            AppEvent::RemoteTrigger(Err(e)) => warn!("BUTTON | take-photo failed: {}", e),
            AppEvent::LoopStats { role, stats } => {
                info!(
                    "STATS | {:?} | iterations={} overruns={} worst={}ms",
                    role, stats.iterations, stats.overruns, stats.worst_ms
                );
            }
        }
    }
}
