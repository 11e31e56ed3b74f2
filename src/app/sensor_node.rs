//! Sensor node (node B) orchestration.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────┐ ──▶ IndicatorPort
//!  Debouncer ───▶ │    SensorNodeService     │ ──▶ TelemetryPort
//!                 │ Evaluator · Alarm · Tick │ ──▶ RemoteTriggerPort
//!                 └──────────────────────────┘ ──▶ EventSink
//! ```
//!
//! One pass per loop period: make sure the MQTT session is up, read the
//! sensors, run the alarm machine, drive the indicator, forward a button
//! press to node A and publish one telemetry document.

use log::{debug, info, warn};

use crate::config::SensorNodeConfig;
use crate::drivers::button::Debouncer;
use crate::error::{CommsError, Result};
use crate::fsm::AlarmStateMachine;
use crate::fsm::condition::{AlarmEvaluator, SensorReading};
use crate::fsm::context::AlarmOutputs;
use crate::ticker::{ActionId, LoopStats, Ticker};

use super::events::{AppEvent, NodeRole, TelemetryPayload};
use super::ports::{
    ClockPort, ConnectivityPort, EventSink, IndicatorPort, RemoteTriggerPort, SensorPort,
    TelemetryPort,
};

/// Control messages drained per pass, so a chatty broker cannot starve
/// the sensor path.
const MAX_INBOUND_PER_PASS: usize = 8;

/// Everything node B's loop talks to.
pub trait SensorNodeHw:
    ClockPort + ConnectivityPort + SensorPort + IndicatorPort + TelemetryPort + RemoteTriggerPort
{
}

impl<T> SensorNodeHw for T where
    T: ClockPort
        + ConnectivityPort
        + SensorPort
        + IndicatorPort
        + TelemetryPort
        + RemoteTriggerPort
{
}

// ───────────────────────────────────────────────────────────────
// SensorNodeService
// ───────────────────────────────────────────────────────────────

pub struct SensorNodeService<'a> {
    config: SensorNodeConfig,
    evaluator: AlarmEvaluator,
    alarm: AlarmStateMachine,
    button: &'a Debouncer,
    ticker: Ticker,
    stats: LoopStats,
    /// Last command successfully written to the indicator.
    applied: Option<AlarmOutputs>,
    last_reading: Option<SensorReading>,
}

impl<'a> SensorNodeService<'a> {
    pub fn new(config: SensorNodeConfig, button: &'a Debouncer) -> Result<Self> {
        let mut ticker = Ticker::new();
        ticker.register(ActionId::SensorLoop, u64::from(config.loop_interval_ms))?;
        Ok(Self {
            evaluator: AlarmEvaluator::from_config(&config),
            alarm: AlarmStateMachine::new(u64::from(config.alarm_sustain_ms)),
            button,
            ticker,
            stats: LoopStats::default(),
            applied: None,
            last_reading: None,
            config,
        })
    }

    /// Drive the indicator to its idle command and announce startup.
    pub fn start(&mut self, hw: &mut impl SensorNodeHw, sink: &mut impl EventSink) {
        self.apply_outputs(hw, self.alarm.outputs(), sink);
        info!(
            "Sensor node: light > {}, proximity < {:.1} cm, alarm held {} ms",
            self.config.light_threshold,
            self.config.proximity_threshold_cm,
            self.config.alarm_sustain_ms
        );
        sink.emit(&AppEvent::Started(NodeRole::Sensor));
    }

    /// One loop pass.  Returns how long the caller may sleep.
    pub fn run_iteration(&mut self, hw: &mut impl SensorNodeHw, sink: &mut impl EventSink) -> u64 {
        // 1. MQTT session; skipped while WiFi is down so the alarm keeps running
        let online = self.ensure_connected(hw, sink);

        let started = hw.now_ms();
        self.ticker.due(ActionId::SensorLoop, started);
        ConnectivityPort::poll(hw, started);

        // 2. inbound control messages
        for _ in 0..MAX_INBOUND_PER_PASS {
            let Some(msg) = TelemetryPort::poll(hw) else {
                break;
            };
            info!(
                "MQTT: message on '{}' ({} bytes)",
                msg.topic,
                msg.payload.len()
            );
            sink.emit(&AppEvent::ControlMessage(msg));
        }

        // 3. sensors
        let reading = hw.read(started);
        self.last_reading = Some(reading);

        // 4. alarm machine
        let cause = self.evaluator.evaluate(&reading);
        if cause.brightness {
            debug!("Alarm condition: light {} above threshold", reading.light);
        }
        if cause.proximity {
            debug!("Alarm condition: object at {:?}", reading.distance);
        }
        sink.emit(&AppEvent::Reading { reading, cause });

        let before = self.alarm.state();
        let outputs = self.alarm.evaluate(cause.any(), started);
        let after = self.alarm.state();
        if before != after {
            sink.emit(&AppEvent::AlarmStateChanged {
                from: before,
                to: after,
            });
        }

        // 5. indicator, written on change only
        if self.applied != Some(outputs) {
            self.apply_outputs(hw, outputs, sink);
        }

        // 6. button → remote capture
        if self.button.take_pending() {
            self.forward_button(hw, sink);
        }

        // 7. telemetry
        let payload =
            TelemetryPayload::new(reading.distance, reading.light, self.alarm.is_alarming());
        if online {
            self.publish(hw, payload, sink);
        } else {
            sink.emit(&AppEvent::TelemetryFailed(CommsError::WifiDisconnected));
        }

        let now = hw.now_ms();
        self.stats.record(
            now.saturating_sub(started),
            u64::from(self.config.loop_interval_ms),
        );
        if self.stats.should_report(self.config.stats_every) {
            sink.emit(&AppEvent::LoopStats {
                role: NodeRole::Sensor,
                stats: self.stats,
            });
        }
        self.ticker
            .sleep_budget(now, u64::from(self.config.loop_interval_ms))
    }

    /// Run forever.
    pub fn run(&mut self, hw: &mut impl SensorNodeHw, sink: &mut impl EventSink) -> ! {
        loop {
            let budget = self.run_iteration(hw, sink);
            hw.sleep_ms(budget);
        }
    }

    /// Block until the MQTT session is live, retrying at a fixed delay.
    /// Subscribes to the control topic on every fresh connection.
    ///
    /// WiFi is polled before every attempt.  Returns `false` without
    /// blocking when WiFi is down, so only a reachable-but-refusing broker
    /// can hold the loop here.
    pub fn ensure_connected(
        &mut self,
        hw: &mut impl SensorNodeHw,
        sink: &mut impl EventSink,
    ) -> bool {
        if TelemetryPort::is_connected(hw) {
            return true;
        }

        let mut attempt: u32 = 0;
        loop {
            let now = hw.now_ms();
            ConnectivityPort::poll(hw, now);
            if !ConnectivityPort::is_connected(hw) {
                warn!("MQTT: WiFi down, connect deferred to next pass");
                return false;
            }

            attempt = attempt.saturating_add(1);
            info!("MQTT: connecting (attempt {})", attempt);
            match TelemetryPort::connect(hw) {
                Ok(()) => break,
                Err(error) => {
                    warn!(
                        "MQTT: connect failed: {}, retrying in {} ms",
                        error, self.config.mqtt_retry_ms
                    );
                    sink.emit(&AppEvent::MqttRetry { attempt, error });
                    hw.sleep_ms(u64::from(self.config.mqtt_retry_ms));
                }
            }
        }

        let topic = self.config.control_topic.as_str();
        match hw.subscribe(topic) {
            Ok(()) => info!("MQTT: subscribed to '{}'", topic),
            Err(e) => warn!("MQTT: subscribe to '{}' failed: {}", topic, e),
        }
        sink.emit(&AppEvent::MqttConnected { attempts: attempt });
        true
    }

    pub fn alarm(&self) -> &AlarmStateMachine {
        &self.alarm
    }

    pub fn last_reading(&self) -> Option<SensorReading> {
        self.last_reading
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    // ── Internal ──────────────────────────────────────────────

    fn apply_outputs(
        &mut self,
        hw: &mut impl SensorNodeHw,
        outputs: AlarmOutputs,
        sink: &mut impl EventSink,
    ) {
        match hw.apply(outputs) {
            Ok(()) => self.applied = Some(outputs),
            Err(e) => {
                // Left unrecorded so the next pass writes again.
                warn!("Indicator: write failed: {}", e);
                sink.emit(&AppEvent::IndicatorFailed(e));
            }
        }
    }

    fn forward_button(&mut self, hw: &mut impl SensorNodeHw, sink: &mut impl EventSink) {
        info!("Button: requesting capture from camera node");
        let result = if ConnectivityPort::is_connected(hw) {
            hw.request_capture()
        } else {
            Err(CommsError::WifiDisconnected)
        };
        match result {
            Ok(status) => info!("Button: camera node answered HTTP {}", status),
            Err(e) => warn!("Button: capture request failed: {}", e),
        }
        sink.emit(&AppEvent::RemoteTrigger(result));
    }

    fn publish(
        &mut self,
        hw: &mut impl SensorNodeHw,
        payload: TelemetryPayload,
        sink: &mut impl EventSink,
    ) {
        let bytes = match payload.to_json() {
            Ok(b) => b,
            Err(e) => {
                warn!("Telemetry: {}", e);
                return;
            }
        };
        match hw.publish(self.config.telemetry_topic.as_str(), &bytes) {
            Ok(()) => sink.emit(&AppEvent::Telemetry(payload)),
            Err(e) => {
                warn!("Telemetry: publish failed: {}", e);
                sink.emit(&AppEvent::TelemetryFailed(e));
            }
        }
    }
}
