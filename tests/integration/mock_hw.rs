//! Mock hardware for integration tests.
//!
//! Every mock records what the service asked of it, so tests can assert on
//! the full call history without touching GPIO, the camera or the network.
//! Time is a manual clock: it only moves when the service sleeps.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use telerig::app::events::AppEvent;
use telerig::app::ports::{
    CameraPort, ClockPort, ConnectivityError, ConnectivityPort, DisplayPort, EventSink, Frame,
    InboundMessage, IndicatorPort, RemoteTriggerPort, SensorPort, TelemetryPort, TriggerInbox,
    TriggerTicket, UploadKind, UploadPort,
};
use telerig::error::{ActuatorError, CommsError, Result, SensorError};
use telerig::fsm::condition::{Distance, SensorReading};
use telerig::fsm::context::AlarmOutputs;

// ── Call journal (camera node) ────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Capture,
    Preview,
    Post { kind: UploadKind, bytes: usize },
}

pub type Journal = Rc<RefCell<Vec<Call>>>;

pub fn journal() -> Journal {
    Rc::new(RefCell::new(Vec::new()))
}

// ── MockCamera ────────────────────────────────────────────────

pub struct MockCamera {
    journal: Journal,
    pub width: u16,
    pub height: u16,
    pub pixels: Vec<u8>,
    pub header: Vec<u8>,
    /// Upcoming captures that fail.
    pub fail_captures: u32,
}

#[allow(dead_code)]
impl MockCamera {
    /// A `width × height` RGB565 frame behind a 4-byte header.
    pub fn new(journal: &Journal, width: u16, height: u16) -> Self {
        let len = usize::from(width) * usize::from(height) * 2;
        Self {
            journal: Rc::clone(journal),
            width,
            height,
            pixels: (0..len).map(|i| i as u8).collect(),
            header: vec![b'B', b'M', 0, 0],
            fail_captures: 0,
        }
    }

    /// Snapshot of the shared journal.
    pub fn calls(&self) -> Vec<Call> {
        self.journal.borrow().clone()
    }

    pub fn payload_len(&self) -> usize {
        self.header.len() + usize::from(self.width) * usize::from(self.height) * 2
    }
}

impl CameraPort for MockCamera {
    fn capture(&mut self) -> Result<()> {
        self.journal.borrow_mut().push(Call::Capture);
        if self.fail_captures > 0 {
            self.fail_captures -= 1;
            return Err(SensorError::FrameUnavailable.into());
        }
        Ok(())
    }

    fn frame(&self) -> Result<Frame<'_>> {
        Ok(Frame {
            width: self.width,
            height: self.height,
            pixels: &self.pixels,
        })
    }

    fn header(&self) -> &[u8] {
        &self.header
    }
}

// ── MockDisplay ───────────────────────────────────────────────

pub struct MockDisplay {
    journal: Journal,
    pub fail: bool,
}

impl MockDisplay {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: Rc::clone(journal),
            fail: false,
        }
    }
}

impl DisplayPort for MockDisplay {
    fn show_preview(&mut self, _frame: &Frame<'_>) -> Result<()> {
        self.journal.borrow_mut().push(Call::Preview);
        if self.fail {
            return Err(ActuatorError::SpiWriteFailed.into());
        }
        Ok(())
    }
}

// ── MockNet (node A network side) ─────────────────────────────

pub struct MockNet {
    journal: Journal,
    pub now: u64,
    pub sleeps: Vec<u64>,
    pub connected: bool,
    /// Scripted responses; `Ok(200)` once exhausted.
    pub responses: VecDeque<core::result::Result<u16, CommsError>>,
    pub bodies: Vec<(UploadKind, Vec<u8>)>,
    pub triggers: VecDeque<TriggerTicket>,
}

impl MockNet {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: Rc::clone(journal),
            now: 0,
            sleeps: Vec::new(),
            connected: true,
            responses: VecDeque::new(),
            bodies: Vec::new(),
            triggers: VecDeque::new(),
        }
    }
}

impl ClockPort for MockNet {
    fn now_ms(&self) -> u64 {
        self.now
    }

    fn sleep_ms(&mut self, ms: u64) {
        self.sleeps.push(ms);
        self.now += ms;
    }
}

impl ConnectivityPort for MockNet {
    fn connect(&mut self) -> core::result::Result<(), ConnectivityError> {
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn poll(&mut self, _now_ms: u64) {}

    fn set_credentials(
        &mut self,
        _ssid: &str,
        _password: &str,
    ) -> core::result::Result<(), ConnectivityError> {
        Ok(())
    }
}

impl UploadPort for MockNet {
    fn post(&mut self, kind: UploadKind, body: &[u8]) -> core::result::Result<u16, CommsError> {
        self.journal.borrow_mut().push(Call::Post {
            kind,
            bytes: body.len(),
        });
        self.bodies.push((kind, body.to_vec()));
        self.responses.pop_front().unwrap_or(Ok(200))
    }
}

impl TriggerInbox for MockNet {
    fn poll_trigger(&mut self) -> Option<TriggerTicket> {
        self.triggers.pop_front()
    }
}

// ── MockSensorHw (node B) ─────────────────────────────────────

pub struct MockSensorHw {
    pub now: u64,
    pub sleeps: Vec<u64>,
    pub wifi_up: bool,
    /// While down, WiFi comes back after this many `poll()` calls.
    pub wifi_back_after_polls: Option<u32>,
    pub wifi_polls: u32,
    pub reads: u32,
    /// Readings served in order; the last one repeats.
    pub readings: VecDeque<(Distance, u16)>,
    /// Every indicator write attempt, successful or not.
    pub indicator_attempts: Vec<AlarmOutputs>,
    pub indicator_failures: u32,
    pub mqtt_up: bool,
    /// Scripted connect results; `Ok` once exhausted.
    pub connect_results: VecDeque<core::result::Result<(), CommsError>>,
    pub subscriptions: Vec<String>,
    pub inbound: VecDeque<InboundMessage>,
    pub published: Vec<(String, Vec<u8>)>,
    pub publish_fails: bool,
    pub capture_requests: u32,
}

#[allow(dead_code)]
impl MockSensorHw {
    pub fn new() -> Self {
        Self {
            now: 0,
            sleeps: Vec::new(),
            wifi_up: true,
            wifi_back_after_polls: None,
            wifi_polls: 0,
            reads: 0,
            readings: VecDeque::from([(Distance::Invalid, 0)]),
            indicator_attempts: Vec::new(),
            indicator_failures: 0,
            mqtt_up: false,
            connect_results: VecDeque::new(),
            subscriptions: Vec::new(),
            inbound: VecDeque::new(),
            published: Vec::new(),
            publish_fails: false,
            capture_requests: 0,
        }
    }

    pub fn with_readings(readings: &[(Distance, u16)]) -> Self {
        let mut hw = Self::new();
        hw.readings = readings.iter().copied().collect();
        hw
    }

    /// `alarm_active` of every published telemetry document, in order.
    pub fn alarm_flags(&self) -> Vec<bool> {
        self.published
            .iter()
            .map(|(_, body)| {
                let v: serde_json::Value = serde_json::from_slice(body).unwrap();
                v["alarm_active"].as_bool().unwrap()
            })
            .collect()
    }
}

impl Default for MockSensorHw {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockPort for MockSensorHw {
    fn now_ms(&self) -> u64 {
        self.now
    }

    fn sleep_ms(&mut self, ms: u64) {
        self.sleeps.push(ms);
        self.now += ms;
    }
}

impl ConnectivityPort for MockSensorHw {
    fn connect(&mut self) -> core::result::Result<(), ConnectivityError> {
        self.wifi_up = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.wifi_up
    }

    fn poll(&mut self, _now_ms: u64) {
        self.wifi_polls += 1;
        if self.wifi_up {
            return;
        }
        if let Some(left) = self.wifi_back_after_polls.as_mut() {
            *left = left.saturating_sub(1);
            if *left == 0 {
                self.wifi_back_after_polls = None;
                self.wifi_up = true;
            }
        }
    }

    fn set_credentials(
        &mut self,
        _ssid: &str,
        _password: &str,
    ) -> core::result::Result<(), ConnectivityError> {
        Ok(())
    }
}

impl SensorPort for MockSensorHw {
    fn read(&mut self, now_ms: u64) -> SensorReading {
        self.reads += 1;
        let (distance, light) = if self.readings.len() > 1 {
            self.readings.pop_front().unwrap_or((Distance::Invalid, 0))
        } else {
            self.readings.front().copied().unwrap_or((Distance::Invalid, 0))
        };
        SensorReading {
            distance,
            light,
            captured_at_ms: now_ms,
        }
    }
}

impl IndicatorPort for MockSensorHw {
    fn apply(&mut self, outputs: AlarmOutputs) -> Result<()> {
        self.indicator_attempts.push(outputs);
        if self.indicator_failures > 0 {
            self.indicator_failures -= 1;
            return Err(ActuatorError::GpioWriteFailed.into());
        }
        Ok(())
    }
}

impl TelemetryPort for MockSensorHw {
    fn is_connected(&self) -> bool {
        self.mqtt_up
    }

    fn connect(&mut self) -> core::result::Result<(), CommsError> {
        if !self.wifi_up {
            return Err(CommsError::MqttConnectFailed);
        }
        let result = self.connect_results.pop_front().unwrap_or(Ok(()));
        self.mqtt_up = result.is_ok();
        result
    }

    fn subscribe(&mut self, topic: &str) -> core::result::Result<(), CommsError> {
        self.subscriptions.push(topic.to_owned());
        Ok(())
    }

    fn poll(&mut self) -> Option<InboundMessage> {
        self.inbound.pop_front()
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> core::result::Result<(), CommsError> {
        if self.publish_fails {
            return Err(CommsError::MqttPublishFailed);
        }
        self.published.push((topic.to_owned(), payload.to_vec()));
        Ok(())
    }
}

impl RemoteTriggerPort for MockSensorHw {
    fn request_capture(&mut self) -> core::result::Result<u16, CommsError> {
        self.capture_requests += 1;
        Ok(200)
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
