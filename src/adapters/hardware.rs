//! Board adapters: bundle one node's drivers behind its port traits.
//!
//! [`SensorBoard`] is everything node B's loop talks to; [`CameraLink`] is
//! the network side of node A (the camera and panel stay separate fields
//! of `CameraRig`).  Both are generic over the pieces that only exist on
//! the device, so the wiring is exercised on the host as well.

use crate::adapters::http::TriggerQueue;
use crate::adapters::time::SystemClock;
use crate::adapters::wifi::WifiAdapter;
use crate::app::ports::{
    ClockPort, ConnectivityError, ConnectivityPort, IndicatorPort, InboundMessage,
    RemoteTriggerPort, SensorPort, TelemetryPort, TriggerInbox, TriggerTicket, UploadKind,
    UploadPort,
};
use crate::drivers::light::LightSensor;
use crate::drivers::ultrasonic::RangeFinder;
use crate::error::{CommsError, Result};
use crate::fsm::condition::SensorReading;
use crate::fsm::context::AlarmOutputs;

// ───────────────────────────────────────────────────────────────
// Node B
// ───────────────────────────────────────────────────────────────

pub struct SensorBoard<U, I, T, R> {
    pub clock: SystemClock,
    pub wifi: WifiAdapter,
    pub ranger: U,
    pub light: LightSensor,
    pub indicator: I,
    pub telemetry: T,
    pub remote: R,
}

impl<U, I, T, R> ClockPort for SensorBoard<U, I, T, R> {
    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    fn sleep_ms(&mut self, ms: u64) {
        self.clock.sleep_ms(ms);
    }
}

impl<U, I, T, R> ConnectivityPort for SensorBoard<U, I, T, R> {
    fn connect(&mut self) -> core::result::Result<(), ConnectivityError> {
        self.wifi.connect()
    }

    fn is_connected(&self) -> bool {
        self.wifi.is_connected()
    }

    fn poll(&mut self, now_ms: u64) {
        self.wifi.poll(now_ms);
    }

    fn set_credentials(
        &mut self,
        ssid: &str,
        password: &str,
    ) -> core::result::Result<(), ConnectivityError> {
        self.wifi.set_credentials(ssid, password)
    }
}

impl<U: RangeFinder, I, T, R> SensorPort for SensorBoard<U, I, T, R> {
    fn read(&mut self, now_ms: u64) -> SensorReading {
        SensorReading {
            distance: self.ranger.measure(),
            light: self.light.read_or_last(),
            captured_at_ms: now_ms,
        }
    }
}

impl<U, I: IndicatorPort, T, R> IndicatorPort for SensorBoard<U, I, T, R> {
    fn apply(&mut self, outputs: AlarmOutputs) -> Result<()> {
        self.indicator.apply(outputs)
    }
}

impl<U, I, T: TelemetryPort, R> TelemetryPort for SensorBoard<U, I, T, R> {
    fn is_connected(&self) -> bool {
        self.telemetry.is_connected()
    }

    fn connect(&mut self) -> core::result::Result<(), CommsError> {
        self.telemetry.connect()
    }

    fn subscribe(&mut self, topic: &str) -> core::result::Result<(), CommsError> {
        self.telemetry.subscribe(topic)
    }

    fn poll(&mut self) -> Option<InboundMessage> {
        self.telemetry.poll()
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> core::result::Result<(), CommsError> {
        self.telemetry.publish(topic, payload)
    }
}

impl<U, I, T, R: RemoteTriggerPort> RemoteTriggerPort for SensorBoard<U, I, T, R> {
    fn request_capture(&mut self) -> core::result::Result<u16, CommsError> {
        self.remote.request_capture()
    }
}

// ───────────────────────────────────────────────────────────────
// Node A
// ───────────────────────────────────────────────────────────────

pub struct CameraLink<P> {
    pub clock: SystemClock,
    pub wifi: WifiAdapter,
    pub uploader: P,
    pub triggers: TriggerQueue,
}

impl<P> ClockPort for CameraLink<P> {
    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    fn sleep_ms(&mut self, ms: u64) {
        self.clock.sleep_ms(ms);
    }
}

impl<P> ConnectivityPort for CameraLink<P> {
    fn connect(&mut self) -> core::result::Result<(), ConnectivityError> {
        self.wifi.connect()
    }

    fn is_connected(&self) -> bool {
        self.wifi.is_connected()
    }

    fn poll(&mut self, now_ms: u64) {
        self.wifi.poll(now_ms);
    }

    fn set_credentials(
        &mut self,
        ssid: &str,
        password: &str,
    ) -> core::result::Result<(), ConnectivityError> {
        self.wifi.set_credentials(ssid, password)
    }
}

impl<P: UploadPort> UploadPort for CameraLink<P> {
    fn post(&mut self, kind: UploadKind, body: &[u8]) -> core::result::Result<u16, CommsError> {
        self.uploader.post(kind, body)
    }
}

impl<P> TriggerInbox for CameraLink<P> {
    fn poll_trigger(&mut self) -> Option<TriggerTicket> {
        self.triggers.poll_trigger()
    }
}
