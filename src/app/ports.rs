//! Port traits: the hexagonal boundary between the node loops and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ CameraNodeService / SensorNodeService
//! ```
//!
//! Driven adapters (camera, display, HTTP, MQTT, GPIO) implement these
//! traits.  The services consume them via generics, so the domain core
//! never touches hardware directly and runs unchanged against the mocks
//! in `tests/integration/mock_hw.rs`.

use core::fmt;
use std::sync::mpsc;

use log::debug;

use crate::error::{CommsError, Error, Result};
use crate::fsm::condition::SensorReading;
use crate::fsm::context::AlarmOutputs;

use super::events::AppEvent;

// ───────────────────────────────────────────────────────────────
// Clock port (both nodes)
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond clock plus a blocking sleep.
pub trait ClockPort {
    fn now_ms(&self) -> u64;
    fn sleep_ms(&mut self, ms: u64);
}

// ───────────────────────────────────────────────────────────────
// Connectivity port (both nodes)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
    AlreadyConnected,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
            Self::AlreadyConnected => write!(f, "already connected to AP"),
        }
    }
}

impl From<ConnectivityError> for Error {
    fn from(_: ConnectivityError) -> Self {
        Self::Comms(CommsError::WifiConnectFailed)
    }
}

/// WiFi station link.
pub trait ConnectivityPort {
    fn connect(&mut self) -> core::result::Result<(), ConnectivityError>;
    fn is_connected(&self) -> bool;
    /// Drive reconnection; `now_ms` paces the backoff.
    fn poll(&mut self, now_ms: u64);
    fn set_credentials(
        &mut self,
        ssid: &str,
        password: &str,
    ) -> core::result::Result<(), ConnectivityError>;
}

// ───────────────────────────────────────────────────────────────
// Camera node ports
// ───────────────────────────────────────────────────────────────

/// An RGB565 frame borrowed from the camera driver (2 bytes per pixel,
/// low byte first).
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub width: u16,
    pub height: u16,
    pub pixels: &'a [u8],
}

impl Frame<'_> {
    /// Byte length implied by the resolution, `None` on overflow.
    pub fn expected_len(&self) -> Option<usize> {
        usize::from(self.width)
            .checked_mul(usize::from(self.height))?
            .checked_mul(2)
    }
}

pub trait CameraPort {
    /// Acquire the newest frame into the driver's buffer.
    fn capture(&mut self) -> Result<()>;
    /// The frame acquired by the last successful `capture`.
    fn frame(&self) -> Result<Frame<'_>>;
    /// Opaque image header prepended to every upload.
    fn header(&self) -> &[u8];
}

pub trait DisplayPort {
    fn show_preview(&mut self, frame: &Frame<'_>) -> Result<()>;
}

/// Which backend endpoint an upload goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    /// Low-latency continuous stream.
    Stream,
    /// Full-quality snapshot.
    Full,
}

impl UploadKind {
    pub fn path(self) -> &'static str {
        match self {
            Self::Stream => "/stream-upload",
            Self::Full => "/upload",
        }
    }
}

impl fmt::Display for UploadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream => f.write_str("stream"),
            Self::Full => f.write_str("full"),
        }
    }
}

/// Blocking HTTP POST of an image payload.  Returns the status code.
pub trait UploadPort {
    fn post(&mut self, kind: UploadKind, body: &[u8]) -> core::result::Result<u16, CommsError>;
}

/// Result of one upload attempt, reported to a waiting trigger request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The backend answered 200.
    Accepted,
    /// The backend answered with another status.
    Rejected { status: u16 },
    /// WiFi was down; nothing was sent.
    Offline,
    /// Capture, allocation or transport failed.
    Failed(Error),
}

impl fmt::Display for UploadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => write!(f, "upload accepted"),
            Self::Rejected { status } => write!(f, "upload rejected with HTTP {status}"),
            Self::Offline => write!(f, "upload skipped, WiFi down"),
            Self::Failed(e) => write!(f, "upload failed: {e}"),
        }
    }
}

/// A pending `GET /take-photo` request awaiting its reply.
///
/// The HTTP server task blocks on the receiving half until the main loop
/// has run the upload and called [`complete`](Self::complete).
pub struct TriggerTicket {
    reply: mpsc::Sender<UploadOutcome>,
}

impl TriggerTicket {
    /// Create a ticket and the receiver the requester waits on.
    pub fn new() -> (Self, mpsc::Receiver<UploadOutcome>) {
        let (reply, rx) = mpsc::channel();
        (Self { reply }, rx)
    }

    /// Report the outcome.  A requester that already gave up is ignored.
    pub fn complete(self, outcome: UploadOutcome) {
        if self.reply.send(outcome).is_err() {
            debug!("Trigger requester gone before reply ({})", outcome);
        }
    }
}

/// Inbound trigger queue fed by the HTTP server task.
pub trait TriggerInbox {
    fn poll_trigger(&mut self) -> Option<TriggerTicket>;
}

// ───────────────────────────────────────────────────────────────
// Sensor node ports
// ───────────────────────────────────────────────────────────────

/// Distance and light sensors.  Read failures surface as
/// [`Distance::Invalid`](crate::fsm::condition::Distance::Invalid) or are
/// logged by the adapter; a read never fails the loop.
pub trait SensorPort {
    fn read(&mut self, now_ms: u64) -> SensorReading;
}

/// Buzzer and LEDs.
pub trait IndicatorPort {
    fn apply(&mut self, outputs: AlarmOutputs) -> Result<()>;
}

/// A message received on a subscribed MQTT topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: heapless::String<64>,
    pub payload: heapless::Vec<u8, 128>,
}

/// MQTT session used for telemetry.
pub trait TelemetryPort {
    fn is_connected(&self) -> bool;
    fn connect(&mut self) -> core::result::Result<(), CommsError>;
    fn subscribe(&mut self, topic: &str) -> core::result::Result<(), CommsError>;
    /// Pump the client; returns one inbound message per call, if any.
    fn poll(&mut self) -> Option<InboundMessage>;
    fn publish(&mut self, topic: &str, payload: &[u8]) -> core::result::Result<(), CommsError>;
}

/// `GET /take-photo` on the camera node.  Returns the status code.
pub trait RemoteTriggerPort {
    fn request_capture(&mut self) -> core::result::Result<u16, CommsError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → logging)
// ───────────────────────────────────────────────────────────────

/// The services emit structured [`AppEvent`]s through this port.
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}
