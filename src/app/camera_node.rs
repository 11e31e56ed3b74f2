//! Camera node (node A) orchestration.
//!
//! ```text
//!  CameraPort ──▶ ┌──────────────────────┐ ──▶ UploadPort
//!  TriggerInbox ─▶│  CameraNodeService   │ ──▶ DisplayPort
//!                 │  Ticker · LoopStats  │ ──▶ EventSink
//!                 └──────────────────────┘
//! ```
//!
//! Every pass: capture, refresh the preview, serve at most one pending
//! `/take-photo` request, then run whichever uploads are due.  Uploads
//! block the loop; a slow backend stretches the pass and the ticker
//! absorbs it without bursting afterwards.

use log::{debug, info, warn};

use crate::config::{CameraNodeConfig, FrameSource};
use crate::error::{ResourceError, Result, SensorError};
use crate::ticker::{ActionId, LoopStats, Ticker};

use super::events::{AppEvent, NodeRole};
use super::ports::{
    CameraPort, ClockPort, ConnectivityPort, DisplayPort, EventSink, Frame, TriggerInbox,
    UploadKind, UploadOutcome, UploadPort,
};

/// Network-side ports of node A: clock, WiFi, uploads and the trigger
/// queue usually live on one adapter.
pub trait CameraNet: ClockPort + ConnectivityPort + UploadPort + TriggerInbox {}

impl<T> CameraNet for T where T: ClockPort + ConnectivityPort + UploadPort + TriggerInbox {}

/// Everything node A's loop talks to.  Kept as separate fields so a
/// borrowed frame can be shown and uploaded without copying it.
pub struct CameraRig<C, D, N> {
    pub camera: C,
    pub display: D,
    pub net: N,
}

// ───────────────────────────────────────────────────────────────
// Payload assembly
// ───────────────────────────────────────────────────────────────

/// Concatenate the image header and the frame's pixel bytes.
///
/// The result is exactly `header.len() + width * height * 2` bytes.  The
/// buffer is reserved up front; an allocation failure is reported instead
/// of aborting.
pub fn build_upload_payload(header: &[u8], frame: &Frame<'_>) -> Result<Vec<u8>> {
    assemble(header, frame, |buf, n| buf.try_reserve_exact(n))
}

fn assemble<F>(header: &[u8], frame: &Frame<'_>, reserve: F) -> Result<Vec<u8>>
where
    F: FnOnce(&mut Vec<u8>, usize) -> core::result::Result<(), std::collections::TryReserveError>,
{
    let pixel_len = frame.expected_len().ok_or(ResourceError::SizeOverflow)?;
    let pixels = frame
        .pixels
        .get(..pixel_len)
        .ok_or(SensorError::FrameSizeMismatch)?;
    let total = header
        .len()
        .checked_add(pixel_len)
        .ok_or(ResourceError::SizeOverflow)?;

    let mut buf = Vec::new();
    reserve(&mut buf, total).map_err(|_| ResourceError::AllocFailed { requested: total })?;
    buf.extend_from_slice(header);
    buf.extend_from_slice(pixels);
    Ok(buf)
}

// ───────────────────────────────────────────────────────────────
// CameraNodeService
// ───────────────────────────────────────────────────────────────

pub struct CameraNodeService {
    config: CameraNodeConfig,
    ticker: Ticker,
    stats: LoopStats,
}

impl CameraNodeService {
    pub fn new(config: CameraNodeConfig) -> Result<Self> {
        let mut ticker = Ticker::new();
        ticker.register(ActionId::FramePreview, u64::from(config.frame_interval_ms))?;
        ticker.register(ActionId::StreamUpload, u64::from(config.stream_interval_ms))?;
        ticker.register(ActionId::FullUpload, u64::from(config.full_upload_interval_ms))?;
        Ok(Self {
            config,
            ticker,
            stats: LoopStats::default(),
        })
    }

    pub fn start(&mut self, sink: &mut impl EventSink) {
        info!(
            "Camera node: stream every {} ms, full upload every {} ms",
            self.config.stream_interval_ms, self.config.full_upload_interval_ms
        );
        sink.emit(&AppEvent::Started(NodeRole::Camera));
    }

    /// One loop pass.  Returns how long the caller may sleep.
    pub fn run_iteration<C, D, N>(
        &mut self,
        rig: &mut CameraRig<C, D, N>,
        sink: &mut impl EventSink,
    ) -> u64
    where
        C: CameraPort,
        D: DisplayPort,
        N: CameraNet,
    {
        let started = rig.net.now_ms();
        ConnectivityPort::poll(&mut rig.net, started);
        // Frame pacing only; the frame itself is taken every pass.
        self.ticker.due(ActionId::FramePreview, started);

        // 1. capture; a pending trigger still gets its answer
        if let Err(e) = rig.camera.capture() {
            warn!("Camera: capture failed: {}", e);
            sink.emit(&AppEvent::CaptureFailed(e));
            if let Some(ticket) = rig.net.poll_trigger() {
                let outcome = UploadOutcome::Failed(e);
                sink.emit(&AppEvent::TriggerServed(outcome));
                ticket.complete(outcome);
            }
            return self.finish(&rig.net, started, sink);
        }

        // 2. preview
        if let Err(e) = rig
            .camera
            .frame()
            .and_then(|frame| rig.display.show_preview(&frame))
        {
            warn!("Camera: preview failed: {}", e);
            sink.emit(&AppEvent::PreviewFailed(e));
        }

        // 3. inbound trigger
        if let Some(ticket) = rig.net.poll_trigger() {
            info!("Camera: /take-photo requested");
            let outcome = self.upload(rig, UploadKind::Full, sink);
            sink.emit(&AppEvent::TriggerServed(outcome));
            ticket.complete(outcome);
        }

        // 4./5. cadenced uploads
        let now = rig.net.now_ms();
        if self.ticker.due(ActionId::StreamUpload, now) {
            self.upload(rig, UploadKind::Stream, sink);
        }
        let now = rig.net.now_ms();
        if self.ticker.due(ActionId::FullUpload, now) {
            self.upload(rig, UploadKind::Full, sink);
        }

        self.finish(&rig.net, started, sink)
    }

    /// Run forever.
    pub fn run<C, D, N>(&mut self, rig: &mut CameraRig<C, D, N>, sink: &mut impl EventSink) -> !
    where
        C: CameraPort,
        D: DisplayPort,
        N: CameraNet,
    {
        loop {
            let budget = self.run_iteration(rig, sink);
            rig.net.sleep_ms(budget);
        }
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    // ── Internal ──────────────────────────────────────────────

    fn finish(&mut self, clock: &impl ClockPort, started: u64, sink: &mut impl EventSink) -> u64 {
        let now = clock.now_ms();
        self.stats.record(
            now.saturating_sub(started),
            u64::from(self.config.frame_interval_ms),
        );
        if self.stats.should_report(self.config.stats_every) {
            sink.emit(&AppEvent::LoopStats {
                role: NodeRole::Camera,
                stats: self.stats,
            });
        }
        self.ticker
            .sleep_budget(now, u64::from(self.config.trigger_poll_ms))
    }

    fn frame_source(&self, kind: UploadKind) -> FrameSource {
        match kind {
            UploadKind::Stream => self.config.stream_frame,
            UploadKind::Full => self.config.full_frame,
        }
    }

    fn upload<C, D, N>(
        &mut self,
        rig: &mut CameraRig<C, D, N>,
        kind: UploadKind,
        sink: &mut impl EventSink,
    ) -> UploadOutcome
    where
        C: CameraPort,
        N: CameraNet,
    {
        let (bytes, outcome) = self.try_upload(rig, kind);
        match outcome {
            UploadOutcome::Accepted => debug!("Upload({}): {} bytes accepted", kind, bytes),
            _ => warn!("Upload({}): {}", kind, outcome),
        }
        sink.emit(&AppEvent::Upload {
            kind,
            bytes,
            outcome,
        });
        outcome
    }

    fn try_upload<C, D, N>(
        &mut self,
        rig: &mut CameraRig<C, D, N>,
        kind: UploadKind,
    ) -> (usize, UploadOutcome)
    where
        C: CameraPort,
        N: CameraNet,
    {
        if !ConnectivityPort::is_connected(&rig.net) {
            return (0, UploadOutcome::Offline);
        }

        if self.frame_source(kind) == FrameSource::Recapture {
            if let Err(e) = rig.camera.capture() {
                return (0, UploadOutcome::Failed(e));
            }
        }

        let camera = &rig.camera;
        let payload = match camera
            .frame()
            .and_then(|frame| build_upload_payload(camera.header(), &frame))
        {
            Ok(p) => p,
            Err(e) => return (0, UploadOutcome::Failed(e)),
        };

        let outcome = match rig.net.post(kind, &payload) {
            Ok(200) => UploadOutcome::Accepted,
            Ok(status) => UploadOutcome::Rejected { status },
            Err(e) => UploadOutcome::Failed(e.into()),
        };
        (payload.len(), outcome)
    }
}
