//! Integration tests for the camera node loop: capture → preview →
//! trigger → cadenced uploads, against recording mocks.

use crate::mock_hw::{Call, MockCamera, MockDisplay, MockNet, RecordingSink, journal};

use telerig::app::camera_node::{CameraNodeService, CameraRig};
use telerig::app::events::AppEvent;
use telerig::app::ports::{TriggerTicket, UploadKind, UploadOutcome};
use telerig::config::{CameraNodeConfig, FrameSource};
use telerig::error::{Error, SensorError};

type Rig = CameraRig<MockCamera, MockDisplay, MockNet>;

fn make_rig(config: CameraNodeConfig) -> (CameraNodeService, Rig, RecordingSink) {
    let j = journal();
    let rig = CameraRig {
        camera: MockCamera::new(&j, 4, 2),
        display: MockDisplay::new(&j),
        net: MockNet::new(&j),
    };
    let mut svc = CameraNodeService::new(config).unwrap();
    let mut sink = RecordingSink::new();
    svc.start(&mut sink);
    (svc, rig, sink)
}

fn calls(rig: &Rig) -> Vec<Call> {
    rig.camera.calls()
}

fn upload_outcomes(sink: &RecordingSink, which: UploadKind) -> Vec<UploadOutcome> {
    sink.events
        .iter()
        .filter_map(|e| match e {
            AppEvent::Upload { kind, outcome, .. } if *kind == which => Some(*outcome),
            _ => None,
        })
        .collect()
}

/// Run passes, sleeping each returned budget, until `until_ms`.
fn run_until(svc: &mut CameraNodeService, rig: &mut Rig, sink: &mut RecordingSink, until_ms: u64) {
    while rig.net.now < until_ms {
        let budget = svc.run_iteration(rig, sink);
        assert!(budget > 0, "loop must always yield");
        rig.net.now += budget;
    }
}

// ── Loop order ────────────────────────────────────────────────

#[test]
fn first_pass_captures_previews_then_uploads_stream_and_full() {
    let (mut svc, mut rig, mut sink) = make_rig(CameraNodeConfig::default());
    svc.run_iteration(&mut rig, &mut sink);

    let len = rig.camera.payload_len();
    assert_eq!(
        calls(&rig),
        vec![
            Call::Capture,
            Call::Preview,
            Call::Capture,
            Call::Post {
                kind: UploadKind::Stream,
                bytes: len
            },
            Call::Capture,
            Call::Post {
                kind: UploadKind::Full,
                bytes: len
            },
        ]
    );
}

#[test]
fn reused_frame_skips_the_extra_capture() {
    let config = CameraNodeConfig {
        stream_frame: FrameSource::Reuse,
        full_frame: FrameSource::Reuse,
        ..CameraNodeConfig::default()
    };
    let (mut svc, mut rig, mut sink) = make_rig(config);
    svc.run_iteration(&mut rig, &mut sink);

    let captures = calls(&rig).iter().filter(|c| **c == Call::Capture).count();
    assert_eq!(captures, 1);
    assert_eq!(rig.net.bodies.len(), 2);
}

#[test]
fn payload_is_header_followed_by_frame() {
    let (mut svc, mut rig, mut sink) = make_rig(CameraNodeConfig::default());
    svc.run_iteration(&mut rig, &mut sink);

    let (_, body) = &rig.net.bodies[0];
    assert_eq!(&body[..4], rig.camera.header.as_slice());
    assert_eq!(&body[4..], rig.camera.pixels.as_slice());
}

// ── Cadences ──────────────────────────────────────────────────

#[test]
fn stream_runs_at_its_interval_and_full_once() {
    let (mut svc, mut rig, mut sink) = make_rig(CameraNodeConfig::default());
    run_until(&mut svc, &mut rig, &mut sink, 1_000);

    // t = 0, 200, 400, 600, 800
    assert_eq!(upload_outcomes(&sink, UploadKind::Stream).len(), 5);
    assert_eq!(upload_outcomes(&sink, UploadKind::Full).len(), 1);
}

#[test]
fn sleep_budget_never_exceeds_trigger_poll() {
    let (mut svc, mut rig, mut sink) = make_rig(CameraNodeConfig::default());
    for _ in 0..20 {
        let budget = svc.run_iteration(&mut rig, &mut sink);
        assert!(budget <= 100);
        rig.net.now += budget;
    }
}

#[test]
fn full_upload_repeats_after_its_interval() {
    let (mut svc, mut rig, mut sink) = make_rig(CameraNodeConfig::default());
    run_until(&mut svc, &mut rig, &mut sink, 30_001);
    assert_eq!(upload_outcomes(&sink, UploadKind::Full).len(), 2);
}

// ── Trigger ───────────────────────────────────────────────────

#[test]
fn trigger_runs_full_upload_and_replies() {
    let (mut svc, mut rig, mut sink) = make_rig(CameraNodeConfig::default());
    svc.run_iteration(&mut rig, &mut sink);
    rig.net.now += 50;

    let (ticket, reply) = TriggerTicket::new();
    rig.net.triggers.push_back(ticket);
    let before = rig.net.bodies.len();
    svc.run_iteration(&mut rig, &mut sink);

    // Only the triggered full upload: stream and full cadences are not due.
    assert_eq!(rig.net.bodies.len(), before + 1);
    assert_eq!(rig.net.bodies[before].0, UploadKind::Full);
    assert_eq!(reply.try_recv().unwrap(), UploadOutcome::Accepted);
    assert!(
        sink.events
            .contains(&AppEvent::TriggerServed(UploadOutcome::Accepted))
    );
}

#[test]
fn only_one_trigger_is_served_per_pass() {
    let (mut svc, mut rig, mut sink) = make_rig(CameraNodeConfig::default());
    svc.run_iteration(&mut rig, &mut sink);
    rig.net.now += 50;

    let (a, reply_a) = TriggerTicket::new();
    let (b, reply_b) = TriggerTicket::new();
    rig.net.triggers.extend([a, b]);

    svc.run_iteration(&mut rig, &mut sink);
    assert!(reply_a.try_recv().is_ok());
    assert!(reply_b.try_recv().is_err());

    rig.net.now += 10;
    svc.run_iteration(&mut rig, &mut sink);
    assert!(reply_b.try_recv().is_ok());
}

#[test]
fn trigger_reply_carries_rejection() {
    let (mut svc, mut rig, mut sink) = make_rig(CameraNodeConfig::default());
    svc.run_iteration(&mut rig, &mut sink);
    rig.net.now += 50;

    let (ticket, reply) = TriggerTicket::new();
    rig.net.triggers.push_back(ticket);
    rig.net.responses.push_back(Ok(503));
    svc.run_iteration(&mut rig, &mut sink);

    assert_eq!(
        reply.try_recv().unwrap(),
        UploadOutcome::Rejected { status: 503 }
    );
}

// ── Failures ──────────────────────────────────────────────────

#[test]
fn non_200_is_a_soft_failure() {
    let (mut svc, mut rig, mut sink) = make_rig(CameraNodeConfig::default());
    rig.net.responses.push_back(Ok(500));
    svc.run_iteration(&mut rig, &mut sink);

    assert_eq!(
        upload_outcomes(&sink, UploadKind::Stream),
        vec![UploadOutcome::Rejected { status: 500 }]
    );
    // The full upload in the same pass still went out.
    assert_eq!(
        upload_outcomes(&sink, UploadKind::Full),
        vec![UploadOutcome::Accepted]
    );
}

#[test]
fn short_frame_aborts_upload_but_keeps_preview() {
    let (mut svc, mut rig, mut sink) = make_rig(CameraNodeConfig::default());
    rig.camera.pixels.truncate(5);
    svc.run_iteration(&mut rig, &mut sink);

    assert!(rig.net.bodies.is_empty());
    assert!(calls(&rig).contains(&Call::Preview));
    assert_eq!(
        upload_outcomes(&sink, UploadKind::Stream),
        vec![UploadOutcome::Failed(Error::Sensor(
            SensorError::FrameSizeMismatch
        ))]
    );
}

#[test]
fn offline_skips_uploads() {
    let (mut svc, mut rig, mut sink) = make_rig(CameraNodeConfig::default());
    rig.net.connected = false;
    svc.run_iteration(&mut rig, &mut sink);

    assert!(rig.net.bodies.is_empty());
    assert_eq!(
        upload_outcomes(&sink, UploadKind::Full),
        vec![UploadOutcome::Offline]
    );
    assert!(calls(&rig).contains(&Call::Preview));
}

#[test]
fn transport_error_is_reported_not_fatal() {
    let (mut svc, mut rig, mut sink) = make_rig(CameraNodeConfig::default());
    rig.net
        .responses
        .push_back(Err(telerig::error::CommsError::HttpTimeout));
    svc.run_iteration(&mut rig, &mut sink);
    rig.net.now += 200;
    svc.run_iteration(&mut rig, &mut sink);

    assert_eq!(
        upload_outcomes(&sink, UploadKind::Stream),
        vec![
            UploadOutcome::Failed(telerig::error::CommsError::HttpTimeout.into()),
            UploadOutcome::Accepted
        ]
    );
}

#[test]
fn capture_failure_answers_pending_trigger_with_the_error() {
    let (mut svc, mut rig, mut sink) = make_rig(CameraNodeConfig::default());
    rig.camera.fail_captures = 1;
    let (ticket, reply) = TriggerTicket::new();
    rig.net.triggers.push_back(ticket);

    svc.run_iteration(&mut rig, &mut sink);
    let failed = UploadOutcome::Failed(SensorError::FrameUnavailable.into());
    assert_eq!(calls(&rig), vec![Call::Capture]);
    assert!(rig.net.triggers.is_empty());
    assert!(rig.net.bodies.is_empty());
    assert_eq!(reply.try_recv().unwrap(), failed);
    assert!(sink.events.contains(&AppEvent::TriggerServed(failed)));
    assert!(
        sink.events
            .contains(&AppEvent::CaptureFailed(SensorError::FrameUnavailable.into()))
    );

    // The camera recovers on the next pass and uploads resume.
    rig.net.now += 100;
    svc.run_iteration(&mut rig, &mut sink);
    assert!(!rig.net.bodies.is_empty());
}

#[test]
fn preview_failure_does_not_block_uploads() {
    let (mut svc, mut rig, mut sink) = make_rig(CameraNodeConfig::default());
    rig.display.fail = true;
    svc.run_iteration(&mut rig, &mut sink);

    assert_eq!(sink.count(|e| matches!(e, AppEvent::PreviewFailed(_))), 1);
    assert_eq!(rig.net.bodies.len(), 2);
}
