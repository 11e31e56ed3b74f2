//! Integration tests for the sensor node loop: MQTT session → sensors →
//! alarm machine → indicator → button → telemetry, against recording mocks.

use crate::mock_hw::{MockSensorHw, RecordingSink};

use telerig::app::events::AppEvent;
use telerig::app::ports::InboundMessage;
use telerig::app::sensor_node::SensorNodeService;
use telerig::config::SensorNodeConfig;
use telerig::drivers::button::Debouncer;
use telerig::error::CommsError;
use telerig::fsm::StateId;
use telerig::fsm::condition::Distance;
use telerig::fsm::context::AlarmOutputs;

fn start<'a>(
    button: &'a Debouncer,
    hw: &mut MockSensorHw,
) -> (SensorNodeService<'a>, RecordingSink) {
    let mut svc = SensorNodeService::new(SensorNodeConfig::default(), button).unwrap();
    let mut sink = RecordingSink::new();
    svc.start(hw, &mut sink);
    (svc, sink)
}

/// Run `n` passes, sleeping each returned budget.
fn run_passes(svc: &mut SensorNodeService<'_>, hw: &mut MockSensorHw, sink: &mut RecordingSink, n: usize) {
    for _ in 0..n {
        let budget = svc.run_iteration(hw, sink);
        hw.now += budget;
    }
}

fn control(payload: &str) -> InboundMessage {
    let mut msg = InboundMessage {
        topic: heapless::String::new(),
        payload: heapless::Vec::new(),
    };
    msg.topic.push_str("esp32/control").unwrap();
    msg.payload.extend_from_slice(payload.as_bytes()).unwrap();
    msg
}

// ── End to end ────────────────────────────────────────────────

#[test]
fn bright_flash_holds_alarm_for_sustain_period() {
    let button = Debouncer::new(200);
    let mut hw = MockSensorHw::with_readings(&[(Distance::Invalid, 1600), (Distance::Invalid, 0)]);
    let (mut svc, mut sink) = start(&button, &mut hw);

    run_passes(&mut svc, &mut hw, &mut sink, 6);

    assert_eq!(hw.alarm_flags(), vec![true, true, true, false, false, false]);
    assert_eq!(svc.alarm().state(), StateId::Idle);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::AlarmStateChanged { .. })),
        2
    );
}

#[test]
fn loop_runs_at_configured_period() {
    let button = Debouncer::new(200);
    let mut hw = MockSensorHw::new();
    let (mut svc, mut sink) = start(&button, &mut hw);

    let budgets: Vec<u64> = (0..3)
        .map(|_| {
            let b = svc.run_iteration(&mut hw, &mut sink);
            hw.now += b;
            b
        })
        .collect();
    assert_eq!(budgets, vec![1_000, 1_000, 1_000]);
}

#[test]
fn close_object_raises_alarm() {
    let button = Debouncer::new(200);
    let mut hw = MockSensorHw::with_readings(&[(Distance::from_cm(3.0), 0)]);
    let (mut svc, mut sink) = start(&button, &mut hw);

    run_passes(&mut svc, &mut hw, &mut sink, 1);
    assert!(svc.alarm().is_alarming());
}

#[test]
fn invalid_distance_never_alarms() {
    let button = Debouncer::new(200);
    let mut hw = MockSensorHw::with_readings(&[(Distance::Invalid, 100)]);
    let (mut svc, mut sink) = start(&button, &mut hw);

    run_passes(&mut svc, &mut hw, &mut sink, 5);
    assert!(hw.alarm_flags().iter().all(|a| !a));
    let (_, body) = &hw.published[0];
    assert_eq!(
        body.as_slice(),
        br#"{"distance":-1.0,"light":100,"alarm_active":false}"#
    );
}

#[test]
fn persistent_condition_cools_one_pass_between_alarms() {
    let button = Debouncer::new(200);
    let mut hw = MockSensorHw::with_readings(&[(Distance::Invalid, 2000)]);
    let (mut svc, mut sink) = start(&button, &mut hw);

    run_passes(&mut svc, &mut hw, &mut sink, 5);
    assert_eq!(hw.alarm_flags(), vec![true, true, true, false, true]);
}

// ── Indicator ─────────────────────────────────────────────────

#[test]
fn indicator_written_only_on_change() {
    let button = Debouncer::new(200);
    let mut hw = MockSensorHw::with_readings(&[(Distance::Invalid, 1600), (Distance::Invalid, 0)]);
    let (mut svc, mut sink) = start(&button, &mut hw);

    run_passes(&mut svc, &mut hw, &mut sink, 6);
    assert_eq!(
        hw.indicator_attempts,
        vec![AlarmOutputs::IDLE, AlarmOutputs::ALARM, AlarmOutputs::IDLE]
    );
}

#[test]
fn failed_indicator_write_is_retried_next_pass() {
    let button = Debouncer::new(200);
    let mut hw = MockSensorHw::new();
    hw.indicator_failures = 1;
    let (mut svc, mut sink) = start(&button, &mut hw);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::IndicatorFailed(_))), 1);

    run_passes(&mut svc, &mut hw, &mut sink, 3);
    assert_eq!(
        hw.indicator_attempts,
        vec![AlarmOutputs::IDLE, AlarmOutputs::IDLE]
    );
}

// ── MQTT session ──────────────────────────────────────────────

#[test]
fn mqtt_reconnect_blocks_with_fixed_delay() {
    let button = Debouncer::new(200);
    let mut hw = MockSensorHw::new();
    hw.connect_results.extend([
        Err(CommsError::MqttConnectFailed),
        Err(CommsError::MqttConnectFailed),
    ]);
    let (mut svc, mut sink) = start(&button, &mut hw);

    svc.run_iteration(&mut hw, &mut sink);
    assert_eq!(hw.sleeps, vec![5_000, 5_000]);
    assert_eq!(hw.subscriptions, vec!["esp32/control".to_owned()]);
    assert!(
        sink.events
            .contains(&AppEvent::MqttConnected { attempts: 3 })
    );
    assert_eq!(sink.count(|e| matches!(e, AppEvent::MqttRetry { .. })), 2);
    // Telemetry went out once the session was up.
    assert_eq!(hw.published.len(), 1);
}

#[test]
fn dropped_session_resubscribes() {
    let button = Debouncer::new(200);
    let mut hw = MockSensorHw::new();
    let (mut svc, mut sink) = start(&button, &mut hw);

    run_passes(&mut svc, &mut hw, &mut sink, 1);
    hw.mqtt_up = false;
    run_passes(&mut svc, &mut hw, &mut sink, 1);
    assert_eq!(hw.subscriptions.len(), 2);
}

#[test]
fn publish_failure_does_not_end_the_loop() {
    let button = Debouncer::new(200);
    let mut hw = MockSensorHw::new();
    hw.publish_fails = true;
    let (mut svc, mut sink) = start(&button, &mut hw);

    run_passes(&mut svc, &mut hw, &mut sink, 2);
    assert_eq!(
        sink.count(|e| *e == AppEvent::TelemetryFailed(CommsError::MqttPublishFailed)),
        2
    );
    assert_eq!(sink.count(|e| matches!(e, AppEvent::Reading { .. })), 2);

    hw.publish_fails = false;
    run_passes(&mut svc, &mut hw, &mut sink, 1);
    assert_eq!(hw.published.len(), 1);
}

#[test]
fn telemetry_goes_to_sensor_topic() {
    let button = Debouncer::new(200);
    let mut hw = MockSensorHw::with_readings(&[(Distance::from_cm(12.5), 830)]);
    let (mut svc, mut sink) = start(&button, &mut hw);

    run_passes(&mut svc, &mut hw, &mut sink, 1);
    let (topic, body) = &hw.published[0];
    assert_eq!(topic, "esp32/sensor");
    assert_eq!(
        body.as_slice(),
        br#"{"distance":12.5,"light":830,"alarm_active":false}"#
    );
}

#[test]
fn control_messages_are_drained_in_bounded_batches() {
    let button = Debouncer::new(200);
    let mut hw = MockSensorHw::new();
    hw.inbound.extend((0..10).map(|i| control(&format!("msg{i}"))));
    let (mut svc, mut sink) = start(&button, &mut hw);

    run_passes(&mut svc, &mut hw, &mut sink, 1);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::ControlMessage(_))), 8);
    run_passes(&mut svc, &mut hw, &mut sink, 1);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::ControlMessage(_))), 10);
}

#[test]
fn lost_wifi_keeps_alarm_running_and_recovers() {
    let button = Debouncer::new(200);
    let mut hw = MockSensorHw::with_readings(&[(Distance::Invalid, 0), (Distance::Invalid, 1600)]);
    let (mut svc, mut sink) = start(&button, &mut hw);
    run_passes(&mut svc, &mut hw, &mut sink, 1);
    assert_eq!(hw.subscriptions.len(), 1);

    // Access point and broker both gone; WiFi only returns through poll().
    hw.wifi_up = false;
    hw.mqtt_up = false;
    hw.wifi_back_after_polls = Some(3);
    run_passes(&mut svc, &mut hw, &mut sink, 1);

    assert!(hw.sleeps.is_empty(), "no blocking retry while WiFi is down");
    assert_eq!(hw.reads, 2);
    assert!(svc.alarm().is_alarming());
    assert_eq!(
        hw.indicator_attempts,
        vec![AlarmOutputs::IDLE, AlarmOutputs::ALARM]
    );
    assert_eq!(hw.published.len(), 1);
    assert!(
        sink.events
            .contains(&AppEvent::TelemetryFailed(CommsError::WifiDisconnected))
    );

    run_passes(&mut svc, &mut hw, &mut sink, 2);
    assert!(hw.wifi_up);
    assert_eq!(hw.reads, 4);
    assert_eq!(hw.subscriptions.len(), 2);
    assert_eq!(hw.alarm_flags(), vec![false, true, true]);
}

// ── Button → remote capture ───────────────────────────────────

#[test]
fn button_edge_requests_remote_capture_once() {
    let button = Debouncer::new(200);
    let mut hw = MockSensorHw::new();
    let (mut svc, mut sink) = start(&button, &mut hw);

    // Bounce burst inside the refractory window.
    for t in [1_000, 1_005, 1_040, 1_150] {
        button.notify_edge(t);
    }
    run_passes(&mut svc, &mut hw, &mut sink, 2);

    assert_eq!(hw.capture_requests, 1);
    assert!(sink.events.contains(&AppEvent::RemoteTrigger(Ok(200))));
}

#[test]
fn button_while_offline_skips_request() {
    let button = Debouncer::new(200);
    let mut hw = MockSensorHw::new();
    hw.wifi_up = false;
    let (mut svc, mut sink) = start(&button, &mut hw);

    button.notify_edge(0);
    run_passes(&mut svc, &mut hw, &mut sink, 1);

    assert_eq!(hw.capture_requests, 0);
    assert!(
        sink.events
            .contains(&AppEvent::RemoteTrigger(Err(CommsError::WifiDisconnected)))
    );
}
