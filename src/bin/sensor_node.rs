//! Sensor node (node B) firmware entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  SensorBoard                                                 │
//! │  Ultrasonic · LightSensor · AlarmIndicator · MqttTelemetry · │
//! │  RemoteTrigger · WifiAdapter           Debouncer ◀── GPIO ISR│
//! │  ──────────────── Port Trait Boundary ───────────────────    │
//! │        SensorNodeService (Evaluator · Alarm FSM · Ticker)    │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Result;
use esp_idf_hal::delay::Ets;
use esp_idf_hal::gpio::PinDriver;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};
use log::info;

use telerig::adapters::hardware::SensorBoard;
use telerig::adapters::http::RemoteTrigger;
use telerig::adapters::log_sink::LogEventSink;
use telerig::adapters::mqtt::MqttTelemetry;
use telerig::adapters::time::{self, SystemClock};
use telerig::adapters::wifi::WifiAdapter;
use telerig::app::ports::ConnectivityPort;
use telerig::app::sensor_node::SensorNodeService;
use telerig::config::RigConfig;
use telerig::drivers::button::Debouncer;
use telerig::drivers::hw_init;
use telerig::drivers::indicator::AlarmIndicator;
use telerig::drivers::light::LightSensor;
use telerig::drivers::ultrasonic::Ultrasonic;
use telerig::error::Error;

/// How long one MQTT connect attempt waits for the broker.
const MQTT_CONNECT_WAIT_MS: u32 = 5_000;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Telerig sensor node v{}          ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let config = RigConfig::from_build_env();
    let net = &config.network;
    let sen = &config.sensor_node;

    let p = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    // ── 2. ADC, button input + ISR ────────────────────────────
    hw_init::init_peripherals().map_err(Error::from)?;
    let button: &'static Debouncer =
        Box::leak(Box::new(Debouncer::new(sen.button_refractory_ms)));
    hw_init::init_button_isr(button).map_err(Error::from)?;

    // ── 3. Sensors + alarm outputs ────────────────────────────
    let ranger = Ultrasonic::new(
        PinDriver::output(p.pins.gpio5)?,
        PinDriver::input(p.pins.gpio18)?,
        Ets,
        time::micros,
        sen.echo_timeout_us,
    );
    let indicator = AlarmIndicator::new(
        PinDriver::output(p.pins.gpio22)?,
        PinDriver::output(p.pins.gpio2)?,
        PinDriver::output(p.pins.gpio4)?,
    )?;

    // ── 4. WiFi (blocking until associated) ───────────────────
    let driver = BlockingWifi::wrap(
        EspWifi::new(p.modem, sysloop.clone(), Some(nvs))?,
        sysloop,
    )?;
    let mut wifi = WifiAdapter::new(driver);
    wifi.set_credentials(&net.wifi_ssid, &net.wifi_password)
        .map_err(Error::from)?;
    let mut clock = SystemClock::new();
    let attempts = wifi
        .connect_blocking(&mut clock, u64::from(net.wifi_retry_ms))
        .map_err(Error::from)?;
    info!("WiFi: up after {} attempt(s)", attempts);

    let mut board = SensorBoard {
        clock,
        wifi,
        ranger,
        light: LightSensor::new(hw_init::ADC1_CH_LIGHT),
        indicator,
        telemetry: MqttTelemetry::new(net, MQTT_CONNECT_WAIT_MS),
        remote: RemoteTrigger::new(&net.camera_node_host, sen.remote_trigger_timeout_ms),
    };

    // ── 5. Loop ───────────────────────────────────────────────
    let mut sink = LogEventSink::new();
    let mut service = SensorNodeService::new(sen.clone(), button)?;
    service.start(&mut board, &mut sink);
    info!("System ready. Entering sensor loop.");
    service.run(&mut board, &mut sink)
}
