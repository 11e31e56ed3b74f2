//! Camera node (node A) firmware entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  EspCamera   Tft (SPI2)   CameraLink                         │
//! │  (Camera)    (Display)    WifiAdapter · HttpUploader ·       │
//! │                           TriggerQueue ◀── TriggerServer     │
//! │  ──────────────── Port Trait Boundary ───────────────────    │
//! │               CameraNodeService (Ticker · LoopStats)         │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{AnyIOPin, PinDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::spi::config::Config as SpiConfig;
use esp_idf_hal::spi::{SpiDeviceDriver, SpiDriver, SpiDriverConfig};
use esp_idf_hal::units::Hertz;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};
use log::info;

use telerig::adapters::camera::EspCamera;
use telerig::adapters::hardware::CameraLink;
use telerig::adapters::http::{self, HttpUploader, TriggerServer, trigger_channel};
use telerig::adapters::log_sink::LogEventSink;
use telerig::adapters::time::SystemClock;
use telerig::adapters::wifi::WifiAdapter;
use telerig::app::camera_node::{CameraNodeService, CameraRig};
use telerig::app::ports::ConnectivityPort;
use telerig::config::RigConfig;
use telerig::drivers::tft::Tft;
use telerig::error::Error;
use telerig::pins;

/// Slack on top of the full-upload timeout before `/take-photo` answers
/// without a verdict.
const TRIGGER_REPLY_SLACK_MS: u64 = 5_000;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Telerig camera node v{}          ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let config = RigConfig::from_build_env();
    let net = &config.network;
    let cam = &config.camera_node;

    let p = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    // ── 2. Camera + preview panel ─────────────────────────────
    let camera = EspCamera::init()?;

    let spi = SpiDriver::new(
        p.spi2,
        p.pins.gpio18,
        p.pins.gpio23,
        None::<AnyIOPin>,
        &SpiDriverConfig::new(),
    )?;
    let spi = SpiDeviceDriver::new(
        spi,
        Some(p.pins.gpio5),
        &SpiConfig::new().baudrate(Hertz(pins::camera::TFT_SPI_FREQ_HZ)),
    )?;
    let mut tft = Tft::new(spi, PinDriver::output(p.pins.gpio2)?);
    let mut rst = PinDriver::output(p.pins.gpio19)?;
    tft.init(&mut rst, &mut FreeRtos)?;

    // ── 3. WiFi (blocking until associated) ───────────────────
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

    // ── 4. HTTP: /take-photo server + uploader ────────────────
    let (requester, triggers) = trigger_channel();
    let reply_wait =
        Duration::from_millis(u64::from(cam.full_upload_timeout_ms) + TRIGGER_REPLY_SLACK_MS);
    let _server = TriggerServer::start(requester, reply_wait)?;
    http::log_endpoints(&net.backend_host, net.backend_port);

    let mut rig = CameraRig {
        camera,
        display: tft,
        net: CameraLink {
            clock,
            wifi,
            uploader: HttpUploader::new(net, cam),
            triggers,
        },
    };

    // ── 5. Loop ───────────────────────────────────────────────
    let mut sink = LogEventSink::new();
    let mut service = CameraNodeService::new(cam.clone())?;
    service.start(&mut sink);
    info!("System ready. Entering camera loop.");
    service.run(&mut rig, &mut sink)
}
