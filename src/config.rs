//! System configuration parameters
//!
//! All tunable parameters for both rig nodes.  Defaults mirror the values
//! the rig was commissioned with; a JSON document (baked in at build time
//! through `TELERIG_CONFIG`) can override any of them.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Fixed-capacity text used for hosts, credentials and topics.
pub type Text<const N: usize> = heapless::String<N>;

/// Build a [`Text`] from a literal, truncating at capacity.
pub fn text<const N: usize>(s: &str) -> Text<N> {
    let mut out = Text::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// Root configuration shared by both firmware images.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    pub network: NetworkConfig,
    pub camera_node: CameraNodeConfig,
    pub sensor_node: SensorNodeConfig,
}

/// WiFi credentials and backend addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub wifi_ssid: Text<32>,
    pub wifi_password: Text<64>,
    /// Delay between blocking WiFi association attempts at boot.
    pub wifi_retry_ms: u32,
    /// Backend receiving image uploads (host part only).
    pub backend_host: Text<64>,
    pub backend_port: u16,
    /// Host name or address of the camera node, used by the remote trigger.
    pub camera_node_host: Text<64>,
    pub mqtt_host: Text<64>,
    pub mqtt_port: u16,
    pub mqtt_client_id: Text<32>,
    pub mqtt_user: Text<32>,
    pub mqtt_password: Text<64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: text("MyWIFI"),
            wifi_password: text("Aa123123"),
            wifi_retry_ms: 500,
            backend_host: text("192.168.97.65"),
            backend_port: 8000,
            camera_node_host: text("192.168.97.18"),
            mqtt_host: text("192.168.97.65"),
            mqtt_port: 1883,
            mqtt_client_id: text("ESP32Client"),
            mqtt_user: text("MQTT1"),
            mqtt_password: text("123456"),
        }
    }
}

/// Which frame an upload sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameSource {
    /// Send the frame already captured for the preview in this pass.
    Reuse,
    /// Capture a fresh frame right before building the payload.
    Recapture,
}

/// Camera node (node A) timing and upload parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraNodeConfig {
    /// Frame/preview pacing.
    pub frame_interval_ms: u32,
    /// Low-latency stream upload cadence.
    pub stream_interval_ms: u32,
    /// Full snapshot upload cadence.
    pub full_upload_interval_ms: u32,
    /// Upper bound on one loop sleep, so inbound triggers are served promptly.
    pub trigger_poll_ms: u32,
    pub stream_timeout_ms: u32,
    pub full_upload_timeout_ms: u32,
    pub stream_frame: FrameSource,
    pub full_frame: FrameSource,
    pub user_agent: Text<32>,
    /// Iterations between loop statistics log lines.
    pub stats_every: u32,
}

impl Default for CameraNodeConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 100,
            stream_interval_ms: 200, // ~5 FPS
            full_upload_interval_ms: 30_000,
            trigger_poll_ms: 100,
            stream_timeout_ms: 5_000,
            full_upload_timeout_ms: 15_000,
            stream_frame: FrameSource::Recapture,
            full_frame: FrameSource::Recapture,
            user_agent: text("ESP32-Camera"),
            stats_every: 600,
        }
    }
}

/// Sensor node (node B) thresholds and timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorNodeConfig {
    /// Main loop period.
    pub loop_interval_ms: u32,
    /// Raw ADC level above which the light condition fires.
    pub light_threshold: u16,
    /// Distance (cm) below which the proximity condition fires.
    pub proximity_threshold_cm: f32,
    /// Minimum time the alarm stays active once raised.
    pub alarm_sustain_ms: u32,
    /// Refractory window of the button debouncer.
    pub button_refractory_ms: u32,
    /// Fixed delay between blocking MQTT reconnect attempts.
    pub mqtt_retry_ms: u32,
    pub remote_trigger_timeout_ms: u32,
    /// Ultrasonic echo timeout; no echo within it reads as invalid.
    pub echo_timeout_us: u32,
    pub telemetry_topic: Text<64>,
    pub control_topic: Text<64>,
    pub stats_every: u32,
}

impl Default for SensorNodeConfig {
    fn default() -> Self {
        Self {
            loop_interval_ms: 1_000,
            light_threshold: 1500,
            proximity_threshold_cm: 5.0,
            alarm_sustain_ms: 3_000,
            button_refractory_ms: 200,
            mqtt_retry_ms: 5_000,
            remote_trigger_timeout_ms: 5_000,
            echo_timeout_us: 30_000,
            telemetry_topic: text("esp32/sensor"),
            control_topic: text("esp32/control"),
            stats_every: 60,
        }
    }
}

impl RigConfig {
    /// Parse a JSON document (missing fields take defaults) and validate it.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let config: Self =
            serde_json::from_slice(bytes).map_err(|_| Error::Config("malformed JSON"))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults, overridden by the JSON document baked in at build time
    /// through `TELERIG_CONFIG`.
    pub fn from_build_env() -> Self {
        Self::with_override(option_env!("TELERIG_CONFIG"))
    }

    /// Apply an optional JSON override.  A bad document is logged and the
    /// defaults are used instead, so a typo cannot brick a node.
    pub fn with_override(json: Option<&str>) -> Self {
        let Some(json) = json else {
            return Self::default();
        };
        match Self::from_json(json.as_bytes()) {
            Ok(config) => {
                info!("Config: build-time override applied");
                config
            }
            Err(e) => {
                warn!("Config: override rejected ({}), using defaults", e);
                Self::default()
            }
        }
    }

    /// Reject values that would stall or starve either loop.
    pub fn validate(&self) -> Result<()> {
        let net = &self.network;
        if net.wifi_ssid.is_empty() {
            return Err(Error::Config("wifi_ssid must not be empty"));
        }
        if net.backend_host.is_empty() || net.camera_node_host.is_empty() || net.mqtt_host.is_empty()
        {
            return Err(Error::Config("hosts must not be empty"));
        }
        if net.wifi_retry_ms == 0 {
            return Err(Error::Config("wifi_retry_ms must be > 0"));
        }

        let cam = &self.camera_node;
        if cam.frame_interval_ms == 0
            || cam.stream_interval_ms == 0
            || cam.full_upload_interval_ms == 0
        {
            return Err(Error::Config("camera intervals must be > 0"));
        }
        if cam.trigger_poll_ms == 0 {
            return Err(Error::Config("trigger_poll_ms must be > 0"));
        }
        if cam.stream_timeout_ms == 0 || cam.full_upload_timeout_ms == 0 {
            return Err(Error::Config("upload timeouts must be > 0"));
        }

        let sen = &self.sensor_node;
        if sen.loop_interval_ms == 0 {
            return Err(Error::Config("loop_interval_ms must be > 0"));
        }
        if sen.alarm_sustain_ms < sen.loop_interval_ms {
            return Err(Error::Config("alarm_sustain_ms must cover at least one loop period"));
        }
        if sen.button_refractory_ms == 0 {
            return Err(Error::Config("button_refractory_ms must be > 0"));
        }
        if sen.mqtt_retry_ms == 0 {
            return Err(Error::Config("mqtt_retry_ms must be > 0"));
        }
        if sen.proximity_threshold_cm.is_nan() || sen.proximity_threshold_cm <= 0.0 {
            return Err(Error::Config("proximity_threshold_cm must be positive"));
        }
        if sen.telemetry_topic.is_empty() || sen.control_topic.is_empty() {
            return Err(Error::Config("MQTT topics must not be empty"));
        }
        Ok(())
    }
}
