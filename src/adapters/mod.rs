//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements                        | Connects to              |
//! |-------------|-----------------------------------|--------------------------|
//! | `camera`    | CameraPort                        | esp32-camera component   |
//! | `hardware`  | SensorPort, IndicatorPort, ...    | per-node driver bundles  |
//! | `http`      | UploadPort, TriggerInbox          | esp_http_client / server |
//! |             | RemoteTriggerPort                 |                          |
//! | `log_sink`  | EventSink                         | Serial log output        |
//! | `mqtt`      | TelemetryPort                     | ESP-MQTT client          |
//! | `time`      | ClockPort                         | ESP32 system timer       |
//! | `wifi`      | ConnectivityPort                  | ESP-IDF WiFi STA         |

pub mod camera;
pub mod hardware;
pub mod http;
pub mod log_sink;
pub mod mqtt;
pub mod time;
pub mod wifi;
