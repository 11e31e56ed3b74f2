//! MQTT telemetry adapter for the sensor node.
//!
//! Wraps `EspMqttClient` behind [`TelemetryPort`].  The client's event
//! callback runs on the MQTT task; it only flips the `connected` flag and
//! forwards received messages through a bounded channel that the main
//! loop drains with `poll()`.
//!
//! Session handling stays with the service: `connect()` waits a bounded
//! time for the broker to accept, and the service re-subscribes after
//! every fresh connection.

use log::warn;

use crate::app::ports::InboundMessage;

/// Messages buffered between the MQTT task and the main loop.
pub const INBOUND_DEPTH: usize = 8;

/// `mqtt://<host>:<port>`.
pub fn broker_url(host: &str, port: u16) -> String {
    format!("mqtt://{}:{}", host, port)
}

/// Copy a received message into fixed-capacity storage.  Payloads longer
/// than the buffer are truncated; an oversized topic drops the message.
pub fn inbound_message(topic: &str, data: &[u8]) -> Option<InboundMessage> {
    let mut msg = InboundMessage {
        topic: heapless::String::new(),
        payload: heapless::Vec::new(),
    };
    if msg.topic.push_str(topic).is_err() {
        warn!("MQTT: dropping message, topic too long ({} bytes)", topic.len());
        return None;
    }
    let cap = msg.payload.capacity();
    if data.len() > cap {
        warn!("MQTT: payload truncated {} -> {} bytes", data.len(), cap);
    }
    // Cannot fail: the slice is clamped to capacity.
    let _ = msg.payload.extend_from_slice(&data[..data.len().min(cap)]);
    Some(msg)
}

#[cfg(target_os = "espidf")]
pub use device::MqttTelemetry;

#[cfg(target_os = "espidf")]
mod device {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;

    use esp_idf_hal::delay::FreeRtos;
    use esp_idf_svc::mqtt::client::{
        EspMqttClient, EventPayload, MqttClientConfiguration, QoS,
    };
    use log::{debug, info, warn};

    use super::{INBOUND_DEPTH, broker_url, inbound_message};
    use crate::app::ports::{InboundMessage, TelemetryPort};
    use crate::config::NetworkConfig;
    use crate::error::CommsError;

    /// Poll step while waiting for the broker's CONNACK.
    const CONNECT_POLL_MS: u32 = 100;

    pub struct MqttTelemetry {
        url: String,
        client_id: heapless::String<32>,
        user: heapless::String<32>,
        password: heapless::String<64>,
        connect_wait_ms: u32,
        client: Option<EspMqttClient<'static>>,
        connected: Arc<AtomicBool>,
        inbound_tx: mpsc::SyncSender<InboundMessage>,
        inbound_rx: mpsc::Receiver<InboundMessage>,
    }

    impl MqttTelemetry {
        pub fn new(net: &NetworkConfig, connect_wait_ms: u32) -> Self {
            let (inbound_tx, inbound_rx) = mpsc::sync_channel(INBOUND_DEPTH);
            Self {
                url: broker_url(&net.mqtt_host, net.mqtt_port),
                client_id: net.mqtt_client_id.clone(),
                user: net.mqtt_user.clone(),
                password: net.mqtt_password.clone(),
                connect_wait_ms,
                client: None,
                connected: Arc::new(AtomicBool::new(false)),
                inbound_tx,
                inbound_rx,
            }
        }

        fn create_client(&self) -> Result<EspMqttClient<'static>, CommsError> {
            let conf = MqttClientConfiguration {
                client_id: Some(self.client_id.as_str()),
                username: Some(self.user.as_str()),
                password: Some(self.password.as_str()),
                ..Default::default()
            };
            let connected = Arc::clone(&self.connected);
            let tx = self.inbound_tx.clone();
            EspMqttClient::new_cb(&self.url, &conf, move |event| match event.payload() {
                EventPayload::Connected(_) => connected.store(true, Ordering::Release),
                EventPayload::Disconnected => connected.store(false, Ordering::Release),
                EventPayload::Received { topic, data, .. } => {
                    if let Some(msg) = inbound_message(topic.unwrap_or(""), data) {
                        if tx.try_send(msg).is_err() {
                            warn!("MQTT: inbound queue full, message dropped");
                        }
                    }
                }
                EventPayload::Error(e) => warn!("MQTT: {:?}", e),
                other => debug!("MQTT: {:?}", other),
            })
            .map_err(|e| {
                warn!("MQTT: client init failed: {}", e);
                CommsError::MqttConnectFailed
            })
        }
    }

    impl TelemetryPort for MqttTelemetry {
        fn is_connected(&self) -> bool {
            self.client.is_some() && self.connected.load(Ordering::Acquire)
        }

        fn connect(&mut self) -> Result<(), CommsError> {
            if self.client.is_none() {
                info!("MQTT: broker {} as '{}'", self.url, self.client_id);
                self.client = Some(self.create_client()?);
            }
            // The client reconnects on its own; wait for it to report in.
            let mut waited = 0;
            while !self.connected.load(Ordering::Acquire) {
                if waited >= self.connect_wait_ms {
                    return Err(CommsError::MqttConnectFailed);
                }
                FreeRtos::delay_ms(CONNECT_POLL_MS);
                waited += CONNECT_POLL_MS;
            }
            Ok(())
        }

        fn subscribe(&mut self, topic: &str) -> Result<(), CommsError> {
            let client = self.client.as_mut().ok_or(CommsError::MqttConnectFailed)?;
            client
                .subscribe(topic, QoS::AtMostOnce)
                .map(|_| ())
                .map_err(|_| CommsError::MqttConnectFailed)
        }

        fn poll(&mut self) -> Option<InboundMessage> {
            self.inbound_rx.try_recv().ok()
        }

        fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
            let client = self.client.as_mut().ok_or(CommsError::MqttPublishFailed)?;
            client
                .publish(topic, QoS::AtMostOnce, false, payload)
                .map(|_| ())
                .map_err(|_| CommsError::MqttPublishFailed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_url_uses_mqtt_scheme() {
        assert_eq!(broker_url("192.168.97.65", 1883), "mqtt://192.168.97.65:1883");
    }

    #[test]
    fn inbound_message_copies_topic_and_payload() {
        let msg = inbound_message("esp32/control", b"buzz").unwrap();
        assert_eq!(msg.topic.as_str(), "esp32/control");
        assert_eq!(msg.payload.as_slice(), b"buzz");
    }

    #[test]
    fn long_payload_is_truncated() {
        let data = [b'x'; 300];
        let msg = inbound_message("t", &data).unwrap();
        assert_eq!(msg.payload.len(), 128);
    }

    #[test]
    fn oversized_topic_is_dropped() {
        let topic = "t".repeat(65);
        assert!(inbound_message(&topic, b"").is_none());
    }
}
