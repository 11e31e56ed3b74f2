//! HTTP adapters.
//!
//! | Item               | Implements          | Node |
//! |--------------------|---------------------|------|
//! | `TriggerQueue`     | TriggerInbox        | A    |
//! | `TriggerServer`    | `GET /take-photo`   | A    |
//! | `HttpUploader`     | UploadPort          | A    |
//! | `RemoteTrigger`    | RemoteTriggerPort   | B    |
//!
//! The trigger queue is plain `std::sync::mpsc`: the server task pushes a
//! [`TriggerTicket`] and blocks on its reply channel, the main loop pops it
//! with `poll_trigger()`, runs the upload and completes the ticket.

use std::sync::mpsc;
use std::time::Duration;

use log::{info, warn};

use crate::app::ports::{TriggerInbox, TriggerTicket, UploadKind, UploadOutcome};

/// Path node A serves and node B calls.
pub const TAKE_PHOTO_PATH: &str = "/take-photo";

/// `http://<host>:<port>/upload` or `.../stream-upload`.
pub fn upload_url(host: &str, port: u16, kind: UploadKind) -> String {
    format!("http://{}:{}{}", host, port, kind.path())
}

/// `http://<camera-host>/take-photo`.
pub fn take_photo_url(camera_host: &str) -> String {
    format!("http://{}{}", camera_host, TAKE_PHOTO_PATH)
}

/// Plain-text body of the `/take-photo` reply.  The status is always 200;
/// the body tells the caller how the upload went, if the loop answered in
/// time.
pub fn take_photo_reply(outcome: Option<UploadOutcome>) -> String {
    match outcome {
        Some(UploadOutcome::Accepted) => "upload triggered: accepted".to_owned(),
        Some(other) => format!("upload triggered: {}", other),
        None => "upload triggered: result pending".to_owned(),
    }
}

// ───────────────────────────────────────────────────────────────
// Trigger queue
// ───────────────────────────────────────────────────────────────

/// Main-loop end of the trigger channel.
pub struct TriggerQueue {
    rx: mpsc::Receiver<TriggerTicket>,
}

/// Server end of the trigger channel.
#[derive(Clone)]
pub struct TriggerRequester {
    tx: mpsc::Sender<TriggerTicket>,
}

pub fn trigger_channel() -> (TriggerRequester, TriggerQueue) {
    let (tx, rx) = mpsc::channel();
    (TriggerRequester { tx }, TriggerQueue { rx })
}

impl TriggerInbox for TriggerQueue {
    fn poll_trigger(&mut self) -> Option<TriggerTicket> {
        self.rx.try_recv().ok()
    }
}

impl TriggerRequester {
    /// Enqueue one request and wait up to `wait` for the loop's verdict.
    /// `None` if the loop is gone or did not answer in time.
    pub fn request(&self, wait: Duration) -> Option<UploadOutcome> {
        let (ticket, reply) = TriggerTicket::new();
        if self.tx.send(ticket).is_err() {
            warn!("Trigger: main loop not listening");
            return None;
        }
        match reply.recv_timeout(wait) {
            Ok(outcome) => Some(outcome),
            Err(_) => {
                warn!("Trigger: no reply within {} ms", wait.as_millis());
                None
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF client / server
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use device::{HttpUploader, RemoteTrigger, TriggerServer};

#[cfg(target_os = "espidf")]
mod device {
    use std::time::Duration;

    use esp_idf_svc::http::Method;
    use esp_idf_svc::http::client::{Configuration as ClientConfiguration, EspHttpConnection};
    use esp_idf_svc::http::server::{Configuration as ServerConfiguration, EspHttpServer};
    use esp_idf_svc::io::{EspIOError, Write};
    use esp_idf_svc::sys::{ESP_ERR_TIMEOUT, EspError};
    use log::{info, warn};

    use super::{TAKE_PHOTO_PATH, TriggerRequester, take_photo_reply, take_photo_url, upload_url};
    use crate::app::ports::{RemoteTriggerPort, UploadKind, UploadPort};
    use crate::config::{CameraNodeConfig, NetworkConfig};
    use crate::error::CommsError;

    fn classify(e: EspError) -> CommsError {
        if e.code() == ESP_ERR_TIMEOUT {
            CommsError::HttpTimeout
        } else {
            CommsError::HttpTransport
        }
    }

    fn connection(timeout_ms: u32) -> Result<EspHttpConnection, CommsError> {
        EspHttpConnection::new(&ClientConfiguration {
            timeout: Some(Duration::from_millis(u64::from(timeout_ms))),
            ..Default::default()
        })
        .map_err(|e| {
            warn!("HTTP: client init failed: {}", e);
            CommsError::HttpTransport
        })
    }

    /// Posts upload payloads to the backend, one connection per request.
    pub struct HttpUploader {
        stream_url: String,
        full_url: String,
        user_agent: heapless::String<32>,
        stream_timeout_ms: u32,
        full_timeout_ms: u32,
    }

    impl HttpUploader {
        pub fn new(net: &NetworkConfig, cam: &CameraNodeConfig) -> Self {
            Self {
                stream_url: upload_url(&net.backend_host, net.backend_port, UploadKind::Stream),
                full_url: upload_url(&net.backend_host, net.backend_port, UploadKind::Full),
                user_agent: cam.user_agent.clone(),
                stream_timeout_ms: cam.stream_timeout_ms,
                full_timeout_ms: cam.full_upload_timeout_ms,
            }
        }
    }

    impl UploadPort for HttpUploader {
        fn post(&mut self, kind: UploadKind, body: &[u8]) -> Result<u16, CommsError> {
            let (url, timeout_ms) = match kind {
                UploadKind::Stream => (&self.stream_url, self.stream_timeout_ms),
                UploadKind::Full => (&self.full_url, self.full_timeout_ms),
            };
            let mut conn = connection(timeout_ms)?;
            let len = body.len().to_string();
            let headers = [
                ("Content-Type", "application/octet-stream"),
                ("User-Agent", self.user_agent.as_str()),
                ("Content-Length", len.as_str()),
            ];
            conn.initiate_request(Method::Post, url, &headers)
                .map_err(classify)?;
            conn.write_all(body).map_err(|e| classify(e.0))?;
            conn.initiate_response().map_err(classify)?;
            Ok(conn.status())
        }
    }

    /// Node B's `GET /take-photo` call to node A.
    pub struct RemoteTrigger {
        url: String,
        timeout_ms: u32,
    }

    impl RemoteTrigger {
        pub fn new(camera_host: &str, timeout_ms: u32) -> Self {
            Self {
                url: take_photo_url(camera_host),
                timeout_ms,
            }
        }
    }

    impl RemoteTriggerPort for RemoteTrigger {
        fn request_capture(&mut self) -> Result<u16, CommsError> {
            let mut conn = connection(self.timeout_ms)?;
            conn.initiate_request(Method::Get, &self.url, &[])
                .map_err(classify)?;
            conn.initiate_response().map_err(classify)?;
            Ok(conn.status())
        }
    }

    /// Node A's HTTP server.  Dropping it stops the server.
    pub struct TriggerServer {
        _server: EspHttpServer<'static>,
    }

    impl TriggerServer {
        /// Serve `GET /take-photo`, handing each request to the main loop
        /// and waiting up to `reply_wait` for its verdict.
        pub fn start(requester: TriggerRequester, reply_wait: Duration) -> anyhow::Result<Self> {
            let mut server = EspHttpServer::new(&ServerConfiguration::default())?;
            server.fn_handler(
                TAKE_PHOTO_PATH,
                Method::Get,
                move |req| -> Result<(), EspIOError> {
                    info!("HTTP: {} requested", TAKE_PHOTO_PATH);
                    let body = take_photo_reply(requester.request(reply_wait));
                    let mut resp =
                        req.into_response(200, Some("OK"), &[("Content-Type", "text/plain")])?;
                    resp.write_all(body.as_bytes())?;
                    Ok(())
                },
            )?;
            info!("HTTP: serving {}", TAKE_PHOTO_PATH);
            Ok(Self { _server: server })
        }
    }
}

/// Log once which backend the uploads go to.
pub fn log_endpoints(host: &str, port: u16) {
    info!(
        "HTTP: uploads to {} and {}",
        upload_url(host, port, UploadKind::Stream),
        upload_url(host, port, UploadKind::Full)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn urls_follow_backend_layout() {
        assert_eq!(
            upload_url("192.168.97.65", 8000, UploadKind::Full),
            "http://192.168.97.65:8000/upload"
        );
        assert_eq!(
            upload_url("192.168.97.65", 8000, UploadKind::Stream),
            "http://192.168.97.65:8000/stream-upload"
        );
        assert_eq!(
            take_photo_url("192.168.97.18"),
            "http://192.168.97.18/take-photo"
        );
    }

    #[test]
    fn empty_queue_has_no_trigger() {
        let (_req, mut queue) = trigger_channel();
        assert!(queue.poll_trigger().is_none());
    }

    #[test]
    fn request_waits_for_main_loop_reply() {
        let (req, mut queue) = trigger_channel();
        let server = thread::spawn(move || req.request(Duration::from_secs(5)));

        let ticket = loop {
            if let Some(t) = queue.poll_trigger() {
                break t;
            }
            thread::sleep(Duration::from_millis(1));
        };
        ticket.complete(UploadOutcome::Rejected { status: 500 });

        assert_eq!(
            server.join().unwrap(),
            Some(UploadOutcome::Rejected { status: 500 })
        );
    }

    #[test]
    fn request_without_loop_returns_none() {
        let (req, queue) = trigger_channel();
        drop(queue);
        assert_eq!(req.request(Duration::from_millis(10)), None);
    }

    #[test]
    fn unanswered_request_times_out() {
        let (req, _queue) = trigger_channel();
        assert_eq!(req.request(Duration::from_millis(10)), None);
    }

    #[test]
    fn reply_text_always_acknowledges() {
        assert_eq!(
            take_photo_reply(Some(UploadOutcome::Accepted)),
            "upload triggered: accepted"
        );
        assert_eq!(
            take_photo_reply(Some(UploadOutcome::Offline)),
            "upload triggered: upload skipped, WiFi down"
        );
        assert_eq!(take_photo_reply(None), "upload triggered: result pending");
    }
}
