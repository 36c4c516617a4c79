//! Structured access log: exactly one record per request.
//!
//! Responsibility:
//! - Time the whole pipeline (auth, scope check, handler).
//! - Collect client address, method, path+query, status, body size, latency and the
//!   error detail a failing stage attached (`ErrorMessage`).
//! - Route status >= 500 to error severity, everything else to info.
//!
//! Records go to an `AccessLogSink`. In the running service that is `TracingSink`,
//! which hands the record to the process-wide `tracing` subscriber (one JSON line
//! per record).
//!
//! If the request future is dropped before a response exists (client went away),
//! the record is still written once, with status 499.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{Body, HttpBody},
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};

use crate::error::ErrorMessage;

pub const ACCESS_LOG_TARGET: &str = "access";

const CLIENT_CLOSED_REQUEST: u16 = 499;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

impl Severity {
    pub fn for_status(status: u16) -> Self {
        if status >= 500 {
            Self::Error
        } else {
            Self::Info
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub level: Severity,
    pub client_id: String,
    pub method: String,
    pub status_code: u16,
    pub body_size: Option<u64>,
    pub path: String,
    pub latency: Duration,
    pub time: DateTime<Utc>,
    pub message: Option<String>,
    pub request_id: Option<String>,
}

/// Latencies over a minute are shown at one-second resolution.
pub fn clamp_latency(latency: Duration) -> Duration {
    if latency > Duration::from_secs(60) {
        Duration::from_secs(latency.as_secs())
    } else {
        latency
    }
}

pub fn render_latency(latency: Duration) -> String {
    format!("{:?}", clamp_latency(latency))
}

/// Destination for access records. Implementations must tolerate concurrent callers.
pub trait AccessLogSink: Send + Sync + 'static {
    fn record(&self, event: LogEvent);
}

pub type SharedSink = Arc<dyn AccessLogSink>;

/// Writes records through `tracing` under the `access` target.
///
/// Every record carries the same keys: an unknown body size is rendered as 0
/// and a missing request id or message as an empty string.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AccessLogSink for TracingSink {
    fn record(&self, event: LogEvent) {
        let latency = render_latency(event.latency);
        let time = event.time.to_rfc3339();
        let message = event.message.as_deref().unwrap_or_default();
        let request_id = event.request_id.as_deref().unwrap_or_default();
        let body_size = event.body_size.unwrap_or(0);

        match event.level {
            Severity::Error => tracing::error!(
                target: ACCESS_LOG_TARGET,
                client_id = %event.client_id,
                method = %event.method,
                status_code = event.status_code,
                body_size,
                path = %event.path,
                latency = %latency,
                time = %time,
                request_id,
                "{message}"
            ),
            Severity::Info => tracing::info!(
                target: ACCESS_LOG_TARGET,
                client_id = %event.client_id,
                method = %event.method,
                status_code = event.status_code,
                body_size,
                path = %event.path,
                latency = %latency,
                time = %time,
                request_id,
                "{message}"
            ),
        }
    }
}

pub async fn access_log(State(sink): State<SharedSink>, req: Request<Body>, next: Next) -> Response {
    let pending = PendingEvent::start(sink, &req);
    let response = next.run(req).await;
    pending.finish(&response);
    response
}

/// Request-side half of a record; emits on `finish` or, failing that, on drop.
struct PendingEvent {
    sink: Option<SharedSink>,
    started: Instant,
    client_id: String,
    method: String,
    path: String,
    request_id: Option<String>,
}

impl PendingEvent {
    fn start(sink: SharedSink, req: &Request<Body>) -> Self {
        let path = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| req.uri().path().to_string());

        Self {
            sink: Some(sink),
            started: Instant::now(),
            client_id: client_id(req),
            method: req.method().to_string(),
            path,
            request_id: header_str(req.headers(), "x-request-id"),
        }
    }

    fn finish(mut self, response: &Response) {
        let status = response.status().as_u16();
        let message = response
            .extensions()
            .get::<ErrorMessage>()
            .map(|m| m.0.clone());
        self.emit(status, body_size(response), message);
    }

    fn emit(&mut self, status: u16, body_size: Option<u64>, message: Option<String>) {
        let Some(sink) = self.sink.take() else {
            return;
        };

        sink.record(LogEvent {
            level: Severity::for_status(status),
            client_id: std::mem::take(&mut self.client_id),
            method: std::mem::take(&mut self.method),
            status_code: status,
            body_size,
            path: std::mem::take(&mut self.path),
            latency: self.started.elapsed(),
            time: Utc::now(),
            message,
            request_id: self.request_id.take(),
        });
    }
}

impl Drop for PendingEvent {
    fn drop(&mut self) {
        self.emit(
            CLIENT_CLOSED_REQUEST,
            None,
            Some("request abandoned".to_string()),
        );
    }
}

fn client_id(req: &Request<Body>) -> String {
    let headers = req.headers();

    if let Some(forwarded) = header_str(headers, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return first.to_string();
        }
    }
    if let Some(real_ip) = header_str(headers, "x-real-ip") {
        return real_ip;
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default()
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn body_size(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .or_else(|| response.body().size_hint().exact())
}

#[cfg(test)]
pub(crate) mod recording {
    use std::sync::Mutex;

    use super::{AccessLogSink, LogEvent};

    /// Keeps every record in memory.
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        events: Mutex<Vec<LogEvent>>,
    }

    impl RecordingSink {
        pub fn events(&self) -> Vec<LogEvent> {
            self.events.lock().expect("lock").clone()
        }
    }

    impl AccessLogSink for RecordingSink {
        fn record(&self, event: LogEvent) {
            self.events.lock().expect("lock").push(event);
        }
    }
}
