//! Structured events for outbound calls.
//!
//! The forwarding executor and the token flow report each upstream call to a
//! [`ProxyObserver`] instead of logging inline. Events never carry header
//! values or bodies.

use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use parking_lot::Mutex;

/// Which upstream a call went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamKind {
    JiraApi,
    TokenExchange,
    AccessibleResources,
}

impl UpstreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamKind::JiraApi => "jira_api",
            UpstreamKind::TokenExchange => "token_exchange",
            UpstreamKind::AccessibleResources => "accessible_resources",
        }
    }
}

/// One completed (or failed) upstream call.
#[derive(Debug, Clone)]
pub struct UpstreamEvent {
    pub kind: UpstreamKind,
    pub method: Method,
    /// URL without query string.
    pub target: String,
    /// `None` when the call failed before a status arrived.
    pub status: Option<u16>,
    pub duration: Duration,
}

/// Receives upstream call events.
pub trait ProxyObserver: Send + Sync + std::fmt::Debug {
    fn upstream_completed(&self, event: &UpstreamEvent);
}

/// Shared observer handle.
pub type SharedObserver = Arc<dyn ProxyObserver>;

/// Default observer: writes events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ProxyObserver for TracingObserver {
    fn upstream_completed(&self, event: &UpstreamEvent) {
        let duration_ms = event.duration.as_millis();
        match event.status {
            None => tracing::warn!(
                kind = event.kind.as_str(),
                method = %event.method,
                target = %event.target,
                duration_ms = %duration_ms,
                "Upstream call failed"
            ),
            Some(status) if status >= 500 => tracing::warn!(
                kind = event.kind.as_str(),
                method = %event.method,
                target = %event.target,
                status,
                duration_ms = %duration_ms,
                "Upstream call returned server error"
            ),
            Some(status) => tracing::info!(
                kind = event.kind.as_str(),
                method = %event.method,
                target = %event.target,
                status,
                duration_ms = %duration_ms,
                "Upstream call completed"
            ),
        }
    }
}

/// Observer that keeps every event in memory (for testing).
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<UpstreamEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<UpstreamEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, kind: UpstreamKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind == kind).count()
    }
}

impl ProxyObserver for RecordingObserver {
    fn upstream_completed(&self, event: &UpstreamEvent) {
        self.events.lock().push(event.clone());
    }
}
