//! Push-event model.
//!
//! The notification stream is shared by every consumer of the catalog:
//! heartbeats, unrelated event types and other requests' deliveries are
//! steady-state traffic.

use crate::error::EapError;
use serde_json::Value;

/// One dispatched server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamEvent {
    pub event_type: Option<String>,
    pub id: Option<String>,
    pub data: String,
}

impl StreamEvent {
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    pub fn heartbeat() -> Self {
        Self::default()
    }

    /// Keep-alive: comment-only or empty-data events.
    pub fn is_heartbeat(&self) -> bool {
        self.data.trim().is_empty()
    }
}

/// Result of a single stream read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamRead {
    Event(StreamEvent),
    /// The per-read timeout elapsed with nothing to dispatch.
    Idle,
}

pub trait EventStream {
    fn read_event(&mut self) -> Result<StreamRead, EapError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Heartbeat,
    Notification,
    Other,
}

/// Parsed view of a stream event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryEvent {
    pub kind: EventKind,
    pub distribution_id: Option<String>,
    pub catalog_id: Option<String>,
    pub artifact_ref: Option<String>,
}

impl DeliveryEvent {
    /// Classify an event. Only bodies carrying all of `generated.@id`,
    /// `generated.identifier` and `generated.snapshot.dataset.catalog.identifier`
    /// are notifications; anything else, including non-JSON bodies, is `Other`.
    pub fn parse(event: &StreamEvent) -> Self {
        if event.is_heartbeat() {
            return Self::other(EventKind::Heartbeat);
        }

        let Ok(body) = serde_json::from_str::<Value>(&event.data) else {
            return Self::other(EventKind::Other);
        };
        let generated = &body["generated"];
        let artifact_ref = generated["@id"].as_str();
        let distribution_id = generated["identifier"].as_str();
        let catalog_id = id_text(&generated["snapshot"]["dataset"]["catalog"]["identifier"]);

        match (artifact_ref, distribution_id, catalog_id) {
            (Some(artifact), Some(distribution), Some(catalog)) => Self {
                kind: EventKind::Notification,
                distribution_id: Some(distribution.to_string()),
                catalog_id: Some(catalog),
                artifact_ref: Some(artifact.to_string()),
            },
            _ => Self::other(EventKind::Other),
        }
    }

    fn other(kind: EventKind) -> Self {
        Self {
            kind,
            distribution_id: None,
            catalog_id: None,
            artifact_ref: None,
        }
    }
}

// Catalog identifiers are numeric-looking strings; accept bare numbers too.
fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
