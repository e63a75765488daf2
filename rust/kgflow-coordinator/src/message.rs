//! The broker message format.
//!
//! Events cross the broker as JSON objects with exactly these fields;
//! routing defaults to the event type and `broadcast` uses the empty key.

use crate::error::CoordinatorResult;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A workflow event as carried by the broker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerEvent {
    pub event_type: String,
    pub payload: Map<String, Value>,
    pub correlation_id: String,
    pub source: String,
    /// Seconds since the epoch
    pub timestamp: f64,
    pub event_id: String,
}

impl BrokerEvent {
    pub fn new(
        event_type: &str,
        payload: Map<String, Value>,
        correlation_id: &str,
        source: &str,
    ) -> Self {
        Self {
            event_type: event_type.to_string(),
            payload,
            correlation_id: correlation_id.to_string(),
            source: source.to_string(),
            timestamp: Utc::now().timestamp_millis() as f64 / 1000.0,
            event_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn to_json(&self) -> CoordinatorResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(data: &str) -> CoordinatorResult<BrokerEvent> {
        Ok(serde_json::from_str(data)?)
    }

    /// Default routing key
    pub fn routing_key(&self) -> &str {
        &self.event_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_through_json() {
        let mut payload = Map::new();
        payload.insert("task".to_string(), json!("approve"));
        let event = BrokerEvent::new("task.completed", payload, "WF-001", "wf-engine");

        let json = event.to_json().unwrap();
        let back = BrokerEvent::from_json(&json).unwrap();
        assert_eq!(event, back);
        assert_eq!(back.routing_key(), "task.completed");
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = BrokerEvent::new("x", Map::new(), "c", "s");
        let b = BrokerEvent::new("x", Map::new(), "c", "s");
        assert_ne!(a.event_id, b.event_id);
    }
}
