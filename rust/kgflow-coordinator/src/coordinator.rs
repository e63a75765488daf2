//! Pub/sub coordination port and the in-memory implementation.
//!
//! Delivery is at-least-once from the consumer's perspective; undeliverable
//! messages land on the `<exchange>.dlq` queue. Correlation tracking groups
//! events of one workflow across publishers.

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::message::BrokerEvent;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Port for the opaque message broker
#[async_trait]
pub trait EventCoordinator: Send + Sync {
    /// Publish with an explicit routing key, or the event type by default.
    /// The empty key broadcasts to every subscriber.
    async fn publish(
        &self,
        event: BrokerEvent,
        routing_key: Option<&str>,
    ) -> CoordinatorResult<bool>;

    /// Name of the dead-letter queue
    fn dead_letter_queue(&self) -> String;
}

/// Handle to an active subscription
pub struct Subscription {
    pub id: String,
    pub receiver: mpsc::UnboundedReceiver<BrokerEvent>,
}

struct SubscriptionEntry {
    id: String,
    pattern: String,
    sender: mpsc::UnboundedSender<BrokerEvent>,
}

/// Tokio-channel fan-out coordinator for tests and single-process runs
pub struct InMemoryCoordinator {
    exchange_name: String,
    subscriptions: Mutex<Vec<SubscriptionEntry>>,
    correlations: Mutex<HashMap<String, Vec<BrokerEvent>>>,
    dead_letters: Mutex<Vec<BrokerEvent>>,
}

impl InMemoryCoordinator {
    pub fn new(exchange_name: &str) -> Self {
        Self {
            exchange_name: exchange_name.to_string(),
            subscriptions: Mutex::new(Vec::new()),
            correlations: Mutex::new(HashMap::new()),
            dead_letters: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe to a routing pattern; `#` matches every key
    pub fn subscribe(&self, pattern: &str) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = Uuid::new_v4().to_string();
        self.subscriptions.lock().push(SubscriptionEntry {
            id: id.clone(),
            pattern: pattern.to_string(),
            sender,
        });
        Subscription { id, receiver }
    }

    pub fn unsubscribe(&self, subscription_id: &str) -> CoordinatorResult<()> {
        let mut subscriptions = self.subscriptions.lock();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != subscription_id);
        if subscriptions.len() == before {
            return Err(CoordinatorError::SubscriptionNotFound(
                subscription_id.to_string(),
            ));
        }
        Ok(())
    }

    /// Record an event against its correlation id and return everything
    /// seen so far for that id
    pub fn track_correlation(&self, correlation_id: &str, event: BrokerEvent) -> Vec<BrokerEvent> {
        let mut correlations = self.correlations.lock();
        let entries = correlations
            .entry(correlation_id.to_string())
            .or_default();
        entries.push(event);
        entries.clone()
    }

    pub fn correlated_events(&self, correlation_id: &str) -> Vec<BrokerEvent> {
        self.correlations
            .lock()
            .get(correlation_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Poll until `expected` events have arrived for the correlation id,
    /// or the timeout elapses
    pub async fn wait_for_correlation(
        &self,
        correlation_id: &str,
        expected: usize,
        timeout: Duration,
        poll_interval: Duration,
    ) -> CoordinatorResult<Vec<BrokerEvent>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let events = self.correlated_events(correlation_id);
            if events.len() >= expected {
                return Ok(events);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(CoordinatorError::CorrelationTimeout {
                    correlation_id: correlation_id.to_string(),
                    expected,
                    seen: events.len(),
                });
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    pub fn clear_correlation(&self, correlation_id: &str) {
        self.correlations.lock().remove(correlation_id);
    }

    pub fn dead_letters(&self) -> Vec<BrokerEvent> {
        self.dead_letters.lock().clone()
    }

    fn matches(pattern: &str, key: &str) -> bool {
        pattern == "#" || pattern == key
    }
}

#[async_trait]
impl EventCoordinator for InMemoryCoordinator {
    async fn publish(
        &self,
        event: BrokerEvent,
        routing_key: Option<&str>,
    ) -> CoordinatorResult<bool> {
        let key = routing_key.unwrap_or_else(|| event.routing_key()).to_string();
        self.track_correlation(&event.correlation_id, event.clone());

        let subscriptions = self.subscriptions.lock();
        let broadcast = key.is_empty();
        let mut delivered = false;
        for entry in subscriptions.iter() {
            if broadcast || Self::matches(&entry.pattern, &key) {
                match entry.sender.send(event.clone()) {
                    Ok(()) => delivered = true,
                    Err(_) => {
                        warn!(
                            subscription = %entry.id,
                            "receiver dropped; dead-lettering message"
                        );
                        self.dead_letters.lock().push(event.clone());
                    }
                }
            }
        }

        debug!(
            event_type = %event.event_type,
            routing_key = %key,
            delivered,
            "event published"
        );
        Ok(delivered)
    }

    fn dead_letter_queue(&self) -> String {
        format!("{}.dlq", self.exchange_name)
    }
}
