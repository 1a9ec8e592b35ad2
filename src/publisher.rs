//! Event publisher: envelope construction, signing, audit, and fanout.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::config::WebhookConfig;
use crate::delivery::DeliveryService;
use crate::envelope::{EventMetadata, WebhookEnvelope, ENVELOPE_VERSION};
use crate::keys;
use crate::store::{EventRecord, EventStore, SubscriptionDirectory};

/// Handle for one publish call.
///
/// Holds the task handle of every delivery timeline the publish
/// launched. Dropping the receipt detaches the tasks (they run to
/// completion on their own); [`PublishReceipt::join_all`] observes them,
/// which tests rely on.
pub struct PublishReceipt {
    pub event_id: String,
    pub idempotency_key: String,
    pub handles: Vec<JoinHandle<()>>,
}

impl PublishReceipt {
    /// Wait for every delivery timeline launched by this publish.
    pub async fn join_all(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

/// Publishes domain events to all active subscribers for their type.
#[derive(Clone)]
pub struct EventPublisher {
    config: WebhookConfig,
    directory: Arc<dyn SubscriptionDirectory>,
    events: Arc<dyn EventStore>,
    delivery: DeliveryService,
    clock: Arc<dyn Clock>,
}

impl EventPublisher {
    /// Create a new publisher.
    pub fn new(
        config: WebhookConfig,
        directory: Arc<dyn SubscriptionDirectory>,
        events: Arc<dyn EventStore>,
        delivery: DeliveryService,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            directory,
            events,
            delivery,
            clock,
        }
    }

    /// Publish one event: build and sign the envelope, persist it for
    /// audit, and launch one independent delivery timeline per active
    /// subscriber.
    ///
    /// Returns once fanout has been launched, never once it has been
    /// delivered. Nothing on this path raises to the caller: downstream
    /// failures are the delivery engine's to record, and a failed audit
    /// insert is logged without gating delivery.
    pub async fn publish(
        &self,
        event_type: &str,
        data: serde_json::Value,
        metadata: Option<EventMetadata>,
    ) -> PublishReceipt {
        let event_id = keys::new_event_id();
        let now = self.clock.now();
        let idempotency_key = keys::idempotency_key(
            event_type,
            &keys::primary_subject_id(&data),
            &now.to_rfc3339(),
        );

        let metadata = metadata.unwrap_or_else(|| EventMetadata {
            source: self.config.source.clone(),
            environment: self.config.environment.clone(),
            correlation_id: format!("req_{}", now.timestamp_millis()),
        });

        let envelope = WebhookEnvelope {
            event: event_type.to_string(),
            version: ENVELOPE_VERSION.to_string(),
            id: event_id.clone(),
            idempotency_key: idempotency_key.clone(),
            timestamp: now,
            data,
            metadata,
        };

        let signed = match envelope.into_signed(&self.config.secret) {
            Ok(signed) => Arc::new(signed),
            Err(e) => {
                // Unserializable payload is a permanent precondition
                // failure: nothing can be delivered.
                tracing::error!(
                    target: "webhook_delivery",
                    event_id = %event_id,
                    event_type,
                    error = %e,
                    "Failed to serialize envelope, publish aborted"
                );
                return PublishReceipt {
                    event_id,
                    idempotency_key,
                    handles: Vec::new(),
                };
            }
        };

        // Audit is best-effort: delivery is not gated on it.
        let record = EventRecord {
            event_id: event_id.clone(),
            event_type: event_type.to_string(),
            idempotency_key: idempotency_key.clone(),
            payload: serde_json::to_value(&signed.envelope).unwrap_or_default(),
            metadata: serde_json::to_value(&signed.envelope.metadata).unwrap_or_default(),
            received_at: now,
            status: "pending".to_string(),
        };
        if let Err(e) = self.events.insert(record).await {
            tracing::error!(
                target: "webhook_delivery",
                event_id = %event_id,
                error = %e,
                "Failed to persist event audit record"
            );
        }

        let subscriptions = match self.directory.list_active_by_event_type(event_type).await {
            Ok(subs) => subs,
            Err(e) => {
                tracing::error!(
                    target: "webhook_delivery",
                    event_id = %event_id,
                    event_type,
                    error = %e,
                    "Failed to query matching subscriptions"
                );
                return PublishReceipt {
                    event_id,
                    idempotency_key,
                    handles: Vec::new(),
                };
            }
        };

        if subscriptions.is_empty() {
            tracing::warn!(
                target: "webhook_delivery",
                event_id = %event_id,
                event_type,
                "No active subscriptions match event type"
            );
            return PublishReceipt {
                event_id,
                idempotency_key,
                handles: Vec::new(),
            };
        }

        tracing::info!(
            target: "webhook_delivery",
            event_id = %event_id,
            event_type,
            subscription_count = subscriptions.len(),
            "Publishing event to matching subscriptions"
        );

        // One independent task per subscriber; a failure in one timeline
        // never affects another's.
        let mut handles = Vec::with_capacity(subscriptions.len());
        for subscription in subscriptions {
            if !subscription.is_active {
                continue;
            }
            let delivery = self.delivery.clone();
            let signed = Arc::clone(&signed);
            let subscription_id = subscription.id;
            handles.push(tokio::spawn(async move {
                delivery.deliver(signed, subscription_id).await;
            }));
        }

        PublishReceipt {
            event_id,
            idempotency_key,
            handles,
        }
    }
}
