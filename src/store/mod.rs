//! Repository traits and record types for the pipeline's stores.
//!
//! The delivery engine and publisher depend only on these capability
//! contracts; concrete stores are injected. [`memory`] provides
//! single-process implementations; a deployed system swaps in
//! database-backed ones.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WebhookError;

/// A subscriber endpoint registered for one event type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    /// Event type this subscription is registered for.
    pub event_type: String,
    /// Delivery target. Read fresh per attempt, never cached across
    /// retries.
    pub url: String,
    /// Soft-disable flag.
    pub is_active: bool,
}

/// Outcome of a single delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Success,
    RetryScheduled,
    Failed,
}

/// One row per HTTP delivery attempt. Append-only; never mutated after
/// insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub subscription_id: Uuid,
    pub event_id: String,
    /// 1-based attempt counter within the timeline.
    pub attempt_number: i32,
    pub status: AttemptStatus,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
    /// Response body snapshot, truncated.
    pub response_body: Option<String>,
    pub delivered_at: DateTime<Utc>,
    /// When the next attempt is due. `None` on terminal attempts.
    pub next_retry_at: Option<DateTime<Utc>>,
}

/// Terminal record for a delivery that exhausted all retries.
///
/// Created exactly once per (event, subscriber) pair; stays "pending"
/// until reprocessed out of band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub subscription_id: Uuid,
    pub event_id: String,
    /// Last error context.
    pub payload: serde_json::Value,
    pub error_reason: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Audit row for a published or received event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: String,
    pub event_type: String,
    pub idempotency_key: String,
    pub payload: serde_json::Value,
    pub metadata: serde_json::Value,
    pub received_at: DateTime<Utc>,
    pub status: String,
}

/// Lookup of subscriber endpoints.
///
/// Subscription lifecycle is owned out of band; the pipeline only reads.
#[async_trait]
pub trait SubscriptionDirectory: Send + Sync {
    /// Active subscriptions registered for `event_type`.
    async fn list_active_by_event_type(
        &self,
        event_type: &str,
    ) -> Result<Vec<Subscription>, WebhookError>;

    /// Current state of one subscription. The engine calls this fresh on
    /// every delivery attempt so endpoint rotation takes effect
    /// mid-retry.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Subscription>, WebhookError>;
}

/// Append-only event audit store.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn insert(&self, record: EventRecord) -> Result<(), WebhookError>;
}

/// Append-only delivery attempt log.
#[async_trait]
pub trait DeliveryLog: Send + Sync {
    async fn record(&self, attempt: DeliveryAttempt) -> Result<(), WebhookError>;
}

/// Terminal store for exhausted deliveries.
#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    async fn insert(&self, entry: DeadLetterEntry) -> Result<(), WebhookError>;
}

/// Processed-key registry backing the consumer-side idempotency guard.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Whether `key` has already been registered.
    async fn exists(&self, key: &str) -> Result<bool, WebhookError>;

    /// Register `key`, failing with
    /// [`WebhookError::DuplicateIdempotencyKey`] when it is already
    /// present. The check-and-insert must be atomic so the loser of a
    /// concurrent race always observes the duplicate kind.
    async fn register(&self, key: &str, subject_ref: &str) -> Result<(), WebhookError>;
}
