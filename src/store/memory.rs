//! In-memory store implementations.
//!
//! Single-process implementations of the repository traits, used by
//! tests and demos. All of them accept concurrent writers; the
//! idempotency store does its check-and-insert under one lock so
//! concurrent registrations of the same key resolve to exactly one
//! winner.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::{
    DeadLetterEntry, DeadLetterStore, DeliveryAttempt, DeliveryLog, EventRecord, EventStore,
    IdempotencyStore, Subscription, SubscriptionDirectory,
};
use crate::error::WebhookError;

// ---------------------------------------------------------------------------
// Subscription directory
// ---------------------------------------------------------------------------

/// In-memory subscription directory.
#[derive(Debug, Default)]
pub struct InMemorySubscriptionDirectory {
    subscriptions: Mutex<HashMap<Uuid, Subscription>>,
}

impl InMemorySubscriptionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a subscription.
    pub fn insert(&self, subscription: Subscription) {
        self.subscriptions
            .lock()
            .unwrap()
            .insert(subscription.id, subscription);
    }

    /// Rotate a subscription's endpoint. Takes effect on the next
    /// delivery attempt because the engine re-reads per attempt.
    pub fn set_url(&self, id: Uuid, url: impl Into<String>) {
        if let Some(sub) = self.subscriptions.lock().unwrap().get_mut(&id) {
            sub.url = url.into();
        }
    }

    /// Remove a subscription entirely.
    pub fn remove(&self, id: Uuid) {
        self.subscriptions.lock().unwrap().remove(&id);
    }
}

#[async_trait]
impl SubscriptionDirectory for InMemorySubscriptionDirectory {
    async fn list_active_by_event_type(
        &self,
        event_type: &str,
    ) -> Result<Vec<Subscription>, WebhookError> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.is_active && s.event_type == event_type)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Subscription>, WebhookError> {
        Ok(self.subscriptions.lock().unwrap().get(&id).cloned())
    }
}

// ---------------------------------------------------------------------------
// Event audit store
// ---------------------------------------------------------------------------

/// In-memory event audit store.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    records: Mutex<Vec<EventRecord>>,
    fail_inserts: AtomicBool,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, in insertion order.
    pub fn records(&self) -> Vec<EventRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Make subsequent inserts fail, for exercising the best-effort
    /// audit path.
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn insert(&self, record: EventRecord) -> Result<(), WebhookError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(WebhookError::Store("event store unavailable".to_string()));
        }
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Delivery attempt log
// ---------------------------------------------------------------------------

/// In-memory append-only delivery log.
#[derive(Debug, Default)]
pub struct InMemoryDeliveryLog {
    attempts: Mutex<Vec<DeliveryAttempt>>,
}

impl InMemoryDeliveryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded attempts, in insertion order.
    pub fn attempts(&self) -> Vec<DeliveryAttempt> {
        self.attempts.lock().unwrap().clone()
    }

    /// Attempts for one (event, subscriber) timeline, in order.
    pub fn attempts_for(&self, event_id: &str, subscription_id: Uuid) -> Vec<DeliveryAttempt> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.event_id == event_id && a.subscription_id == subscription_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl DeliveryLog for InMemoryDeliveryLog {
    async fn record(&self, attempt: DeliveryAttempt) -> Result<(), WebhookError> {
        self.attempts.lock().unwrap().push(attempt);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Dead letter store
// ---------------------------------------------------------------------------

/// In-memory dead letter store.
#[derive(Debug, Default)]
pub struct InMemoryDeadLetterStore {
    entries: Mutex<Vec<DeadLetterEntry>>,
}

impl InMemoryDeadLetterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All dead-lettered entries, in insertion order.
    pub fn entries(&self) -> Vec<DeadLetterEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeadLetterStore for InMemoryDeadLetterStore {
    async fn insert(&self, entry: DeadLetterEntry) -> Result<(), WebhookError> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Idempotency store
// ---------------------------------------------------------------------------

/// In-memory processed-key registry.
#[derive(Debug, Default)]
pub struct InMemoryIdempotencyStore {
    keys: Mutex<HashMap<String, String>>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn exists(&self, key: &str) -> Result<bool, WebhookError> {
        Ok(self.keys.lock().unwrap().contains_key(key))
    }

    async fn register(&self, key: &str, subject_ref: &str) -> Result<(), WebhookError> {
        // Check-and-insert under one lock: the race loser must see the
        // duplicate kind, not overwrite the winner.
        let mut keys = self.keys.lock().unwrap();
        if keys.contains_key(key) {
            return Err(WebhookError::DuplicateIdempotencyKey {
                key: key.to_string(),
            });
        }
        keys.insert(key.to_string(), subject_ref.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
