//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;
use wiremock::{Request, Respond, ResponseTemplate};

use pulpo_webhooks::clock::Clock;
use pulpo_webhooks::config::WebhookConfig;
use pulpo_webhooks::delivery::DeliveryService;
use pulpo_webhooks::envelope::{EventMetadata, SignedEnvelope, WebhookEnvelope, ENVELOPE_VERSION};
use pulpo_webhooks::error::WebhookError;
use pulpo_webhooks::keys;
use pulpo_webhooks::publisher::EventPublisher;
use pulpo_webhooks::store::memory::{
    InMemoryDeadLetterStore, InMemoryDeliveryLog, InMemoryEventStore,
    InMemorySubscriptionDirectory,
};
use pulpo_webhooks::store::{Subscription, SubscriptionDirectory};

pub const SECRET: &str = "whsec_test_secret_key_12345";

/// Fixed virtual start instant for deterministic timelines.
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap()
}

pub fn subscription(event_type: &str, url: &str) -> Subscription {
    Subscription {
        id: Uuid::new_v4(),
        event_type: event_type.to_string(),
        url: url.to_string(),
        is_active: true,
    }
}

/// Build a signed envelope without going through the publisher.
pub fn signed_envelope(event_type: &str, data: serde_json::Value) -> SignedEnvelope {
    let timestamp = start_time();
    WebhookEnvelope {
        event: event_type.to_string(),
        version: ENVELOPE_VERSION.to_string(),
        id: keys::new_event_id(),
        idempotency_key: keys::idempotency_key(
            event_type,
            &keys::primary_subject_id(&data),
            &timestamp.to_rfc3339(),
        ),
        timestamp,
        data,
        metadata: EventMetadata {
            source: "ms-producto".to_string(),
            environment: "test".to_string(),
            correlation_id: "req_test".to_string(),
        },
    }
    .into_signed(SECRET)
    .unwrap()
}

// ---------------------------------------------------------------------------
// Virtual clock
// ---------------------------------------------------------------------------

/// Clock whose sleeps complete immediately while advancing virtual time,
/// recording every requested wait. Lets the multi-day retry schedule run
/// in milliseconds and be asserted exactly.
pub struct TestClock {
    now: Mutex<DateTime<Utc>>,
    waits: Mutex<Vec<Duration>>,
}

impl TestClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
            waits: Mutex::new(Vec::new()),
        }
    }

    /// Every wait requested so far, in order.
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        {
            let mut now = self.now.lock().unwrap();
            *now += chrono::Duration::from_std(duration).unwrap();
            self.waits.lock().unwrap().push(duration);
        }
        tokio::task::yield_now().await;
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Fully wired pipeline over in-memory stores and a virtual clock.
pub struct TestHarness {
    pub directory: Arc<InMemorySubscriptionDirectory>,
    pub events: Arc<InMemoryEventStore>,
    pub delivery_log: Arc<InMemoryDeliveryLog>,
    pub dead_letters: Arc<InMemoryDeadLetterStore>,
    pub clock: Arc<TestClock>,
    pub publisher: EventPublisher,
}

impl TestHarness {
    pub fn new() -> Self {
        let config = WebhookConfig::new(SECRET).with_environment("test");
        let directory = Arc::new(InMemorySubscriptionDirectory::new());
        let events = Arc::new(InMemoryEventStore::new());
        let delivery_log = Arc::new(InMemoryDeliveryLog::new());
        let dead_letters = Arc::new(InMemoryDeadLetterStore::new());
        let clock = Arc::new(TestClock::new(start_time()));

        let delivery = DeliveryService::new(
            directory.clone(),
            delivery_log.clone(),
            dead_letters.clone(),
            clock.clone(),
        )
        .unwrap();

        let publisher = EventPublisher::new(
            config,
            directory.clone(),
            events.clone(),
            delivery,
            clock.clone(),
        );

        Self {
            directory,
            events,
            delivery_log,
            dead_letters,
            clock,
            publisher,
        }
    }
}

// ---------------------------------------------------------------------------
// Responders
// ---------------------------------------------------------------------------

/// Responds 500 for the first `failures` requests, then 200.
pub struct FlakyResponder {
    failures: usize,
    hits: AtomicUsize,
}

impl FlakyResponder {
    pub fn new(failures: usize) -> Self {
        Self {
            failures,
            hits: AtomicUsize::new(0),
        }
    }
}

impl Respond for FlakyResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let hit = self.hits.fetch_add(1, Ordering::SeqCst);
        if hit < self.failures {
            ResponseTemplate::new(500).set_body_string("upstream error")
        } else {
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true}))
        }
    }
}

/// Always responds with `status`, counting hits.
pub struct CountingResponder {
    status: u16,
    hits: Arc<AtomicUsize>,
}

impl CountingResponder {
    pub fn new(status: u16) -> (Self, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        (
            Self {
                status,
                hits: hits.clone(),
            },
            hits,
        )
    }
}

impl Respond for CountingResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.hits.fetch_add(1, Ordering::SeqCst);
        ResponseTemplate::new(self.status)
    }
}

// ---------------------------------------------------------------------------
// Scripted directories
// ---------------------------------------------------------------------------

/// Directory whose subscription disappears after `visible_reads` lookups.
pub struct VanishingDirectory {
    subscription: Subscription,
    visible_reads: usize,
    reads: AtomicUsize,
}

impl VanishingDirectory {
    pub fn new(subscription: Subscription, visible_reads: usize) -> Self {
        Self {
            subscription,
            visible_reads,
            reads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SubscriptionDirectory for VanishingDirectory {
    async fn list_active_by_event_type(
        &self,
        event_type: &str,
    ) -> Result<Vec<Subscription>, WebhookError> {
        Ok(if self.subscription.event_type == event_type {
            vec![self.subscription.clone()]
        } else {
            Vec::new()
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Subscription>, WebhookError> {
        if id != self.subscription.id {
            return Ok(None);
        }
        let read = self.reads.fetch_add(1, Ordering::SeqCst);
        Ok((read < self.visible_reads).then(|| self.subscription.clone()))
    }
}

/// Directory that serves `subscription.url` on the first lookup and
/// `second_url` on every lookup after that.
pub struct RotatingDirectory {
    subscription: Subscription,
    second_url: String,
    reads: AtomicUsize,
}

impl RotatingDirectory {
    pub fn new(subscription: Subscription, second_url: impl Into<String>) -> Self {
        Self {
            subscription,
            second_url: second_url.into(),
            reads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SubscriptionDirectory for RotatingDirectory {
    async fn list_active_by_event_type(
        &self,
        event_type: &str,
    ) -> Result<Vec<Subscription>, WebhookError> {
        Ok(if self.subscription.event_type == event_type {
            vec![self.subscription.clone()]
        } else {
            Vec::new()
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Subscription>, WebhookError> {
        if id != self.subscription.id {
            return Ok(None);
        }
        let read = self.reads.fetch_add(1, Ordering::SeqCst);
        let mut sub = self.subscription.clone();
        if read > 0 {
            sub.url = self.second_url.clone();
        }
        Ok(Some(sub))
    }
}
