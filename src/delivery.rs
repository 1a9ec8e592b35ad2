//! Webhook delivery engine.
//!
//! One [`DeliveryService::deliver`] call owns the full retry timeline for
//! a single (event, subscriber) pair: HTTP attempts, outcome recording,
//! backoff scheduling, and dead-lettering on exhaustion. Attempts within
//! a timeline are strictly sequential; timelines for different
//! subscribers run as independent tasks.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use uuid::Uuid;

use crate::clock::Clock;
use crate::envelope::SignedEnvelope;
use crate::error::WebhookError;
use crate::store::{
    AttemptStatus, DeadLetterEntry, DeadLetterStore, DeliveryAttempt, DeliveryLog, Subscription,
    SubscriptionDirectory,
};

/// Maximum delivery attempts per (event, subscriber) pair: one initial
/// attempt plus 5 retries.
pub const MAX_DELIVERY_ATTEMPTS: usize = 6;

/// Per-attempt HTTP timeout.
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum response body snapshot kept per attempt.
const RESPONSE_BODY_LIMIT: usize = 4096;

/// Backoff schedule indexed by 0-based attempt number: 1min, 5min,
/// 30min, 2hr, 12hr, 24hr. The sixth attempt is always terminal, so the
/// last entry is never consulted; the table mirrors the six-slot retry
/// constant it ships with.
pub const RETRY_DELAYS_SECS: [i64; 6] = [60, 300, 1800, 7200, 43200, 86400];

/// Delay before the retry that follows `attempt` (0-based), or `None`
/// when the timeline is exhausted.
pub fn retry_delay(attempt: usize) -> Option<Duration> {
    if attempt + 1 >= MAX_DELIVERY_ATTEMPTS {
        return None;
    }
    RETRY_DELAYS_SECS
        .get(attempt)
        .map(|secs| Duration::from_secs(*secs as u64))
}

/// Engine for delivering signed envelopes to subscriber endpoints.
#[derive(Clone)]
pub struct DeliveryService {
    http_client: Client,
    directory: Arc<dyn SubscriptionDirectory>,
    delivery_log: Arc<dyn DeliveryLog>,
    dead_letters: Arc<dyn DeadLetterStore>,
    clock: Arc<dyn Clock>,
}

/// Outcome of one attempt, driving the timeline loop.
enum AttemptOutcome {
    Delivered,
    Retry { delay: Duration },
    Exhausted { error: String },
}

impl DeliveryService {
    /// Create a new delivery engine with a shared HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::Internal` if the HTTP client cannot be
    /// built.
    pub fn new(
        directory: Arc<dyn SubscriptionDirectory>,
        delivery_log: Arc<dyn DeliveryLog>,
        dead_letters: Arc<dyn DeadLetterStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, WebhookError> {
        let http_client = Client::builder()
            .timeout(ATTEMPT_TIMEOUT)
            .user_agent("pulpo-webhooks/1.0")
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| WebhookError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            directory,
            delivery_log,
            dead_letters,
            clock,
        })
    }

    /// Run the full delivery timeline for one (event, subscriber) pair.
    ///
    /// Returns when the timeline reaches `delivered` or `dead-lettered`,
    /// or aborts because the subscription vanished. Never returns an
    /// error: every failure on this path is recorded or logged.
    pub async fn deliver(&self, signed: Arc<SignedEnvelope>, subscription_id: Uuid) {
        for attempt in 0..MAX_DELIVERY_ATTEMPTS {
            // Re-resolve the endpoint on every attempt: the target may
            // have been rotated between retries.
            let subscription = match self.directory.find_by_id(subscription_id).await {
                Ok(Some(sub)) => sub,
                Ok(None) => {
                    tracing::error!(
                        target: "webhook_delivery",
                        event_id = %signed.envelope.id,
                        subscription_id = %subscription_id,
                        attempt_number = attempt + 1,
                        "Subscription vanished mid-timeline, stopping without DLQ entry"
                    );
                    return;
                }
                Err(e) => {
                    tracing::error!(
                        target: "webhook_delivery",
                        event_id = %signed.envelope.id,
                        subscription_id = %subscription_id,
                        error = %e,
                        "Failed to resolve subscription, stopping timeline"
                    );
                    return;
                }
            };

            match self.execute_attempt(&signed, &subscription, attempt).await {
                AttemptOutcome::Delivered => return,
                AttemptOutcome::Exhausted { error } => {
                    self.dead_letter(&signed, &subscription, &error).await;
                    return;
                }
                AttemptOutcome::Retry { delay } => {
                    self.clock.sleep(delay).await;
                }
            }
        }
    }

    /// Execute a single HTTP attempt and classify the outcome.
    async fn execute_attempt(
        &self,
        signed: &SignedEnvelope,
        subscription: &Subscription,
        attempt: usize,
    ) -> AttemptOutcome {
        let attempt_number = (attempt + 1) as i32;
        let timestamp = self.clock.now().timestamp().to_string();

        tracing::debug!(
            target: "webhook_delivery",
            event_id = %signed.envelope.id,
            subscription_id = %subscription.id,
            url = %subscription.url,
            attempt_number,
            max_attempts = MAX_DELIVERY_ATTEMPTS,
            "Sending webhook"
        );

        let result = self
            .http_client
            .post(&subscription.url)
            .header("Content-Type", "application/json")
            .header("X-Webhook-Signature", &signed.signature)
            .header("X-Webhook-Timestamp", &timestamp)
            .body(signed.body.clone())
            .send()
            .await;

        match result {
            Ok(response) => {
                let status_code = response.status().as_u16();
                let body: String = response
                    .text()
                    .await
                    .unwrap_or_default()
                    .chars()
                    .take(RESPONSE_BODY_LIMIT)
                    .collect();

                if (200..300).contains(&status_code) {
                    tracing::info!(
                        target: "webhook_delivery",
                        event_id = %signed.envelope.id,
                        event_type = %signed.envelope.event,
                        subscription_id = %subscription.id,
                        status_code,
                        attempt_number,
                        "Webhook delivered"
                    );
                    self.record_attempt(DeliveryAttempt {
                        subscription_id: subscription.id,
                        event_id: signed.envelope.id.clone(),
                        attempt_number,
                        status: AttemptStatus::Success,
                        status_code: Some(status_code),
                        error_message: None,
                        response_body: Some(body),
                        delivered_at: self.clock.now(),
                        next_retry_at: None,
                    })
                    .await;
                    AttemptOutcome::Delivered
                } else {
                    self.handle_failure(
                        signed,
                        subscription,
                        attempt,
                        format!("HTTP {status_code}"),
                        Some(status_code),
                        Some(body),
                    )
                    .await
                }
            }
            Err(e) => {
                let error_message = if e.is_timeout() {
                    "Request timeout (10s)".to_string()
                } else if e.is_connect() {
                    format!("Connection failed: {e}")
                } else {
                    format!("Request error: {e}")
                };

                self.handle_failure(signed, subscription, attempt, error_message, None, None)
                    .await
            }
        }
    }

    /// Record a failed attempt and decide between retry and exhaustion.
    async fn handle_failure(
        &self,
        signed: &SignedEnvelope,
        subscription: &Subscription,
        attempt: usize,
        error_message: String,
        status_code: Option<u16>,
        response_body: Option<String>,
    ) -> AttemptOutcome {
        let attempt_number = (attempt + 1) as i32;
        let delay = retry_delay(attempt);
        let next_retry_at = delay.map(|d| {
            self.clock.now() + chrono::Duration::seconds(d.as_secs() as i64)
        });

        tracing::warn!(
            target: "webhook_delivery",
            event_id = %signed.envelope.id,
            event_type = %signed.envelope.event,
            subscription_id = %subscription.id,
            error = %error_message,
            attempt_number,
            has_next_retry = delay.is_some(),
            "Webhook delivery failed"
        );

        self.record_attempt(DeliveryAttempt {
            subscription_id: subscription.id,
            event_id: signed.envelope.id.clone(),
            attempt_number,
            status: if delay.is_some() {
                AttemptStatus::RetryScheduled
            } else {
                AttemptStatus::Failed
            },
            status_code,
            error_message: Some(error_message.clone()),
            response_body,
            delivered_at: self.clock.now(),
            next_retry_at,
        })
        .await;

        match delay {
            Some(delay) => AttemptOutcome::Retry { delay },
            None => AttemptOutcome::Exhausted {
                error: error_message,
            },
        }
    }

    /// Append to the delivery log. Failures are logged, never fatal.
    async fn record_attempt(&self, attempt: DeliveryAttempt) {
        if let Err(e) = self.delivery_log.record(attempt).await {
            tracing::error!(
                target: "webhook_delivery",
                error = %e,
                "Failed to record delivery attempt"
            );
        }
    }

    /// File the exhausted timeline to the dead letter store.
    async fn dead_letter(&self, signed: &SignedEnvelope, subscription: &Subscription, error: &str) {
        tracing::error!(
            target: "dlq",
            event_id = %signed.envelope.id,
            subscription_id = %subscription.id,
            error = %error,
            "Webhook failed after {MAX_DELIVERY_ATTEMPTS} attempts, moving to DLQ"
        );

        let entry = DeadLetterEntry {
            subscription_id: subscription.id,
            event_id: signed.envelope.id.clone(),
            payload: serde_json::json!({
                "url": subscription.url,
                "error": error,
            }),
            error_reason: format!("Failed after {MAX_DELIVERY_ATTEMPTS} attempts: {error}"),
            status: "pending".to_string(),
            created_at: self.clock.now(),
        };

        if let Err(e) = self.dead_letters.insert(entry).await {
            tracing::error!(
                target: "dlq",
                event_id = %signed.envelope.id,
                subscription_id = %subscription.id,
                error = %e,
                "Failed to write dead letter entry"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
