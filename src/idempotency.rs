//! Consumer-side idempotency guard.

use std::sync::Arc;

use crate::error::WebhookError;
use crate::store::IdempotencyStore;

/// Rejects envelopes whose idempotency key was already processed.
///
/// The delivery engine retries, so every receiver WILL see the same
/// envelope (same key) more than once: on transient failure followed by
/// eventual success, or on genuine duplicate fanout. Redelivery must be
/// safe to ignore.
#[derive(Clone)]
pub struct IdempotencyGuard {
    store: Arc<dyn IdempotencyStore>,
}

impl IdempotencyGuard {
    pub fn new(store: Arc<dyn IdempotencyStore>) -> Self {
        Self { store }
    }

    /// Whether `key` has already been processed.
    pub async fn exists(&self, key: &str) -> Result<bool, WebhookError> {
        self.store.exists(key).await
    }

    /// Claim `key` for `subject_ref`.
    ///
    /// A concurrent duplicate surfaces as
    /// [`WebhookError::DuplicateIdempotencyKey`]: the loser of the race
    /// short-circuits as if [`Self::exists`] had returned true and must
    /// not re-apply the side effect.
    pub async fn register(&self, key: &str, subject_ref: &str) -> Result<(), WebhookError> {
        self.store.register(key, subject_ref).await
    }
}
