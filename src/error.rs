//! Error types for the webhook pipeline.

use thiserror::Error;

/// Webhook pipeline error variants.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Required configuration variable is missing.
    #[error("Configuration missing: {var}")]
    ConfigMissing { var: String },

    /// Envelope payload could not be serialized to JSON.
    #[error("Failed to serialize envelope for event {event_type}: {cause}")]
    Serialization { event_type: String, cause: String },

    /// The idempotency key was already claimed.
    ///
    /// Distinct from a generic store failure so callers can treat it as
    /// "someone else already processed this" and short-circuit instead of
    /// re-applying the side effect.
    #[error("Idempotency key already registered: {key}")]
    DuplicateIdempotencyKey { key: String },

    /// A store operation failed.
    #[error("Store operation failed: {0}")]
    Store(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
