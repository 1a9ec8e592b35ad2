//! Signed event envelope sent to webhook subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto;
use crate::error::WebhookError;

/// Current envelope schema version.
pub const ENVELOPE_VERSION: &str = "1.0";

/// Metadata attached to every envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Service that emitted the event.
    pub source: String,
    /// Deployment environment of the emitter.
    pub environment: String,
    /// Correlation id for tracing the triggering request.
    pub correlation_id: String,
}

/// The versioned event payload sent to subscribers.
///
/// Serialization is canonical: struct fields serialize in declaration
/// order and `serde_json` maps keep sorted key order, so the same
/// envelope always produces the same bytes. The signature contract
/// depends on this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    /// Event type tag, e.g. "producto.reservado".
    pub event: String,
    /// Schema version.
    pub version: String,
    /// Globally-unique event identifier.
    pub id: String,
    /// Deterministic dedup token (see [`crate::keys::idempotency_key`]).
    pub idempotency_key: String,
    /// Event creation instant.
    pub timestamp: DateTime<Utc>,
    /// Opaque event-specific payload.
    pub data: serde_json::Value,
    /// Emitter metadata.
    pub metadata: EventMetadata,
}

/// An envelope frozen to its exact signed bytes.
///
/// Every delivery attempt posts `body` verbatim so the subscriber can
/// verify `signature` against the raw request body it received.
#[derive(Debug)]
pub struct SignedEnvelope {
    pub envelope: WebhookEnvelope,
    pub body: Vec<u8>,
    pub signature: String,
}

impl WebhookEnvelope {
    /// Serialize and sign the envelope. The envelope is immutable from
    /// here on: the returned bytes are what goes on the wire.
    pub fn into_signed(self, secret: &str) -> Result<SignedEnvelope, WebhookError> {
        let body = serde_json::to_vec(&self).map_err(|e| WebhookError::Serialization {
            event_type: self.event.clone(),
            cause: e.to_string(),
        })?;
        let signature = crypto::sign(&body, secret);

        Ok(SignedEnvelope {
            envelope: self,
            body,
            signature,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
