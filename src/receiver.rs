//! Inbound webhook receiver.
//!
//! Implements the consumer contract: signature verification over the raw
//! request body, timestamp replay protection, and idempotent ingest.
//! Duplicates are not errors; they answer 200 with `duplicate: true`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;

use crate::clock::Clock;
use crate::crypto;
use crate::error::WebhookError;
use crate::idempotency::IdempotencyGuard;
use crate::store::{EventRecord, EventStore};

/// Maximum accepted age of an inbound webhook (replay guard).
const MAX_TIMESTAMP_AGE_SECS: i64 = 5 * 60;

/// Maximum tolerated clock skew into the future.
const MAX_FUTURE_SKEW_SECS: i64 = 60;

/// Shared state for the receiver router.
#[derive(Clone)]
pub struct ReceiverState {
    pub secret: String,
    pub events: Arc<dyn EventStore>,
    pub guard: IdempotencyGuard,
    pub clock: Arc<dyn Clock>,
}

/// Build the receiver router: `POST /webhooks`.
pub fn receiver_router(state: ReceiverState) -> Router {
    Router::new()
        .route("/webhooks", post(handle_webhook))
        .with_state(state)
}

async fn handle_webhook(
    State(state): State<ReceiverState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get("x-webhook-signature")
        .and_then(|v| v.to_str().ok());
    let timestamp = headers
        .get("x-webhook-timestamp")
        .and_then(|v| v.to_str().ok());

    let (Some(signature), Some(timestamp)) = (signature, timestamp) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Missing required headers"})),
        )
            .into_response();
    };

    // Signature covers the raw bytes as received, before any parsing.
    if !crypto::verify(&body, signature, &state.secret) {
        tracing::warn!(target: "webhook_receiver", "Invalid webhook signature");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Invalid webhook signature"})),
        )
            .into_response();
    }

    if !timestamp_is_fresh(timestamp, state.clock.now().timestamp()) {
        tracing::warn!(target: "webhook_receiver", timestamp, "Stale or future webhook timestamp");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Invalid or expired timestamp"})),
        )
            .into_response();
    }

    match ingest(&state, &body).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(
                target: "webhook_receiver",
                error = %e,
                "Failed to process inbound webhook"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Internal server error",
                    "details": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

/// Store the event exactly once, keyed by its idempotency key.
async fn ingest(state: &ReceiverState, body: &[u8]) -> Result<Response, WebhookError> {
    let payload: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| WebhookError::Internal(format!("Invalid JSON body: {e}")))?;

    let event_type = str_field(&payload, "event");
    let event_id = str_field(&payload, "id");
    let idempotency_key = str_field(&payload, "idempotency_key");

    if state.guard.exists(&idempotency_key).await? {
        tracing::info!(
            target: "webhook_receiver",
            event_type = %event_type,
            event_id = %event_id,
            idempotency_key = %idempotency_key,
            "Duplicate event ignored"
        );
        return Ok(duplicate_response(&event_id));
    }

    // Claim the key before inserting so two concurrent handlers can
    // never both store the event: the race loser sees the duplicate
    // kind and short-circuits.
    match state.guard.register(&idempotency_key, &event_id).await {
        Ok(()) => {}
        Err(WebhookError::DuplicateIdempotencyKey { .. }) => {
            tracing::info!(
                target: "webhook_receiver",
                idempotency_key = %idempotency_key,
                "Idempotency key claimed concurrently, treating as duplicate"
            );
            return Ok(duplicate_response(&event_id));
        }
        Err(e) => return Err(e),
    }

    let stored_at = state.clock.now();
    state
        .events
        .insert(EventRecord {
            event_id: event_id.clone(),
            event_type: event_type.clone(),
            idempotency_key,
            payload: payload.clone(),
            metadata: payload.get("metadata").cloned().unwrap_or_default(),
            received_at: stored_at,
            status: "processed".to_string(),
        })
        .await?;

    tracing::info!(
        target: "webhook_receiver",
        event_type = %event_type,
        event_id = %event_id,
        "Inbound webhook stored"
    );

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "event_id": event_id,
            "stored_at": stored_at.to_rfc3339(),
        })),
    )
        .into_response())
}

fn duplicate_response(event_id: &str) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "success": false,
            "duplicate": true,
            "event_id": event_id,
            "message": "Event already processed",
        })),
    )
        .into_response()
}

fn str_field(payload: &serde_json::Value, field: &str) -> String {
    payload
        .get(field)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// Accept timestamps at most 5 minutes old and at most 60 seconds into
/// the future (clock skew).
fn timestamp_is_fresh(timestamp: &str, now_secs: i64) -> bool {
    let Ok(request_time) = timestamp.parse::<i64>() else {
        return false;
    };
    let age = now_secs - request_time;
    age <= MAX_TIMESTAMP_AGE_SECS && age >= -MAX_FUTURE_SKEW_SECS
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
