//! Event identifiers and idempotency keys.

use rand::rngs::OsRng;
use rand::RngCore;

/// Generate a globally-unique event identifier.
///
/// Format: `evt_` + 12 hex characters (6 bytes of OS randomness). There
/// is no collision check; at this scale the probability is negligible.
pub fn new_event_id() -> String {
    let mut bytes = [0u8; 6];
    OsRng.fill_bytes(&mut bytes);
    format!("evt_{}", hex::encode(bytes))
}

/// Derive the deterministic idempotency key for an event.
///
/// `{event_type}-{subject_id}-{timestamp}` with every `.` in the event
/// type replaced by `-` so the key is safe as a storage identifier.
/// Rapid re-triggers of the same subject within one timestamp
/// intentionally collide, deduplicating them downstream.
pub fn idempotency_key(event_type: &str, subject_id: &str, timestamp: &str) -> String {
    format!("{}-{subject_id}-{timestamp}", event_type.replace('.', "-"))
}

/// Extract the primary subject id from an event payload.
///
/// Checks `producto_id`, `detalle_id`, then `id`; falls back to `"0"`
/// when the payload carries none of them.
pub fn primary_subject_id(data: &serde_json::Value) -> String {
    for key in ["producto_id", "detalle_id", "id"] {
        match data.get(key) {
            Some(serde_json::Value::Number(n)) => return n.to_string(),
            Some(serde_json::Value::String(s)) => return s.clone(),
            _ => {}
        }
    }
    "0".to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
