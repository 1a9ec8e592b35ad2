//! Signed webhook delivery pipeline.
//!
//! Producers publish domain events through [`EventPublisher`]; each
//! event is wrapped in a versioned envelope, HMAC-signed, persisted for
//! audit, and fanned out to every active subscriber of its type. The
//! [`DeliveryService`] owns one independent retry timeline per
//! subscriber, following a fixed backoff schedule and dead-lettering on
//! exhaustion. The [`receiver`] module provides the matching consumer
//! side: signature and timestamp verification plus idempotent ingest.
//!
//! Persistence sits behind repository traits in [`store`]; time sits
//! behind [`Clock`]. Both are injected, so the long-horizon retry
//! schedule can be exercised under virtual time.

pub mod clock;
pub mod config;
pub mod crypto;
pub mod delivery;
pub mod envelope;
pub mod error;
pub mod idempotency;
pub mod keys;
pub mod publisher;
pub mod receiver;
pub mod store;

pub use clock::{Clock, SystemClock};
pub use config::WebhookConfig;
pub use delivery::{DeliveryService, MAX_DELIVERY_ATTEMPTS, RETRY_DELAYS_SECS};
pub use envelope::{EventMetadata, SignedEnvelope, WebhookEnvelope};
pub use error::WebhookError;
pub use idempotency::IdempotencyGuard;
pub use publisher::{EventPublisher, PublishReceipt};
pub use receiver::{receiver_router, ReceiverState};
