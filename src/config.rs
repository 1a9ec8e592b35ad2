//! Webhook pipeline configuration.

use std::env;

use crate::error::WebhookError;

/// Configuration shared by the publisher and the receiver.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Shared HMAC secret used to sign outbound envelopes and verify
    /// inbound ones.
    pub secret: String,
    /// Name of the service emitting events (`metadata.source`).
    pub source: String,
    /// Deployment environment (`metadata.environment`).
    pub environment: String,
}

impl WebhookConfig {
    /// Create a configuration with default source and environment.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            source: "ms-producto".to_string(),
            environment: "development".to_string(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `WEBHOOK_SECRET`: shared HMAC signing secret
    ///
    /// Optional:
    /// - `WEBHOOK_SOURCE`: emitting service name (default: "ms-producto")
    /// - `WEBHOOK_ENVIRONMENT`: deployment environment (default: "development")
    pub fn from_env() -> Result<Self, WebhookError> {
        let secret = env::var("WEBHOOK_SECRET").map_err(|_| WebhookError::ConfigMissing {
            var: "WEBHOOK_SECRET".to_string(),
        })?;

        let mut config = Self::new(secret);
        if let Ok(source) = env::var("WEBHOOK_SOURCE") {
            config.source = source;
        }
        if let Ok(environment) = env::var("WEBHOOK_ENVIRONMENT") {
            config.environment = environment;
        }
        Ok(config)
    }

    /// Set the emitting service name.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Set the deployment environment.
    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }
}
