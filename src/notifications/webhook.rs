//! Webhook text-message gateway
//!
//! Messages are delivered by POSTing a JSON payload to an HTTP gateway that
//! relays them as text messages.

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{NotificationError, Notifier};

/// Webhook gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Gateway endpoint
    pub url: String,
    /// API key sent in the `apikey` header
    pub api_key: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    10
}

impl WebhookConfig {
    /// Create a new gateway configuration
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            timeout_secs: default_timeout(),
        }
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("Gateway URL cannot be empty".to_string());
        }

        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err("Gateway URL must start with http:// or https://".to_string());
        }

        if self.api_key.is_empty() {
            return Err("Gateway API key cannot be empty".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Gateway notifier
///
/// # Payload Format
///
/// ```json
/// {
///   "number": "919800000000",
///   "text": "🎉 Stock Available! ...",
///   "delay": 150
/// }
/// ```
///
/// `delay` is a random 100-200 ms send delay hint for the gateway.
pub struct WebhookNotifier {
    config: WebhookConfig,
    client: Client,
}

impl WebhookNotifier {
    /// Create a new notifier
    pub fn new(config: WebhookConfig) -> Result<Self, NotificationError> {
        config.validate().map_err(NotificationError::InvalidConfig)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NotificationError::Other(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Get the gateway URL
    pub fn url(&self) -> &str {
        &self.config.url
    }

    fn build_payload(&self, phone_number: &str, message: &str) -> serde_json::Value {
        let delay: u32 = rand::thread_rng().gen_range(100..=200);
        serde_json::json!({
            "number": phone_number,
            "text": message,
            "delay": delay,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, phone_number: &str, message: &str) -> Result<(), NotificationError> {
        let payload = self.build_payload(phone_number, message);

        let response = self
            .client
            .post(&self.config.url)
            .header("apikey", &self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(status = %status, "Message accepted by gateway");
        Ok(())
    }
}
