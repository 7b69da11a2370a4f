//! Delivery transport seam.
//!
//! The dispatcher talks to follower agents through this trait so tests can
//! script failures and slow sinks without a network.

use async_trait::async_trait;
use reqwest::Client;

use shared::SignalEnvelope;

#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    async fn deliver(&self, url: &str, envelope: &SignalEnvelope) -> anyhow::Result<()>;
}

/// Production transport: JSON POST to the subscriber's webhook URL.
/// No client-side timeout here; the dispatcher owns the per-delivery budget.
pub struct WebhookTransport {
    client: Client,
}

impl WebhookTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for WebhookTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryTransport for WebhookTransport {
    async fn deliver(&self, url: &str, envelope: &SignalEnvelope) -> anyhow::Result<()> {
        let response = self.client.post(url).json(envelope).send().await?;
        response.error_for_status()?;
        Ok(())
    }
}
