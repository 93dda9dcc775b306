//! Outbound reply delivery.

use drip_faucet::ReplySink;
use tracing::{info, warn};

/// Delivers asynchronous worker replies to the chat platform's
/// outbound webhook. Without a configured webhook the reply is only
/// logged, which is enough for local operation.
pub struct WebhookSink {
    client: reqwest::Client,
    webhook: Option<String>,
    channel: String,
}

impl WebhookSink {
    pub fn new(webhook: Option<String>, channel: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook,
            channel,
        }
    }
}

impl ReplySink for WebhookSink {
    fn post(&self, text: String) {
        let Some(webhook) = self.webhook.clone() else {
            info!(channel = %self.channel, %text, "outbound reply");
            return;
        };

        let client = self.client.clone();
        let channel = self.channel.clone();
        tokio::spawn(async move {
            let payload = serde_json::json!({ "channel": channel, "text": text });
            let result = client.post(&webhook).json(&payload).send().await;
            match result {
                Ok(response) if response.status().is_success() => {}
                Ok(response) => {
                    warn!(status = %response.status(), "outbound webhook rejected reply")
                }
                Err(error) => warn!(%error, "outbound webhook delivery failed"),
            }
        });
    }
}
