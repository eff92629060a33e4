use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;

use crate::models::{NotificationError, OutboundMessage};
use crate::services::Notifier;

const SUBJECT: &str = "Clinic appointment notification";

/// Posts messages as JSON to an HTTP email relay.
pub struct WebhookNotifier {
    client: Client,
    url: String,
    api_key: String,
    sender: String,
}

impl WebhookNotifier {
    /// Deliveries that take longer than `notification_timeout_secs` fail.
    pub fn new(config: &AppConfig) -> Self {
        let timeout = Duration::from_secs(config.notification_timeout_secs.max(1));
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Notification client setup failed, using defaults: {}", e);
                Client::new()
            });

        Self {
            client,
            url: config.notification_webhook_url.clone(),
            api_key: config.notification_api_key.clone(),
            sender: config.notification_sender.clone(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, address: &str, message: &str) -> Result<(), NotificationError> {
        if address.trim().is_empty() {
            return Err(NotificationError::MissingAddress);
        }

        let body = OutboundMessage {
            from: self.sender.clone(),
            to: address.to_string(),
            subject: SUBJECT.to_string(),
            text: message.to_string(),
        };

        debug!("Posting notification for {} to {}", address, self.url);

        let mut request = self.client.post(&self.url).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotificationError::DeliveryFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("Notification relay rejected message ({}): {}", status, text);
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }

        info!("Notification delivered to {}", address);
        Ok(())
    }
}
