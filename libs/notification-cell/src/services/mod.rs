pub mod log;
pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;

use shared_config::AppConfig;

use crate::models::NotificationError;

pub use log::LogNotifier;
pub use webhook::WebhookNotifier;

/// Delivers a plain-text message to an address.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, address: &str, message: &str) -> Result<(), NotificationError>;
}

/// Webhook delivery when configured, otherwise log-only.
pub fn notifier_from_config(config: &AppConfig) -> Arc<dyn Notifier> {
    if config.is_notification_configured() {
        Arc::new(WebhookNotifier::new(config))
    } else {
        Arc::new(LogNotifier)
    }
}
