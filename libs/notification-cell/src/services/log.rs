use async_trait::async_trait;
use tracing::info;

use crate::models::NotificationError;
use crate::services::Notifier;

/// Writes messages to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, address: &str, message: &str) -> Result<(), NotificationError> {
        if address.trim().is_empty() {
            return Err(NotificationError::MissingAddress);
        }

        info!(to = %address, "Notification (not delivered, no webhook configured): {}", message);
        Ok(())
    }
}
