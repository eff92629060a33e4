pub mod models;
pub mod services;

pub use models::{NotificationError, OutboundMessage};
pub use services::{notifier_from_config, LogNotifier, Notifier, WebhookNotifier};
