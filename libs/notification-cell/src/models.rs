use serde::{Deserialize, Serialize};

/// Body posted to the delivery webhook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboundMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum NotificationError {
    #[error("Recipient address is empty")]
    MissingAddress,

    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Delivery rejected ({status}): {body}")]
    Rejected { status: u16, body: String },
}
