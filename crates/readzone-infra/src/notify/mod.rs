//! Delivery transports for expiration notices.
//!
//! The notifier is generic over `NotificationSender`; [`ConfiguredSender`]
//! picks a concrete transport from configuration at startup.

pub mod log;
pub mod webhook;

use readzone_core::service::notifier::NotificationSender;
use readzone_types::config::NotifierConfig;
use readzone_types::error::NotificationError;
use readzone_types::notification::ExpirationMessage;

pub use log::LogSender;
pub use webhook::WebhookSender;

/// The transport selected by `notifier.webhook_url`: webhook when set, log otherwise.
#[derive(Clone)]
pub enum ConfiguredSender {
    Log(LogSender),
    Webhook(WebhookSender),
}

impl ConfiguredSender {
    pub fn from_config(config: &NotifierConfig) -> Result<Self, NotificationError> {
        match config.webhook_url.as_deref() {
            Some(url) if !url.trim().is_empty() => Ok(Self::Webhook(WebhookSender::new(
                url,
                config.delivery_timeout_ms,
            )?)),
            _ => Ok(Self::Log(LogSender)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Log(_) => "log",
            Self::Webhook(_) => "webhook",
        }
    }
}

impl NotificationSender for ConfiguredSender {
    async fn send(&self, message: &ExpirationMessage) -> Result<(), NotificationError> {
        match self {
            Self::Log(sender) => sender.send(message).await,
            Self::Webhook(sender) => sender.send(message).await,
        }
    }
}
