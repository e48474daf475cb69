//! Sender that writes notices to the tracing log. The default when no
//! delivery endpoint is configured.

use readzone_core::service::notifier::NotificationSender;
use readzone_types::error::NotificationError;
use readzone_types::notification::ExpirationMessage;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogSender;

impl NotificationSender for LogSender {
    async fn send(&self, message: &ExpirationMessage) -> Result<(), NotificationError> {
        tracing::info!(
            draft_id = %message.draft_id,
            owner_id = %message.owner_id,
            class = %message.class,
            subject = %message.subject,
            "expiration notice"
        );
        Ok(())
    }
}
