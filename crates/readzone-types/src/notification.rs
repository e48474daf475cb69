//! Expiration warning classes, notices and rendered messages.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;

use crate::draft::{DraftId, ItemFailure};

/// Graduated warning level for a draft approaching or past expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationClass {
    EarlyWarning,
    FinalWarning,
    Expired,
}

impl NotificationClass {
    /// Classify by time remaining. `None` means the draft is not due a warning.
    ///
    /// ```
    /// use chrono::{Duration, Utc};
    /// use readzone_types::notification::NotificationClass;
    ///
    /// let now = Utc::now();
    /// let class = NotificationClass::classify(now + Duration::hours(30), now, 48, 24);
    /// assert_eq!(class, Some(NotificationClass::EarlyWarning));
    /// ```
    pub fn classify(
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
        early_warning_hours: i64,
        final_warning_hours: i64,
    ) -> Option<Self> {
        let remaining = expires_at - now;
        if remaining <= Duration::zero() {
            Some(NotificationClass::Expired)
        } else if remaining <= Duration::hours(final_warning_hours) {
            Some(NotificationClass::FinalWarning)
        } else if remaining <= Duration::hours(early_warning_hours) {
            Some(NotificationClass::EarlyWarning)
        } else {
            None
        }
    }
}

impl fmt::Display for NotificationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationClass::EarlyWarning => write!(f, "early_warning"),
            NotificationClass::FinalWarning => write!(f, "final_warning"),
            NotificationClass::Expired => write!(f, "expired"),
        }
    }
}

/// A draft due a warning, as surfaced by the expiration scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpirationNotice {
    pub draft_id: DraftId,
    pub owner_id: String,
    /// Book title, else draft title, else "Untitled".
    pub display_title: String,
    pub expires_at: DateTime<Utc>,
    /// Whole hours left, negative once expired.
    pub hours_remaining: i64,
    pub class: NotificationClass,
}

/// A fully-formed message handed to the delivery collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpirationMessage {
    pub draft_id: DraftId,
    pub owner_id: String,
    pub class: NotificationClass,
    pub subject: String,
    pub body: String,
}

impl ExpirationMessage {
    pub fn render(notice: &ExpirationNotice) -> Self {
        let title = &notice.display_title;
        let (subject, body) = match notice.class {
            NotificationClass::EarlyWarning => {
                let days = (notice.hours_remaining + 23) / 24;
                (
                    format!("ReadZone: your review draft of \"{title}\" expires in {days} day(s)"),
                    format!(
                        "Your saved review draft of \"{title}\" will expire on {}.\n\
                         Open the draft to keep working on it; any save extends it by another week.",
                        notice.expires_at.format("%Y-%m-%d %H:%M UTC")
                    ),
                )
            }
            NotificationClass::FinalWarning => (
                format!("ReadZone: your review draft of \"{title}\" expires tomorrow"),
                format!(
                    "Your saved review draft of \"{title}\" expires in about {} hour(s), on {}.\n\
                     Save or publish it now to keep your work.",
                    notice.hours_remaining.max(1),
                    notice.expires_at.format("%Y-%m-%d %H:%M UTC")
                ),
            ),
            NotificationClass::Expired => (
                format!("ReadZone: your review draft of \"{title}\" has expired"),
                format!(
                    "Your saved review draft of \"{title}\" expired on {}.\n\
                     You can still restore it from your drafts until it is cleaned up.",
                    notice.expires_at.format("%Y-%m-%d %H:%M UTC")
                ),
            ),
        };

        Self {
            draft_id: notice.draft_id,
            owner_id: notice.owner_id.clone(),
            class: notice.class,
            subject,
            body,
        }
    }
}

/// Summary of one notification run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationReport {
    pub targets: usize,
    pub sent: usize,
    pub failed: usize,
    /// Duplicate targets skipped because the draft was already notified this run.
    pub suppressed: usize,
    pub errors: Vec<ItemFailure>,
    pub duration_ms: u64,
}
