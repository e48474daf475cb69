//! Expiration notifier.
//!
//! Scans Active drafts nearing or past expiry, classifies them into graduated
//! warnings and hands rendered messages to a delivery collaborator. Read-only
//! with respect to drafts: status flips happen on read or in cleanup, never here.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use chrono::Duration as ChronoDuration;
use readzone_types::book::BookData;
use readzone_types::config::NotifierConfig;
use readzone_types::draft::{Draft, ItemFailure};
use readzone_types::error::NotificationError;
use readzone_types::notification::{
    ExpirationMessage, ExpirationNotice, NotificationClass, NotificationReport,
};

use crate::clock::SharedClock;
use crate::repository::draft::DraftRepository;

/// Delivery transport for rendered messages (email, webhook, log).
pub trait NotificationSender: Send + Sync {
    fn send(
        &self,
        message: &ExpirationMessage,
    ) -> impl std::future::Future<Output = Result<(), NotificationError>> + Send;
}

pub struct ExpirationNotifier<D: DraftRepository, S: NotificationSender> {
    drafts: D,
    sender: S,
    config: NotifierConfig,
    clock: SharedClock,
}

impl<D: DraftRepository, S: NotificationSender> ExpirationNotifier<D, S> {
    pub fn new(drafts: D, sender: S, config: NotifierConfig, clock: SharedClock) -> Self {
        Self {
            drafts,
            sender,
            config,
            clock,
        }
    }

    /// Active drafts inside the early-warning window or already overdue,
    /// soonest first, capped at `max_targets`.
    pub async fn get_expiration_targets(&self) -> Result<Vec<ExpirationNotice>, NotificationError> {
        let now = self.clock.now();
        let cutoff = now + ChronoDuration::hours(self.config.early_warning_hours);
        let drafts = self
            .drafts
            .list_expiring(None, cutoff, self.config.max_targets as i64)
            .await?;

        Ok(drafts
            .iter()
            .filter_map(|draft| {
                let class = NotificationClass::classify(
                    draft.expires_at,
                    now,
                    self.config.early_warning_hours,
                    self.config.final_warning_hours,
                )?;
                Some(notice(draft, class, now))
            })
            .collect())
    }

    /// Scan and deliver one notification per target.
    pub async fn notify_expiring_drafts(&self) -> Result<NotificationReport, NotificationError> {
        let targets = self.get_expiration_targets().await?;
        Ok(self.deliver(targets).await)
    }

    /// Deliver notices, at most one per draft for this call.
    ///
    /// Individual delivery failures and timeouts are collected; the
    /// remaining notices are still sent.
    pub async fn deliver(&self, notices: Vec<ExpirationNotice>) -> NotificationReport {
        let started = Instant::now();
        let budget = Duration::from_millis(self.config.delivery_timeout_ms);
        let mut notified = HashSet::new();
        let mut report = NotificationReport {
            targets: notices.len(),
            ..Default::default()
        };

        for notice in notices {
            if !notified.insert(notice.draft_id) {
                report.suppressed += 1;
                continue;
            }

            let message = ExpirationMessage::render(&notice);
            let outcome = match tokio::time::timeout(budget, self.sender.send(&message)).await {
                Ok(result) => result,
                Err(_) => Err(NotificationError::Timeout(self.config.delivery_timeout_ms)),
            };

            match outcome {
                Ok(()) => {
                    report.sent += 1;
                    tracing::debug!(draft_id = %notice.draft_id, class = %notice.class, "expiration notice sent");
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(draft_id = %notice.draft_id, error = %e, "expiration notice failed");
                    report.errors.push(ItemFailure::new(notice.draft_id, e.to_string()));
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            targets = report.targets,
            sent = report.sent,
            failed = report.failed,
            suppressed = report.suppressed,
            "expiration notification run finished"
        );
        report
    }

    /// The owner's Active drafts expiring within the user warning window.
    pub async fn user_expiration_warnings(
        &self,
        owner_id: &str,
    ) -> Result<Vec<ExpirationNotice>, NotificationError> {
        let now = self.clock.now();
        let cutoff = now + ChronoDuration::hours(self.config.user_warning_hours);
        let drafts = self
            .drafts
            .list_expiring(Some(owner_id), cutoff, self.config.max_targets as i64)
            .await?;

        Ok(drafts
            .iter()
            .map(|draft| {
                let class = NotificationClass::classify(
                    draft.expires_at,
                    now,
                    self.config.early_warning_hours,
                    self.config.final_warning_hours,
                )
                .unwrap_or(NotificationClass::EarlyWarning);
                notice(draft, class, now)
            })
            .collect())
    }
}

fn notice(draft: &Draft, class: NotificationClass, now: chrono::DateTime<chrono::Utc>) -> ExpirationNotice {
    ExpirationNotice {
        draft_id: draft.id,
        owner_id: draft.owner_id.clone(),
        display_title: display_title(draft),
        expires_at: draft.expires_at,
        hours_remaining: draft.hours_until_expiry(now),
        class,
    }
}

/// Book title, else draft title, else "Untitled".
fn display_title(draft: &Draft) -> String {
    draft
        .book_data
        .as_deref()
        .and_then(|raw| BookData::parse(raw).ok())
        .map(|data| data.title.trim().to_string())
        .filter(|title| !title.is_empty())
        .or_else(|| draft.title.clone().filter(|t| !t.trim().is_empty()))
        .unwrap_or_else(|| "Untitled".to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::Utc;
    use readzone_types::draft::{DraftId, DraftStatus};

    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::test_support::{InMemoryStore, sample_draft, with_book_data};

    /// Records messages; fails or stalls for chosen drafts.
    #[derive(Clone, Default)]
    struct RecordingSender {
        sent: Arc<Mutex<Vec<ExpirationMessage>>>,
        failing: Arc<Mutex<HashSet<DraftId>>>,
        stalling: Arc<Mutex<HashSet<DraftId>>>,
    }

    impl NotificationSender for RecordingSender {
        async fn send(&self, message: &ExpirationMessage) -> Result<(), NotificationError> {
            let stall = self.stalling.lock().unwrap().contains(&message.draft_id);
            if stall {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            if self.failing.lock().unwrap().contains(&message.draft_id) {
                return Err(NotificationError::Delivery("mailbox full".to_string()));
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn setup() -> (InMemoryStore, RecordingSender, ExpirationNotifier<InMemoryStore, RecordingSender>, ManualClock) {
        let store = InMemoryStore::new();
        let sender = RecordingSender::default();
        let clock = ManualClock::new(Utc::now());
        let notifier = ExpirationNotifier::new(
            store.clone(),
            sender.clone(),
            NotifierConfig::default(),
            Arc::new(clock.clone()),
        );
        (store, sender, notifier, clock)
    }

    fn seed_expiring(store: &InMemoryStore, clock: &ManualClock, owner: &str, hours: i64) -> Draft {
        let mut draft = sample_draft(owner, clock.now());
        draft.expires_at = clock.now() + ChronoDuration::hours(hours);
        store.seed(draft)
    }

    #[tokio::test]
    async fn test_targets_are_classified() {
        let (store, _, notifier, clock) = setup();
        let early = seed_expiring(&store, &clock, "user-1", 40);
        let last = seed_expiring(&store, &clock, "user-1", 10);
        let gone = seed_expiring(&store, &clock, "user-1", -3);
        seed_expiring(&store, &clock, "user-1", 100);
        let mut abandoned = sample_draft("user-1", clock.now());
        abandoned.expires_at = clock.now() + ChronoDuration::hours(5);
        abandoned.status = DraftStatus::Abandoned;
        store.seed(abandoned);

        let targets = notifier.get_expiration_targets().await.unwrap();
        let classes: Vec<_> = targets.iter().map(|t| (t.draft_id, t.class)).collect();
        assert_eq!(
            classes,
            vec![
                (gone.id, NotificationClass::Expired),
                (last.id, NotificationClass::FinalWarning),
                (early.id, NotificationClass::EarlyWarning),
            ]
        );
    }

    #[tokio::test]
    async fn test_notifier_never_mutates_drafts() {
        let (store, _, notifier, clock) = setup();
        let gone = seed_expiring(&store, &clock, "user-1", -3);

        notifier.notify_expiring_drafts().await.unwrap();
        assert_eq!(store.stored(&gone.id).unwrap(), gone);
        assert!(store.all_audit().is_empty());
    }

    #[tokio::test]
    async fn test_duplicates_suppressed_within_run() {
        let (store, sender, notifier, clock) = setup();
        seed_expiring(&store, &clock, "user-1", 10);
        let targets = notifier.get_expiration_targets().await.unwrap();
        let doubled: Vec<_> = targets.iter().chain(targets.iter()).cloned().collect();

        let report = notifier.deliver(doubled).await;
        assert_eq!(report.sent, 1);
        assert_eq!(report.suppressed, 1);
        assert_eq!(sender.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delivery_failure_does_not_stop_run() {
        let (store, sender, notifier, clock) = setup();
        let bad = seed_expiring(&store, &clock, "user-1", 10);
        seed_expiring(&store, &clock, "user-2", 20);
        seed_expiring(&store, &clock, "user-3", 30);
        sender.failing.lock().unwrap().insert(bad.id);

        let report = notifier.notify_expiring_drafts().await.unwrap();
        assert_eq!(report.targets, 3);
        assert_eq!(report.sent, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.errors[0].draft_id, bad.id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_delivery_times_out() {
        let (store, sender, notifier, clock) = setup();
        let slow = seed_expiring(&store, &clock, "user-1", 10);
        seed_expiring(&store, &clock, "user-2", 20);
        sender.stalling.lock().unwrap().insert(slow.id);

        let report = notifier.notify_expiring_drafts().await.unwrap();
        assert_eq!(report.sent, 1);
        assert_eq!(report.failed, 1);
        assert!(report.errors[0].error.contains("timed out"));
    }

    #[tokio::test]
    async fn test_messages_use_book_title() {
        let (store, sender, notifier, clock) = setup();
        let mut draft = with_book_data(sample_draft("user-1", clock.now()), "Foo", "Bar");
        draft.expires_at = clock.now() + ChronoDuration::hours(12);
        store.seed(draft);

        notifier.notify_expiring_drafts().await.unwrap();
        let sent = sender.sent.lock().unwrap();
        assert!(sent[0].subject.contains("\"Foo\""));
        assert_eq!(sent[0].owner_id, "user-1");
    }

    #[tokio::test]
    async fn test_user_warnings_within_three_days() {
        let (store, _, notifier, clock) = setup();
        seed_expiring(&store, &clock, "user-1", 60);
        seed_expiring(&store, &clock, "user-1", 80);
        seed_expiring(&store, &clock, "user-2", 10);

        let warnings = notifier.user_expiration_warnings("user-1").await.unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].class, NotificationClass::EarlyWarning);
        assert_eq!(warnings[0].display_title, "Untitled");
    }
}
