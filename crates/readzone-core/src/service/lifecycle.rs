//! Draft lifecycle state machine.
//!
//! ```text
//! Active ──(time)──────► Expired ──(restore)──► Active
//! Active ──(operator)──► Abandoned ─(restore)─► Active
//! Active ──(publish)───► Migrated
//! any ─────(delete)────► row removed, audit kept
//! ```
//!
//! Only Active drafts accept content mutations or renew their expiry.

use chrono::{DateTime, Utc};
use readzone_types::audit::{AuditAction, AuditEntry, SYSTEM_ACTOR};
use readzone_types::draft::{Draft, DraftStatus, expiry_from};
use readzone_types::error::{DraftError, RepositoryError};

use crate::repository::draft::{CasOutcome, DraftRepository, Expected};

/// Whether `from -> to` is a legal status change.
pub fn can_transition(from: DraftStatus, to: DraftStatus) -> bool {
    use DraftStatus::*;
    matches!(
        (from, to),
        (Active, Expired)
            | (Active, Abandoned)
            | (Active, Migrated)
            | (Expired, Active)
            | (Abandoned, Active)
    )
}

/// Reject content mutations on anything but an Active draft.
pub fn ensure_mutable(draft: &Draft) -> Result<(), DraftError> {
    if draft.status.is_active() {
        Ok(())
    } else {
        Err(DraftError::StaleDraft {
            status: draft.status,
        })
    }
}

/// Copy of `draft` as the next version, stamped at `now`.
pub fn next_version(draft: &Draft, now: DateTime<Utc>) -> Draft {
    let mut next = draft.clone();
    next.version = draft.version + 1;
    next.updated_at = now;
    next
}

/// Next version of `draft` in status `to`.
///
/// Returns `StaleDraft` when the transition is not allowed from the current status.
pub fn transition(
    draft: &Draft,
    to: DraftStatus,
    now: DateTime<Utc>,
    ttl_days: i64,
) -> Result<Draft, DraftError> {
    if !can_transition(draft.status, to) {
        return Err(DraftError::StaleDraft {
            status: draft.status,
        });
    }
    let mut next = next_version(draft, now);
    next.status = to;
    if to == DraftStatus::Active {
        next.expires_at = expiry_from(now, ttl_days);
    }
    Ok(next)
}

/// Flip an Active draft whose expiry has passed to Expired, with an audit entry.
///
/// The flip is driven by time, not by a writer, so the version is kept: a
/// client holding that version is told the draft is stale rather than that
/// someone else changed it. Returns the draft unchanged when it is not due.
/// If another writer got there first, returns whatever the store now holds.
pub async fn expire_if_due<R: DraftRepository>(
    repo: &R,
    draft: Draft,
    now: DateTime<Utc>,
) -> Result<Draft, RepositoryError> {
    if !draft.status.is_active() || !draft.is_past_expiry(now) {
        return Ok(draft);
    }

    let mut expired = draft.clone();
    expired.status = DraftStatus::Expired;
    let audit = AuditEntry::record(
        draft.id,
        SYSTEM_ACTOR,
        AuditAction::Expired,
        Some(&draft),
        Some(&expired),
        now,
    );

    match repo.compare_and_swap(&expired, Expected::of(&draft), &audit).await? {
        CasOutcome::Applied(stored) => {
            tracing::debug!(draft_id = %stored.id, version = stored.version, "draft expired on read");
            Ok(stored)
        }
        CasOutcome::Conflict(Some(current)) => Ok(current),
        CasOutcome::Conflict(None) => Err(RepositoryError::NotFound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::test_support::{InMemoryStore, sample_draft};

    #[test]
    fn test_transition_table() {
        use DraftStatus::*;
        assert!(can_transition(Active, Expired));
        assert!(can_transition(Expired, Active));
        assert!(can_transition(Abandoned, Active));
        assert!(!can_transition(Migrated, Active));
        assert!(!can_transition(Expired, Abandoned));
        assert!(!can_transition(Active, Active));
    }

    #[test]
    fn test_ensure_mutable() {
        let mut draft = sample_draft("user-1", Utc::now());
        assert!(ensure_mutable(&draft).is_ok());
        draft.status = DraftStatus::Migrated;
        assert!(matches!(
            ensure_mutable(&draft),
            Err(DraftError::StaleDraft {
                status: DraftStatus::Migrated
            })
        ));
    }

    #[test]
    fn test_restore_transition_renews_expiry() {
        let now = Utc::now();
        let mut draft = sample_draft("user-1", now - Duration::days(10));
        draft.status = DraftStatus::Expired;

        let restored = transition(&draft, DraftStatus::Active, now, 7).unwrap();
        assert_eq!(restored.status, DraftStatus::Active);
        assert_eq!(restored.version, draft.version + 1);
        assert_eq!(restored.expires_at, now + Duration::days(7));
    }

    #[tokio::test]
    async fn test_expire_if_due_flips_once() {
        let created = Utc::now();
        let store = InMemoryStore::new();
        let draft = store.seed(sample_draft("user-1", created));

        let later = created + Duration::days(7) + Duration::seconds(1);
        let first = expire_if_due(&store, draft.clone(), later).await.unwrap();
        assert_eq!(first.status, DraftStatus::Expired);
        assert_eq!(first.version, draft.version);
        assert_eq!(first.updated_at, draft.updated_at);

        let second = expire_if_due(&store, first.clone(), later).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(store.audit_actions(&draft.id), vec![AuditAction::Expired]);
    }

    #[tokio::test]
    async fn test_expire_if_due_leaves_fresh_draft() {
        let now = Utc::now();
        let store = InMemoryStore::new();
        let draft = store.seed(sample_draft("user-1", now));

        let result = expire_if_due(&store, draft.clone(), now + Duration::days(6))
            .await
            .unwrap();
        assert_eq!(result, draft);
        assert!(store.audit_actions(&draft.id).is_empty());
    }
}
