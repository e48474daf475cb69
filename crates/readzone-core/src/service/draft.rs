//! Draft management service.
//!
//! Every mutation goes through the same path: validate the input, load the
//! current row, apply lazy expiration, check the caller's expected version
//! and the lifecycle rules, then compare-and-swap the next version together
//! with its audit entry. Nothing is locked between load and write; the
//! version check at the store decides the winner.

use readzone_types::audit::{AuditAction, AuditEntry};
use readzone_types::config::DraftsConfig;
use readzone_types::draft::{
    CreateDraftRequest, Draft, DraftId, DraftPage, DraftPatch, DraftStatus, expiry_from,
};
use readzone_types::error::{DraftError, RepositoryError, ValidationError};

use crate::clock::SharedClock;
use crate::repository::audit::AuditRepository;
use crate::repository::draft::{CasOutcome, DraftFilter, DraftRepository, Expected};
use crate::service::lifecycle::{self, ensure_mutable, expire_if_due, next_version};
use crate::service::validation::{
    validate_book_data, validate_content, validate_page, validate_title,
};

/// Upper bound on overdue drafts expired per owner before listing.
const LIST_SWEEP_LIMIT: i64 = 200;

/// Service owning the single-draft operations exposed to collaborators.
///
/// Generic over repository traits -- readzone-core never depends on readzone-infra.
pub struct DraftService<D: DraftRepository, A: AuditRepository> {
    drafts: D,
    audit: A,
    rules: DraftsConfig,
    clock: SharedClock,
}

impl<D: DraftRepository, A: AuditRepository> DraftService<D, A> {
    pub fn new(drafts: D, audit: A, rules: DraftsConfig, clock: SharedClock) -> Self {
        Self {
            drafts,
            audit,
            rules,
            clock,
        }
    }

    /// Create a new Active draft at version 1.
    ///
    /// Rejects invalid content before writing anything, and rejects a second
    /// Active draft for the same (owner, book).
    pub async fn create_draft(&self, request: CreateDraftRequest) -> Result<Draft, DraftError> {
        let owner_id = request.owner_id.trim().to_string();
        if owner_id.is_empty() {
            return Err(ValidationError::MissingOwner.into());
        }
        validate_content(&request.content, &self.rules)?;
        if let Some(title) = &request.title {
            validate_title(title, &self.rules)?;
        }
        let book_data = normalize_book_data(request.book_data);
        if let Some(raw) = &book_data {
            validate_book_data(raw)?;
        }

        if let Some(book_id) = &request.book_id {
            if self
                .drafts
                .find_active_for_book(&owner_id, book_id)
                .await?
                .is_some()
            {
                return Err(DraftError::DuplicateDraft);
            }
        }

        let now = self.clock.now();
        let draft = Draft {
            id: DraftId::new(),
            owner_id: owner_id.clone(),
            book_id: request.book_id,
            book_data,
            title: request.title,
            content: request.content,
            metadata: request.metadata,
            status: DraftStatus::Active,
            version: 1,
            expires_at: expiry_from(now, self.rules.ttl_days),
            last_accessed_at: now,
            created_at: now,
            updated_at: now,
        };
        let audit = AuditEntry::record(draft.id, &owner_id, AuditAction::Created, None, Some(&draft), now);

        let draft = self.drafts.insert(&draft, &audit).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => DraftError::DuplicateDraft,
            other => other.into(),
        })?;

        tracing::info!(draft_id = %draft.id, owner_id = %draft.owner_id, "draft created");
        Ok(draft)
    }

    /// Load a draft for its owner, applying lazy expiration.
    ///
    /// When `resuming`, `last_accessed_at` is stamped without bumping the version.
    pub async fn get_draft(
        &self,
        id: &DraftId,
        owner_id: &str,
        resuming: bool,
    ) -> Result<Draft, DraftError> {
        let mut draft = self.load_owned(id, owner_id).await?;
        if resuming {
            let now = self.clock.now();
            self.drafts.touch_last_accessed(&draft.id, now).await?;
            draft.last_accessed_at = now;
        }
        Ok(draft)
    }

    /// Apply `patch` if the draft is still at `expected_version`.
    ///
    /// A successful update bumps the version by one and renews `expires_at`.
    /// A stale version returns `VersionConflict` carrying the current draft;
    /// a non-Active draft returns `StaleDraft` unless `patch.restore` is set.
    /// Lazy expiration keeps the version, so a client that last saw the
    /// draft while it was Active gets `StaleDraft`, or a restore.
    pub async fn update_draft(
        &self,
        id: &DraftId,
        owner_id: &str,
        expected_version: i64,
        patch: DraftPatch,
    ) -> Result<Draft, DraftError> {
        if patch.is_empty() {
            return Err(ValidationError::EmptyPatch.into());
        }
        if let Some(content) = &patch.content {
            validate_content(content, &self.rules)?;
        }
        if let Some(title) = &patch.title {
            validate_title(title, &self.rules)?;
        }
        let book_data = patch.book_data.clone().map(|raw| normalize_book_data(Some(raw)));
        if let Some(Some(raw)) = &book_data {
            validate_book_data(raw)?;
        }

        let current = self.load_owned(id, owner_id).await?;
        if current.version != expected_version {
            return Err(DraftError::VersionConflict {
                expected: expected_version,
                current: Box::new(current),
            });
        }

        let now = self.clock.now();
        let mut next = if current.status.is_active() {
            next_version(&current, now)
        } else if patch.restore {
            lifecycle::transition(&current, DraftStatus::Active, now, self.rules.ttl_days)?
        } else {
            return Err(DraftError::StaleDraft {
                status: current.status,
            });
        };

        if let Some(title) = patch.title {
            next.title = if title.trim().is_empty() { None } else { Some(title) };
        }
        if let Some(content) = patch.content {
            next.content = content;
        }
        if let Some(data) = book_data {
            next.book_data = data;
        }
        if let Some(metadata) = patch.metadata {
            next.metadata = metadata;
        }
        next.expires_at = expiry_from(now, self.rules.ttl_days);

        let audit = AuditEntry::record(
            current.id,
            owner_id,
            AuditAction::Updated,
            Some(&current),
            Some(&next),
            now,
        );
        let updated = self.swap(&next, Expected::of(&current), &audit).await?;

        tracing::debug!(draft_id = %updated.id, version = updated.version, "draft updated");
        Ok(updated)
    }

    /// Bring an Expired or Abandoned draft back to Active with a fresh expiry.
    ///
    /// Restoring an Active draft is a no-op that returns it unchanged.
    pub async fn restore_draft(&self, id: &DraftId, owner_id: &str) -> Result<Draft, DraftError> {
        let current = self.load_owned(id, owner_id).await?;
        if current.status.is_active() {
            return Ok(current);
        }

        let now = self.clock.now();
        let restored =
            lifecycle::transition(&current, DraftStatus::Active, now, self.rules.ttl_days)?;
        let audit = AuditEntry::record(
            current.id,
            owner_id,
            AuditAction::Updated,
            Some(&current),
            Some(&restored),
            now,
        )
        .with_details(serde_json::json!({ "transition": "restored", "from": current.status }));

        let restored = self.swap(&restored, Expected::of(&current), &audit).await?;
        tracing::info!(draft_id = %restored.id, "draft restored");
        Ok(restored)
    }

    /// One page of the owner's drafts, most recently updated first.
    ///
    /// Overdue Active drafts are expired first so the page reflects it.
    pub async fn list_drafts(
        &self,
        owner_id: &str,
        page: Option<u32>,
        limit: Option<u32>,
        status: Option<DraftStatus>,
    ) -> Result<DraftPage, DraftError> {
        let (page, limit) = validate_page(page, limit, &self.rules)?;

        let now = self.clock.now();
        let overdue = self
            .drafts
            .list_expiring(Some(owner_id), now, LIST_SWEEP_LIMIT)
            .await?;
        for draft in overdue {
            expire_if_due(&self.drafts, draft, now).await?;
        }

        let filter = DraftFilter {
            owner_id: Some(owner_id.to_string()),
            status,
            sort_order: None,
            limit: Some(i64::from(limit)),
            offset: Some(i64::from(page - 1) * i64::from(limit)),
        };
        let total = self.drafts.count(&filter).await?;
        let items = self.drafts.list(&filter).await?;

        Ok(DraftPage {
            has_next: u64::from(page) * u64::from(limit) < total,
            items,
            page,
            limit,
            total,
        })
    }

    /// Remove a draft in any state. The `Deleted` audit entry survives the row.
    pub async fn delete_draft(&self, id: &DraftId, owner_id: &str) -> Result<(), DraftError> {
        let current = self.load_raw_owned(id, owner_id).await?;
        let audit = AuditEntry::record(
            current.id,
            owner_id,
            AuditAction::Deleted,
            Some(&current),
            None,
            self.clock.now(),
        );
        if !self.drafts.delete(id, &audit).await? {
            return Err(DraftError::NotFound);
        }
        tracing::info!(draft_id = %id, "draft deleted");
        Ok(())
    }

    /// Operator action: retire an Active draft without publishing it.
    pub async fn abandon_draft(&self, id: &DraftId, actor_id: &str) -> Result<Draft, DraftError> {
        let current = self.load(id).await?;
        self.retire(current, DraftStatus::Abandoned, actor_id, "abandoned")
            .await
    }

    /// Load a draft for the publish pipeline, checking owner, version and status.
    pub async fn load_for_publish(
        &self,
        id: &DraftId,
        owner_id: &str,
        expected_version: i64,
    ) -> Result<Draft, DraftError> {
        let current = self.load_owned(id, owner_id).await?;
        if current.version != expected_version {
            return Err(DraftError::VersionConflict {
                expected: expected_version,
                current: Box::new(current),
            });
        }
        ensure_mutable(&current)?;
        Ok(current)
    }

    /// Mark a draft as converted into a published review.
    pub async fn mark_migrated(
        &self,
        id: &DraftId,
        owner_id: &str,
        expected_version: i64,
    ) -> Result<Draft, DraftError> {
        let current = self.load_for_publish(id, owner_id, expected_version).await?;
        self.retire(current, DraftStatus::Migrated, owner_id, "migrated")
            .await
    }

    /// Audit entries for a draft, newest first. Available after deletion.
    ///
    /// With `owner_id`, the caller must own the draft, judged by the live row
    /// or, once deleted, by who created it.
    pub async fn draft_history(
        &self,
        id: &DraftId,
        owner_id: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<AuditEntry>, DraftError> {
        let entries = self.audit.list_for_draft(id, limit).await?;

        if let Some(owner_id) = owner_id {
            let owned = match self.drafts.get(id).await? {
                Some(draft) => draft.owner_id == owner_id,
                None => entries
                    .iter()
                    .any(|e| e.action == AuditAction::Created && e.actor_id == owner_id),
            };
            if !owned {
                return Err(DraftError::NotFound);
            }
        } else if entries.is_empty() && self.drafts.get(id).await?.is_none() {
            return Err(DraftError::NotFound);
        }

        Ok(entries)
    }

    async fn retire(
        &self,
        current: Draft,
        to: DraftStatus,
        actor_id: &str,
        label: &str,
    ) -> Result<Draft, DraftError> {
        ensure_mutable(&current)?;
        let now = self.clock.now();
        let next = lifecycle::transition(&current, to, now, self.rules.ttl_days)?;
        let audit = AuditEntry::record(
            current.id,
            actor_id,
            AuditAction::Updated,
            Some(&current),
            Some(&next),
            now,
        )
        .with_details(serde_json::json!({ "transition": label }));

        let retired = self.swap(&next, Expected::of(&current), &audit).await?;
        tracing::info!(draft_id = %retired.id, status = %retired.status, "draft retired");
        Ok(retired)
    }

    async fn swap(
        &self,
        next: &Draft,
        expected: Expected,
        audit: &AuditEntry,
    ) -> Result<Draft, DraftError> {
        match self.drafts.compare_and_swap(next, expected, audit).await {
            Ok(CasOutcome::Applied(draft)) => Ok(draft),
            // Same version, different status: expired between load and write.
            Ok(CasOutcome::Conflict(Some(current))) if current.version == expected.version => {
                Err(DraftError::StaleDraft {
                    status: current.status,
                })
            }
            Ok(CasOutcome::Conflict(Some(current))) => {
                tracing::debug!(
                    draft_id = %next.id,
                    expected_version = expected.version,
                    current_version = current.version,
                    "version conflict"
                );
                Err(DraftError::VersionConflict {
                    expected: expected.version,
                    current: Box::new(current),
                })
            }
            Ok(CasOutcome::Conflict(None)) => Err(DraftError::NotFound),
            Err(RepositoryError::Conflict(_)) => Err(DraftError::DuplicateDraft),
            Err(other) => Err(other.into()),
        }
    }

    async fn load(&self, id: &DraftId) -> Result<Draft, DraftError> {
        let draft = self.drafts.get(id).await?.ok_or(DraftError::NotFound)?;
        Ok(expire_if_due(&self.drafts, draft, self.clock.now()).await?)
    }

    async fn load_raw_owned(&self, id: &DraftId, owner_id: &str) -> Result<Draft, DraftError> {
        match self.drafts.get(id).await? {
            // Another owner's draft is indistinguishable from a missing one.
            Some(draft) if draft.owner_id == owner_id => Ok(draft),
            _ => Err(DraftError::NotFound),
        }
    }

    async fn load_owned(&self, id: &DraftId, owner_id: &str) -> Result<Draft, DraftError> {
        let draft = self.load_raw_owned(id, owner_id).await?;
        Ok(expire_if_due(&self.drafts, draft, self.clock.now()).await?)
    }
}

/// Blank book data is treated as absent.
fn normalize_book_data(raw: Option<String>) -> Option<String> {
    raw.filter(|data| !data.trim().is_empty())
}
