//! Operator tooling: migration status, validation, shape upgrade and
//! rollback, and cleanup.
//!
//! The only place allowed to see legacy-shaped rows or change row shape.
//! All loops work in bounded batches of `maintenance.batch_size`.

use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use readzone_types::audit::{AuditAction, AuditEntry, SYSTEM_ACTOR};
use readzone_types::config::{DraftsConfig, MaintenanceConfig};
use readzone_types::draft::{DraftId, DraftStatus, ItemFailure, expiry_from};
use readzone_types::error::MaintenanceError;
use readzone_types::maintenance::{
    CleanupReport, MigrationStats, MigrationStatus, RollbackStats, ValidationReport,
};
use tokio_util::sync::CancellationToken;

use crate::clock::SharedClock;
use crate::repository::SortOrder;
use crate::repository::audit::AuditRepository;
use crate::repository::draft::{CasOutcome, DraftFilter, DraftRepository, Expected};
use crate::repository::maintenance::MaintenanceRepository;
use crate::service::lifecycle::{self, expire_if_due};

/// Literal an operator must pass to run a rollback.
pub const ROLLBACK_CONFIRMATION: &str = "rollback";

/// Row cap for dry-run counts, which cannot page by consuming rows.
const DRY_RUN_SCAN_LIMIT: i64 = 100_000;

pub struct DraftMaintenance<M, D, A>
where
    M: MaintenanceRepository,
    D: DraftRepository,
    A: AuditRepository,
{
    store: M,
    drafts: D,
    audit: A,
    config: MaintenanceConfig,
    rules: DraftsConfig,
    clock: SharedClock,
}

impl<M, D, A> DraftMaintenance<M, D, A>
where
    M: MaintenanceRepository,
    D: DraftRepository,
    A: AuditRepository,
{
    pub fn new(
        store: M,
        drafts: D,
        audit: A,
        config: MaintenanceConfig,
        rules: DraftsConfig,
        clock: SharedClock,
    ) -> Self {
        Self {
            store,
            drafts,
            audit,
            config,
            rules,
            clock,
        }
    }

    fn batch(&self) -> i64 {
        self.config.batch_size.max(1) as i64
    }

    /// Progress of the shape upgrade and whether cleanup has work to do.
    pub async fn status(&self) -> Result<MigrationStatus, MaintenanceError> {
        let counts = self.store.shape_counts(self.clock.now()).await?;
        let audit_records = self.audit.count().await?;

        Ok(MigrationStatus {
            complete: counts.total == counts.current_shape,
            progress_percent: MigrationStatus::progress(counts.current_shape, counts.total),
            total: counts.total,
            current_shape: counts.current_shape,
            legacy: counts.total - counts.current_shape,
            expired: counts.expired,
            audit_records,
            needs_cleanup: counts.expired > 0,
        })
    }

    /// Read-only integrity scan over every row.
    pub async fn validate(&self) -> Result<ValidationReport, MaintenanceError> {
        let started = Instant::now();
        let now = self.clock.now();
        let mut report = ValidationReport::default();
        let mut cursor: Option<DraftId> = None;

        loop {
            let records = self.store.scan_records(cursor.as_ref(), self.batch()).await?;
            let Some(last) = records.last().map(|r| r.id) else {
                break;
            };

            for record in &records {
                report.stats.total += 1;
                let issues = record.issues();
                if issues.is_empty() {
                    report.stats.valid += 1;
                }
                if record.is_expired(now) {
                    report.stats.expired += 1;
                }
                if record.is_orphaned() {
                    report.stats.orphaned += 1;
                }
                report.issues.extend(issues);
            }
            cursor = Some(last);
        }

        report.is_fit = report.issues.is_empty();
        report.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            total = report.stats.total,
            valid = report.stats.valid,
            orphaned = report.stats.orphaned,
            issues = report.issues.len(),
            "draft validation finished"
        );
        Ok(report)
    }

    /// Fail with `IntegrityError` unless the store validates clean.
    pub async fn require_fit(&self) -> Result<ValidationReport, MaintenanceError> {
        let report = self.validate().await?;
        if report.is_fit {
            Ok(report)
        } else {
            Err(MaintenanceError::IntegrityError {
                issues: report.issues,
            })
        }
    }

    /// Upgrade legacy rows to the current shape.
    ///
    /// Safe to re-run: rows already in the current shape are counted as
    /// skipped. Existing `expires_at` and `last_accessed_at` values are kept;
    /// missing ones become now + TTL and the row's `updated_at`.
    pub async fn migrate(
        &self,
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> Result<MigrationStats, MaintenanceError> {
        let started = Instant::now();
        let now = self.clock.now();
        let counts = self.store.shape_counts(now).await?;
        let mut stats = MigrationStats {
            dry_run,
            total: counts.total,
            skipped: counts.current_shape,
            ..Default::default()
        };
        let mut cursor: Option<DraftId> = None;

        tracing::info!(legacy = counts.total - counts.current_shape, dry_run, "starting draft migration");

        loop {
            if cancel.is_cancelled() {
                stats.interrupted = true;
                tracing::warn!(migrated = stats.migrated, "draft migration cancelled");
                break;
            }

            let records = self.store.legacy_records(cursor.as_ref(), self.batch()).await?;
            let Some(last) = records.last().map(|r| r.id) else {
                break;
            };

            for record in &records {
                if dry_run {
                    stats.migrated += 1;
                    continue;
                }
                let expires_at = record
                    .expires_at
                    .unwrap_or_else(|| expiry_from(now, self.rules.ttl_days));
                let last_accessed_at = record.last_accessed_at.unwrap_or(record.updated_at);

                match self
                    .store
                    .upgrade_record(&record.id, expires_at, last_accessed_at)
                    .await
                {
                    Ok(true) => stats.migrated += 1,
                    Ok(false) => stats.skipped += 1,
                    Err(e) => {
                        stats.failed += 1;
                        tracing::warn!(draft_id = %record.id, error = %e, "failed to migrate draft");
                        stats.errors.push(ItemFailure::new(record.id, e.to_string()));
                    }
                }
            }
            cursor = Some(last);
        }

        stats.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            total = stats.total,
            migrated = stats.migrated,
            skipped = stats.skipped,
            failed = stats.failed,
            duration_ms = stats.duration_ms,
            "draft migration finished"
        );
        Ok(stats)
    }

    /// Return every row to the legacy shape. Destructive and emergency-only.
    ///
    /// Requires `confirmation` to equal [`ROLLBACK_CONFIRMATION`]. The audit
    /// trail is left untouched.
    pub async fn rollback(&self, confirmation: &str) -> Result<RollbackStats, MaintenanceError> {
        if confirmation != ROLLBACK_CONFIRMATION {
            return Err(MaintenanceError::ConfirmationRequired {
                expected: ROLLBACK_CONFIRMATION,
            });
        }

        let started = Instant::now();
        let mut stats = RollbackStats::default();
        tracing::warn!("starting draft migration rollback");

        loop {
            let reverted = self.store.downgrade_batch(self.batch()).await?;
            if reverted == 0 {
                break;
            }
            stats.reverted += reverted;
            stats.batches += 1;
        }

        stats.duration_ms = started.elapsed().as_millis() as u64;
        tracing::warn!(reverted = stats.reverted, batches = stats.batches, "draft migration rolled back");
        Ok(stats)
    }

    /// Expire overdue drafts, enforce the per-user cap, remove retired rows
    /// past retention and orphaned rows, optionally prune old audit entries,
    /// then optimize indexes. With `dry_run`, only counts.
    pub async fn cleanup(&self, dry_run: bool) -> Result<CleanupReport, MaintenanceError> {
        let started = Instant::now();
        let now = self.clock.now();
        let mut report = CleanupReport {
            dry_run,
            ..Default::default()
        };

        self.expire_overdue(now, &mut report).await?;
        self.abandon_excess(now, &mut report).await?;
        self.delete_retired(now, &mut report).await?;
        self.delete_orphaned(now, &mut report).await?;

        if let Some(days) = self.config.audit_retention_days {
            let cutoff = now - Duration::days(days);
            report.audit_pruned = if dry_run {
                self.audit.count_older_than(cutoff).await?
            } else {
                self.audit.prune_older_than(cutoff).await?
            };
        }

        if !dry_run {
            self.store.optimize().await?;
            report.optimized = true;
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            dry_run,
            expired = report.expired,
            abandoned_excess = report.abandoned_excess,
            deleted_retired = report.deleted_retired,
            deleted_orphaned = report.deleted_orphaned,
            audit_pruned = report.audit_pruned,
            errors = report.errors.len(),
            "draft cleanup finished"
        );
        Ok(report)
    }

    async fn expire_overdue(
        &self,
        now: DateTime<Utc>,
        report: &mut CleanupReport,
    ) -> Result<(), MaintenanceError> {
        if report.dry_run {
            report.expired = self
                .drafts
                .list_expiring(None, now, DRY_RUN_SCAN_LIMIT)
                .await?
                .iter()
                .filter(|d| d.is_past_expiry(now))
                .count() as u64;
            return Ok(());
        }

        loop {
            let overdue = self.drafts.list_expiring(None, now, self.batch()).await?;
            if overdue.is_empty() {
                return Ok(());
            }
            let mut progressed = false;
            for draft in overdue {
                let id = draft.id;
                match expire_if_due(&self.drafts, draft, now).await {
                    Ok(stored) if stored.status == DraftStatus::Expired => {
                        report.expired += 1;
                        progressed = true;
                    }
                    Ok(_) => {}
                    Err(e) => report.errors.push(ItemFailure::new(id, e.to_string())),
                }
            }
            // Every remaining row failed; retrying would spin.
            if !progressed {
                return Ok(());
            }
        }
    }

    async fn abandon_excess(
        &self,
        now: DateTime<Utc>,
        report: &mut CleanupReport,
    ) -> Result<(), MaintenanceError> {
        let max = self.config.max_drafts_per_user as u64;
        for owner in self.store.owners_over_limit(max).await? {
            if report.dry_run {
                report.abandoned_excess += owner.active_drafts - max;
                continue;
            }

            let filter = DraftFilter {
                owner_id: Some(owner.owner_id.clone()),
                status: Some(DraftStatus::Active),
                sort_order: Some(SortOrder::Desc),
                limit: None,
                offset: Some(max as i64),
            };
            for draft in self.drafts.list(&filter).await? {
                let id = draft.id;
                let next = lifecycle::transition(&draft, DraftStatus::Abandoned, now, self.rules.ttl_days);
                let Ok(next) = next else {
                    continue;
                };
                let audit = AuditEntry::record(
                    id,
                    SYSTEM_ACTOR,
                    AuditAction::Updated,
                    Some(&draft),
                    Some(&next),
                    now,
                )
                .with_details(serde_json::json!({
                    "transition": "abandoned",
                    "reason": "per_user_limit",
                    "limit": max,
                }));
                match self.drafts.compare_and_swap(&next, Expected::of(&draft), &audit).await {
                    Ok(CasOutcome::Applied(_)) => report.abandoned_excess += 1,
                    Ok(CasOutcome::Conflict(_)) => {
                        tracing::debug!(draft_id = %id, "draft changed during cleanup, left as is");
                    }
                    Err(e) => report.errors.push(ItemFailure::new(id, e.to_string())),
                }
            }
        }
        Ok(())
    }

    async fn delete_retired(
        &self,
        now: DateTime<Utc>,
        report: &mut CleanupReport,
    ) -> Result<(), MaintenanceError> {
        let cutoff = now - Duration::days(self.config.retention_days);
        if report.dry_run {
            report.deleted_retired = self
                .store
                .retired_before(cutoff, DRY_RUN_SCAN_LIMIT)
                .await?
                .len() as u64;
            return Ok(());
        }

        loop {
            let retired = self.store.retired_before(cutoff, self.batch()).await?;
            if retired.is_empty() {
                return Ok(());
            }
            let mut progressed = false;
            for draft in retired {
                let audit = AuditEntry::record(
                    draft.id,
                    SYSTEM_ACTOR,
                    AuditAction::Deleted,
                    Some(&draft),
                    None,
                    now,
                )
                .with_details(serde_json::json!({
                    "reason": "retention",
                    "retention_days": self.config.retention_days,
                }));
                match self.drafts.delete(&draft.id, &audit).await {
                    Ok(_) => {
                        report.deleted_retired += 1;
                        progressed = true;
                    }
                    Err(e) => report.errors.push(ItemFailure::new(draft.id, e.to_string())),
                }
            }
            if !progressed {
                return Ok(());
            }
        }
    }

    async fn delete_orphaned(
        &self,
        now: DateTime<Utc>,
        report: &mut CleanupReport,
    ) -> Result<(), MaintenanceError> {
        if report.dry_run {
            report.deleted_orphaned = self
                .store
                .orphaned_records(DRY_RUN_SCAN_LIMIT)
                .await?
                .len() as u64;
            return Ok(());
        }

        loop {
            let orphans = self.store.orphaned_records(self.batch()).await?;
            if orphans.is_empty() {
                return Ok(());
            }
            let mut progressed = false;
            for record in orphans {
                match self.store.remove_record(&record.id).await {
                    Ok(_) => {
                        progressed = true;
                        report.deleted_orphaned += 1;
                        let audit = AuditEntry::record(
                            record.id,
                            SYSTEM_ACTOR,
                            AuditAction::Deleted,
                            None,
                            None,
                            now,
                        )
                        .with_details(serde_json::json!({
                            "reason": "orphaned_owner",
                            "owner_id": record.owner_id,
                        }));
                        if let Err(e) = self.audit.append(&audit).await {
                            report.errors.push(ItemFailure::new(record.id, e.to_string()));
                        }
                    }
                    Err(e) => report.errors.push(ItemFailure::new(record.id, e.to_string())),
                }
            }
            if !progressed {
                return Ok(());
            }
        }
    }
}
