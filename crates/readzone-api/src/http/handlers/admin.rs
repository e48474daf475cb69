//! Operator handlers: batch sync, notifications, migration status and
//! validation, and abandoning drafts.

use axum::Json;
use axum::extract::{Path, Query, State};
use tokio_util::sync::CancellationToken;

use readzone_core::service::sync::BatchSyncOptions;
use readzone_types::draft::{Draft, DraftId};
use readzone_types::error::DraftError;
use readzone_types::maintenance::{MigrationStatus, ValidationReport};
use readzone_types::notification::{ExpirationNotice, NotificationReport};
use readzone_types::sync::{BatchSyncReport, SyncMetrics};

use crate::http::error::AppError;
use crate::http::extractors::operator::Operator;
use crate::http::extractors::query::{BatchSyncBody, MetricsQuery};
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

/// POST /api/v1/admin/sync/batch - Run one checkpointed batch sweep.
pub async fn batch_sync(
    State(state): State<AppState>,
    operator: Operator,
    Json(body): Json<BatchSyncBody>,
) -> ApiResult<BatchSyncReport> {
    let timer = RequestTimer::start();
    tracing::info!(actor = %operator.actor_id, "batch sync requested");

    let report = state
        .sync
        .batch_sync_drafts(
            BatchSyncOptions {
                limit: body.limit,
                batch_size: body.batch_size,
                fresh: body.fresh,
            },
            &CancellationToken::new(),
        )
        .await?;

    Ok(Json(timer.finish(report)))
}

/// GET /api/v1/admin/sync/metrics?hours=24
pub async fn sync_metrics(
    State(state): State<AppState>,
    _operator: Operator,
    Query(query): Query<MetricsQuery>,
) -> ApiResult<SyncMetrics> {
    let timer = RequestTimer::start();

    if query.hours <= 0 {
        return Err(AppError::Validation("hours must be positive".to_string()));
    }
    let metrics = state.sync.sync_metrics(query.hours).await?;

    Ok(Json(timer.finish(metrics)))
}

/// GET /api/v1/admin/expiration-targets - Drafts due a warning, nothing sent.
pub async fn expiration_targets(
    State(state): State<AppState>,
    _operator: Operator,
) -> ApiResult<Vec<ExpirationNotice>> {
    let timer = RequestTimer::start();

    let targets = state.notifier.get_expiration_targets().await?;

    Ok(Json(timer.finish(targets)))
}

/// POST /api/v1/admin/notify - Send one warning per due draft.
pub async fn notify(
    State(state): State<AppState>,
    operator: Operator,
) -> ApiResult<NotificationReport> {
    let timer = RequestTimer::start();
    tracing::info!(actor = %operator.actor_id, sender = state.sender, "notification run requested");

    let report = state.notifier.notify_expiring_drafts().await?;

    Ok(Json(timer.finish(report)))
}

/// GET /api/v1/admin/migration/status
pub async fn migration_status(
    State(state): State<AppState>,
    _operator: Operator,
) -> ApiResult<MigrationStatus> {
    let timer = RequestTimer::start();

    let status = state.maintenance.status().await?;

    Ok(Json(timer.finish(status)))
}

/// GET /api/v1/admin/migration/validate - Read-only integrity scan.
pub async fn migration_validate(
    State(state): State<AppState>,
    _operator: Operator,
) -> ApiResult<ValidationReport> {
    let timer = RequestTimer::start();

    let report = state.maintenance.validate().await?;

    Ok(Json(timer.finish(report)))
}

/// POST /api/v1/admin/drafts/{id}/abandon - Retire an active draft.
pub async fn abandon_draft(
    State(state): State<AppState>,
    operator: Operator,
    Path(id): Path<String>,
) -> ApiResult<Draft> {
    let timer = RequestTimer::start();

    let id = id.parse::<DraftId>().map_err(|_| AppError::Draft(DraftError::NotFound))?;
    let draft = state.drafts.abandon_draft(&id, &operator.actor_id).await?;

    Ok(Json(timer.finish(draft)))
}
