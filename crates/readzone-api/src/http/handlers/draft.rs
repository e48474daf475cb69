//! Draft handlers for the REST API. Every route acts on the caller's own drafts.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};

use readzone_types::audit::AuditEntry;
use readzone_types::book::BookId;
use readzone_types::draft::{CreateDraftRequest, Draft, DraftId, DraftMetadata, DraftPage, DraftPatch, DraftStatus};
use readzone_types::notification::ExpirationNotice;
use readzone_types::sync::{SyncConfidence, SyncResult};

use crate::http::error::AppError;
use crate::http::extractors::identity::CallerId;
use crate::http::extractors::query::{DraftListQuery, GetDraftQuery, HistoryQuery, SyncQuery};
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

/// Body of `POST /drafts`.
#[derive(Debug, Deserialize)]
pub struct CreateDraftBody {
    pub content: String,
    pub title: Option<String>,
    /// Book description, as a JSON object or an already-serialized string.
    pub book_data: Option<serde_json::Value>,
    pub book_id: Option<BookId>,
    #[serde(default)]
    pub metadata: DraftMetadata,
    /// Vouch for the book data so inline sync may create a catalog book.
    #[serde(default)]
    pub confident: bool,
}

/// Body of `PUT /drafts/{id}`.
#[derive(Debug, Deserialize)]
pub struct UpdateDraftBody {
    pub expected_version: i64,
    pub title: Option<String>,
    pub content: Option<String>,
    /// Absent leaves the book data alone; `null` clears it.
    #[serde(default, deserialize_with = "present_or_null")]
    pub book_data: Option<Option<serde_json::Value>>,
    pub metadata: Option<DraftMetadata>,
    #[serde(default)]
    pub restore: bool,
    #[serde(default)]
    pub confident: bool,
}

/// A saved draft and the inline sync attempt that followed, if any.
#[derive(Debug, Serialize)]
pub struct SavedDraft {
    pub draft: Draft,
    pub sync: Option<SyncResult>,
}

fn confidence(confident: bool) -> SyncConfidence {
    if confident {
        SyncConfidence::Confirmed
    } else {
        SyncConfidence::Unconfirmed
    }
}

fn book_data_string(value: Option<serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::Null => None,
        serde_json::Value::String(raw) => Some(raw),
        other => Some(other.to_string()),
    }
}

/// Wrap whatever is present, so an explicit `null` becomes `Some(None)`.
fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<serde_json::Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<serde_json::Value>::deserialize(deserializer).map(Some)
}

/// Patch value for book data: an empty string asks the service to clear it.
fn book_data_patch(value: Option<Option<serde_json::Value>>) -> Option<String> {
    value.map(|inner| book_data_string(inner).unwrap_or_default())
}

fn parse_id(raw: &str) -> Result<DraftId, AppError> {
    // An unparseable id cannot name a draft.
    raw.parse::<DraftId>()
        .map_err(|_| AppError::Draft(readzone_types::error::DraftError::NotFound))
}

fn draft_link(id: &DraftId) -> String {
    format!("/api/v1/drafts/{id}")
}

/// POST /api/v1/drafts - Create a draft, then sync its book inline.
pub async fn create_draft(
    State(state): State<AppState>,
    CallerId(owner_id): CallerId,
    Json(body): Json<CreateDraftBody>,
) -> Result<(StatusCode, Json<ApiResponse<SavedDraft>>), AppError> {
    let timer = RequestTimer::start();

    let request = CreateDraftRequest {
        owner_id,
        content: body.content,
        title: body.title,
        book_data: book_data_string(body.book_data),
        book_id: body.book_id,
        metadata: body.metadata,
    };
    let draft = state.drafts.create_draft(request).await?;
    let (draft, sync) = state.sync_after_save(draft, confidence(body.confident)).await;

    let link = draft_link(&draft.id);
    let resp = timer
        .finish(SavedDraft { draft, sync })
        .with_link("self", &link);
    Ok((StatusCode::CREATED, Json(resp)))
}

/// GET /api/v1/drafts - One page of the caller's drafts.
pub async fn list_drafts(
    State(state): State<AppState>,
    CallerId(owner_id): CallerId,
    Query(query): Query<DraftListQuery>,
) -> ApiResult<DraftPage> {
    let timer = RequestTimer::start();

    let status = query
        .status
        .as_deref()
        .map(|s| s.parse::<DraftStatus>().map_err(AppError::Validation))
        .transpose()?;
    let page = state
        .drafts
        .list_drafts(&owner_id, query.page, query.limit, status)
        .await?;

    Ok(Json(timer.finish(page).with_link("self", "/api/v1/drafts")))
}

/// GET /api/v1/drafts/{id}?resume=true - Load a draft, applying lazy expiration.
pub async fn get_draft(
    State(state): State<AppState>,
    CallerId(owner_id): CallerId,
    Path(id): Path<String>,
    Query(query): Query<GetDraftQuery>,
) -> ApiResult<Draft> {
    let timer = RequestTimer::start();

    let draft = state
        .drafts
        .get_draft(&parse_id(&id)?, &owner_id, query.resume)
        .await?;

    let link = draft_link(&draft.id);
    Ok(Json(
        timer
            .finish(draft)
            .with_link("self", &link)
            .with_link("history", &format!("{link}/history")),
    ))
}

/// PUT /api/v1/drafts/{id} - Versioned update, then inline sync.
pub async fn update_draft(
    State(state): State<AppState>,
    CallerId(owner_id): CallerId,
    Path(id): Path<String>,
    Json(body): Json<UpdateDraftBody>,
) -> ApiResult<SavedDraft> {
    let timer = RequestTimer::start();

    let patch = DraftPatch {
        title: body.title,
        content: body.content,
        book_data: book_data_patch(body.book_data),
        metadata: body.metadata,
        restore: body.restore,
    };
    let draft = state
        .drafts
        .update_draft(&parse_id(&id)?, &owner_id, body.expected_version, patch)
        .await?;
    let (draft, sync) = state.sync_after_save(draft, confidence(body.confident)).await;

    let link = draft_link(&draft.id);
    Ok(Json(timer.finish(SavedDraft { draft, sync }).with_link("self", &link)))
}

/// DELETE /api/v1/drafts/{id} - Remove a draft. Its audit trail is kept.
pub async fn delete_draft(
    State(state): State<AppState>,
    CallerId(owner_id): CallerId,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    let timer = RequestTimer::start();

    let id = parse_id(&id)?;
    state.drafts.delete_draft(&id, &owner_id).await?;

    Ok(Json(timer.finish(serde_json::json!({ "deleted": id }))))
}

/// POST /api/v1/drafts/{id}/restore - Bring an expired or abandoned draft back.
pub async fn restore_draft(
    State(state): State<AppState>,
    CallerId(owner_id): CallerId,
    Path(id): Path<String>,
) -> ApiResult<Draft> {
    let timer = RequestTimer::start();

    let draft = state.drafts.restore_draft(&parse_id(&id)?, &owner_id).await?;

    let link = draft_link(&draft.id);
    Ok(Json(timer.finish(draft).with_link("self", &link)))
}

/// POST /api/v1/drafts/{id}/sync?confident=true - Explicit single-draft sync.
pub async fn sync_draft(
    State(state): State<AppState>,
    CallerId(owner_id): CallerId,
    Path(id): Path<String>,
    Query(query): Query<SyncQuery>,
) -> ApiResult<SyncResult> {
    let timer = RequestTimer::start();

    // Ownership check, also applying lazy expiration before the sync.
    let draft = state.drafts.get_draft(&parse_id(&id)?, &owner_id, false).await?;
    let result = state
        .sync
        .sync_draft_book(&draft.id, confidence(query.confident))
        .await?;

    Ok(Json(timer.finish(result).with_link("draft", &draft_link(&draft.id))))
}

/// GET /api/v1/drafts/{id}/history - Audit entries, newest first.
pub async fn draft_history(
    State(state): State<AppState>,
    CallerId(owner_id): CallerId,
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Vec<AuditEntry>> {
    let timer = RequestTimer::start();

    let entries = state
        .drafts
        .draft_history(&parse_id(&id)?, Some(&owner_id), query.limit)
        .await?;

    Ok(Json(timer.finish(entries)))
}

/// GET /api/v1/drafts/expiring - The caller's drafts nearing expiry.
pub async fn expiring_drafts(
    State(state): State<AppState>,
    CallerId(owner_id): CallerId,
) -> ApiResult<Vec<ExpirationNotice>> {
    let timer = RequestTimer::start();

    let notices = state.notifier.user_expiration_warnings(&owner_id).await?;

    Ok(Json(timer.finish(notices)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_data_accepts_object_or_string() {
        let object = book_data_string(Some(serde_json::json!({ "title": "Foo" }))).unwrap();
        assert_eq!(serde_json::from_str::<serde_json::Value>(&object).unwrap()["title"], "Foo");

        let raw = book_data_string(Some(serde_json::json!(r#"{"title":"Bar"}"#))).unwrap();
        assert_eq!(raw, r#"{"title":"Bar"}"#);

        assert!(book_data_string(Some(serde_json::Value::Null)).is_none());
        assert!(book_data_string(None).is_none());
    }

    #[test]
    fn test_update_body_tells_null_from_absent() {
        let absent: UpdateDraftBody =
            serde_json::from_value(serde_json::json!({ "expected_version": 3 })).unwrap();
        assert!(absent.book_data.is_none());
        assert_eq!(book_data_patch(absent.book_data), None);

        let cleared: UpdateDraftBody =
            serde_json::from_value(serde_json::json!({ "expected_version": 3, "book_data": null }))
                .unwrap();
        assert_eq!(cleared.book_data, Some(None));
        assert_eq!(book_data_patch(cleared.book_data).as_deref(), Some(""));

        let set: UpdateDraftBody = serde_json::from_value(
            serde_json::json!({ "expected_version": 3, "book_data": { "title": "Foo" } }),
        )
        .unwrap();
        assert!(book_data_patch(set.book_data).unwrap().contains("Foo"));
    }
}
