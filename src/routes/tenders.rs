//! Tender routes
//!
//! Lifecycle, requirement lines and attachments. Every handler resolves the
//! caller and hands off to the engine.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, DataResponse, NoContent, Paginated, PaginationParams};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::*;
use crate::error::ApiResult;

/// POST /tenders
pub async fn create_tender(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Json(req): Json<CreateTenderRequest>,
) -> ApiResult<Created<Tender>> {
    let caller = auth.caller()?;
    let tender = state.engine.create_tender(&caller, req).await?;
    Ok(Created(tender))
}

/// GET /tenders
///
/// Scoped by role: customers see their own tenders, contractors the ones
/// they were invited to or selected for, supervisors the ones they vet.
pub async fn list_tenders(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Query(pagination): Query<PaginationParams>,
    Query(query): Query<TenderQuery>,
) -> ApiResult<Paginated<Tender>> {
    let caller = auth.caller()?;
    let (tenders, total) = state
        .engine
        .list_tenders(&caller, &query, pagination.limit(), pagination.offset())
        .await?;
    Ok(Paginated::new(tenders, &pagination, total))
}

/// GET /tenders/:tender_id
pub async fn get_tender(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(tender_id): Path<Uuid>,
) -> ApiResult<DataResponse<TenderDetailResponse>> {
    let caller = auth.caller()?;
    let detail = state.engine.get_tender(&caller, tender_id).await?;
    Ok(DataResponse::new(detail))
}

/// PATCH /tenders/:tender_id
pub async fn update_tender(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(tender_id): Path<Uuid>,
    Json(req): Json<UpdateTenderRequest>,
) -> ApiResult<DataResponse<Tender>> {
    let caller = auth.caller()?;
    let tender = state.engine.update_tender(&caller, tender_id, req).await?;
    Ok(DataResponse::new(tender))
}

/// POST /tenders/:tender_id/publish
pub async fn publish_tender(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(tender_id): Path<Uuid>,
    Json(req): Json<PublishTenderRequest>,
) -> ApiResult<DataResponse<Tender>> {
    let caller = auth.caller()?;
    let tender = state.engine.publish_tender(&caller, tender_id, req).await?;
    Ok(DataResponse::new(tender))
}

/// POST /tenders/:tender_id/cancel
pub async fn cancel_tender(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(tender_id): Path<Uuid>,
) -> ApiResult<DataResponse<Tender>> {
    let caller = auth.caller()?;
    let tender = state.engine.cancel_tender(&caller, tender_id).await?;
    Ok(DataResponse::new(tender))
}

/// POST /tenders/:tender_id/complete
pub async fn complete_tender(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(tender_id): Path<Uuid>,
) -> ApiResult<DataResponse<Tender>> {
    let caller = auth.caller()?;
    let tender = state.engine.complete_tender(&caller, tender_id).await?;
    Ok(DataResponse::new(tender))
}

// ============================================================================
// Requirement lines
// ============================================================================

/// GET /tenders/:tender_id/requirements
pub async fn list_requirements(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(tender_id): Path<Uuid>,
) -> ApiResult<DataResponse<Vec<TenderRequirement>>> {
    let caller = auth.caller()?;
    let lines = state.engine.list_requirements(&caller, tender_id).await?;
    Ok(DataResponse::new(lines))
}

/// POST /tenders/:tender_id/requirements
pub async fn add_requirement(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(tender_id): Path<Uuid>,
    Json(req): Json<AddRequirementRequest>,
) -> ApiResult<Created<TenderRequirement>> {
    let caller = auth.caller()?;
    let line = state.engine.add_requirement(&caller, tender_id, req).await?;
    Ok(Created(line))
}

/// PATCH /requirements/:requirement_id
///
/// On a published tender the response carries the new line id.
pub async fn update_requirement(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(requirement_id): Path<Uuid>,
    Json(req): Json<UpdateRequirementRequest>,
) -> ApiResult<DataResponse<TenderRequirement>> {
    let caller = auth.caller()?;
    let line = state
        .engine
        .update_requirement(&caller, requirement_id, req)
        .await?;
    Ok(DataResponse::new(line))
}

/// DELETE /requirements/:requirement_id
pub async fn delete_requirement(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(requirement_id): Path<Uuid>,
) -> ApiResult<NoContent> {
    let caller = auth.caller()?;
    state.engine.delete_requirement(&caller, requirement_id).await?;
    Ok(NoContent)
}

// ============================================================================
// Attachments
// ============================================================================

/// POST /tenders/:tender_id/attachments
pub async fn add_attachment(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(tender_id): Path<Uuid>,
    Json(req): Json<AddAttachmentRequest>,
) -> ApiResult<Created<Attachment>> {
    let caller = auth.caller()?;
    let attachment = state.engine.add_attachment(&caller, tender_id, req).await?;
    Ok(Created(attachment))
}

/// DELETE /attachments/:attachment_id
pub async fn delete_attachment(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(attachment_id): Path<Uuid>,
) -> ApiResult<NoContent> {
    let caller = auth.caller()?;
    state.engine.delete_attachment(&caller, attachment_id).await?;
    Ok(NoContent)
}

// ============================================================================
// History
// ============================================================================

/// GET /tenders/:tender_id/audit-log
pub async fn audit_log(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(tender_id): Path<Uuid>,
) -> ApiResult<DataResponse<Vec<AuditEntry>>> {
    let caller = auth.caller()?;
    let entries = state.engine.audit_log(&caller, tender_id).await?;
    Ok(DataResponse::new(entries))
}

/// GET /tenders/:tender_id/versions
pub async fn versions(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(tender_id): Path<Uuid>,
) -> ApiResult<DataResponse<Vec<VersionSnapshot>>> {
    let caller = auth.caller()?;
    let snapshots = state.engine.versions(&caller, tender_id).await?;
    Ok(DataResponse::new(snapshots))
}
