use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, DataResponse};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::{
    AddMilestoneRequest, Milestone, Progress, ProgressResponse, UpdateMilestoneRequest,
    UpdateProgressRequest,
};
use crate::error::ApiResult;

/// GET /tenders/:tender_id/progress
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(tender_id): Path<Uuid>,
) -> ApiResult<DataResponse<ProgressResponse>> {
    let caller = auth.caller()?;
    let progress = state.engine.get_progress(&caller, tender_id).await?;
    Ok(DataResponse::new(progress))
}

/// PUT /tenders/:tender_id/progress
pub async fn update_progress(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(tender_id): Path<Uuid>,
    Json(req): Json<UpdateProgressRequest>,
) -> ApiResult<DataResponse<Progress>> {
    let caller = auth.caller()?;
    let progress = state.engine.update_progress(&caller, tender_id, req).await?;
    Ok(DataResponse::new(progress))
}

/// POST /tenders/:tender_id/milestones
pub async fn add_milestone(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(tender_id): Path<Uuid>,
    Json(req): Json<AddMilestoneRequest>,
) -> ApiResult<Created<Milestone>> {
    let caller = auth.caller()?;
    let milestone = state.engine.add_milestone(&caller, tender_id, req).await?;
    Ok(Created(milestone))
}

/// PATCH /milestones/:milestone_id
pub async fn update_milestone(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(milestone_id): Path<Uuid>,
    Json(req): Json<UpdateMilestoneRequest>,
) -> ApiResult<DataResponse<Milestone>> {
    let caller = auth.caller()?;
    let milestone = state
        .engine
        .update_milestone(&caller, milestone_id, req)
        .await?;
    Ok(DataResponse::new(milestone))
}
