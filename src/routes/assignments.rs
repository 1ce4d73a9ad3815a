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
    Assignment, RateContractorRequest, RatingResponse, SelectContractorRequest,
    UpdatePaymentRequest,
};
use crate::error::ApiResult;

/// POST /tenders/:tender_id/select
pub async fn select_contractor(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(tender_id): Path<Uuid>,
    Json(req): Json<SelectContractorRequest>,
) -> ApiResult<Created<Assignment>> {
    let caller = auth.caller()?;
    let assignment = state
        .engine
        .select_contractor(&caller, tender_id, req)
        .await?;
    Ok(Created(assignment))
}

/// GET /tenders/:tender_id/assignment
pub async fn get_assignment(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(tender_id): Path<Uuid>,
) -> ApiResult<DataResponse<Assignment>> {
    let caller = auth.caller()?;
    let assignment = state.engine.get_assignment(&caller, tender_id).await?;
    Ok(DataResponse::new(assignment))
}

/// PATCH /tenders/:tender_id/assignment/payment
pub async fn update_payment_status(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(tender_id): Path<Uuid>,
    Json(req): Json<UpdatePaymentRequest>,
) -> ApiResult<DataResponse<Assignment>> {
    let caller = auth.caller()?;
    let assignment = state
        .engine
        .update_payment_status(&caller, tender_id, req)
        .await?;
    Ok(DataResponse::new(assignment))
}

/// POST /tenders/:tender_id/rating
pub async fn rate_contractor(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(tender_id): Path<Uuid>,
    Json(req): Json<RateContractorRequest>,
) -> ApiResult<Created<RatingResponse>> {
    let caller = auth.caller()?;
    let rating = state.engine.rate_contractor(&caller, tender_id, req).await?;
    Ok(Created(rating))
}
