//! Bid routes
//!
//! `POST /tenders/:id/bids/all` is the main contractor entry point; the
//! single-line endpoints exist for edits.

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, DataResponse, NoContent};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::{
    Bid, ContractorBidSummary, CreateBidRequest, SubmitAllBidsRequest, UpdateBidRequest,
};
use crate::error::ApiResult;

/// POST /tenders/:tender_id/bids
pub async fn submit_bid(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(tender_id): Path<Uuid>,
    Json(req): Json<CreateBidRequest>,
) -> ApiResult<Created<Bid>> {
    let caller = auth.caller()?;
    let bid = state.engine.submit_bid(&caller, tender_id, req).await?;
    Ok(Created(bid))
}

/// POST /tenders/:tender_id/bids/all
pub async fn submit_all_bids(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(tender_id): Path<Uuid>,
    Json(req): Json<SubmitAllBidsRequest>,
) -> ApiResult<Created<Vec<Bid>>> {
    let caller = auth.caller()?;
    let bids = state.engine.submit_all_bids(&caller, tender_id, req).await?;
    Ok(Created(bids))
}

/// GET /tenders/:tender_id/bids
pub async fn list_bids(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(tender_id): Path<Uuid>,
) -> ApiResult<DataResponse<Vec<Bid>>> {
    let caller = auth.caller()?;
    let bids = state.engine.list_bids(&caller, tender_id).await?;
    Ok(DataResponse::new(bids))
}

/// GET /tenders/:tender_id/bids/mine
pub async fn list_my_bids(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(tender_id): Path<Uuid>,
) -> ApiResult<DataResponse<Vec<Bid>>> {
    let caller = auth.caller()?;
    let bids = state.engine.list_my_bids(&caller, tender_id).await?;
    Ok(DataResponse::new(bids))
}

/// GET /tenders/:tender_id/bids/summary
pub async fn bid_summary(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(tender_id): Path<Uuid>,
) -> ApiResult<DataResponse<Vec<ContractorBidSummary>>> {
    let caller = auth.caller()?;
    let summary = state.engine.bid_summary(&caller, tender_id).await?;
    Ok(DataResponse::new(summary))
}

/// PATCH /bids/:bid_id
pub async fn update_bid(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(bid_id): Path<Uuid>,
    Json(req): Json<UpdateBidRequest>,
) -> ApiResult<DataResponse<Bid>> {
    let caller = auth.caller()?;
    let bid = state.engine.update_bid(&caller, bid_id, req).await?;
    Ok(DataResponse::new(bid))
}

/// DELETE /bids/:bid_id
pub async fn delete_bid(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(bid_id): Path<Uuid>,
) -> ApiResult<NoContent> {
    let caller = auth.caller()?;
    state.engine.delete_bid(&caller, bid_id).await?;
    Ok(NoContent)
}
