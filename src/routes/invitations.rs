use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, DataResponse};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::{Invitation, InviteContractorsRequest, RespondToInviteRequest};
use crate::error::ApiResult;

/// POST /tenders/:tender_id/invitations
pub async fn invite_contractors(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(tender_id): Path<Uuid>,
    Json(req): Json<InviteContractorsRequest>,
) -> ApiResult<Created<Vec<Invitation>>> {
    let caller = auth.caller()?;
    let invitations = state
        .engine
        .invite_contractors(&caller, tender_id, req)
        .await?;
    Ok(Created(invitations))
}

/// GET /tenders/:tender_id/invitations
///
/// Contractors only see their own invitation.
pub async fn list_invitations(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(tender_id): Path<Uuid>,
) -> ApiResult<DataResponse<Vec<Invitation>>> {
    let caller = auth.caller()?;
    let invitations = state.engine.list_invitations(&caller, tender_id).await?;
    Ok(DataResponse::new(invitations))
}

/// POST /invitations/:invitation_id/respond
pub async fn respond_to_invite(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(invitation_id): Path<Uuid>,
    Json(req): Json<RespondToInviteRequest>,
) -> ApiResult<DataResponse<Invitation>> {
    let caller = auth.caller()?;
    let invitation = state
        .engine
        .respond_to_invite(&caller, invitation_id, req.response)
        .await?;
    Ok(DataResponse::new(invitation))
}
