pub mod assignments;
pub mod bids;
pub mod health;
pub mod invitations;
pub mod me;
pub mod progress;
pub mod tenders;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;

use crate::app::AppState;

/// Build the API router with all routes
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Public routes
        .route("/health", get(health::health_check))
        // Protected routes
        .route("/me", get(me::get_me))
        // Tenders
        .route(
            "/tenders",
            post(tenders::create_tender).get(tenders::list_tenders),
        )
        .route(
            "/tenders/:tender_id",
            get(tenders::get_tender).patch(tenders::update_tender),
        )
        .route("/tenders/:tender_id/publish", post(tenders::publish_tender))
        .route("/tenders/:tender_id/cancel", post(tenders::cancel_tender))
        .route("/tenders/:tender_id/complete", post(tenders::complete_tender))
        // Requirement lines
        .route(
            "/tenders/:tender_id/requirements",
            get(tenders::list_requirements).post(tenders::add_requirement),
        )
        .route(
            "/requirements/:requirement_id",
            patch(tenders::update_requirement).delete(tenders::delete_requirement),
        )
        // Attachments
        .route(
            "/tenders/:tender_id/attachments",
            post(tenders::add_attachment),
        )
        .route(
            "/attachments/:attachment_id",
            delete(tenders::delete_attachment),
        )
        // Invitations
        .route(
            "/tenders/:tender_id/invitations",
            get(invitations::list_invitations).post(invitations::invite_contractors),
        )
        .route(
            "/invitations/:invitation_id/respond",
            post(invitations::respond_to_invite),
        )
        // Bids
        .route(
            "/tenders/:tender_id/bids",
            get(bids::list_bids).post(bids::submit_bid),
        )
        .route("/tenders/:tender_id/bids/all", post(bids::submit_all_bids))
        .route("/tenders/:tender_id/bids/mine", get(bids::list_my_bids))
        .route("/tenders/:tender_id/bids/summary", get(bids::bid_summary))
        .route(
            "/bids/:bid_id",
            patch(bids::update_bid).delete(bids::delete_bid),
        )
        // Selection and assignment
        .route(
            "/tenders/:tender_id/select",
            post(assignments::select_contractor),
        )
        .route(
            "/tenders/:tender_id/assignment",
            get(assignments::get_assignment),
        )
        .route(
            "/tenders/:tender_id/assignment/payment",
            patch(assignments::update_payment_status),
        )
        .route(
            "/tenders/:tender_id/rating",
            post(assignments::rate_contractor),
        )
        // Progress
        .route(
            "/tenders/:tender_id/progress",
            get(progress::get_progress).put(progress::update_progress),
        )
        .route(
            "/tenders/:tender_id/milestones",
            post(progress::add_milestone),
        )
        .route(
            "/milestones/:milestone_id",
            patch(progress::update_milestone),
        )
        // History
        .route("/tenders/:tender_id/audit-log", get(tenders::audit_log))
        .route("/tenders/:tender_id/versions", get(tenders::versions))
}
