mod common;

use common::*;
use async_trait::async_trait;
use rust_decimal_macros::dec;
use std::sync::Arc;
use uuid::Uuid;

use tenderworks_backend::config::EngineSettings;
use tenderworks_backend::domain::*;
use tenderworks_backend::domain::notifications::NotificationType;
use tenderworks_backend::engine::{EngineError, TenderEngine};
use tenderworks_backend::store::{
    ChangeSet, ChildRef, CommitReceipt, MemoryTenderStore, StoreError, StoreResult,
    TenderAggregate, TenderFilter, TenderStore,
};

/// Store whose commits fail once the connection is lost
struct DisconnectingStore {
    inner: Arc<MemoryTenderStore>,
}

#[async_trait]
impl TenderStore for DisconnectingStore {
    async fn insert_tender(&self, tender: &Tender, audit: NewAuditEntry) -> StoreResult<()> {
        self.inner.insert_tender(tender, audit).await
    }

    async fn load(&self, tender_id: Uuid) -> StoreResult<Option<TenderAggregate>> {
        self.inner.load(tender_id).await
    }

    async fn commit(&self, _changes: ChangeSet) -> StoreResult<CommitReceipt> {
        Err(StoreError::Database(sqlx::Error::PoolClosed))
    }

    async fn tender_of(&self, child: ChildRef) -> StoreResult<Option<Uuid>> {
        self.inner.tender_of(child).await
    }

    async fn list_tenders(
        &self,
        filter: &TenderFilter,
        limit: u32,
        offset: u32,
    ) -> StoreResult<(Vec<Tender>, u64)> {
        self.inner.list_tenders(filter, limit, offset).await
    }

    async fn audit_log(&self, tender_id: Uuid) -> StoreResult<Vec<AuditEntry>> {
        self.inner.audit_log(tender_id).await
    }

    async fn versions(&self, tender_id: Uuid) -> StoreResult<Vec<VersionSnapshot>> {
        self.inner.versions(tender_id).await
    }
}

#[tokio::test]
async fn test_selection_forces_out_the_losers() {
    let h = Harness::new();
    let (tender, lines) = h.bidding().await;
    let (winner, accepted_loser, silent_loser) = (h.contractor(0), h.contractor(1), h.contractor(2));

    let invitation = h.invitation_of(tender.id, &accepted_loser).await;
    h.engine
        .respond_to_invite(&accepted_loser, invitation.id, InviteResponse::Accept)
        .await
        .unwrap();
    h.bid_all(&winner, tender.id, &lines, &[dec!(45), dec!(120), dec!(60)])
        .await;

    h.engine
        .select_contractor(&h.customer, tender.id, h.selection(&winner))
        .await
        .unwrap();

    assert_eq!(
        h.invitation_of(tender.id, &winner).await.status,
        InvitationStatus::Accepted
    );
    assert_eq!(
        h.invitation_of(tender.id, &accepted_loser).await.status,
        InvitationStatus::Declined
    );
    assert_eq!(
        h.invitation_of(tender.id, &silent_loser).await.status,
        InvitationStatus::Removed
    );
    let accepted = h
        .invitations(tender.id)
        .await
        .into_iter()
        .filter(|i| i.status == InvitationStatus::Accepted)
        .count();
    assert_eq!(accepted, 1);

    // Window is still open, but the loser is out
    let err = h
        .engine
        .submit_bid(
            &accepted_loser,
            tender.id,
            CreateBidRequest {
                requirement_id: lines[0].id,
                amount: dec!(30),
                proposal: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotInvited));
}

#[tokio::test]
async fn test_selection_moves_tender_in_progress() {
    let h = Harness::new();
    let (tender, _) = h.in_progress().await;
    assert_eq!(tender.status, TenderStatus::InProgress);
    assert_eq!(tender.selected_contractor, Some(h.contractor(0).user_id));

    let assignment = h
        .engine
        .get_assignment(&h.customer, tender.id)
        .await
        .unwrap();
    assert_eq!(assignment.contractor_id, h.contractor(0).user_id);
    assert_eq!(assignment.payment_status, PaymentStatus::Pending);
    assert_eq!(assignment.start_date, date(2026, 3, 16));
    assert_eq!(assignment.due_date, date(2026, 4, 30));
    // 45*10 + 120*2.5 + 60*4
    assert_eq!(assignment.total_amount, Some(dec!(990)));
}

#[tokio::test]
async fn test_selection_without_bids_falls_back_to_budget() {
    let h = Harness::new();
    let (tender, _) = h.bidding().await;

    let assignment = h
        .engine
        .select_contractor(&h.customer, tender.id, h.selection(&h.contractor(2)))
        .await
        .unwrap();
    assert_eq!(assignment.total_amount, Some(dec!(8000)));
}

#[tokio::test]
async fn test_selecting_uninvited_pool_member_creates_accepted_invitation() {
    let h = Harness::with_settings(EngineSettings {
        min_trust_score: None,
        max_auto_invitees: Some(1),
    });
    let (tender, _) = h.bidding().await;
    let invited = h.invitations(tender.id).await[0].contractor_id;
    let outsider = h
        .contractors
        .iter()
        .find(|c| c.user_id != invited)
        .copied()
        .unwrap();

    h.engine
        .select_contractor(&h.customer, tender.id, h.selection(&outsider))
        .await
        .unwrap();

    let invitations = h.invitations(tender.id).await;
    assert_eq!(invitations.len(), 2);
    assert_eq!(
        h.invitation_of(tender.id, &outsider).await.status,
        InvitationStatus::Accepted
    );
    assert_eq!(
        invitations
            .iter()
            .find(|i| i.contractor_id == invited)
            .unwrap()
            .status,
        InvitationStatus::Removed
    );
}

#[tokio::test]
async fn test_second_selection_is_rejected() {
    let h = Harness::new();
    let (tender, _) = h.in_progress().await;
    let version = tender.version;

    let err = h
        .engine
        .select_contractor(&h.customer, tender.id, h.selection(&h.contractor(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AlreadyAssigned));

    let after = h.tender(tender.id).await;
    assert_eq!(after.selected_contractor, Some(h.contractor(0).user_id));
    assert_eq!(after.version, version);
}

#[tokio::test]
async fn test_selection_guards() {
    let h = Harness::new();
    let (tender, _) = h.bidding().await;

    let err = h
        .engine
        .select_contractor(&h.supervisor, tender.id, h.selection(&h.contractor(0)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let mut backwards = h.selection(&h.contractor(0));
    backwards.due_date = date(2026, 3, 1);
    let err = h
        .engine
        .select_contractor(&h.customer, tender.id, backwards)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidDateRange));

    let mut stranger = h.selection(&h.contractor(0));
    stranger.contractor_id = Uuid::new_v4();
    let err = h
        .engine
        .select_contractor(&h.customer, tender.id, stranger)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::IneligibleContractor(_)));

    let draft = h.draft().await;
    let err = h
        .engine
        .select_contractor(&h.customer, draft.id, h.selection(&h.contractor(0)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));

    assert_eq!(h.tender(tender.id).await.status, TenderStatus::Published);
}

#[tokio::test]
async fn test_selection_notifies_winner_and_live_losers() {
    let h = Harness::new();
    let (tender, _) = h.bidding().await;
    let (winner, declined, silent) = (h.contractor(0), h.contractor(1), h.contractor(2));

    let invitation = h.invitation_of(tender.id, &declined).await;
    h.engine
        .respond_to_invite(&declined, invitation.id, InviteResponse::Decline)
        .await
        .unwrap();
    h.engine
        .select_contractor(&h.customer, tender.id, h.selection(&winner))
        .await
        .unwrap();

    let kinds = |user: &Caller| -> Vec<NotificationType> {
        h.notifier
            .sent_to(user.user_id)
            .into_iter()
            .map(|n| n.notification_type)
            .collect()
    };
    assert_eq!(
        kinds(&winner),
        vec![
            NotificationType::TenderInvitation,
            NotificationType::ContractorSelected
        ]
    );
    assert_eq!(
        kinds(&silent),
        vec![
            NotificationType::TenderInvitation,
            NotificationType::TenderAwardedElsewhere
        ]
    );
    // Already out of the running
    assert_eq!(kinds(&declined), vec![NotificationType::TenderInvitation]);
    assert_eq!(
        h.invitation_of(tender.id, &declined).await.status,
        InvitationStatus::Removed
    );
}

#[tokio::test]
async fn test_assignment_visibility() {
    let h = Harness::new();
    let (tender, _) = h.in_progress().await;

    h.engine
        .get_assignment(&h.contractor(0), tender.id)
        .await
        .unwrap();
    h.engine
        .get_assignment(&h.supervisor, tender.id)
        .await
        .unwrap();
    let err = h
        .engine
        .get_assignment(&h.contractor(1), tender.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let (published, _) = h.published().await;
    let err = h
        .engine
        .get_assignment(&h.customer, published.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound("assignment")));
}

#[tokio::test]
async fn test_payment_status_updates() {
    let h = Harness::new();
    let (tender, _) = h.in_progress().await;

    let assignment = h
        .engine
        .update_payment_status(
            &h.supervisor,
            tender.id,
            UpdatePaymentRequest {
                payment_status: PaymentStatus::PartiallyPaid,
            },
        )
        .await
        .unwrap();
    assert_eq!(assignment.payment_status, PaymentStatus::PartiallyPaid);

    let err = h
        .engine
        .update_payment_status(
            &h.contractor(0),
            tender.id,
            UpdatePaymentRequest {
                payment_status: PaymentStatus::Paid,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let stored = h
        .engine
        .get_assignment(&h.customer, tender.id)
        .await
        .unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::PartiallyPaid);

    let log = h.store.audit_log(tender.id).await.unwrap();
    let last = log.last().unwrap();
    assert_eq!(last.action.kind(), "payment_update");
    assert_eq!(
        last.old_value,
        Some(serde_json::json!({ "payment_status": "pending" }))
    );
}

#[tokio::test]
async fn test_payment_requires_assignment() {
    let h = Harness::new();
    let (tender, _) = h.bidding().await;

    let err = h
        .engine
        .update_payment_status(
            &h.customer,
            tender.id,
            UpdatePaymentRequest {
                payment_status: PaymentStatus::Paid,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
}

#[tokio::test]
async fn test_rating_after_completion_only_once() {
    let h = Harness::new();
    let (tender, _) = h.in_progress().await;
    let rate = |score: i16| RateContractorRequest {
        score,
        comment: Some("Tidy work".to_string()),
    };

    let err = h
        .engine
        .rate_contractor(&h.customer, tender.id, rate(5))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));

    h.engine
        .complete_tender(&h.customer, tender.id)
        .await
        .unwrap();

    let err = h
        .engine
        .rate_contractor(&h.customer, tender.id, rate(6))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let rating = h
        .engine
        .rate_contractor(&h.customer, tender.id, rate(4))
        .await
        .unwrap();
    assert_eq!(rating.contractor_id, h.contractor(0).user_id);
    assert_eq!(rating.score, 4);
    assert_eq!(rating.average_rating, dec!(4));

    let err = h
        .engine
        .rate_contractor(&h.customer, tender.id, rate(2))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
    assert_eq!(h.store.ratings().len(), 1);

    let log = h.store.audit_log(tender.id).await.unwrap();
    assert_eq!(log.last().unwrap().action.kind(), "contractor_rate");
}

#[tokio::test]
async fn test_only_owner_rates() {
    let h = Harness::new();
    let (tender, _) = h.in_progress().await;
    h.engine
        .complete_tender(&h.customer, tender.id)
        .await
        .unwrap();

    let err = h
        .engine
        .rate_contractor(
            &h.supervisor,
            tender.id,
            RateContractorRequest {
                score: 5,
                comment: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn test_failed_rating_commit_writes_nothing() {
    let h = Harness::new();
    let (tender, _) = h.in_progress().await;
    h.engine
        .complete_tender(&h.customer, tender.id)
        .await
        .unwrap();
    let audit_before = h.store_audit_len(tender.id).await;

    let disconnected = TenderEngine::new(
        Arc::new(DisconnectingStore {
            inner: h.store.clone(),
        }),
        h.catalog.clone(),
        h.directory.clone(),
        h.notifier.clone(),
        h.clock.clone(),
        EngineSettings::default(),
    );
    let rate = RateContractorRequest {
        score: 5,
        comment: None,
    };

    let err = disconnected
        .rate_contractor(&h.customer, tender.id, rate.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Internal(_)));
    assert!(h.store.ratings().is_empty());
    assert_eq!(h.store_audit_len(tender.id).await, audit_before);

    // Nothing half-written blocks the retry
    let rating = h
        .engine
        .rate_contractor(&h.customer, tender.id, rate)
        .await
        .unwrap();
    assert_eq!(rating.average_rating, dec!(5));
    assert_eq!(h.store.ratings().len(), 1);
    assert_eq!(h.store_audit_len(tender.id).await, audit_before + 1);
}
