//! Selection and assignment
//!
//! Selecting a contractor binds them to the tender in one commit: tender
//! status and version, snapshot, audit entry, assignment and every
//! invitation. Losing invitees are forced out whatever they answered.

use std::collections::HashMap;
use uuid::Uuid;

use super::{require_status, EngineError, EngineResult, Operation, TenderEngine};
use crate::domain::*;
use crate::services::notifications as notify;
use crate::store::{AssignmentWrite, ChangeSet};

impl TenderEngine {
    pub async fn select_contractor(
        &self,
        caller: &Caller,
        tender_id: Uuid,
        req: SelectContractorRequest,
    ) -> EngineResult<Assignment> {
        let aggregate = self
            .load_authorized(caller, tender_id, Operation::SelectContractor)
            .await?;
        if req.due_date < req.start_date {
            return Err(EngineError::InvalidDateRange);
        }
        let tender = &aggregate.tender;
        if tender.status.has_contractor() || aggregate.assignment.is_some() {
            return Err(EngineError::AlreadyAssigned);
        }
        require_status(tender, &[TenderStatus::Published])?;

        let pool = self
            .catalog
            .contractors_for_service(tender.service_id)
            .await?;
        if !pool.contains(&req.contractor_id) {
            return Err(EngineError::IneligibleContractor(req.contractor_id));
        }

        let current: HashMap<Uuid, &TenderRequirement> =
            aggregate.current_requirements().map(|r| (r.id, r)).collect();
        let total_amount = if aggregate.bids_of(req.contractor_id).next().is_some() {
            Some(weighted_total(aggregate.bids_of(req.contractor_id), &current)?)
        } else {
            tender.budget
        };

        let now = self.now();
        let mut selected = self.bump(tender, now);
        selected.status = TenderStatus::InProgress;
        selected.selected_contractor = Some(req.contractor_id);

        let assignment = Assignment {
            id: Uuid::new_v4(),
            tender_id,
            contractor_id: req.contractor_id,
            start_date: req.start_date,
            due_date: req.due_date,
            total_amount,
            payment_status: PaymentStatus::Pending,
            actual_completion_date: None,
            comment: req.comment,
            created_at: now,
            updated_at: now,
        };

        let mut changes = ChangeSet::against(&aggregate);

        let winner = match aggregate.invitation_for(req.contractor_id) {
            Some(existing) => Invitation {
                status: InvitationStatus::Accepted,
                updated_at: now,
                ..existing.clone()
            },
            None => Invitation {
                id: Uuid::new_v4(),
                tender_id,
                contractor_id: req.contractor_id,
                status: InvitationStatus::Accepted,
                trust_score: None,
                invited_at: now,
                responded_at: None,
                updated_at: now,
            },
        };
        changes.invitations.push(winner);

        let mut losers = Vec::new();
        for invitation in aggregate
            .invitations
            .iter()
            .filter(|i| i.contractor_id != req.contractor_id)
        {
            if invitation.status.may_bid() {
                losers.push(invitation.contractor_id);
            }
            let forced = invitation.status.forced_on_loss();
            if forced != invitation.status {
                changes.invitations.push(Invitation {
                    status: forced,
                    updated_at: now,
                    ..invitation.clone()
                });
            }
        }

        changes.audit.push(self.audit(
            caller,
            AuditAction::ContractorSelect {
                contractor_id: req.contractor_id,
            },
            Some(serde_json::json!({
                "status": tender.status,
                "selected_contractor": tender.selected_contractor,
            })),
            Some(serde_json::json!({
                "status": selected.status,
                "selected_contractor": selected.selected_contractor,
                "assignment_id": assignment.id,
            })),
            now,
        ));
        changes.tender = Some(selected.clone());
        changes.assignment = Some(AssignmentWrite::Create(assignment.clone()));
        changes.snapshot = Some(self.snapshot(caller, &aggregate, &changes, "contractor_select", now));
        self.commit(&aggregate, changes).await?;

        tracing::info!(
            tender_id = %tender_id,
            actor_id = %caller.user_id,
            contractor_id = %req.contractor_id,
            assignment_id = %assignment.id,
            "Contractor selected"
        );

        let mut notifications = vec![notify::contractor_selected(req.contractor_id, &selected)];
        notifications.extend(
            losers
                .into_iter()
                .map(|contractor_id| notify::tender_awarded_elsewhere(contractor_id, &selected)),
        );
        self.notify(notifications).await;

        Ok(assignment)
    }

    pub async fn get_assignment(&self, caller: &Caller, tender_id: Uuid) -> EngineResult<Assignment> {
        let aggregate = self
            .load_authorized(caller, tender_id, Operation::ViewProgress)
            .await?;
        aggregate.assignment.ok_or(EngineError::NotFound("assignment"))
    }

    pub async fn update_payment_status(
        &self,
        caller: &Caller,
        tender_id: Uuid,
        req: UpdatePaymentRequest,
    ) -> EngineResult<Assignment> {
        let aggregate = self
            .load_authorized(caller, tender_id, Operation::UpdatePayment)
            .await?;
        require_status(
            &aggregate.tender,
            &[TenderStatus::InProgress, TenderStatus::Completed],
        )?;
        let old = aggregate
            .assignment
            .clone()
            .ok_or(EngineError::NotFound("assignment"))?;

        let now = self.now();
        let assignment = Assignment {
            payment_status: req.payment_status,
            updated_at: now,
            ..old.clone()
        };

        let mut changes = ChangeSet::against(&aggregate);
        changes.assignment = Some(AssignmentWrite::Update(assignment.clone()));
        changes.audit.push(self.audit(
            caller,
            AuditAction::PaymentUpdate {
                assignment_id: assignment.id,
            },
            Some(serde_json::json!({ "payment_status": old.payment_status })),
            Some(serde_json::json!({ "payment_status": assignment.payment_status })),
            now,
        ));
        self.commit(&aggregate, changes).await?;

        tracing::info!(
            tender_id = %tender_id,
            actor_id = %caller.user_id,
            payment_status = %assignment.payment_status,
            "Payment status updated"
        );
        Ok(assignment)
    }

    /// Rate the contractor of a completed tender, once per tender.
    pub async fn rate_contractor(
        &self,
        caller: &Caller,
        tender_id: Uuid,
        req: RateContractorRequest,
    ) -> EngineResult<RatingResponse> {
        let aggregate = self
            .load_authorized(caller, tender_id, Operation::Rate)
            .await?;
        require_status(&aggregate.tender, &[TenderStatus::Completed])?;
        if !(1..=5).contains(&req.score) {
            return Err(EngineError::validation("score must be between 1 and 5"));
        }
        let contractor_id = aggregate
            .tender
            .selected_contractor
            .ok_or_else(|| EngineError::InvalidState("tender has no contractor".to_string()))?;

        let now = self.now();
        let mut changes = ChangeSet::against(&aggregate);
        changes.rating = Some(NewRating {
            contractor_id,
            tender_id,
            rater_id: caller.user_id,
            score: req.score,
            comment: req.comment.clone(),
            created_at: now,
        });
        changes.audit.push(self.audit(
            caller,
            AuditAction::ContractorRate { contractor_id },
            None,
            Some(serde_json::json!({ "score": req.score, "comment": req.comment })),
            now,
        ));
        let average_rating = self
            .commit(&aggregate, changes)
            .await?
            .contractor_rating
            .ok_or_else(|| anyhow::anyhow!("commit did not report the contractor average"))?;

        tracing::info!(
            tender_id = %tender_id,
            actor_id = %caller.user_id,
            contractor_id = %contractor_id,
            score = req.score,
            "Contractor rated"
        );

        Ok(RatingResponse {
            contractor_id,
            score: req.score,
            average_rating,
        })
    }
}
