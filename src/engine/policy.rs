//! Authorization policy
//!
//! One function decides whether a caller may perform an operation on a
//! tender. Engine operations consult it before touching anything else.

use uuid::Uuid;

use super::error::EngineError;
use crate::domain::{Caller, Role};
use crate::store::TenderAggregate;

/// Operations subject to authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ViewTender,
    UpdateTender,
    EditRequirements,
    ManageAttachments,
    Publish,
    Cancel,
    Complete,
    Invite,
    /// Respond on behalf of the invitation's contractor
    RespondToInvite { contractor_id: Uuid },
    SubmitBid,
    ModifyBid { contractor_id: Uuid },
    ViewBidMatrix,
    SelectContractor,
    UpdatePayment,
    ManageProgress,
    ViewProgress,
    Rate,
    ViewHistory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(&'static str),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> Result<(), EngineError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(EngineError::Forbidden(reason)),
        }
    }
}

fn allow_if(cond: bool, reason: &'static str) -> Decision {
    if cond {
        Decision::Allow
    } else {
        Decision::Deny(reason)
    }
}

/// Only customers open tenders.
pub fn authorize_create(caller: &Caller) -> Decision {
    allow_if(
        caller.role == Role::Customer,
        "only customers can create tenders",
    )
}

pub fn authorize(caller: &Caller, aggregate: &TenderAggregate, op: Operation) -> Decision {
    let tender = &aggregate.tender;
    let is_owner = caller.role == Role::Customer && tender.is_owned_by(caller.user_id);
    let is_supervisor = caller.role == Role::Supervisor && tender.is_supervised_by(caller.user_id);
    let is_contractor = caller.role == Role::Contractor;
    let is_selected = is_contractor && tender.selected_contractor == Some(caller.user_id);
    let is_invitee = is_contractor && aggregate.invitation_for(caller.user_id).is_some();

    match op {
        Operation::ViewTender => allow_if(
            is_owner || is_supervisor || is_invitee || is_selected,
            "tender is not visible to this user",
        ),
        Operation::UpdateTender
        | Operation::ManageAttachments
        | Operation::Publish
        | Operation::Cancel
        | Operation::Complete
        | Operation::Invite
        | Operation::SelectContractor
        | Operation::Rate => allow_if(is_owner, "only the tender owner can do this"),
        Operation::EditRequirements => allow_if(
            is_owner || is_supervisor,
            "only the owner or assigned supervisor can edit requirements",
        ),
        Operation::RespondToInvite { contractor_id } => allow_if(
            is_contractor && caller.user_id == contractor_id,
            "invitation belongs to another contractor",
        ),
        Operation::SubmitBid => allow_if(is_contractor, "only contractors can bid"),
        Operation::ModifyBid { contractor_id } => allow_if(
            is_contractor && caller.user_id == contractor_id,
            "bid belongs to another contractor",
        ),
        Operation::ViewBidMatrix | Operation::UpdatePayment | Operation::ViewHistory => allow_if(
            is_owner || is_supervisor,
            "only the owner or assigned supervisor can do this",
        ),
        Operation::ManageProgress | Operation::ViewProgress => allow_if(
            is_owner || is_supervisor || is_selected,
            "only parties to the assignment can access progress",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::*;
    use chrono::Utc;

    fn aggregate(customer: Uuid, supervisor: Uuid) -> TenderAggregate {
        let now = Utc::now();
        TenderAggregate::new(Tender {
            id: Uuid::new_v4(),
            customer_id: customer,
            supervisor_id: Some(supervisor),
            service_id: Uuid::new_v4(),
            title: "Kitchen refit".to_string(),
            description: None,
            location: "Leeds".to_string(),
            budget: None,
            status: TenderStatus::Published,
            priority: TenderPriority::Medium,
            contractor_limit: None,
            version: 1,
            start_time: None,
            end_time: None,
            published_at: None,
            selected_contractor: None,
            created_at: now,
            updated_at: now,
        })
    }

    fn invite(agg: &mut TenderAggregate, contractor_id: Uuid) {
        let now = Utc::now();
        agg.invitations.push(Invitation {
            id: Uuid::new_v4(),
            tender_id: agg.tender.id,
            contractor_id,
            status: InvitationStatus::Invited,
            trust_score: None,
            invited_at: now,
            responded_at: None,
            updated_at: now,
        });
    }

    #[test]
    fn test_owner_only_operations() {
        let (customer, supervisor) = (Uuid::new_v4(), Uuid::new_v4());
        let agg = aggregate(customer, supervisor);

        assert!(authorize(&Caller::customer(customer), &agg, Operation::SelectContractor).is_allowed());
        assert!(!authorize(&Caller::customer(Uuid::new_v4()), &agg, Operation::SelectContractor).is_allowed());
        assert!(!authorize(&Caller::supervisor(supervisor), &agg, Operation::SelectContractor).is_allowed());
        assert!(!authorize(&Caller::contractor(customer), &agg, Operation::Publish).is_allowed());
    }

    #[test]
    fn test_supervisor_may_edit_requirements() {
        let (customer, supervisor) = (Uuid::new_v4(), Uuid::new_v4());
        let agg = aggregate(customer, supervisor);

        assert!(authorize(&Caller::supervisor(supervisor), &agg, Operation::EditRequirements).is_allowed());
        assert!(!authorize(&Caller::supervisor(Uuid::new_v4()), &agg, Operation::EditRequirements).is_allowed());
    }

    #[test]
    fn test_contractor_visibility_requires_invitation() {
        let mut agg = aggregate(Uuid::new_v4(), Uuid::new_v4());
        let contractor = Uuid::new_v4();

        assert_eq!(
            authorize(&Caller::contractor(contractor), &agg, Operation::ViewTender),
            Decision::Deny("tender is not visible to this user")
        );
        invite(&mut agg, contractor);
        assert!(authorize(&Caller::contractor(contractor), &agg, Operation::ViewTender).is_allowed());
        assert!(!authorize(&Caller::contractor(contractor), &agg, Operation::ViewBidMatrix).is_allowed());
    }

    #[test]
    fn test_bid_ownership() {
        let agg = aggregate(Uuid::new_v4(), Uuid::new_v4());
        let owner = Uuid::new_v4();

        assert!(authorize(&Caller::contractor(owner), &agg, Operation::ModifyBid { contractor_id: owner }).is_allowed());
        assert!(!authorize(
            &Caller::contractor(Uuid::new_v4()),
            &agg,
            Operation::ModifyBid { contractor_id: owner }
        )
        .is_allowed());
    }

    #[test]
    fn test_deny_maps_to_forbidden() {
        let err = Decision::Deny("nope").into_result().unwrap_err();
        assert!(matches!(err, EngineError::Forbidden("nope")));
        assert!(!authorize_create(&Caller::contractor(Uuid::new_v4())).is_allowed());
    }
}
