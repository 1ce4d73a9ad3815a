//! Bid book operations
//!
//! Bids are sealed, one per (requirement, contractor), and writable only
//! inside the tender's bidding window. The window is checked here and again
//! by the store against its own clock at commit time.

use rust_decimal::Decimal;
use std::collections::HashSet;
use uuid::Uuid;

use super::{json, policy, EngineError, EngineResult, Operation, TenderEngine};
use crate::domain::money;
use crate::domain::*;
use crate::store::{ChangeSet, ChildRef, TenderAggregate};

fn validate_amount(amount: Decimal) -> EngineResult<()> {
    if amount <= Decimal::ZERO {
        return Err(EngineError::validation("bid amount must be positive"));
    }
    if !money::AMOUNT.holds(amount) {
        return Err(EngineError::validation(format!(
            "bid amount must be below {} with at most {} decimal places",
            money::AMOUNT.limit(),
            money::AMOUNT.scale
        )));
    }
    Ok(())
}

impl TenderEngine {
    /// Gate shared by every bid write, in order: role, window, invitation,
    /// tender status.
    fn check_bid_gate(
        &self,
        caller: &Caller,
        aggregate: &TenderAggregate,
        op: Operation,
    ) -> EngineResult<BidWindow> {
        policy::authorize(caller, aggregate, op).into_result()?;

        let window = aggregate
            .tender
            .bid_window()
            .filter(|w| w.contains(self.now()))
            .ok_or(EngineError::BidWindowClosed)?;

        let may_bid = aggregate
            .invitation_for(caller.user_id)
            .is_some_and(|i| i.status.may_bid());
        if !may_bid {
            return Err(EngineError::NotInvited);
        }

        if aggregate.tender.status != TenderStatus::Published {
            return Err(EngineError::status(aggregate.tender.status));
        }

        Ok(window)
    }

    pub async fn submit_bid(
        &self,
        caller: &Caller,
        tender_id: Uuid,
        req: CreateBidRequest,
    ) -> EngineResult<Bid> {
        let aggregate = self.load(tender_id).await?;
        let window = self.check_bid_gate(caller, &aggregate, Operation::SubmitBid)?;

        let requirement = aggregate
            .requirement(req.requirement_id)
            .filter(|r| r.is_current)
            .ok_or(EngineError::NotFound("requirement"))?;
        validate_amount(req.amount)?;
        if aggregate.has_bid(requirement.id, caller.user_id) {
            return Err(EngineError::DuplicateBid);
        }

        let now = self.now();
        let bid = Bid {
            id: Uuid::new_v4(),
            tender_id,
            requirement_id: requirement.id,
            contractor_id: caller.user_id,
            amount: req.amount,
            proposal: req.proposal,
            is_final: false,
            created_at: now,
            updated_at: now,
        };

        let mut changes = ChangeSet::against(&aggregate);
        changes.bid_window = Some(window);
        changes.new_bids.push(bid.clone());
        changes.audit.push(self.audit(
            caller,
            AuditAction::BidAdd {
                contractor_id: caller.user_id,
                bid_ids: vec![bid.id],
            },
            None,
            json(&bid),
            now,
        ));
        self.commit(&aggregate, changes).await?;

        tracing::info!(
            tender_id = %tender_id,
            actor_id = %caller.user_id,
            bid_id = %bid.id,
            requirement_id = %bid.requirement_id,
            "Bid submitted"
        );
        Ok(bid)
    }

    /// Price every current requirement line at once. Nothing is written
    /// unless the whole set is accepted.
    pub async fn submit_all_bids(
        &self,
        caller: &Caller,
        tender_id: Uuid,
        req: SubmitAllBidsRequest,
    ) -> EngineResult<Vec<Bid>> {
        let aggregate = self.load(tender_id).await?;
        let window = self.check_bid_gate(caller, &aggregate, Operation::SubmitBid)?;

        let current: HashSet<Uuid> = aggregate.current_requirements().map(|r| r.id).collect();
        let mut priced = HashSet::new();
        for line in &req.bids {
            if !current.contains(&line.requirement_id) {
                return Err(EngineError::IncompleteBidSet(format!(
                    "requirement {} is not a current line of this tender",
                    line.requirement_id
                )));
            }
            if !priced.insert(line.requirement_id) {
                return Err(EngineError::IncompleteBidSet(format!(
                    "requirement {} priced more than once",
                    line.requirement_id
                )));
            }
        }
        if priced.len() != current.len() {
            return Err(EngineError::IncompleteBidSet(format!(
                "{} of {} requirements priced",
                priced.len(),
                current.len()
            )));
        }
        for line in &req.bids {
            validate_amount(line.amount)?;
            if aggregate.has_bid(line.requirement_id, caller.user_id) {
                return Err(EngineError::DuplicateBid);
            }
        }

        let now = self.now();
        let bids: Vec<Bid> = req
            .bids
            .into_iter()
            .map(|line| Bid {
                id: Uuid::new_v4(),
                tender_id,
                requirement_id: line.requirement_id,
                contractor_id: caller.user_id,
                amount: line.amount,
                proposal: line.proposal,
                is_final: true,
                created_at: now,
                updated_at: now,
            })
            .collect();

        let mut changes = ChangeSet::against(&aggregate);
        changes.bid_window = Some(window);
        changes.new_bids = bids.clone();
        changes.audit.push(self.audit(
            caller,
            AuditAction::BidAdd {
                contractor_id: caller.user_id,
                bid_ids: bids.iter().map(|b| b.id).collect(),
            },
            None,
            json(&bids),
            now,
        ));
        self.commit(&aggregate, changes).await?;

        tracing::info!(
            tender_id = %tender_id,
            actor_id = %caller.user_id,
            bids = bids.len(),
            "Full bid set submitted"
        );
        Ok(bids)
    }

    async fn load_own_bid(
        &self,
        caller: &Caller,
        bid_id: Uuid,
    ) -> EngineResult<(TenderAggregate, Bid, BidWindow)> {
        let tender_id = self.resolve(ChildRef::Bid(bid_id), "bid").await?;
        let aggregate = self.load(tender_id).await?;
        let bid = aggregate
            .bids
            .iter()
            .find(|b| b.id == bid_id)
            .cloned()
            .ok_or(EngineError::NotFound("bid"))?;
        let window = self.check_bid_gate(
            caller,
            &aggregate,
            Operation::ModifyBid {
                contractor_id: bid.contractor_id,
            },
        )?;
        Ok((aggregate, bid, window))
    }

    pub async fn update_bid(
        &self,
        caller: &Caller,
        bid_id: Uuid,
        req: UpdateBidRequest,
    ) -> EngineResult<Bid> {
        let (aggregate, old, window) = self.load_own_bid(caller, bid_id).await?;
        validate_amount(req.amount)?;

        let now = self.now();
        let mut bid = old.clone();
        bid.amount = req.amount;
        if req.proposal.is_some() {
            bid.proposal = req.proposal;
        }
        bid.updated_at = now;

        let mut changes = ChangeSet::against(&aggregate);
        changes.bid_window = Some(window);
        changes.bids.push(bid.clone());
        changes.audit.push(self.audit(
            caller,
            AuditAction::BidUpdate { bid_id },
            Some(serde_json::json!({ "amount": old.amount, "proposal": old.proposal })),
            Some(serde_json::json!({ "amount": bid.amount, "proposal": bid.proposal })),
            now,
        ));
        self.commit(&aggregate, changes).await?;

        tracing::info!(
            tender_id = %bid.tender_id,
            actor_id = %caller.user_id,
            bid_id = %bid_id,
            "Bid updated"
        );
        Ok(bid)
    }

    /// Hard-delete a bid while the window is open.
    pub async fn delete_bid(&self, caller: &Caller, bid_id: Uuid) -> EngineResult<()> {
        let (aggregate, old, window) = self.load_own_bid(caller, bid_id).await?;

        let now = self.now();
        let mut changes = ChangeSet::against(&aggregate);
        changes.bid_window = Some(window);
        changes.removed_bids.push(bid_id);
        changes.audit.push(self.audit(
            caller,
            AuditAction::BidDelete { bid_id },
            json(&old),
            None,
            now,
        ));
        self.commit(&aggregate, changes).await?;

        tracing::info!(
            tender_id = %old.tender_id,
            actor_id = %caller.user_id,
            bid_id = %bid_id,
            "Bid deleted"
        );
        Ok(())
    }

    /// Full bid matrix; owner and supervisor only.
    pub async fn list_bids(&self, caller: &Caller, tender_id: Uuid) -> EngineResult<Vec<Bid>> {
        let aggregate = self
            .load_authorized(caller, tender_id, Operation::ViewBidMatrix)
            .await?;
        Ok(aggregate.bids)
    }

    pub async fn list_my_bids(&self, caller: &Caller, tender_id: Uuid) -> EngineResult<Vec<Bid>> {
        let aggregate = self
            .load_authorized(caller, tender_id, Operation::ViewTender)
            .await?;
        Ok(aggregate.bids_of(caller.user_id).cloned().collect())
    }

    /// Bids grouped per contractor with quantity-weighted totals.
    pub async fn bid_summary(
        &self,
        caller: &Caller,
        tender_id: Uuid,
    ) -> EngineResult<Vec<ContractorBidSummary>> {
        let aggregate = self
            .load_authorized(caller, tender_id, Operation::ViewBidMatrix)
            .await?;
        Ok(summarize_by_contractor(
            &aggregate.bids,
            &aggregate.requirements,
        )?)
    }
}
