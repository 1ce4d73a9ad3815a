//! In-process tender store
//!
//! A single mutex around all state makes every commit atomic. Used by the
//! test-suite and for running the service without Postgres.

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use super::{
    AssignmentWrite, ChangeSet, ChildRef, CommitReceipt, StoreError, StoreResult,
    TenderAggregate, TenderFilter, TenderStore,
};
use crate::clock::Clock;
use crate::domain::*;

#[derive(Default)]
struct MemoryState {
    tenders: HashMap<Uuid, TenderAggregate>,
    audit: HashMap<Uuid, Vec<AuditEntry>>,
    versions: HashMap<Uuid, Vec<VersionSnapshot>>,
    ratings: Vec<NewRating>,
}

impl MemoryState {
    /// Average score of a contractor, rounded like the `contractors.rating` column
    fn average_rating(&self, contractor_id: Uuid) -> Option<Decimal> {
        let scores: Vec<Decimal> = self
            .ratings
            .iter()
            .filter(|r| r.contractor_id == contractor_id)
            .map(|r| Decimal::from(r.score))
            .collect();
        if scores.is_empty() {
            return None;
        }
        Some((scores.iter().sum::<Decimal>() / Decimal::from(scores.len())).round_dp(2))
    }
}

pub struct MemoryTenderStore {
    state: Mutex<MemoryState>,
    clock: Arc<dyn Clock>,
}

impl MemoryTenderStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            clock,
        }
    }

    /// Every rating recorded so far
    pub fn ratings(&self) -> Vec<NewRating> {
        self.state.lock().ratings.clone()
    }
}

/// Rejects the change set before anything is applied.
fn validate(
    aggregate: &TenderAggregate,
    ratings: &[NewRating],
    changes: &ChangeSet,
    clock: &dyn Clock,
) -> StoreResult<()> {
    if aggregate.tender.version != changes.expected_version {
        return Err(StoreError::StaleVersion {
            expected: changes.expected_version,
            actual: aggregate.tender.version,
        });
    }

    changes.check_window(clock.now())?;

    let mut invited = HashSet::new();
    for invitation in &changes.new_invitations {
        if aggregate.invitation_for(invitation.contractor_id).is_some()
            || !invited.insert(invitation.contractor_id)
        {
            return Err(StoreError::DuplicateInvite);
        }
    }

    let mut priced = HashSet::new();
    for bid in &changes.new_bids {
        let taken = aggregate.has_bid(bid.requirement_id, bid.contractor_id)
            && !aggregate.bids.iter().any(|b| {
                b.requirement_id == bid.requirement_id
                    && b.contractor_id == bid.contractor_id
                    && changes.removed_bids.contains(&b.id)
            });
        if taken || !priced.insert((bid.requirement_id, bid.contractor_id)) {
            return Err(StoreError::DuplicateBid);
        }
    }

    if let Some(AssignmentWrite::Create(_)) = &changes.assignment {
        if aggregate.assignment.is_some() {
            return Err(StoreError::AssignmentExists);
        }
    }

    if let Some(rating) = &changes.rating {
        if ratings
            .iter()
            .any(|r| r.tender_id == rating.tender_id && r.rater_id == rating.rater_id)
        {
            return Err(StoreError::AlreadyRated);
        }
    }

    Ok(())
}

#[async_trait]
impl TenderStore for MemoryTenderStore {
    async fn insert_tender(&self, tender: &Tender, audit: NewAuditEntry) -> StoreResult<()> {
        let mut state = self.state.lock();
        state
            .tenders
            .insert(tender.id, TenderAggregate::new(tender.clone()));
        state
            .audit
            .insert(tender.id, vec![AuditEntry::from_new(tender.id, 1, audit)]);
        Ok(())
    }

    async fn load(&self, tender_id: Uuid) -> StoreResult<Option<TenderAggregate>> {
        Ok(self.state.lock().tenders.get(&tender_id).cloned())
    }

    async fn commit(&self, changes: ChangeSet) -> StoreResult<CommitReceipt> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let tender_id = changes.tender_id;

        let aggregate = state
            .tenders
            .get_mut(&tender_id)
            .ok_or(StoreError::TenderNotFound)?;
        validate(aggregate, &state.ratings, &changes, self.clock.as_ref())?;
        aggregate.apply(&changes);

        let mut receipt = CommitReceipt::default();
        if let Some(rating) = changes.rating {
            let contractor_id = rating.contractor_id;
            state.ratings.push(rating);
            receipt.contractor_rating = state.average_rating(contractor_id);
        }

        let log = state.audit.entry(tender_id).or_default();
        for entry in changes.audit {
            let sequence = log.last().map_or(1, |e| e.sequence + 1);
            log.push(AuditEntry::from_new(tender_id, sequence, entry));
        }

        if let Some(snapshot) = changes.snapshot {
            let history = state.versions.entry(tender_id).or_default();
            let version_number = history.last().map_or(1, |v| v.version_number + 1);
            history.push(VersionSnapshot::from_new(tender_id, version_number, snapshot));
        }

        Ok(receipt)
    }

    async fn tender_of(&self, child: ChildRef) -> StoreResult<Option<Uuid>> {
        let state = self.state.lock();
        let found = state.tenders.values().find(|agg| match child {
            ChildRef::Requirement(id) => agg.requirements.iter().any(|r| r.id == id),
            ChildRef::Attachment(id) => agg.attachments.iter().any(|a| a.id == id),
            ChildRef::Invitation(id) => agg.invitations.iter().any(|i| i.id == id),
            ChildRef::Bid(id) => agg.bids.iter().any(|b| b.id == id),
            ChildRef::Milestone(id) => agg.milestones.iter().any(|m| m.id == id),
        });
        Ok(found.map(|agg| agg.tender.id))
    }

    async fn list_tenders(
        &self,
        filter: &TenderFilter,
        limit: u32,
        offset: u32,
    ) -> StoreResult<(Vec<Tender>, u64)> {
        let state = self.state.lock();
        let mut matching: Vec<Tender> = state
            .tenders
            .values()
            .filter(|agg| {
                let t = &agg.tender;
                filter.customer_id.map_or(true, |id| t.customer_id == id)
                    && filter.supervisor_id.map_or(true, |id| t.supervisor_id == Some(id))
                    && filter.status.map_or(true, |s| t.status == s)
                    && filter.contractor_id.map_or(true, |id| {
                        t.selected_contractor == Some(id) || agg.invitation_for(id).is_some()
                    })
            })
            .map(|agg| agg.tender.clone())
            .collect();

        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();

        Ok((page, total))
    }

    async fn audit_log(&self, tender_id: Uuid) -> StoreResult<Vec<AuditEntry>> {
        Ok(self
            .state
            .lock()
            .audit
            .get(&tender_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn versions(&self, tender_id: Uuid) -> StoreResult<Vec<VersionSnapshot>> {
        Ok(self
            .state
            .lock()
            .versions
            .get(&tender_id)
            .cloned()
            .unwrap_or_default())
    }
}
