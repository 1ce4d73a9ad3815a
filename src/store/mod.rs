//! Persistence boundary for the tender aggregate
//!
//! The engine decides, the store applies. Every write goes through
//! [`TenderStore::commit`] as one atomic [`ChangeSet`] guarded by the tender
//! version it was decided against.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::*;

pub use memory::MemoryTenderStore;
pub use postgres::PgTenderStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("tender not found")]
    TenderNotFound,

    #[error("tender version is {actual}, expected {expected}")]
    StaleVersion { expected: i64, actual: i64 },

    #[error("a bid already exists for this requirement and contractor")]
    DuplicateBid,

    #[error("contractor already invited")]
    DuplicateInvite,

    #[error("tender already has an assignment")]
    AssignmentExists,

    #[error("bidding window is closed")]
    BidWindowClosed,

    #[error("tender already rated by this user")]
    AlreadyRated,

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("serialization error")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt row: {0}")]
    Corrupt(#[from] ParseEnumError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Everything hanging off one tender
#[derive(Debug, Clone, PartialEq)]
pub struct TenderAggregate {
    pub tender: Tender,
    /// All line versions, current and retired
    pub requirements: Vec<TenderRequirement>,
    pub attachments: Vec<Attachment>,
    pub invitations: Vec<Invitation>,
    pub bids: Vec<Bid>,
    pub assignment: Option<Assignment>,
    /// Ordered by due date
    pub milestones: Vec<Milestone>,
    pub progress: Option<Progress>,
}

impl TenderAggregate {
    pub fn new(tender: Tender) -> Self {
        Self {
            tender,
            requirements: Vec::new(),
            attachments: Vec::new(),
            invitations: Vec::new(),
            bids: Vec::new(),
            assignment: None,
            milestones: Vec::new(),
            progress: None,
        }
    }

    pub fn current_requirements(&self) -> impl Iterator<Item = &TenderRequirement> {
        self.requirements.iter().filter(|r| r.is_current)
    }

    pub fn requirement(&self, id: Uuid) -> Option<&TenderRequirement> {
        self.requirements.iter().find(|r| r.id == id)
    }

    pub fn invitation_for(&self, contractor_id: Uuid) -> Option<&Invitation> {
        self.invitations
            .iter()
            .find(|i| i.contractor_id == contractor_id)
    }

    pub fn bids_of(&self, contractor_id: Uuid) -> impl Iterator<Item = &Bid> {
        self.bids
            .iter()
            .filter(move |b| b.contractor_id == contractor_id)
    }

    pub fn has_bid(&self, requirement_id: Uuid, contractor_id: Uuid) -> bool {
        self.bids
            .iter()
            .any(|b| b.requirement_id == requirement_id && b.contractor_id == contractor_id)
    }

    /// Apply a change set in memory.
    ///
    /// Used by the in-process store and to preview the post-commit state a
    /// snapshot captures. Performs no validation.
    pub fn apply(&mut self, changes: &ChangeSet) {
        if let Some(tender) = &changes.tender {
            self.tender = tender.clone();
        }

        for requirement in &changes.requirements {
            upsert_by(&mut self.requirements, requirement.clone(), |r| r.id);
        }
        self.requirements
            .retain(|r| !changes.removed_requirements.contains(&r.id));

        self.attachments.extend(changes.attachments.iter().cloned());
        self.attachments
            .retain(|a| !changes.removed_attachments.contains(&a.id));

        self.invitations
            .extend(changes.new_invitations.iter().cloned());
        for invitation in &changes.invitations {
            upsert_by(&mut self.invitations, invitation.clone(), |i| i.contractor_id);
        }

        self.bids.retain(|b| !changes.removed_bids.contains(&b.id));
        self.bids.extend(changes.new_bids.iter().cloned());
        for bid in &changes.bids {
            if let Some(existing) = self.bids.iter_mut().find(|b| b.id == bid.id) {
                *existing = bid.clone();
            }
        }

        match &changes.assignment {
            Some(AssignmentWrite::Create(assignment)) | Some(AssignmentWrite::Update(assignment)) => {
                self.assignment = Some(assignment.clone());
            }
            None => {}
        }

        for milestone in &changes.milestones {
            upsert_by(&mut self.milestones, milestone.clone(), |m| m.id);
        }
        self.milestones
            .sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.created_at.cmp(&b.created_at)));

        if let Some(progress) = &changes.progress {
            self.progress = Some(progress.clone());
        }
    }

    /// Serialized state captured in version snapshots
    pub fn snapshot_state(&self) -> serde_json::Value {
        serde_json::json!({
            "tender": self.tender,
            "requirements": self.current_requirements().collect::<Vec<_>>(),
            "attachments": self.attachments,
            "invitations": self.invitations,
            "assignment": self.assignment,
        })
    }
}

fn upsert_by<T, K: PartialEq>(items: &mut Vec<T>, item: T, key: impl Fn(&T) -> K) {
    let k = key(&item);
    match items.iter().position(|existing| key(existing) == k) {
        Some(pos) => items[pos] = item,
        None => items.push(item),
    }
}

/// Assignment write inside a change set
#[derive(Debug, Clone, PartialEq)]
pub enum AssignmentWrite {
    /// Fails with [`StoreError::AssignmentExists`] if the tender already has one
    Create(Assignment),
    Update(Assignment),
}

/// Atomic unit of writes against one tender.
///
/// The store rejects the whole set with [`StoreError::StaleVersion`] unless the
/// stored tender version still equals `expected_version`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub tender_id: Uuid,
    pub expected_version: i64,
    /// Replacement tender row; its version must be `expected_version + 1`
    pub tender: Option<Tender>,
    /// Re-checked against the store clock at commit time
    pub bid_window: Option<BidWindow>,
    pub requirements: Vec<TenderRequirement>,
    pub removed_requirements: Vec<Uuid>,
    pub attachments: Vec<Attachment>,
    pub removed_attachments: Vec<Uuid>,
    pub new_invitations: Vec<Invitation>,
    pub invitations: Vec<Invitation>,
    pub new_bids: Vec<Bid>,
    pub bids: Vec<Bid>,
    pub removed_bids: Vec<Uuid>,
    pub assignment: Option<AssignmentWrite>,
    pub milestones: Vec<Milestone>,
    pub progress: Option<Progress>,
    /// Fails with [`StoreError::AlreadyRated`] on a second rating by the same rater
    pub rating: Option<NewRating>,
    pub audit: Vec<NewAuditEntry>,
    pub snapshot: Option<NewSnapshot>,
}

/// What a commit reports back beyond success
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitReceipt {
    /// Contractor average recomputed in the same commit as a rating
    pub contractor_rating: Option<Decimal>,
}

impl ChangeSet {
    pub fn against(aggregate: &TenderAggregate) -> Self {
        Self {
            tender_id: aggregate.tender.id,
            expected_version: aggregate.tender.version,
            ..Default::default()
        }
    }

    /// Whether the tender row itself is rewritten (exclusive lock)
    pub fn bumps_version(&self) -> bool {
        self.tender.is_some()
    }

    /// Bid writes only land while `now`, read at commit time, is inside the window.
    pub fn check_window(&self, now: DateTime<Utc>) -> StoreResult<()> {
        match self.bid_window {
            Some(window) if !window.contains(now) => Err(StoreError::BidWindowClosed),
            _ => Ok(()),
        }
    }
}

/// Child records that can be addressed without their tender id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildRef {
    Requirement(Uuid),
    Attachment(Uuid),
    Invitation(Uuid),
    Bid(Uuid),
    Milestone(Uuid),
}

/// Role-scoped tender listing filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TenderFilter {
    pub customer_id: Option<Uuid>,
    pub supervisor_id: Option<Uuid>,
    /// Tenders the contractor is invited to or selected for
    pub contractor_id: Option<Uuid>,
    pub status: Option<TenderStatus>,
}

#[async_trait]
pub trait TenderStore: Send + Sync {
    async fn insert_tender(&self, tender: &Tender, audit: NewAuditEntry) -> StoreResult<()>;

    async fn load(&self, tender_id: Uuid) -> StoreResult<Option<TenderAggregate>>;

    async fn commit(&self, changes: ChangeSet) -> StoreResult<CommitReceipt>;

    /// Tender that owns a child record
    async fn tender_of(&self, child: ChildRef) -> StoreResult<Option<Uuid>>;

    async fn list_tenders(
        &self,
        filter: &TenderFilter,
        limit: u32,
        offset: u32,
    ) -> StoreResult<(Vec<Tender>, u64)>;

    async fn audit_log(&self, tender_id: Uuid) -> StoreResult<Vec<AuditEntry>>;

    async fn versions(&self, tender_id: Uuid) -> StoreResult<Vec<VersionSnapshot>>;
}
