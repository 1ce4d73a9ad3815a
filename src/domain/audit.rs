//! Audit trail and version history types
//!
//! Two independent append-only sequences keyed by tender id: fine-grained
//! audit entries and coarse full-state snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::TenderStatus;

/// What a state-changing operation did
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditAction {
    TenderCreate,
    TenderUpdate,
    StatusChange {
        from: TenderStatus,
        to: TenderStatus,
    },
    RequirementAdd {
        requirement_id: Uuid,
    },
    RequirementUpdate {
        requirement_id: Uuid,
        /// Set when the edit produced a new line version
        superseded_by: Option<Uuid>,
    },
    RequirementDelete {
        requirement_id: Uuid,
    },
    AttachmentAdd {
        attachment_id: Uuid,
    },
    AttachmentDelete {
        attachment_id: Uuid,
    },
    ContractorsInvite {
        contractor_ids: Vec<Uuid>,
    },
    InvitationRespond {
        invitation_id: Uuid,
        contractor_id: Uuid,
    },
    BidAdd {
        contractor_id: Uuid,
        bid_ids: Vec<Uuid>,
    },
    BidUpdate {
        bid_id: Uuid,
    },
    BidDelete {
        bid_id: Uuid,
    },
    ContractorSelect {
        contractor_id: Uuid,
    },
    PaymentUpdate {
        assignment_id: Uuid,
    },
    MilestoneAdd {
        milestone_id: Uuid,
    },
    MilestoneUpdate {
        milestone_id: Uuid,
    },
    ProgressUpdate,
    ContractorRate {
        contractor_id: Uuid,
    },
}

impl AuditAction {
    pub fn kind(&self) -> &'static str {
        match self {
            AuditAction::TenderCreate => "tender_create",
            AuditAction::TenderUpdate => "tender_update",
            AuditAction::StatusChange { .. } => "status_change",
            AuditAction::RequirementAdd { .. } => "requirement_add",
            AuditAction::RequirementUpdate { .. } => "requirement_update",
            AuditAction::RequirementDelete { .. } => "requirement_delete",
            AuditAction::AttachmentAdd { .. } => "attachment_add",
            AuditAction::AttachmentDelete { .. } => "attachment_delete",
            AuditAction::ContractorsInvite { .. } => "contractors_invite",
            AuditAction::InvitationRespond { .. } => "invitation_respond",
            AuditAction::BidAdd { .. } => "bid_add",
            AuditAction::BidUpdate { .. } => "bid_update",
            AuditAction::BidDelete { .. } => "bid_delete",
            AuditAction::ContractorSelect { .. } => "contractor_select",
            AuditAction::PaymentUpdate { .. } => "payment_update",
            AuditAction::MilestoneAdd { .. } => "milestone_add",
            AuditAction::MilestoneUpdate { .. } => "milestone_update",
            AuditAction::ProgressUpdate => "progress_update",
            AuditAction::ContractorRate { .. } => "contractor_rate",
        }
    }
}

/// Audit entry as handed to the store; the store assigns `sequence`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub action: AuditAction,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Persisted audit entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub id: Uuid,
    pub tender_id: Uuid,
    /// 1-based, strictly increasing per tender
    pub sequence: i64,
    pub actor_id: Uuid,
    pub action: AuditAction,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn from_new(tender_id: Uuid, sequence: i64, entry: NewAuditEntry) -> Self {
        Self {
            id: entry.id,
            tender_id,
            sequence,
            actor_id: entry.actor_id,
            action: entry.action,
            old_value: entry.old_value,
            new_value: entry.new_value,
            created_at: entry.created_at,
        }
    }
}

/// Snapshot as handed to the store; the store assigns `version_number`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSnapshot {
    pub id: Uuid,
    pub tender_version: i64,
    pub reason: String,
    pub state: serde_json::Value,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Full point-in-time capture of tender state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VersionSnapshot {
    pub id: Uuid,
    pub tender_id: Uuid,
    /// 1-based, strictly increasing per tender, never reused
    pub version_number: i32,
    pub tender_version: i64,
    pub reason: String,
    pub state: serde_json::Value,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl VersionSnapshot {
    pub fn from_new(tender_id: Uuid, version_number: i32, snapshot: NewSnapshot) -> Self {
        Self {
            id: snapshot.id,
            tender_id,
            version_number,
            tender_version: snapshot.tender_version,
            reason: snapshot.reason,
            state: snapshot.state,
            created_by: snapshot.created_by,
            created_at: snapshot.created_at,
        }
    }
}
