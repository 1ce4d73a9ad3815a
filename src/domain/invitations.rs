use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ParseEnumError;

/// Invitation status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Invited,
    Accepted,
    Declined,
    Removed,
}

impl Default for InvitationStatus {
    fn default() -> Self {
        Self::Invited
    }
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Invited => "invited",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Declined => "declined",
            InvitationStatus::Removed => "removed",
        }
    }

    /// Only live invitees may place bids.
    pub fn may_bid(&self) -> bool {
        matches!(self, InvitationStatus::Invited | InvitationStatus::Accepted)
    }

    /// State a losing invitee is forced into when another contractor is selected.
    pub fn forced_on_loss(&self) -> InvitationStatus {
        match self {
            InvitationStatus::Accepted => InvitationStatus::Declined,
            _ => InvitationStatus::Removed,
        }
    }
}

impl std::fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InvitationStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invited" => Ok(Self::Invited),
            "accepted" => Ok(Self::Accepted),
            "declined" => Ok(Self::Declined),
            "removed" => Ok(Self::Removed),
            other => Err(ParseEnumError::new("invitation status", other)),
        }
    }
}

/// Contractor's answer to an invitation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InviteResponse {
    Accept,
    Decline,
}

impl InviteResponse {
    pub fn target_status(&self) -> InvitationStatus {
        match self {
            InviteResponse::Accept => InvitationStatus::Accepted,
            InviteResponse::Decline => InvitationStatus::Declined,
        }
    }
}

/// Contractor <-> tender edge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invitation {
    pub id: Uuid,
    pub tender_id: Uuid,
    pub contractor_id: Uuid,
    pub status: InvitationStatus,
    /// Trust score read at invitation time, if the directory knew one
    pub trust_score: Option<f64>,
    pub invited_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Request DTO for explicit invitations
#[derive(Debug, Clone, Deserialize)]
pub struct InviteContractorsRequest {
    pub contractor_ids: Vec<Uuid>,
}

/// Request DTO for accepting or declining
#[derive(Debug, Clone, Deserialize)]
pub struct RespondToInviteRequest {
    pub response: InviteResponse,
}
