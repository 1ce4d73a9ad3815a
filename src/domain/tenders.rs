use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ParseEnumError;

/// Tender status
///
/// `draft -> published -> in_progress -> completed`, with `cancelled` reachable
/// from `draft` and `published` only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TenderStatus {
    Draft,
    Published,
    InProgress,
    Completed,
    Cancelled,
}

impl Default for TenderStatus {
    fn default() -> Self {
        Self::Draft
    }
}

impl TenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenderStatus::Draft => "draft",
            TenderStatus::Published => "published",
            TenderStatus::InProgress => "in_progress",
            TenderStatus::Completed => "completed",
            TenderStatus::Cancelled => "cancelled",
        }
    }

    /// Statuses in which a contractor is bound to the tender.
    pub fn has_contractor(&self) -> bool {
        matches!(self, TenderStatus::InProgress | TenderStatus::Completed)
    }

    pub fn can_transition_to(&self, next: TenderStatus) -> bool {
        use TenderStatus::*;
        matches!(
            (self, next),
            (Draft, Published)
                | (Draft, Cancelled)
                | (Published, Cancelled)
                | (Published, InProgress)
                | (InProgress, Completed)
        )
    }
}

impl std::fmt::Display for TenderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TenderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(ParseEnumError::new("tender status", other)),
        }
    }
}

/// Tender priority
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TenderPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Default for TenderPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl TenderPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenderPriority::Low => "low",
            TenderPriority::Medium => "medium",
            TenderPriority::High => "high",
            TenderPriority::Urgent => "urgent",
        }
    }
}

impl std::fmt::Display for TenderPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TenderPriority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => Err(ParseEnumError::new("tender priority", other)),
        }
    }
}

/// Inclusive bidding window `[start_time, end_time]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BidWindow {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl BidWindow {
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && now <= self.end_time
    }
}

/// Tender entity (aggregate root)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tender {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub supervisor_id: Option<Uuid>,
    pub service_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub budget: Option<Decimal>,
    pub status: TenderStatus,
    pub priority: TenderPriority,
    /// Upper bound on the publish-time invitee pool
    pub contractor_limit: Option<i32>,
    pub version: i64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub selected_contractor: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tender {
    pub fn bid_window(&self) -> Option<BidWindow> {
        match (self.start_time, self.end_time) {
            (Some(start_time), Some(end_time)) => Some(BidWindow {
                start_time,
                end_time,
            }),
            _ => None,
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.customer_id == user_id
    }

    pub fn is_supervised_by(&self, user_id: Uuid) -> bool {
        self.supervisor_id == Some(user_id)
    }
}

/// Requirement line attached to a tender.
///
/// Lines are versioned: once the tender is published an edit retires the
/// current row (`is_current = false`) and inserts a successor with
/// `version + 1`, so bids keep pointing at what was actually priced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TenderRequirement {
    pub id: Uuid,
    pub tender_id: Uuid,
    pub requirement_type_id: Uuid,
    pub name: String,
    pub quantity: Decimal,
    pub unit: String,
    pub is_critical: bool,
    pub description: Option<String>,
    pub version: i32,
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
}

/// Attachment metadata. File bytes live in external media storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    pub id: Uuid,
    pub tender_id: Uuid,
    pub file_name: String,
    pub url: String,
    pub content_type: Option<String>,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Request DTO for creating a tender
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTenderRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub service_id: Uuid,
    pub location: String,
    #[serde(default)]
    pub budget: Option<Decimal>,
    #[serde(default)]
    pub priority: TenderPriority,
    #[serde(default)]
    pub supervisor_id: Option<Uuid>,
    #[serde(default)]
    pub contractor_limit: Option<i32>,
}

/// Request DTO for updating tender content
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTenderRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub budget: Option<Decimal>,
    #[serde(default)]
    pub priority: Option<TenderPriority>,
    #[serde(default)]
    pub contractor_limit: Option<i32>,
}

/// Request DTO for publishing a tender
#[derive(Debug, Clone, Deserialize)]
pub struct PublishTenderRequest {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Request DTO for adding a requirement line
#[derive(Debug, Clone, Deserialize)]
pub struct AddRequirementRequest {
    pub requirement_type_id: Uuid,
    pub quantity: Decimal,
    /// Defaults to the catalog's unit for the requirement type
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub is_critical: bool,
    #[serde(default)]
    pub description: Option<String>,
}

/// Request DTO for editing a requirement line
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRequirementRequest {
    #[serde(default)]
    pub quantity: Option<Decimal>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub is_critical: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Request DTO for registering an attachment
#[derive(Debug, Clone, Deserialize)]
pub struct AddAttachmentRequest {
    pub file_name: String,
    pub url: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Query params for listing tenders
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TenderQuery {
    #[serde(default)]
    pub status: Option<TenderStatus>,
}

/// Full tender view returned by `GET /tenders/:id`
#[derive(Debug, Clone, Serialize)]
pub struct TenderDetailResponse {
    #[serde(flatten)]
    pub tender: Tender,
    pub requirements: Vec<TenderRequirement>,
    pub attachments: Vec<Attachment>,
}
