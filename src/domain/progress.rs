use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ParseEnumError;

/// Milestone status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    Pending,
    InProgress,
    Completed,
    Delayed,
}

impl Default for MilestoneStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl MilestoneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MilestoneStatus::Pending => "pending",
            MilestoneStatus::InProgress => "in_progress",
            MilestoneStatus::Completed => "completed",
            MilestoneStatus::Delayed => "delayed",
        }
    }
}

impl std::fmt::Display for MilestoneStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MilestoneStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "delayed" => Ok(Self::Delayed),
            other => Err(ParseEnumError::new("milestone status", other)),
        }
    }
}

/// Work phase reported in the progress summary
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    Planning,
    Execution,
    Completion,
    Review,
}

impl Default for ProgressPhase {
    fn default() -> Self {
        Self::Planning
    }
}

impl ProgressPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressPhase::Planning => "planning",
            ProgressPhase::Execution => "execution",
            ProgressPhase::Completion => "completion",
            ProgressPhase::Review => "review",
        }
    }
}

impl std::fmt::Display for ProgressPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProgressPhase {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planning" => Ok(Self::Planning),
            "execution" => Ok(Self::Execution),
            "completion" => Ok(Self::Completion),
            "review" => Ok(Self::Review),
            other => Err(ParseEnumError::new("progress phase", other)),
        }
    }
}

/// Dated checkpoint within an in-progress tender
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Milestone {
    pub id: Uuid,
    pub tender_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub due_date: NaiveDate,
    pub completed_date: Option<NaiveDate>,
    pub status: MilestoneStatus,
    pub completion_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One-to-one progress summary per tender
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Progress {
    pub id: Uuid,
    pub tender_id: Uuid,
    pub percent_complete: i16,
    pub current_phase: ProgressPhase,
    pub next_milestone_id: Option<Uuid>,
    pub notes: Option<String>,
    pub updated_by: Uuid,
    pub updated_at: DateTime<Utc>,
}

/// Earliest-due milestone that is not yet completed.
pub fn next_open_milestone(milestones: &[Milestone]) -> Option<&Milestone> {
    milestones
        .iter()
        .filter(|m| m.status != MilestoneStatus::Completed)
        .min_by(|a, b| a.due_date.cmp(&b.due_date).then(a.created_at.cmp(&b.created_at)))
}

/// Request DTO for adding a milestone
#[derive(Debug, Clone, Deserialize)]
pub struct AddMilestoneRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub due_date: NaiveDate,
}

/// Request DTO for updating a milestone
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMilestoneRequest {
    #[serde(default)]
    pub status: Option<MilestoneStatus>,
    #[serde(default)]
    pub completion_notes: Option<String>,
}

/// Request DTO for the progress summary
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateProgressRequest {
    pub percent_complete: i16,
    pub current_phase: ProgressPhase,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Progress summary together with the ordered milestone list
#[derive(Debug, Clone, Serialize)]
pub struct ProgressResponse {
    pub progress: Option<Progress>,
    pub milestones: Vec<Milestone>,
}
