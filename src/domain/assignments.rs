use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ParseEnumError;

/// Payment status of an assignment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    PartiallyPaid,
    Paid,
    Overdue,
    Refunded,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::PartiallyPaid => "partially_paid",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Overdue => "overdue",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "partially_paid" => Ok(Self::PartiallyPaid),
            "paid" => Ok(Self::Paid),
            "overdue" => Ok(Self::Overdue),
            "refunded" => Ok(Self::Refunded),
            other => Err(ParseEnumError::new("payment status", other)),
        }
    }
}

/// Binding contract record, one per tender once a contractor is selected
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assignment {
    pub id: Uuid,
    pub tender_id: Uuid,
    pub contractor_id: Uuid,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    pub total_amount: Option<Decimal>,
    pub payment_status: PaymentStatus,
    pub actual_completion_date: Option<NaiveDate>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request DTO for selecting a contractor
#[derive(Debug, Clone, Deserialize)]
pub struct SelectContractorRequest {
    pub contractor_id: Uuid,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Request DTO for payment events
#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePaymentRequest {
    pub payment_status: PaymentStatus,
}

/// Request DTO for rating the selected contractor
#[derive(Debug, Clone, Deserialize)]
pub struct RateContractorRequest {
    pub score: i16,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Rating written together with its audit entry
#[derive(Debug, Clone, PartialEq)]
pub struct NewRating {
    pub contractor_id: Uuid,
    pub tender_id: Uuid,
    pub rater_id: Uuid,
    pub score: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Response after a rating is recorded
#[derive(Debug, Clone, Serialize)]
pub struct RatingResponse {
    pub contractor_id: Uuid,
    pub score: i16,
    pub average_rating: Decimal,
}
