use thiserror::Error;
use uuid::Uuid;

use crate::domain::money::TotalOverflow;
use crate::domain::TenderStatus;
use crate::services::directory::DirectoryError;
use crate::store::StoreError;

/// Typed failure of a tender engine operation
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    InvalidState(String),

    #[error("bidding window is closed")]
    BidWindowClosed,

    #[error("a bid already exists for this requirement")]
    DuplicateBid,

    #[error("contractor already invited to this tender")]
    DuplicateInvite,

    #[error("incomplete bid set: {0}")]
    IncompleteBidSet(String),

    #[error("contractor is not invited to this tender")]
    NotInvited,

    #[error("due date is before start date")]
    InvalidDateRange,

    #[error("a contractor is already assigned to this tender")]
    AlreadyAssigned,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("tender has no requirement lines")]
    NoRequirements,

    #[error("requirement type already present on this tender")]
    DuplicateRequirement,

    #[error("contractor {0} does not offer this service")]
    IneligibleContractor(Uuid),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("tender was modified concurrently")]
    Conflict,

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl EngineError {
    pub fn status(status: TenderStatus) -> Self {
        Self::InvalidState(format!("operation not allowed while tender is {status}"))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TenderNotFound => Self::NotFound("tender"),
            StoreError::DuplicateBid => Self::DuplicateBid,
            StoreError::DuplicateInvite => Self::DuplicateInvite,
            StoreError::AssignmentExists => Self::AlreadyAssigned,
            StoreError::BidWindowClosed => Self::BidWindowClosed,
            StoreError::AlreadyRated => {
                Self::InvalidState("contractor already rated for this tender".to_string())
            }
            StoreError::StaleVersion { .. } => Self::Conflict,
            other => Self::Internal(anyhow::Error::new(other)),
        }
    }
}

impl From<TotalOverflow> for EngineError {
    fn from(err: TotalOverflow) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<DirectoryError> for EngineError {
    fn from(err: DirectoryError) -> Self {
        Self::Internal(anyhow::Error::new(err))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
