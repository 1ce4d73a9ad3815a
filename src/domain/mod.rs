//! Domain types and DTOs
//!
//! These types define the data structures of the tender marketplace: the
//! tender aggregate, its invitations, bids, assignment and progress records,
//! plus the audit and version history kept alongside it.

pub mod assignments;
pub mod audit;
pub mod bids;
pub mod catalog;
pub mod invitations;
pub mod money;
pub mod notifications;
pub mod progress;
pub mod tenders;
pub mod users;

// Re-export commonly used types
pub use assignments::*;
pub use audit::*;
pub use bids::*;
pub use catalog::*;
pub use invitations::*;
pub use progress::*;
pub use tenders::*;
pub use users::*;

// Notification types are accessed via crate::domain::notifications::, numeric
// bounds via crate::domain::money::

/// Failure to parse a stored enum value
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
