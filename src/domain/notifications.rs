//! Notification domain types
//!
//! In-app notifications raised by tender lifecycle events.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Notification type enum
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    // Invitation related
    TenderInvitation,

    // Selection related
    ContractorSelected,
    TenderAwardedElsewhere,

    // Lifecycle
    TenderCancelled,
    TenderCompleted,
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_string(self).unwrap_or_default();
        write!(f, "{}", s.trim_matches('"'))
    }
}

/// Notification to deliver to one user
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: Option<String>,
    pub data: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_wire_name() {
        assert_eq!(
            NotificationType::TenderAwardedElsewhere.to_string(),
            "tender_awarded_elsewhere"
        );
        assert_eq!(NotificationType::TenderInvitation.to_string(), "tender_invitation");
    }
}
