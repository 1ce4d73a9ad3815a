//! Notification service
//!
//! The engine raises notifications after a commit succeeds. Delivery is
//! best-effort: a failed notification is logged by the caller and never
//! undoes the state change that triggered it.

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::notifications::{NewNotification, NotificationType};
use crate::domain::Tender;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: NewNotification) -> anyhow::Result<()>;
}

/// Writes notifications to the `notifications` table
#[derive(Clone)]
pub struct PgNotifier {
    db: PgPool,
}

impl PgNotifier {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Notifier for PgNotifier {
    async fn notify(&self, notification: NewNotification) -> anyhow::Result<()> {
        let id = Uuid::new_v4();
        let type_str = notification.notification_type.to_string();

        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, type, title, message, data)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(notification.user_id)
        .bind(&type_str)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.data)
        .execute(&self.db)
        .await?;

        tracing::info!(
            user_id = %notification.user_id,
            notification_type = %type_str,
            notification_id = %id,
            "Notification created"
        );

        Ok(())
    }
}

/// Keeps every notification in memory; for tests and local runs.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<NewNotification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<NewNotification> {
        self.sent.lock().clone()
    }

    pub fn sent_to(&self, user_id: Uuid) -> Vec<NewNotification> {
        self.sent
            .lock()
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: NewNotification) -> anyhow::Result<()> {
        self.sent.lock().push(notification);
        Ok(())
    }
}

fn tender_data(tender: &Tender) -> serde_json::Value {
    serde_json::json!({
        "tender_id": tender.id,
        "tender_title": tender.title,
    })
}

/// Invitation to bid on a published tender
pub fn tender_invitation(contractor_id: Uuid, tender: &Tender) -> NewNotification {
    NewNotification {
        user_id: contractor_id,
        notification_type: NotificationType::TenderInvitation,
        title: format!("You're invited to bid on {}", tender.title),
        message: Some(format!(
            "'{}' in {} is open for bids. Review the requirements and submit your prices.",
            tender.title, tender.location
        )),
        data: tender_data(tender),
    }
}

/// The contractor won the tender
pub fn contractor_selected(contractor_id: Uuid, tender: &Tender) -> NewNotification {
    NewNotification {
        user_id: contractor_id,
        notification_type: NotificationType::ContractorSelected,
        title: "You've been selected!".to_string(),
        message: Some(format!(
            "Congratulations! You were selected for '{}'.",
            tender.title
        )),
        data: tender_data(tender),
    }
}

/// Another contractor won the tender
pub fn tender_awarded_elsewhere(contractor_id: Uuid, tender: &Tender) -> NewNotification {
    NewNotification {
        user_id: contractor_id,
        notification_type: NotificationType::TenderAwardedElsewhere,
        title: "Tender awarded".to_string(),
        message: Some(format!(
            "'{}' was awarded to another contractor. Keep bidding on other opportunities!",
            tender.title
        )),
        data: tender_data(tender),
    }
}

pub fn tender_cancelled(user_id: Uuid, tender: &Tender) -> NewNotification {
    NewNotification {
        user_id,
        notification_type: NotificationType::TenderCancelled,
        title: "Tender cancelled".to_string(),
        message: Some(format!("'{}' was cancelled by the customer.", tender.title)),
        data: tender_data(tender),
    }
}

pub fn tender_completed(contractor_id: Uuid, tender: &Tender) -> NewNotification {
    NewNotification {
        user_id: contractor_id,
        notification_type: NotificationType::TenderCompleted,
        title: "Work marked complete".to_string(),
        message: Some(format!(
            "The customer marked '{}' as completed.",
            tender.title
        )),
        data: tender_data(tender),
    }
}
