//! Tender lifecycle and bidding engine
//!
//! Every operation follows the same shape: load the aggregate, authorize via
//! [`policy::authorize`], validate, build a [`ChangeSet`] and hand it to the
//! store in one commit. Notifications go out only after the commit landed.

pub mod bidding;
pub mod error;
pub mod invitations;
pub mod lifecycle;
pub mod policy;
pub mod progress;
pub mod selection;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::EngineSettings;
use crate::domain::notifications::NewNotification;
use crate::domain::*;
use crate::services::{Catalog, ContractorDirectory, Notifier};
use crate::store::{ChangeSet, ChildRef, CommitReceipt, StoreError, TenderAggregate, TenderStore};

pub use error::{EngineError, EngineResult};
pub use policy::{Decision, Operation};

#[derive(Clone)]
pub struct TenderEngine {
    store: Arc<dyn TenderStore>,
    catalog: Arc<dyn Catalog>,
    directory: Arc<dyn ContractorDirectory>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
}

impl TenderEngine {
    pub fn new(
        store: Arc<dyn TenderStore>,
        catalog: Arc<dyn Catalog>,
        directory: Arc<dyn ContractorDirectory>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            catalog,
            directory,
            notifier,
            clock,
            settings,
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    async fn load(&self, tender_id: Uuid) -> EngineResult<TenderAggregate> {
        self.store
            .load(tender_id)
            .await?
            .ok_or(EngineError::NotFound("tender"))
    }

    async fn load_authorized(
        &self,
        caller: &Caller,
        tender_id: Uuid,
        op: Operation,
    ) -> EngineResult<TenderAggregate> {
        let aggregate = self.load(tender_id).await?;
        policy::authorize(caller, &aggregate, op).into_result()?;
        Ok(aggregate)
    }

    /// Tender owning a child record
    async fn resolve(&self, child: ChildRef, what: &'static str) -> EngineResult<Uuid> {
        self.store
            .tender_of(child)
            .await?
            .ok_or(EngineError::NotFound(what))
    }

    /// Commit a change set decided against `decided`.
    ///
    /// A lost version race is never retried. The tender is re-read once to
    /// report why the decision no longer holds.
    async fn commit(
        &self,
        decided: &TenderAggregate,
        changes: ChangeSet,
    ) -> EngineResult<CommitReceipt> {
        match self.store.commit(changes).await {
            Ok(receipt) => Ok(receipt),
            Err(StoreError::StaleVersion { expected, actual }) => {
                tracing::warn!(
                    tender_id = %decided.tender.id,
                    expected,
                    actual,
                    "Tender changed underneath a commit"
                );
                Err(self.classify_conflict(&decided.tender).await)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn classify_conflict(&self, before: &Tender) -> EngineError {
        let current = match self.store.load(before.id).await {
            Ok(Some(aggregate)) => aggregate.tender,
            Ok(None) => return EngineError::NotFound("tender"),
            Err(e) => return e.into(),
        };

        if before.selected_contractor.is_none() && current.selected_contractor.is_some() {
            EngineError::AlreadyAssigned
        } else if current.status != before.status {
            EngineError::status(current.status)
        } else {
            EngineError::Conflict
        }
    }

    /// Next tender row: version bumped, `updated_at` set
    fn bump(&self, tender: &Tender, now: DateTime<Utc>) -> Tender {
        let mut next = tender.clone();
        next.version += 1;
        next.updated_at = now;
        next
    }

    fn audit(
        &self,
        caller: &Caller,
        action: AuditAction,
        old_value: Option<serde_json::Value>,
        new_value: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> NewAuditEntry {
        NewAuditEntry {
            id: Uuid::new_v4(),
            actor_id: caller.user_id,
            action,
            old_value,
            new_value,
            created_at: now,
        }
    }

    /// Snapshot of the state `changes` will produce
    fn snapshot(
        &self,
        caller: &Caller,
        aggregate: &TenderAggregate,
        changes: &ChangeSet,
        reason: &str,
        now: DateTime<Utc>,
    ) -> NewSnapshot {
        let mut after = aggregate.clone();
        after.apply(changes);
        NewSnapshot {
            id: Uuid::new_v4(),
            tender_version: after.tender.version,
            reason: reason.to_string(),
            state: after.snapshot_state(),
            created_by: caller.user_id,
            created_at: now,
        }
    }

    async fn notify(&self, notifications: Vec<NewNotification>) {
        for notification in notifications {
            let user_id = notification.user_id;
            let kind = notification.notification_type.to_string();
            if let Err(e) = self.notifier.notify(notification).await {
                tracing::warn!(
                    user_id = %user_id,
                    notification_type = %kind,
                    error = %e,
                    "Failed to deliver notification"
                );
            }
        }
    }
}

/// Serialize a value for an audit before/after slot.
fn json<T: Serialize>(value: &T) -> Option<serde_json::Value> {
    serde_json::to_value(value).ok()
}

fn require_status(tender: &Tender, allowed: &[TenderStatus]) -> EngineResult<()> {
    if allowed.contains(&tender.status) {
        Ok(())
    } else {
        Err(EngineError::status(tender.status))
    }
}
