//! Progress tracker: milestones and the percent-complete summary
//!
//! Writable only while the tender is in progress. `percent_complete` is
//! whatever the caller reports; it is never derived from milestones.

use uuid::Uuid;

use super::{json, require_status, EngineError, EngineResult, Operation, TenderEngine};
use crate::domain::*;
use crate::store::{ChangeSet, ChildRef, TenderAggregate};

impl TenderEngine {
    /// Re-point an existing progress summary at the next open milestone.
    fn repoint_progress(&self, aggregate: &TenderAggregate, changes: &mut ChangeSet) {
        let Some(progress) = &aggregate.progress else {
            return;
        };
        let mut after = aggregate.clone();
        after.apply(changes);
        let next = next_open_milestone(&after.milestones).map(|m| m.id);
        if next != progress.next_milestone_id {
            changes.progress = Some(Progress {
                next_milestone_id: next,
                ..progress.clone()
            });
        }
    }

    pub async fn add_milestone(
        &self,
        caller: &Caller,
        tender_id: Uuid,
        req: AddMilestoneRequest,
    ) -> EngineResult<Milestone> {
        let aggregate = self
            .load_authorized(caller, tender_id, Operation::ManageProgress)
            .await?;
        require_status(&aggregate.tender, &[TenderStatus::InProgress])?;
        let title = req.title.trim();
        if title.is_empty() {
            return Err(EngineError::validation("title must not be empty"));
        }

        let now = self.now();
        let milestone = Milestone {
            id: Uuid::new_v4(),
            tender_id,
            title: title.to_string(),
            description: req.description,
            due_date: req.due_date,
            completed_date: None,
            status: MilestoneStatus::Pending,
            completion_notes: None,
            created_at: now,
            updated_at: now,
        };

        let mut changes = ChangeSet::against(&aggregate);
        changes.milestones.push(milestone.clone());
        self.repoint_progress(&aggregate, &mut changes);
        changes.audit.push(self.audit(
            caller,
            AuditAction::MilestoneAdd {
                milestone_id: milestone.id,
            },
            None,
            json(&milestone),
            now,
        ));
        self.commit(&aggregate, changes).await?;

        tracing::info!(
            tender_id = %tender_id,
            actor_id = %caller.user_id,
            milestone_id = %milestone.id,
            "Milestone added"
        );
        Ok(milestone)
    }

    pub async fn update_milestone(
        &self,
        caller: &Caller,
        milestone_id: Uuid,
        req: UpdateMilestoneRequest,
    ) -> EngineResult<Milestone> {
        let tender_id = self
            .resolve(ChildRef::Milestone(milestone_id), "milestone")
            .await?;
        let aggregate = self
            .load_authorized(caller, tender_id, Operation::ManageProgress)
            .await?;
        require_status(&aggregate.tender, &[TenderStatus::InProgress])?;
        let old = aggregate
            .milestones
            .iter()
            .find(|m| m.id == milestone_id)
            .cloned()
            .ok_or(EngineError::NotFound("milestone"))?;

        let now = self.now();
        let mut milestone = old.clone();
        if let Some(status) = req.status {
            milestone.status = status;
            milestone.completed_date = match status {
                MilestoneStatus::Completed => old.completed_date.or(Some(now.date_naive())),
                _ => None,
            };
        }
        if req.completion_notes.is_some() {
            milestone.completion_notes = req.completion_notes;
        }
        milestone.updated_at = now;

        let mut changes = ChangeSet::against(&aggregate);
        changes.milestones.push(milestone.clone());
        self.repoint_progress(&aggregate, &mut changes);
        changes.audit.push(self.audit(
            caller,
            AuditAction::MilestoneUpdate { milestone_id },
            json(&old),
            json(&milestone),
            now,
        ));
        self.commit(&aggregate, changes).await?;

        tracing::info!(
            tender_id = %tender_id,
            actor_id = %caller.user_id,
            milestone_id = %milestone_id,
            status = %milestone.status,
            "Milestone updated"
        );
        Ok(milestone)
    }

    pub async fn update_progress(
        &self,
        caller: &Caller,
        tender_id: Uuid,
        req: UpdateProgressRequest,
    ) -> EngineResult<Progress> {
        let aggregate = self
            .load_authorized(caller, tender_id, Operation::ManageProgress)
            .await?;
        require_status(&aggregate.tender, &[TenderStatus::InProgress])?;
        if !(0..=100).contains(&req.percent_complete) {
            return Err(EngineError::validation(
                "percent_complete must be between 0 and 100",
            ));
        }

        let now = self.now();
        let progress = Progress {
            id: aggregate
                .progress
                .as_ref()
                .map_or_else(Uuid::new_v4, |p| p.id),
            tender_id,
            percent_complete: req.percent_complete,
            current_phase: req.current_phase,
            next_milestone_id: next_open_milestone(&aggregate.milestones).map(|m| m.id),
            notes: req.notes,
            updated_by: caller.user_id,
            updated_at: now,
        };

        let mut changes = ChangeSet::against(&aggregate);
        changes.progress = Some(progress.clone());
        changes.audit.push(self.audit(
            caller,
            AuditAction::ProgressUpdate,
            aggregate.progress.as_ref().and_then(json),
            json(&progress),
            now,
        ));
        self.commit(&aggregate, changes).await?;

        tracing::info!(
            tender_id = %tender_id,
            actor_id = %caller.user_id,
            percent_complete = progress.percent_complete,
            phase = %progress.current_phase,
            "Progress updated"
        );
        Ok(progress)
    }

    pub async fn get_progress(&self, caller: &Caller, tender_id: Uuid) -> EngineResult<ProgressResponse> {
        let aggregate = self
            .load_authorized(caller, tender_id, Operation::ViewProgress)
            .await?;
        Ok(ProgressResponse {
            progress: aggregate.progress,
            milestones: aggregate.milestones,
        })
    }
}
