//! Tender store and state machine operations
//!
//! Creation, content edits, requirement lines, attachments and the status
//! transitions `publish`, `cancel` and `complete`.

use rust_decimal::Decimal;
use uuid::Uuid;

use super::{json, policy, require_status, EngineError, EngineResult, Operation, TenderEngine};
use crate::domain::money;
use crate::domain::*;
use crate::services::notifications as notify;
use crate::store::{AssignmentWrite, ChangeSet, ChildRef, TenderAggregate, TenderFilter};

const EDITABLE: &[TenderStatus] = &[TenderStatus::Draft, TenderStatus::Published];

fn required_text(field: &str, value: &str) -> EngineResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn validate_budget(budget: Option<Decimal>) -> EngineResult<()> {
    match budget {
        Some(b) if b <= Decimal::ZERO => Err(EngineError::validation("budget must be positive")),
        Some(b) if !money::AMOUNT.holds(b) => Err(EngineError::validation(format!(
            "budget must be below {} with at most {} decimal places",
            money::AMOUNT.limit(),
            money::AMOUNT.scale
        ))),
        _ => Ok(()),
    }
}

fn validate_contractor_limit(limit: Option<i32>) -> EngineResult<()> {
    match limit {
        Some(n) if n < 1 => Err(EngineError::validation("contractor_limit must be at least 1")),
        _ => Ok(()),
    }
}

fn validate_quantity(quantity: Decimal) -> EngineResult<()> {
    if quantity <= Decimal::ZERO {
        return Err(EngineError::validation("quantity must be positive"));
    }
    if !money::QUANTITY.holds(quantity) {
        return Err(EngineError::validation(format!(
            "quantity must be below {} with at most {} decimal places",
            money::QUANTITY.limit(),
            money::QUANTITY.scale
        )));
    }
    Ok(())
}

/// Current line by id, rejecting retired ones
fn current_line(aggregate: &TenderAggregate, requirement_id: Uuid) -> EngineResult<TenderRequirement> {
    let line = aggregate
        .requirement(requirement_id)
        .ok_or(EngineError::NotFound("requirement"))?;
    if !line.is_current {
        return Err(EngineError::InvalidState(
            "requirement line has been superseded".to_string(),
        ));
    }
    Ok(line.clone())
}

impl TenderEngine {
    pub async fn create_tender(
        &self,
        caller: &Caller,
        req: CreateTenderRequest,
    ) -> EngineResult<Tender> {
        policy::authorize_create(caller).into_result()?;

        let title = required_text("title", &req.title)?;
        let location = required_text("location", &req.location)?;
        validate_budget(req.budget)?;
        validate_contractor_limit(req.contractor_limit)?;
        if !self.catalog.service_exists(req.service_id).await? {
            return Err(EngineError::NotFound("service"));
        }

        let now = self.now();
        let tender = Tender {
            id: Uuid::new_v4(),
            customer_id: caller.user_id,
            supervisor_id: req.supervisor_id,
            service_id: req.service_id,
            title,
            description: req.description,
            location,
            budget: req.budget,
            status: TenderStatus::Draft,
            priority: req.priority,
            contractor_limit: req.contractor_limit,
            version: 1,
            start_time: None,
            end_time: None,
            published_at: None,
            selected_contractor: None,
            created_at: now,
            updated_at: now,
        };

        let audit = self.audit(caller, AuditAction::TenderCreate, None, json(&tender), now);
        self.store.insert_tender(&tender, audit).await?;

        tracing::info!(
            tender_id = %tender.id,
            actor_id = %caller.user_id,
            service_id = %tender.service_id,
            "Tender created"
        );

        Ok(tender)
    }

    pub async fn update_tender(
        &self,
        caller: &Caller,
        tender_id: Uuid,
        req: UpdateTenderRequest,
    ) -> EngineResult<Tender> {
        let aggregate = self
            .load_authorized(caller, tender_id, Operation::UpdateTender)
            .await?;
        require_status(&aggregate.tender, EDITABLE)?;

        let now = self.now();
        let mut tender = self.bump(&aggregate.tender, now);
        if let Some(title) = req.title {
            tender.title = required_text("title", &title)?;
        }
        if let Some(location) = req.location {
            tender.location = required_text("location", &location)?;
        }
        if req.description.is_some() {
            tender.description = req.description;
        }
        if req.budget.is_some() {
            validate_budget(req.budget)?;
            tender.budget = req.budget;
        }
        if let Some(priority) = req.priority {
            tender.priority = priority;
        }
        if req.contractor_limit.is_some() {
            validate_contractor_limit(req.contractor_limit)?;
            tender.contractor_limit = req.contractor_limit;
        }

        let mut changes = ChangeSet::against(&aggregate);
        changes.audit.push(self.audit(
            caller,
            AuditAction::TenderUpdate,
            json(&aggregate.tender),
            json(&tender),
            now,
        ));
        changes.tender = Some(tender.clone());
        self.commit(&aggregate, changes).await?;

        tracing::info!(tender_id = %tender_id, actor_id = %caller.user_id, "Tender updated");
        Ok(tender)
    }

    pub async fn get_tender(
        &self,
        caller: &Caller,
        tender_id: Uuid,
    ) -> EngineResult<TenderDetailResponse> {
        let aggregate = self
            .load_authorized(caller, tender_id, Operation::ViewTender)
            .await?;
        let requirements = aggregate.current_requirements().cloned().collect();
        Ok(TenderDetailResponse {
            tender: aggregate.tender,
            requirements,
            attachments: aggregate.attachments,
        })
    }

    /// Tenders visible to the caller: own (customer), invited or selected
    /// (contractor), supervised (supervisor).
    pub async fn list_tenders(
        &self,
        caller: &Caller,
        query: &TenderQuery,
        limit: u32,
        offset: u32,
    ) -> EngineResult<(Vec<Tender>, u64)> {
        let mut filter = TenderFilter {
            status: query.status,
            ..Default::default()
        };
        match caller.role {
            Role::Customer => filter.customer_id = Some(caller.user_id),
            Role::Contractor => filter.contractor_id = Some(caller.user_id),
            Role::Supervisor => filter.supervisor_id = Some(caller.user_id),
        }
        Ok(self.store.list_tenders(&filter, limit, offset).await?)
    }

    pub async fn add_requirement(
        &self,
        caller: &Caller,
        tender_id: Uuid,
        req: AddRequirementRequest,
    ) -> EngineResult<TenderRequirement> {
        let aggregate = self
            .load_authorized(caller, tender_id, Operation::EditRequirements)
            .await?;
        require_status(&aggregate.tender, EDITABLE)?;
        validate_quantity(req.quantity)?;

        let requirement_type = self
            .catalog
            .requirement_type(req.requirement_type_id)
            .await?
            .ok_or(EngineError::NotFound("requirement type"))?;
        if requirement_type.service_id != aggregate.tender.service_id {
            return Err(EngineError::validation(
                "requirement type belongs to a different service",
            ));
        }
        if aggregate
            .current_requirements()
            .any(|r| r.requirement_type_id == requirement_type.id)
        {
            return Err(EngineError::DuplicateRequirement);
        }

        // Retired lines of the same type keep their version numbers.
        let version = aggregate
            .requirements
            .iter()
            .filter(|r| r.requirement_type_id == requirement_type.id)
            .map(|r| r.version)
            .max()
            .map_or(1, |v| v + 1);

        let now = self.now();
        let requirement = TenderRequirement {
            id: Uuid::new_v4(),
            tender_id,
            requirement_type_id: requirement_type.id,
            name: requirement_type.name,
            quantity: req.quantity,
            unit: req.unit.unwrap_or(requirement_type.default_unit),
            is_critical: req.is_critical,
            description: req.description,
            version,
            is_current: true,
            created_at: now,
        };

        let mut changes = ChangeSet::against(&aggregate);
        changes.tender = Some(self.bump(&aggregate.tender, now));
        changes.requirements.push(requirement.clone());
        changes.audit.push(self.audit(
            caller,
            AuditAction::RequirementAdd {
                requirement_id: requirement.id,
            },
            None,
            json(&requirement),
            now,
        ));
        changes.snapshot = Some(self.snapshot(caller, &aggregate, &changes, "requirement_add", now));
        self.commit(&aggregate, changes).await?;

        tracing::info!(
            tender_id = %tender_id,
            actor_id = %caller.user_id,
            requirement_id = %requirement.id,
            "Requirement added"
        );
        Ok(requirement)
    }

    /// Edit a requirement line. Before publication the row is edited in
    /// place; afterwards the row is retired and a successor is inserted.
    pub async fn update_requirement(
        &self,
        caller: &Caller,
        requirement_id: Uuid,
        req: UpdateRequirementRequest,
    ) -> EngineResult<TenderRequirement> {
        let tender_id = self
            .resolve(ChildRef::Requirement(requirement_id), "requirement")
            .await?;
        let aggregate = self
            .load_authorized(caller, tender_id, Operation::EditRequirements)
            .await?;
        require_status(&aggregate.tender, EDITABLE)?;
        let old = current_line(&aggregate, requirement_id)?;

        let now = self.now();
        let mut edited = old.clone();
        if let Some(quantity) = req.quantity {
            validate_quantity(quantity)?;
            edited.quantity = quantity;
        }
        if let Some(unit) = req.unit {
            edited.unit = required_text("unit", &unit)?;
        }
        if let Some(is_critical) = req.is_critical {
            edited.is_critical = is_critical;
        }
        if req.description.is_some() {
            edited.description = req.description;
        }

        let mut changes = ChangeSet::against(&aggregate);
        changes.tender = Some(self.bump(&aggregate.tender, now));

        let superseded_by = if aggregate.tender.status == TenderStatus::Draft {
            changes.requirements.push(edited.clone());
            None
        } else {
            let mut retired = old.clone();
            retired.is_current = false;
            edited.id = Uuid::new_v4();
            edited.version = old.version + 1;
            edited.created_at = now;
            changes.requirements.push(retired);
            changes.requirements.push(edited.clone());
            Some(edited.id)
        };

        changes.audit.push(self.audit(
            caller,
            AuditAction::RequirementUpdate {
                requirement_id,
                superseded_by,
            },
            json(&old),
            json(&edited),
            now,
        ));
        changes.snapshot =
            Some(self.snapshot(caller, &aggregate, &changes, "requirement_update", now));
        self.commit(&aggregate, changes).await?;

        tracing::info!(
            tender_id = %tender_id,
            actor_id = %caller.user_id,
            requirement_id = %requirement_id,
            new_version = edited.version,
            "Requirement updated"
        );
        Ok(edited)
    }

    /// Remove a requirement line. Published tenders only retire it.
    pub async fn delete_requirement(
        &self,
        caller: &Caller,
        requirement_id: Uuid,
    ) -> EngineResult<()> {
        let tender_id = self
            .resolve(ChildRef::Requirement(requirement_id), "requirement")
            .await?;
        let aggregate = self
            .load_authorized(caller, tender_id, Operation::EditRequirements)
            .await?;
        require_status(&aggregate.tender, EDITABLE)?;
        let old = current_line(&aggregate, requirement_id)?;

        let now = self.now();
        let mut changes = ChangeSet::against(&aggregate);
        changes.tender = Some(self.bump(&aggregate.tender, now));

        if aggregate.tender.status == TenderStatus::Draft {
            changes.removed_requirements.push(requirement_id);
        } else {
            if aggregate.current_requirements().count() == 1 {
                return Err(EngineError::NoRequirements);
            }
            let mut retired = old.clone();
            retired.is_current = false;
            changes.requirements.push(retired);
        }

        changes.audit.push(self.audit(
            caller,
            AuditAction::RequirementDelete { requirement_id },
            json(&old),
            None,
            now,
        ));
        changes.snapshot =
            Some(self.snapshot(caller, &aggregate, &changes, "requirement_delete", now));
        self.commit(&aggregate, changes).await?;

        tracing::info!(
            tender_id = %tender_id,
            actor_id = %caller.user_id,
            requirement_id = %requirement_id,
            "Requirement deleted"
        );
        Ok(())
    }

    pub async fn list_requirements(
        &self,
        caller: &Caller,
        tender_id: Uuid,
    ) -> EngineResult<Vec<TenderRequirement>> {
        let aggregate = self
            .load_authorized(caller, tender_id, Operation::ViewTender)
            .await?;
        Ok(aggregate.current_requirements().cloned().collect())
    }

    pub async fn add_attachment(
        &self,
        caller: &Caller,
        tender_id: Uuid,
        req: AddAttachmentRequest,
    ) -> EngineResult<Attachment> {
        let aggregate = self
            .load_authorized(caller, tender_id, Operation::ManageAttachments)
            .await?;
        require_status(&aggregate.tender, EDITABLE)?;

        let now = self.now();
        let attachment = Attachment {
            id: Uuid::new_v4(),
            tender_id,
            file_name: required_text("file_name", &req.file_name)?,
            url: required_text("url", &req.url)?,
            content_type: req.content_type,
            uploaded_by: caller.user_id,
            created_at: now,
        };

        let mut changes = ChangeSet::against(&aggregate);
        changes.tender = Some(self.bump(&aggregate.tender, now));
        changes.attachments.push(attachment.clone());
        changes.audit.push(self.audit(
            caller,
            AuditAction::AttachmentAdd {
                attachment_id: attachment.id,
            },
            None,
            json(&attachment),
            now,
        ));
        self.commit(&aggregate, changes).await?;

        tracing::info!(
            tender_id = %tender_id,
            actor_id = %caller.user_id,
            attachment_id = %attachment.id,
            "Attachment added"
        );
        Ok(attachment)
    }

    pub async fn delete_attachment(&self, caller: &Caller, attachment_id: Uuid) -> EngineResult<()> {
        let tender_id = self
            .resolve(ChildRef::Attachment(attachment_id), "attachment")
            .await?;
        let aggregate = self
            .load_authorized(caller, tender_id, Operation::ManageAttachments)
            .await?;
        require_status(&aggregate.tender, EDITABLE)?;
        let old = aggregate
            .attachments
            .iter()
            .find(|a| a.id == attachment_id)
            .cloned()
            .ok_or(EngineError::NotFound("attachment"))?;

        let now = self.now();
        let mut changes = ChangeSet::against(&aggregate);
        changes.tender = Some(self.bump(&aggregate.tender, now));
        changes.removed_attachments.push(attachment_id);
        changes.audit.push(self.audit(
            caller,
            AuditAction::AttachmentDelete { attachment_id },
            json(&old),
            None,
            now,
        ));
        self.commit(&aggregate, changes).await?;

        tracing::info!(
            tender_id = %tender_id,
            actor_id = %caller.user_id,
            attachment_id = %attachment_id,
            "Attachment deleted"
        );
        Ok(())
    }

    /// Open the tender for bidding and invite the capability-matched pool.
    pub async fn publish_tender(
        &self,
        caller: &Caller,
        tender_id: Uuid,
        req: PublishTenderRequest,
    ) -> EngineResult<Tender> {
        let aggregate = self
            .load_authorized(caller, tender_id, Operation::Publish)
            .await?;
        require_status(&aggregate.tender, &[TenderStatus::Draft])?;
        if aggregate.current_requirements().next().is_none() {
            return Err(EngineError::NoRequirements);
        }
        if req.end_time < req.start_time {
            return Err(EngineError::InvalidDateRange);
        }

        let invitees = self.invitee_pool(&aggregate.tender).await?;

        let now = self.now();
        let mut tender = self.bump(&aggregate.tender, now);
        tender.status = TenderStatus::Published;
        tender.start_time = Some(req.start_time);
        tender.end_time = Some(req.end_time);
        tender.published_at = Some(now);

        let mut changes = ChangeSet::against(&aggregate);
        changes.new_invitations = invitees
            .iter()
            .map(|(contractor_id, trust_score)| Invitation {
                id: Uuid::new_v4(),
                tender_id,
                contractor_id: *contractor_id,
                status: InvitationStatus::Invited,
                trust_score: *trust_score,
                invited_at: now,
                responded_at: None,
                updated_at: now,
            })
            .collect();
        changes.audit.push(self.audit(
            caller,
            AuditAction::StatusChange {
                from: TenderStatus::Draft,
                to: TenderStatus::Published,
            },
            Some(serde_json::json!({ "status": TenderStatus::Draft })),
            Some(serde_json::json!({
                "status": TenderStatus::Published,
                "start_time": req.start_time,
                "end_time": req.end_time,
                "invited": invitees.iter().map(|(id, _)| id).collect::<Vec<_>>(),
            })),
            now,
        ));
        changes.tender = Some(tender.clone());
        changes.snapshot = Some(self.snapshot(caller, &aggregate, &changes, "publish", now));
        self.commit(&aggregate, changes).await?;

        tracing::info!(
            tender_id = %tender_id,
            actor_id = %caller.user_id,
            invited = invitees.len(),
            "Tender published"
        );

        self.notify(
            invitees
                .iter()
                .map(|(contractor_id, _)| notify::tender_invitation(*contractor_id, &tender))
                .collect(),
        )
        .await;

        Ok(tender)
    }

    pub async fn cancel_tender(&self, caller: &Caller, tender_id: Uuid) -> EngineResult<Tender> {
        let aggregate = self
            .load_authorized(caller, tender_id, Operation::Cancel)
            .await?;
        let from = aggregate.tender.status;
        if !from.can_transition_to(TenderStatus::Cancelled) {
            return Err(EngineError::status(from));
        }

        let now = self.now();
        let mut tender = self.bump(&aggregate.tender, now);
        tender.status = TenderStatus::Cancelled;

        let mut changes = ChangeSet::against(&aggregate);
        changes.audit.push(self.audit(
            caller,
            AuditAction::StatusChange {
                from,
                to: TenderStatus::Cancelled,
            },
            Some(serde_json::json!({ "status": from })),
            Some(serde_json::json!({ "status": TenderStatus::Cancelled })),
            now,
        ));
        changes.tender = Some(tender.clone());
        self.commit(&aggregate, changes).await?;

        tracing::info!(tender_id = %tender_id, actor_id = %caller.user_id, "Tender cancelled");

        self.notify(
            aggregate
                .invitations
                .iter()
                .filter(|i| i.status.may_bid())
                .map(|i| notify::tender_cancelled(i.contractor_id, &tender))
                .collect(),
        )
        .await;

        Ok(tender)
    }

    /// Close out an in-progress tender. Progress is set to 100 / review.
    pub async fn complete_tender(&self, caller: &Caller, tender_id: Uuid) -> EngineResult<Tender> {
        let aggregate = self
            .load_authorized(caller, tender_id, Operation::Complete)
            .await?;
        require_status(&aggregate.tender, &[TenderStatus::InProgress])?;
        let mut assignment = aggregate.assignment.clone().ok_or_else(|| {
            EngineError::InvalidState("tender has no assignment".to_string())
        })?;

        let now = self.now();
        let mut tender = self.bump(&aggregate.tender, now);
        tender.status = TenderStatus::Completed;

        assignment.actual_completion_date = Some(now.date_naive());
        assignment.updated_at = now;

        let progress = Progress {
            percent_complete: 100,
            current_phase: ProgressPhase::Review,
            next_milestone_id: next_open_milestone(&aggregate.milestones).map(|m| m.id),
            updated_by: caller.user_id,
            updated_at: now,
            ..aggregate.progress.clone().unwrap_or_else(|| Progress {
                id: Uuid::new_v4(),
                tender_id,
                percent_complete: 0,
                current_phase: ProgressPhase::Planning,
                next_milestone_id: None,
                notes: None,
                updated_by: caller.user_id,
                updated_at: now,
            })
        };

        let mut changes = ChangeSet::against(&aggregate);
        changes.assignment = Some(AssignmentWrite::Update(assignment));
        changes.progress = Some(progress);
        changes.audit.push(self.audit(
            caller,
            AuditAction::StatusChange {
                from: TenderStatus::InProgress,
                to: TenderStatus::Completed,
            },
            Some(serde_json::json!({ "status": TenderStatus::InProgress })),
            Some(serde_json::json!({
                "status": TenderStatus::Completed,
                "actual_completion_date": now.date_naive(),
            })),
            now,
        ));
        changes.tender = Some(tender.clone());
        self.commit(&aggregate, changes).await?;

        tracing::info!(tender_id = %tender_id, actor_id = %caller.user_id, "Tender completed");

        if let Some(contractor_id) = tender.selected_contractor {
            self.notify(vec![notify::tender_completed(contractor_id, &tender)])
                .await;
        }

        Ok(tender)
    }

    pub async fn audit_log(&self, caller: &Caller, tender_id: Uuid) -> EngineResult<Vec<AuditEntry>> {
        self.load_authorized(caller, tender_id, Operation::ViewHistory)
            .await?;
        Ok(self.store.audit_log(tender_id).await?)
    }

    pub async fn versions(
        &self,
        caller: &Caller,
        tender_id: Uuid,
    ) -> EngineResult<Vec<VersionSnapshot>> {
        self.load_authorized(caller, tender_id, Operation::ViewHistory)
            .await?;
        Ok(self.store.versions(tender_id).await?)
    }
}
