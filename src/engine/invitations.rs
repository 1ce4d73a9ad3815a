//! Invitation ledger operations

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::{json, require_status, EngineError, EngineResult, Operation, TenderEngine};
use crate::domain::*;
use crate::services::notifications as notify;
use crate::store::{ChangeSet, ChildRef};

/// Rank by trust score, highest first. Unknown scores sort last.
fn by_trust(a: &(Uuid, Option<f64>), b: &(Uuid, Option<f64>)) -> Ordering {
    match (a.1, b.1) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.0.cmp(&b.0))
}

impl TenderEngine {
    /// Publish-time invitees with the trust score they were ranked by.
    ///
    /// The trust lookup is advisory: when it fails the capability pool is
    /// used unfiltered and unranked.
    pub(crate) async fn invitee_pool(&self, tender: &Tender) -> EngineResult<Vec<(Uuid, Option<f64>)>> {
        let mut seen = HashSet::new();
        let pool: Vec<Uuid> = self
            .catalog
            .contractors_for_service(tender.service_id)
            .await?
            .into_iter()
            .filter(|id| seen.insert(*id))
            .collect();

        let mut ranked: Vec<(Uuid, Option<f64>)> = match self.directory.trust_scores(&pool).await {
            Ok(scores) => {
                let mut ranked: Vec<_> = pool
                    .iter()
                    .map(|id| (*id, scores.get(id).copied()))
                    .filter(|(_, score)| match (self.settings.min_trust_score, score) {
                        (Some(min), Some(score)) => *score >= min,
                        _ => true,
                    })
                    .collect();
                ranked.sort_by(by_trust);
                ranked
            }
            Err(e) => {
                tracing::warn!(
                    tender_id = %tender.id,
                    error = %e,
                    "Trust scores unavailable, inviting unranked capability pool"
                );
                let mut unranked: Vec<_> = pool.into_iter().map(|id| (id, None)).collect();
                unranked.sort_by_key(|(id, _)| *id);
                unranked
            }
        };

        let tender_cap = tender.contractor_limit.map(|n| n.max(0) as usize);
        let cap = match (tender_cap, self.settings.max_auto_invitees) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        if let Some(cap) = cap {
            ranked.truncate(cap);
        }

        Ok(ranked)
    }

    /// Invite further contractors to a published tender.
    pub async fn invite_contractors(
        &self,
        caller: &Caller,
        tender_id: Uuid,
        req: InviteContractorsRequest,
    ) -> EngineResult<Vec<Invitation>> {
        let aggregate = self
            .load_authorized(caller, tender_id, Operation::Invite)
            .await?;
        require_status(&aggregate.tender, &[TenderStatus::Published])?;
        if req.contractor_ids.is_empty() {
            return Err(EngineError::validation("contractor_ids must not be empty"));
        }

        let mut requested = HashSet::new();
        for contractor_id in &req.contractor_ids {
            if !requested.insert(*contractor_id)
                || aggregate.invitation_for(*contractor_id).is_some()
            {
                return Err(EngineError::DuplicateInvite);
            }
        }

        let pool: HashSet<Uuid> = self
            .catalog
            .contractors_for_service(aggregate.tender.service_id)
            .await?
            .into_iter()
            .collect();
        if let Some(outsider) = req.contractor_ids.iter().find(|id| !pool.contains(id)) {
            return Err(EngineError::IneligibleContractor(*outsider));
        }

        let scores = self
            .directory
            .trust_scores(&req.contractor_ids)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(
                    tender_id = %tender_id,
                    error = %e,
                    "Trust scores unavailable, inviting without scores"
                );
                HashMap::new()
            });

        let now = self.now();
        let invitations: Vec<Invitation> = req
            .contractor_ids
            .iter()
            .map(|contractor_id| Invitation {
                id: Uuid::new_v4(),
                tender_id,
                contractor_id: *contractor_id,
                status: InvitationStatus::Invited,
                trust_score: scores.get(contractor_id).copied(),
                invited_at: now,
                responded_at: None,
                updated_at: now,
            })
            .collect();

        let mut changes = ChangeSet::against(&aggregate);
        changes.tender = Some(self.bump(&aggregate.tender, now));
        changes.new_invitations = invitations.clone();
        changes.audit.push(self.audit(
            caller,
            AuditAction::ContractorsInvite {
                contractor_ids: req.contractor_ids.clone(),
            },
            None,
            json(&invitations),
            now,
        ));
        self.commit(&aggregate, changes).await?;

        tracing::info!(
            tender_id = %tender_id,
            actor_id = %caller.user_id,
            invited = invitations.len(),
            "Contractors invited"
        );

        self.notify(
            invitations
                .iter()
                .map(|i| notify::tender_invitation(i.contractor_id, &aggregate.tender))
                .collect(),
        )
        .await;

        Ok(invitations)
    }

    /// Accept or decline an invitation.
    ///
    /// Repeating the current answer is a no-op. Only `invited` invitations
    /// can change, and only while the tender is still published.
    pub async fn respond_to_invite(
        &self,
        caller: &Caller,
        invitation_id: Uuid,
        response: InviteResponse,
    ) -> EngineResult<Invitation> {
        let tender_id = self
            .resolve(ChildRef::Invitation(invitation_id), "invitation")
            .await?;
        let aggregate = self.load(tender_id).await?;
        let invitation = aggregate
            .invitations
            .iter()
            .find(|i| i.id == invitation_id)
            .cloned()
            .ok_or(EngineError::NotFound("invitation"))?;
        super::policy::authorize(
            caller,
            &aggregate,
            Operation::RespondToInvite {
                contractor_id: invitation.contractor_id,
            },
        )
        .into_result()?;

        let target = response.target_status();
        if invitation.status == target {
            return Ok(invitation);
        }
        require_status(&aggregate.tender, &[TenderStatus::Published])?;
        if invitation.status != InvitationStatus::Invited {
            return Err(EngineError::InvalidState(format!(
                "invitation is already {}",
                invitation.status
            )));
        }

        let now = self.now();
        let mut updated = invitation.clone();
        updated.status = target;
        updated.responded_at = Some(now);
        updated.updated_at = now;

        let mut changes = ChangeSet::against(&aggregate);
        changes.invitations.push(updated.clone());
        changes.audit.push(self.audit(
            caller,
            AuditAction::InvitationRespond {
                invitation_id,
                contractor_id: invitation.contractor_id,
            },
            Some(serde_json::json!({ "status": invitation.status })),
            Some(serde_json::json!({ "status": target })),
            now,
        ));
        self.commit(&aggregate, changes).await?;

        tracing::info!(
            tender_id = %tender_id,
            actor_id = %caller.user_id,
            invitation_id = %invitation_id,
            status = %target,
            "Invitation answered"
        );
        Ok(updated)
    }

    /// All invitations for the owner and supervisor; a contractor sees only their own.
    pub async fn list_invitations(
        &self,
        caller: &Caller,
        tender_id: Uuid,
    ) -> EngineResult<Vec<Invitation>> {
        let aggregate = self
            .load_authorized(caller, tender_id, Operation::ViewTender)
            .await?;
        Ok(match caller.role {
            Role::Contractor => aggregate
                .invitations
                .into_iter()
                .filter(|i| i.contractor_id == caller.user_id)
                .collect(),
            _ => aggregate.invitations,
        })
    }
}
