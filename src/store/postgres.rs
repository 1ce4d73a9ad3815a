//! Postgres tender store
//!
//! Commits run in one transaction: lock the tender row, compare the version,
//! re-check the bidding window, apply every write, append history, commit.
//! Uniqueness (bids, invitations, assignment) is enforced by table constraints.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{
    AssignmentWrite, ChangeSet, ChildRef, CommitReceipt, StoreError, StoreResult,
    TenderAggregate, TenderFilter, TenderStore,
};
use crate::domain::*;

// ============================================================================
// Database Row Types
// ============================================================================

const TENDER_COLUMNS: &str = "id, customer_id, supervisor_id, service_id, title, description, \
     location, budget, status, priority, contractor_limit, version, start_time, end_time, \
     published_at, selected_contractor, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct TenderRow {
    id: Uuid,
    customer_id: Uuid,
    supervisor_id: Option<Uuid>,
    service_id: Uuid,
    title: String,
    description: Option<String>,
    location: String,
    budget: Option<Decimal>,
    status: String,
    priority: String,
    contractor_limit: Option<i32>,
    version: i64,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    published_at: Option<DateTime<Utc>>,
    selected_contractor: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TenderRow> for Tender {
    type Error = ParseEnumError;

    fn try_from(r: TenderRow) -> Result<Self, Self::Error> {
        Ok(Tender {
            id: r.id,
            customer_id: r.customer_id,
            supervisor_id: r.supervisor_id,
            service_id: r.service_id,
            title: r.title,
            description: r.description,
            location: r.location,
            budget: r.budget,
            status: r.status.parse()?,
            priority: r.priority.parse()?,
            contractor_limit: r.contractor_limit,
            version: r.version,
            start_time: r.start_time,
            end_time: r.end_time,
            published_at: r.published_at,
            selected_contractor: r.selected_contractor,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RequirementRow {
    id: Uuid,
    tender_id: Uuid,
    requirement_type_id: Uuid,
    name: String,
    quantity: Decimal,
    unit: String,
    is_critical: bool,
    description: Option<String>,
    version: i32,
    is_current: bool,
    created_at: DateTime<Utc>,
}

impl From<RequirementRow> for TenderRequirement {
    fn from(r: RequirementRow) -> Self {
        Self {
            id: r.id,
            tender_id: r.tender_id,
            requirement_type_id: r.requirement_type_id,
            name: r.name,
            quantity: r.quantity,
            unit: r.unit,
            is_critical: r.is_critical,
            description: r.description,
            version: r.version,
            is_current: r.is_current,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AttachmentRow {
    id: Uuid,
    tender_id: Uuid,
    file_name: String,
    url: String,
    content_type: Option<String>,
    uploaded_by: Uuid,
    created_at: DateTime<Utc>,
}

impl From<AttachmentRow> for Attachment {
    fn from(r: AttachmentRow) -> Self {
        Self {
            id: r.id,
            tender_id: r.tender_id,
            file_name: r.file_name,
            url: r.url,
            content_type: r.content_type,
            uploaded_by: r.uploaded_by,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct InvitationRow {
    id: Uuid,
    tender_id: Uuid,
    contractor_id: Uuid,
    status: String,
    trust_score: Option<f64>,
    invited_at: DateTime<Utc>,
    responded_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InvitationRow> for Invitation {
    type Error = ParseEnumError;

    fn try_from(r: InvitationRow) -> Result<Self, Self::Error> {
        Ok(Invitation {
            id: r.id,
            tender_id: r.tender_id,
            contractor_id: r.contractor_id,
            status: r.status.parse()?,
            trust_score: r.trust_score,
            invited_at: r.invited_at,
            responded_at: r.responded_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BidRow {
    id: Uuid,
    tender_id: Uuid,
    requirement_id: Uuid,
    contractor_id: Uuid,
    amount: Decimal,
    proposal: Option<String>,
    is_final: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BidRow> for Bid {
    fn from(r: BidRow) -> Self {
        Self {
            id: r.id,
            tender_id: r.tender_id,
            requirement_id: r.requirement_id,
            contractor_id: r.contractor_id,
            amount: r.amount,
            proposal: r.proposal,
            is_final: r.is_final,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AssignmentRow {
    id: Uuid,
    tender_id: Uuid,
    contractor_id: Uuid,
    start_date: NaiveDate,
    due_date: NaiveDate,
    total_amount: Option<Decimal>,
    payment_status: String,
    actual_completion_date: Option<NaiveDate>,
    comment: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AssignmentRow> for Assignment {
    type Error = ParseEnumError;

    fn try_from(r: AssignmentRow) -> Result<Self, Self::Error> {
        Ok(Assignment {
            id: r.id,
            tender_id: r.tender_id,
            contractor_id: r.contractor_id,
            start_date: r.start_date,
            due_date: r.due_date,
            total_amount: r.total_amount,
            payment_status: r.payment_status.parse()?,
            actual_completion_date: r.actual_completion_date,
            comment: r.comment,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MilestoneRow {
    id: Uuid,
    tender_id: Uuid,
    title: String,
    description: Option<String>,
    due_date: NaiveDate,
    completed_date: Option<NaiveDate>,
    status: String,
    completion_notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MilestoneRow> for Milestone {
    type Error = ParseEnumError;

    fn try_from(r: MilestoneRow) -> Result<Self, Self::Error> {
        Ok(Milestone {
            id: r.id,
            tender_id: r.tender_id,
            title: r.title,
            description: r.description,
            due_date: r.due_date,
            completed_date: r.completed_date,
            status: r.status.parse()?,
            completion_notes: r.completion_notes,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProgressRow {
    id: Uuid,
    tender_id: Uuid,
    percent_complete: i16,
    current_phase: String,
    next_milestone_id: Option<Uuid>,
    notes: Option<String>,
    updated_by: Uuid,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProgressRow> for Progress {
    type Error = ParseEnumError;

    fn try_from(r: ProgressRow) -> Result<Self, Self::Error> {
        Ok(Progress {
            id: r.id,
            tender_id: r.tender_id,
            percent_complete: r.percent_complete,
            current_phase: r.current_phase.parse()?,
            next_milestone_id: r.next_milestone_id,
            notes: r.notes,
            updated_by: r.updated_by,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    id: Uuid,
    tender_id: Uuid,
    sequence: i64,
    actor_id: Uuid,
    action: serde_json::Value,
    old_value: Option<serde_json::Value>,
    new_value: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct VersionRow {
    id: Uuid,
    tender_id: Uuid,
    version_number: i32,
    tender_version: i64,
    reason: String,
    state: serde_json::Value,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}

impl From<VersionRow> for VersionSnapshot {
    fn from(r: VersionRow) -> Self {
        Self {
            id: r.id,
            tender_id: r.tender_id,
            version_number: r.version_number,
            tender_version: r.tender_version,
            reason: r.reason,
            state: r.state,
            created_by: r.created_by,
            created_at: r.created_at,
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Map a unique-constraint violation to a domain conflict.
fn unique_as(err: sqlx::Error, conflict: StoreError) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => conflict,
        _ => StoreError::Database(err),
    }
}

type Tx<'c> = Transaction<'c, Postgres>;

async fn write_tender(tx: &mut Tx<'_>, t: &Tender) -> StoreResult<()> {
    sqlx::query(
        r#"
        UPDATE tenders SET
            supervisor_id = $2, title = $3, description = $4, location = $5, budget = $6,
            status = $7, priority = $8, contractor_limit = $9, version = $10,
            start_time = $11, end_time = $12, published_at = $13,
            selected_contractor = $14, updated_at = $15
        WHERE id = $1
        "#,
    )
    .bind(t.id)
    .bind(t.supervisor_id)
    .bind(&t.title)
    .bind(&t.description)
    .bind(&t.location)
    .bind(t.budget)
    .bind(t.status.as_str())
    .bind(t.priority.as_str())
    .bind(t.contractor_limit)
    .bind(t.version)
    .bind(t.start_time)
    .bind(t.end_time)
    .bind(t.published_at)
    .bind(t.selected_contractor)
    .bind(t.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn write_requirement(tx: &mut Tx<'_>, r: &TenderRequirement) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO tender_requirements (
            id, tender_id, requirement_type_id, name, quantity, unit, is_critical,
            description, version, is_current, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (id) DO UPDATE SET
            quantity = EXCLUDED.quantity,
            unit = EXCLUDED.unit,
            is_critical = EXCLUDED.is_critical,
            description = EXCLUDED.description,
            is_current = EXCLUDED.is_current
        "#,
    )
    .bind(r.id)
    .bind(r.tender_id)
    .bind(r.requirement_type_id)
    .bind(&r.name)
    .bind(r.quantity)
    .bind(&r.unit)
    .bind(r.is_critical)
    .bind(&r.description)
    .bind(r.version)
    .bind(r.is_current)
    .bind(r.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_attachment(tx: &mut Tx<'_>, a: &Attachment) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO tender_attachments (
            id, tender_id, file_name, url, content_type, uploaded_by, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(a.id)
    .bind(a.tender_id)
    .bind(&a.file_name)
    .bind(&a.url)
    .bind(&a.content_type)
    .bind(a.uploaded_by)
    .bind(a.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_invitation(tx: &mut Tx<'_>, i: &Invitation) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO tender_invitations (
            id, tender_id, contractor_id, status, trust_score, invited_at, responded_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(i.id)
    .bind(i.tender_id)
    .bind(i.contractor_id)
    .bind(i.status.as_str())
    .bind(i.trust_score)
    .bind(i.invited_at)
    .bind(i.responded_at)
    .bind(i.updated_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| unique_as(e, StoreError::DuplicateInvite))?;
    Ok(())
}

async fn upsert_invitation(tx: &mut Tx<'_>, i: &Invitation) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO tender_invitations (
            id, tender_id, contractor_id, status, trust_score, invited_at, responded_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (tender_id, contractor_id) DO UPDATE SET
            status = EXCLUDED.status,
            responded_at = EXCLUDED.responded_at,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(i.id)
    .bind(i.tender_id)
    .bind(i.contractor_id)
    .bind(i.status.as_str())
    .bind(i.trust_score)
    .bind(i.invited_at)
    .bind(i.responded_at)
    .bind(i.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_bid(tx: &mut Tx<'_>, b: &Bid) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO tender_bids (
            id, tender_id, requirement_id, contractor_id, amount, proposal, is_final,
            created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(b.id)
    .bind(b.tender_id)
    .bind(b.requirement_id)
    .bind(b.contractor_id)
    .bind(b.amount)
    .bind(&b.proposal)
    .bind(b.is_final)
    .bind(b.created_at)
    .bind(b.updated_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| unique_as(e, StoreError::DuplicateBid))?;
    Ok(())
}

async fn update_bid(tx: &mut Tx<'_>, b: &Bid) -> StoreResult<()> {
    sqlx::query(
        "UPDATE tender_bids SET amount = $2, proposal = $3, is_final = $4, updated_at = $5 WHERE id = $1",
    )
    .bind(b.id)
    .bind(b.amount)
    .bind(&b.proposal)
    .bind(b.is_final)
    .bind(b.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn write_assignment(tx: &mut Tx<'_>, write: &AssignmentWrite) -> StoreResult<()> {
    match write {
        AssignmentWrite::Create(a) => {
            sqlx::query(
                r#"
                INSERT INTO tender_assignments (
                    id, tender_id, contractor_id, start_date, due_date, total_amount,
                    payment_status, actual_completion_date, comment, created_at, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(a.id)
            .bind(a.tender_id)
            .bind(a.contractor_id)
            .bind(a.start_date)
            .bind(a.due_date)
            .bind(a.total_amount)
            .bind(a.payment_status.as_str())
            .bind(a.actual_completion_date)
            .bind(&a.comment)
            .bind(a.created_at)
            .bind(a.updated_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| unique_as(e, StoreError::AssignmentExists))?;
        }
        AssignmentWrite::Update(a) => {
            sqlx::query(
                r#"
                UPDATE tender_assignments SET
                    payment_status = $2, actual_completion_date = $3, updated_at = $4
                WHERE id = $1
                "#,
            )
            .bind(a.id)
            .bind(a.payment_status.as_str())
            .bind(a.actual_completion_date)
            .bind(a.updated_at)
            .execute(&mut **tx)
            .await?;
        }
    }
    Ok(())
}

async fn write_milestone(tx: &mut Tx<'_>, m: &Milestone) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO tender_milestones (
            id, tender_id, title, description, due_date, completed_date, status,
            completion_notes, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (id) DO UPDATE SET
            completed_date = EXCLUDED.completed_date,
            status = EXCLUDED.status,
            completion_notes = EXCLUDED.completion_notes,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(m.id)
    .bind(m.tender_id)
    .bind(&m.title)
    .bind(&m.description)
    .bind(m.due_date)
    .bind(m.completed_date)
    .bind(m.status.as_str())
    .bind(&m.completion_notes)
    .bind(m.created_at)
    .bind(m.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn write_progress(tx: &mut Tx<'_>, p: &Progress) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO tender_progress (
            id, tender_id, percent_complete, current_phase, next_milestone_id, notes,
            updated_by, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (tender_id) DO UPDATE SET
            percent_complete = EXCLUDED.percent_complete,
            current_phase = EXCLUDED.current_phase,
            next_milestone_id = EXCLUDED.next_milestone_id,
            notes = EXCLUDED.notes,
            updated_by = EXCLUDED.updated_by,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(p.id)
    .bind(p.tender_id)
    .bind(p.percent_complete)
    .bind(p.current_phase.as_str())
    .bind(p.next_milestone_id)
    .bind(&p.notes)
    .bind(p.updated_by)
    .bind(p.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Insert the rating and recompute the contractor's stored average from all
/// of their ratings.
async fn record_rating(tx: &mut Tx<'_>, r: &NewRating) -> StoreResult<Decimal> {
    sqlx::query(
        r#"
        INSERT INTO contractor_ratings (id, contractor_id, tender_id, rater_id, score, comment, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(r.contractor_id)
    .bind(r.tender_id)
    .bind(r.rater_id)
    .bind(r.score)
    .bind(&r.comment)
    .bind(r.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| unique_as(e, StoreError::AlreadyRated))?;

    let average: Decimal = sqlx::query_scalar(
        r#"
        UPDATE contractors SET rating = (
            SELECT ROUND(AVG(score)::numeric, 2) FROM contractor_ratings WHERE contractor_id = $1
        )
        WHERE id = $1
        RETURNING rating
        "#,
    )
    .bind(r.contractor_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(average)
}

async fn append_audit(tx: &mut Tx<'_>, tender_id: Uuid, entry: &NewAuditEntry) -> StoreResult<()> {
    let action = serde_json::to_value(&entry.action)?;
    sqlx::query(
        r#"
        INSERT INTO tender_audit_log (
            id, tender_id, sequence, actor_id, kind, action, old_value, new_value, created_at
        )
        SELECT $1, $2, COALESCE(MAX(sequence), 0) + 1, $3, $4, $5, $6, $7, $8
        FROM tender_audit_log WHERE tender_id = $2
        "#,
    )
    .bind(entry.id)
    .bind(tender_id)
    .bind(entry.actor_id)
    .bind(entry.action.kind())
    .bind(&action)
    .bind(&entry.old_value)
    .bind(&entry.new_value)
    .bind(entry.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn append_snapshot(tx: &mut Tx<'_>, tender_id: Uuid, s: &NewSnapshot) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO tender_versions (
            id, tender_id, version_number, tender_version, reason, state, created_by, created_at
        )
        SELECT $1, $2, COALESCE(MAX(version_number), 0) + 1, $3, $4, $5, $6, $7
        FROM tender_versions WHERE tender_id = $2
        "#,
    )
    .bind(s.id)
    .bind(tender_id)
    .bind(s.tender_version)
    .bind(&s.reason)
    .bind(&s.state)
    .bind(s.created_by)
    .bind(s.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

// ============================================================================
// Store
// ============================================================================

#[derive(Clone)]
pub struct PgTenderStore {
    pool: PgPool,
}

impl PgTenderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenderStore for PgTenderStore {
    async fn insert_tender(&self, t: &Tender, audit: NewAuditEntry) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO tenders (
                id, customer_id, supervisor_id, service_id, title, description, location,
                budget, status, priority, contractor_limit, version, start_time, end_time,
                published_at, selected_contractor, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(t.id)
        .bind(t.customer_id)
        .bind(t.supervisor_id)
        .bind(t.service_id)
        .bind(&t.title)
        .bind(&t.description)
        .bind(&t.location)
        .bind(t.budget)
        .bind(t.status.as_str())
        .bind(t.priority.as_str())
        .bind(t.contractor_limit)
        .bind(t.version)
        .bind(t.start_time)
        .bind(t.end_time)
        .bind(t.published_at)
        .bind(t.selected_contractor)
        .bind(t.created_at)
        .bind(t.updated_at)
        .execute(&mut *tx)
        .await?;

        append_audit(&mut tx, t.id, &audit).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn load(&self, tender_id: Uuid) -> StoreResult<Option<TenderAggregate>> {
        // One snapshot for every child table: a reader never sees half a commit.
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query_as::<_, TenderRow>(&format!(
            "SELECT {TENDER_COLUMNS} FROM tenders WHERE id = $1"
        ))
        .bind(tender_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut aggregate = TenderAggregate::new(Tender::try_from(row)?);

        aggregate.requirements = sqlx::query_as::<_, RequirementRow>(
            "SELECT * FROM tender_requirements WHERE tender_id = $1 ORDER BY created_at, version",
        )
        .bind(tender_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(TenderRequirement::from)
        .collect();

        aggregate.attachments = sqlx::query_as::<_, AttachmentRow>(
            "SELECT * FROM tender_attachments WHERE tender_id = $1 ORDER BY created_at",
        )
        .bind(tender_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(Attachment::from)
        .collect();

        aggregate.invitations = sqlx::query_as::<_, InvitationRow>(
            "SELECT * FROM tender_invitations WHERE tender_id = $1 ORDER BY invited_at, contractor_id",
        )
        .bind(tender_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(Invitation::try_from)
        .collect::<Result<_, _>>()?;

        aggregate.bids = sqlx::query_as::<_, BidRow>(
            "SELECT * FROM tender_bids WHERE tender_id = $1 ORDER BY contractor_id, created_at",
        )
        .bind(tender_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(Bid::from)
        .collect();

        aggregate.assignment = sqlx::query_as::<_, AssignmentRow>(
            "SELECT * FROM tender_assignments WHERE tender_id = $1",
        )
        .bind(tender_id)
        .fetch_optional(&mut *tx)
        .await?
        .map(Assignment::try_from)
        .transpose()?;

        aggregate.milestones = sqlx::query_as::<_, MilestoneRow>(
            "SELECT * FROM tender_milestones WHERE tender_id = $1 ORDER BY due_date, created_at",
        )
        .bind(tender_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(Milestone::try_from)
        .collect::<Result<_, _>>()?;

        aggregate.progress = sqlx::query_as::<_, ProgressRow>(
            "SELECT * FROM tender_progress WHERE tender_id = $1",
        )
        .bind(tender_id)
        .fetch_optional(&mut *tx)
        .await?
        .map(Progress::try_from)
        .transpose()?;

        tx.commit().await?;
        Ok(Some(aggregate))
    }

    async fn commit(&self, changes: ChangeSet) -> StoreResult<CommitReceipt> {
        let tender_id = changes.tender_id;
        let mut tx = self.pool.begin().await?;

        // Version-bumping writes serialize on the tender row; bid and response
        // writes only need it to stay put while they land.
        let lock = if changes.bumps_version() {
            "FOR UPDATE"
        } else {
            "FOR SHARE"
        };
        let actual: i64 = sqlx::query_scalar(&format!(
            "SELECT version FROM tenders WHERE id = $1 {lock}"
        ))
        .bind(tender_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::TenderNotFound)?;

        if actual != changes.expected_version {
            return Err(StoreError::StaleVersion {
                expected: changes.expected_version,
                actual,
            });
        }

        if changes.bid_window.is_some() {
            // Database clock, read inside the transaction
            let now: DateTime<Utc> = sqlx::query_scalar("SELECT clock_timestamp()")
                .fetch_one(&mut *tx)
                .await?;
            changes.check_window(now)?;
        }

        if let Some(tender) = &changes.tender {
            write_tender(&mut tx, tender).await?;
        }

        for requirement in &changes.requirements {
            write_requirement(&mut tx, requirement).await?;
        }
        if !changes.removed_requirements.is_empty() {
            sqlx::query("DELETE FROM tender_requirements WHERE id = ANY($1)")
                .bind(&changes.removed_requirements)
                .execute(&mut *tx)
                .await?;
        }

        for attachment in &changes.attachments {
            insert_attachment(&mut tx, attachment).await?;
        }
        if !changes.removed_attachments.is_empty() {
            sqlx::query("DELETE FROM tender_attachments WHERE id = ANY($1)")
                .bind(&changes.removed_attachments)
                .execute(&mut *tx)
                .await?;
        }

        for invitation in &changes.new_invitations {
            insert_invitation(&mut tx, invitation).await?;
        }
        for invitation in &changes.invitations {
            upsert_invitation(&mut tx, invitation).await?;
        }

        if !changes.removed_bids.is_empty() {
            sqlx::query("DELETE FROM tender_bids WHERE id = ANY($1)")
                .bind(&changes.removed_bids)
                .execute(&mut *tx)
                .await?;
        }
        for bid in &changes.new_bids {
            insert_bid(&mut tx, bid).await?;
        }
        for bid in &changes.bids {
            update_bid(&mut tx, bid).await?;
        }

        if let Some(write) = &changes.assignment {
            write_assignment(&mut tx, write).await?;
        }

        for milestone in &changes.milestones {
            write_milestone(&mut tx, milestone).await?;
        }
        if let Some(progress) = &changes.progress {
            write_progress(&mut tx, progress).await?;
        }

        let mut receipt = CommitReceipt::default();
        if let Some(rating) = &changes.rating {
            receipt.contractor_rating = Some(record_rating(&mut tx, rating).await?);
        }

        if !changes.audit.is_empty() || changes.snapshot.is_some() {
            // Shared-lock commits may run side by side; history numbering may not.
            sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
                .bind(tender_id)
                .execute(&mut *tx)
                .await?;
        }
        for entry in &changes.audit {
            append_audit(&mut tx, tender_id, entry).await?;
        }
        if let Some(snapshot) = &changes.snapshot {
            append_snapshot(&mut tx, tender_id, snapshot).await?;
        }

        tx.commit().await?;
        Ok(receipt)
    }

    async fn tender_of(&self, child: ChildRef) -> StoreResult<Option<Uuid>> {
        let (table, id) = match child {
            ChildRef::Requirement(id) => ("tender_requirements", id),
            ChildRef::Attachment(id) => ("tender_attachments", id),
            ChildRef::Invitation(id) => ("tender_invitations", id),
            ChildRef::Bid(id) => ("tender_bids", id),
            ChildRef::Milestone(id) => ("tender_milestones", id),
        };

        let tender_id = sqlx::query_scalar(&format!("SELECT tender_id FROM {table} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tender_id)
    }

    async fn list_tenders(
        &self,
        filter: &TenderFilter,
        limit: u32,
        offset: u32,
    ) -> StoreResult<(Vec<Tender>, u64)> {
        const WHERE: &str = r#"
            WHERE ($1::uuid IS NULL OR customer_id = $1)
            AND ($2::uuid IS NULL OR supervisor_id = $2)
            AND ($3::uuid IS NULL OR selected_contractor = $3 OR EXISTS (
                SELECT 1 FROM tender_invitations i
                WHERE i.tender_id = tenders.id AND i.contractor_id = $3
            ))
            AND ($4::text IS NULL OR status = $4)
        "#;
        let status = filter.status.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM tenders {WHERE}"))
            .bind(filter.customer_id)
            .bind(filter.supervisor_id)
            .bind(filter.contractor_id)
            .bind(status)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, TenderRow>(&format!(
            "SELECT {TENDER_COLUMNS} FROM tenders {WHERE} ORDER BY created_at DESC, id LIMIT $5 OFFSET $6"
        ))
        .bind(filter.customer_id)
        .bind(filter.supervisor_id)
        .bind(filter.contractor_id)
        .bind(status)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        let tenders = rows
            .into_iter()
            .map(Tender::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((tenders, total as u64))
    }

    async fn audit_log(&self, tender_id: Uuid) -> StoreResult<Vec<AuditEntry>> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT id, tender_id, sequence, actor_id, action, old_value, new_value, created_at
            FROM tender_audit_log WHERE tender_id = $1 ORDER BY sequence
            "#,
        )
        .bind(tender_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(AuditEntry {
                    id: r.id,
                    tender_id: r.tender_id,
                    sequence: r.sequence,
                    actor_id: r.actor_id,
                    action: serde_json::from_value(r.action)?,
                    old_value: r.old_value,
                    new_value: r.new_value,
                    created_at: r.created_at,
                })
            })
            .collect()
    }

    async fn versions(&self, tender_id: Uuid) -> StoreResult<Vec<VersionSnapshot>> {
        let rows = sqlx::query_as::<_, VersionRow>(
            "SELECT * FROM tender_versions WHERE tender_id = $1 ORDER BY version_number",
        )
        .bind(tender_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(VersionSnapshot::from).collect())
    }
}
