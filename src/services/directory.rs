//! Contractor directory
//!
//! Read-only trust scores for invitee ranking. A contractor's score is the
//! rating average the tender store recomputes whenever a rating is committed.

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("contractor directory unavailable: {0}")]
    Unavailable(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait ContractorDirectory: Send + Sync {
    /// Known trust scores; contractors without one are absent from the map.
    async fn trust_scores(&self, contractor_ids: &[Uuid]) -> Result<HashMap<Uuid, f64>, DirectoryError>;
}

#[derive(Clone)]
pub struct PgContractorDirectory {
    db: PgPool,
}

impl PgContractorDirectory {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ContractorDirectory for PgContractorDirectory {
    async fn trust_scores(&self, contractor_ids: &[Uuid]) -> Result<HashMap<Uuid, f64>, DirectoryError> {
        let rows: Vec<(Uuid, Decimal)> =
            sqlx::query_as("SELECT id, rating FROM contractors WHERE id = ANY($1)")
                .bind(contractor_ids)
                .fetch_all(&self.db)
                .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, rating)| rating.to_f64().map(|score| (id, score)))
            .collect())
    }
}

/// In-memory directory for tests and local runs.
#[derive(Default)]
pub struct MemoryContractorDirectory {
    scores: Mutex<HashMap<Uuid, f64>>,
    unavailable: Mutex<bool>,
}

impl MemoryContractorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_score(&self, contractor_id: Uuid, score: f64) {
        self.scores.lock().insert(contractor_id, score);
    }

    /// Make trust lookups fail, as when the scoring service is down.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock() = unavailable;
    }
}

#[async_trait]
impl ContractorDirectory for MemoryContractorDirectory {
    async fn trust_scores(&self, contractor_ids: &[Uuid]) -> Result<HashMap<Uuid, f64>, DirectoryError> {
        if *self.unavailable.lock() {
            return Err(DirectoryError::Unavailable("trust scores offline".to_string()));
        }
        let scores = self.scores.lock();
        Ok(contractor_ids
            .iter()
            .filter_map(|id| scores.get(id).map(|score| (*id, *score)))
            .collect())
    }
}
