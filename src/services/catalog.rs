//! Catalog access
//!
//! Services, requirement types and contractor service capabilities are owned
//! by the catalog and read-only here.

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use super::cache::{keys, RedisCache};
use crate::domain::RequirementType;

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn service_exists(&self, service_id: Uuid) -> Result<bool>;

    async fn requirement_type(&self, requirement_type_id: Uuid) -> Result<Option<RequirementType>>;

    /// Contractors declaring the service capability
    async fn contractors_for_service(&self, service_id: Uuid) -> Result<Vec<Uuid>>;
}

// ============================================================================
// Postgres
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
struct RequirementTypeRow {
    id: Uuid,
    service_id: Uuid,
    name: String,
    default_unit: String,
}

#[derive(Clone)]
pub struct PgCatalog {
    db: PgPool,
}

impl PgCatalog {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn service_exists(&self, service_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM services WHERE id = $1)")
            .bind(service_id)
            .fetch_one(&self.db)
            .await
            .context("Failed to look up service")?;
        Ok(exists)
    }

    async fn requirement_type(&self, requirement_type_id: Uuid) -> Result<Option<RequirementType>> {
        let row = sqlx::query_as::<_, RequirementTypeRow>(
            "SELECT id, service_id, name, default_unit FROM requirement_types WHERE id = $1",
        )
        .bind(requirement_type_id)
        .fetch_optional(&self.db)
        .await
        .context("Failed to look up requirement type")?;

        Ok(row.map(|r| RequirementType {
            id: r.id,
            service_id: r.service_id,
            name: r.name,
            default_unit: r.default_unit,
        }))
    }

    async fn contractors_for_service(&self, service_id: Uuid) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar(
            "SELECT contractor_id FROM contractor_services WHERE service_id = $1 ORDER BY contractor_id",
        )
        .bind(service_id)
        .fetch_all(&self.db)
        .await
        .context("Failed to load service capability pool")?;
        Ok(ids)
    }
}

// ============================================================================
// Redis-cached wrapper
// ============================================================================

/// Read-through Redis cache in front of another catalog.
pub struct CachedCatalog<C> {
    inner: C,
    cache: RedisCache,
}

impl<C: Catalog> CachedCatalog<C> {
    pub fn new(inner: C, cache: RedisCache) -> Self {
        Self { inner, cache }
    }

    async fn remember<T: serde::Serialize>(&self, key: &str, value: &T) {
        if let Err(e) = self.cache.set(key, value).await {
            tracing::warn!(key = key, error = %e, "Failed to cache catalog value");
        }
    }
}

#[async_trait]
impl<C: Catalog> Catalog for CachedCatalog<C> {
    async fn service_exists(&self, service_id: Uuid) -> Result<bool> {
        let key = keys::service(service_id);
        if let Some(exists) = self.cache.get::<bool>(&key).await {
            return Ok(exists);
        }
        let exists = self.inner.service_exists(service_id).await?;
        // Negative answers are not cached, a service may appear later.
        if exists {
            self.remember(&key, &exists).await;
        }
        Ok(exists)
    }

    async fn requirement_type(&self, requirement_type_id: Uuid) -> Result<Option<RequirementType>> {
        let key = keys::requirement_type(requirement_type_id);
        if let Some(found) = self.cache.get::<RequirementType>(&key).await {
            return Ok(Some(found));
        }
        let found = self.inner.requirement_type(requirement_type_id).await?;
        if let Some(rt) = &found {
            self.remember(&key, rt).await;
        }
        Ok(found)
    }

    async fn contractors_for_service(&self, service_id: Uuid) -> Result<Vec<Uuid>> {
        let key = keys::service_contractors(service_id);
        if let Some(ids) = self.cache.get::<Vec<Uuid>>(&key).await {
            return Ok(ids);
        }
        let ids = self.inner.contractors_for_service(service_id).await?;
        self.remember(&key, &ids).await;
        Ok(ids)
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Fixed catalog held in memory. Used for tests and local runs.
#[derive(Default)]
pub struct StaticCatalog {
    services: RwLock<HashMap<Uuid, Vec<Uuid>>>,
    requirement_types: RwLock<HashMap<Uuid, RequirementType>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service together with its capability pool.
    pub fn add_service(&self, service_id: Uuid, contractors: impl IntoIterator<Item = Uuid>) {
        self.services
            .write()
            .insert(service_id, contractors.into_iter().collect());
    }

    /// Register a requirement type and return its id.
    pub fn add_requirement_type(&self, service_id: Uuid, name: &str, default_unit: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.requirement_types.write().insert(
            id,
            RequirementType {
                id,
                service_id,
                name: name.to_string(),
                default_unit: default_unit.to_string(),
            },
        );
        id
    }
}

#[async_trait]
impl Catalog for StaticCatalog {
    async fn service_exists(&self, service_id: Uuid) -> Result<bool> {
        Ok(self.services.read().contains_key(&service_id))
    }

    async fn requirement_type(&self, requirement_type_id: Uuid) -> Result<Option<RequirementType>> {
        Ok(self.requirement_types.read().get(&requirement_type_id).cloned())
    }

    async fn contractors_for_service(&self, service_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .services
            .read()
            .get(&service_id)
            .cloned()
            .unwrap_or_default())
    }
}
