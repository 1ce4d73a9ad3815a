//! Redis caching service.
//!
//! Typed get/set over a pooled `ConnectionManager`; values are stored as JSON
//! with a TTL. Catalog lookups are the main consumer.

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Redis cache client with connection pooling.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    default_ttl: Duration,
}

impl RedisCache {
    /// Create a new Redis cache connection.
    pub async fn new(redis_url: &str, default_ttl_seconds: u64) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        tracing::info!("Redis cache connected");

        Ok(Self {
            conn,
            default_ttl: Duration::from_secs(default_ttl_seconds),
        })
    }

    /// Get a value from cache. Misses, Redis errors and undecodable entries all read as `None`.
    #[instrument(skip(self), fields(cache_hit))]
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.conn.clone();

        let raw = match conn.get::<_, Option<String>>(key).await {
            Ok(raw) => raw,
            Err(e) => {
                error!(key = key, error = %e, "Redis get error");
                None
            }
        };

        let value = raw.and_then(|data| {
            serde_json::from_str(&data)
                .map_err(|e| warn!(key = key, error = %e, "Discarding undecodable cache entry"))
                .ok()
        });

        debug!(key = key, hit = value.is_some(), "Cache lookup");
        tracing::Span::current().record("cache_hit", value.is_some());
        value
    }

    /// Set a value in cache with the default TTL.
    #[instrument(skip(self, value))]
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let mut conn = self.conn.clone();

        let data = serde_json::to_string(value)
            .context("Failed to serialize value for cache")?;

        conn.set_ex::<_, _, ()>(key, data, self.default_ttl.as_secs())
            .await
            .context("Failed to set cache value")?;

        debug!(key = key, ttl_secs = self.default_ttl.as_secs(), "Cached value");
        Ok(())
    }

    /// Check if Redis is healthy.
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("Redis health check failed")?;
        Ok(())
    }
}

/// Cache key builders for consistent key formats.
pub mod keys {
    use uuid::Uuid;

    /// Capability pool of a service
    pub fn service_contractors(service_id: Uuid) -> String {
        format!("catalog:service:{}:contractors", service_id)
    }

    /// Whether a service exists
    pub fn service(service_id: Uuid) -> String {
        format!("catalog:service:{}", service_id)
    }

    /// Requirement type definition
    pub fn requirement_type(requirement_type_id: Uuid) -> String {
        format!("catalog:requirement_type:{}", requirement_type_id)
    }
}
