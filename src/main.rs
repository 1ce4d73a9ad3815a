use anyhow::Result;
use std::sync::Arc;

use tenderworks_backend::{
    app, auth,
    clock::SystemClock,
    config, db,
    engine::TenderEngine,
    logging,
    services::{CachedCatalog, PgCatalog, PgContractorDirectory, PgNotifier, RedisCache},
    store::PgTenderStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = config::Settings::from_env()?;

    logging::init_logging(&settings.env);

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr,
        "Starting TenderWorks backend"
    );

    let pool = db::create_pool(&settings).await?;
    db::run_migrations(&pool).await?;

    let cache = RedisCache::new(&settings.redis_url, settings.redis_cache_ttl_seconds).await?;
    tracing::info!("Redis cache initialized");

    let clock = Arc::new(SystemClock);
    let catalog = CachedCatalog::new(PgCatalog::new(pool.clone()), cache.clone());
    let engine = TenderEngine::new(
        Arc::new(PgTenderStore::new(pool.clone())),
        Arc::new(catalog),
        Arc::new(PgContractorDirectory::new(pool.clone())),
        Arc::new(PgNotifier::new(pool.clone())),
        clock,
        settings.engine.clone(),
    );
    tracing::info!(
        min_trust_score = ?settings.engine.min_trust_score,
        max_auto_invitees = ?settings.engine.max_auto_invitees,
        "Tender engine ready"
    );

    let jwks_cache = auth::JwksCache::new(
        settings.supabase_jwt_jwks_url.clone(),
        settings.supabase_jwt_issuer.clone(),
        settings.supabase_jwt_audience.clone(),
        settings.jwks_cache_ttl_seconds,
    );

    if let Err(e) = jwks_cache.warm_cache().await {
        tracing::warn!(error = %e, "Failed to warm JWKS cache - will fetch on first request");
    }

    let state = app::AppState::new(pool, settings.clone(), jwks_cache, cache, engine);
    let app = app::create_app(state);

    let listener = tokio::net::TcpListener::bind(&settings.server_addr).await?;
    tracing::info!("Listening on {}", settings.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
