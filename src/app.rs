use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::auth::JwksCache;
use crate::config::{Environment, Settings};
use crate::engine::TenderEngine;
use crate::error::ApiError;
use crate::middleware::{request_id_layer, X_REQUEST_ID};
use crate::routes;
use crate::services::RedisCache;

/// Request bodies are small JSON documents; attachments are stored elsewhere
/// and only referenced by URL.
const MAX_BODY_BYTES: usize = 256 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub settings: Settings,
    pub jwks_cache: JwksCache,
    pub cache: RedisCache,
    pub engine: TenderEngine,
}

impl AppState {
    pub fn new(
        db: PgPool,
        settings: Settings,
        jwks_cache: JwksCache,
        cache: RedisCache,
        engine: TenderEngine,
    ) -> Arc<Self> {
        Arc::new(Self {
            db,
            settings,
            jwks_cache,
            cache,
            engine,
        })
    }
}

/// Build the HTTP application: tender routes plus the middleware stack.
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.settings);

    // Spans at DEBUG; engine operations log their own INFO events
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG));

    let (set_request_id, propagate_request_id) = request_id_layer();

    Router::new()
        .merge(routes::api_router())
        .fallback(|| async { ApiError::NotFound("route".to_string()) })
        // Applied bottom-up
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(propagate_request_id)
        .layer(trace_layer)
        .layer(set_request_id)
        .layer(cors)
        .with_state(state)
}

fn preflight_max_age(env: &Environment) -> Duration {
    if env.is_dev() {
        Duration::from_secs(24 * 3600)
    } else {
        Duration::from_secs(3600)
    }
}

fn cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .cors_allow_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring unparsable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(X_REQUEST_ID),
        ]))
        .expose_headers([HeaderName::from_static(X_REQUEST_ID)])
        .allow_credentials(true)
        .max_age(preflight_max_age(&settings.env))
}
