//! # Curriculum HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Record counts per kind
//! - `GET /export` - Export the catalog as a base64 encoded archive
//! - `POST /import` - Import an archive (API key protected when configured)
//! - `GET /curricula` - Paginated list (`page`, `state`, `subject`)
//! - `GET /curricula/all` - Every curriculum as a tree
//! - `GET /curricula/{id}` - One curriculum as a tree
//!
//! ## Security Configuration
//!
//! - `server.cors_origins` / `CURRICULUM_CORS_ORIGINS`: allowed origins, or
//!   "*" for all (default: localhost only)
//! - `server.api_key` / `CURRICULUM_API_KEY`: if set, `POST /import`
//!   requires Bearer token authentication

mod auth;
mod handlers;
mod types;

pub use auth::keys_match;
pub use handlers::error_status;
pub use types::{
    ErrorResponse, ExportResponse, HealthResponse, ImportRequest, ImportResponse, KindCount,
    ListQuery, StatusResponse,
};

use crate::config::AppConfig;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use curriculum_core::{Catalog, CurriculumError};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Extra body allowance on top of the base64 encoded archive (JSON framing).
const BODY_SLACK_BYTES: usize = 64 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    /// The catalog. One lock for reads and imports alike: an import holds it
    /// for its whole run.
    pub catalog: Arc<Mutex<Catalog>>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(catalog: Catalog, config: AppConfig) -> Self {
        Self {
            catalog: Arc::new(Mutex::new(catalog)),
            config: Arc::new(config),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer from the configured origins.
///
/// - `["*"]`: allows all origins (development only)
/// - empty: localhost only
/// - otherwise: the listed origins; invalid entries are skipped
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o.trim() == "*") {
        tracing::warn!("CORS: Allowing ALL origins. This is insecure for production!");
        return CorsLayer::permissive();
    }

    if origins.is_empty() {
        tracing::info!("CORS: No origins configured, defaulting to localhost only");
        return build_localhost_cors();
    }

    let allowed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|s| {
            let trimmed = s.trim();
            match trimmed.parse::<HeaderValue>() {
                Ok(hv) => {
                    tracing::info!("CORS: Allowing origin: {}", trimmed);
                    Some(hv)
                }
                Err(e) => {
                    tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect();

    if allowed_origins.is_empty() {
        tracing::warn!("CORS: No valid origins configured, defaulting to localhost only");
        return build_localhost_cors();
    }

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Request body limit for an archive limit: base64 expands by 4/3.
fn body_limit(archive_limit: usize) -> usize {
    archive_limit
        .div_ceil(3)
        .saturating_mul(4)
        .saturating_add(BODY_SLACK_BYTES)
}

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit - sized from the archive limit
/// 4. Authentication - `POST /import` only, if a key is configured
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.server.cors_origins);
    let limit = body_limit(state.config.archive_limit());

    let mut import_route = post(handlers::import_handler);
    match state.config.api_key() {
        Some(key) => {
            tracing::info!("API key authentication enabled for POST /import");
            let key: Arc<str> = Arc::from(key);
            import_route = import_route.route_layer(axum_middleware::from_fn_with_state(
                key,
                auth::require_api_key,
            ));
        }
        None => {
            tracing::warn!(
                "API key authentication DISABLED - anyone who can reach the server can import. \
                 Set server.api_key or CURRICULUM_API_KEY to enable it."
            );
        }
    }

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/export", get(handlers::export_handler))
        .route("/import", import_route)
        .route("/curricula", get(handlers::list_handler))
        .route("/curricula/all", get(handlers::all_trees_handler))
        .route("/curricula/{id}", get(handlers::tree_handler))
        .layer(axum::extract::DefaultBodyLimit::max(limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), CurriculumError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| CurriculumError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Curriculum HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| CurriculumError::IoError(format!("Server error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_limit_covers_base64_expansion() {
        assert_eq!(body_limit(3), 4 + BODY_SLACK_BYTES);
        assert_eq!(body_limit(4), 8 + BODY_SLACK_BYTES);
        assert_eq!(body_limit(usize::MAX), usize::MAX);
    }
}
