//! HTTP surface of the Quill article extractor.
//!
//! [`router`] wires the extraction endpoint, a health probe, CORS and request
//! tracing around an [`AppState`]. The binary in `main.rs` only loads
//! configuration, initialises logging and calls [`server::serve`].

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use quill_config::CorsConfig;
use quill_web::ContentExtractor;
use tower_http::cors::{AllowHeaders, AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod routes;
pub mod server;

pub const FETCH_ROUTE: &str = "/api/fetch-medium-content";

/// Shared, immutable handler state.
#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<ContentExtractor>,
}

impl AppState {
    pub fn new(extractor: ContentExtractor) -> Self {
        Self {
            extractor: Arc::new(extractor),
        }
    }
}

pub fn router(state: AppState, cors: &CorsConfig) -> Router {
    Router::new()
        .route(FETCH_ROUTE, post(routes::fetch_medium_content))
        .route("/health", get(routes::health))
        .layer(cors_layer(cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Any requested header is echoed back; a `*` wildcard would not cover `authorization`.
fn cors_layer(cfg: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request());

    if cfg.allows_any_origin() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = cfg
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "cors.invalid_origin_skipped");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}
