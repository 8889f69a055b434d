//! Cross-origin resource sharing.
//!
//! # Responsibilities
//! - Answer CORS preflight requests before they reach the dispatcher
//! - Echo allowed origins in `Access-Control-Allow-Origin`
//! - Advertise allowed methods, headers and max-age on every response
//!
//! # Design Decisions
//! - Development mode echoes any origin
//! - Credentials are allowed, so the origin is always echoed, never `*`

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, request::Parts, HeaderName, HeaderValue, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::CorsConfig;

const MAX_AGE: Duration = Duration::from_secs(3600);
const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization, X-Requested-With";

/// Wrap `router` in the CORS policy.
///
/// Preflights get their headers from [`cors_layer`]; other responses get the
/// same method, header and max-age values unless a handler set its own.
pub fn with_cors(router: Router, config: &CorsConfig) -> Router {
    router
        .layer(cors_layer(config))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static("3600"),
        ))
}

/// Build the CORS layer for the configured origins.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let allowed: Arc<Vec<String>> = Arc::new(config.allowed_origins.clone());
    let development = config.development;

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| {
                development || allowed.iter().any(|o| o.as_bytes() == origin.as_bytes())
            },
        ))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
        ])
        .allow_credentials(true)
        .max_age(MAX_AGE)
}
