//! API route definitions

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, StatusCode, request::Parts},
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use super::{handlers, state::AppState};

async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "error": "Not found. Visit / for the upload page or /health to check API status.",
        })),
    )
}

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(state.config.allowed_origins.clone());
    let max_upload_size = state.config.max_upload_size;

    Router::new()
        .route("/", get(handlers::serve_index))
        .route("/predict", post(handlers::predict))
        .route("/health", get(handlers::health_check))
        .fallback(handle_404)
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_size))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Credentialed CORS restricted to `allowed`; methods and headers mirror the preflight.
fn cors_layer(allowed: Vec<String>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| {
                origin
                    .to_str()
                    .is_ok_and(|origin| allowed.iter().any(|pattern| origin_allowed(pattern, origin)))
            },
        ))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Matches an origin against an allow-list entry.
///
/// `*` alone allows everything; `https://*.github.io` allows exactly one extra
/// leading label such as `https://user.github.io`.
pub fn origin_allowed(pattern: &str, origin: &str) -> bool {
    let pattern = pattern.trim_end_matches('/');
    if pattern == "*" {
        return true;
    }
    match pattern.split_once('*') {
        None => pattern == origin,
        Some((prefix, suffix)) => {
            origin.len() > prefix.len() + suffix.len()
                && origin.starts_with(prefix)
                && origin.ends_with(suffix)
                && !origin[prefix.len()..origin.len() - suffix.len()].contains(['.', '/', ':'])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_origin() {
        assert!(origin_allowed("http://localhost:3000", "http://localhost:3000"));
        assert!(origin_allowed("http://localhost:3000/", "http://localhost:3000"));
        assert!(!origin_allowed("http://localhost:3000", "http://localhost:8080"));
    }

    #[test]
    fn test_wildcard_subdomain() {
        let pattern = "https://*.github.io";
        assert!(origin_allowed(pattern, "https://someone.github.io"));
        assert!(!origin_allowed(pattern, "https://github.io"));
        assert!(!origin_allowed(pattern, "https://a.b.github.io"));
        assert!(!origin_allowed(pattern, "http://someone.github.io"));
        assert!(!origin_allowed(pattern, "https://evil.example/x.github.io"));
    }

    #[test]
    fn test_star_allows_all() {
        assert!(origin_allowed("*", "https://anything.example"));
    }
}
