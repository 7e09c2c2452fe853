use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

const PREFLIGHT_MAX_AGE_SECS: u64 = 86400;

/// Session cookies must cross origins, so credentials are always allowed and
/// the origin list is always explicit. A blank or unusable list falls back to
/// [`DEFAULT_ALLOWED_ORIGINS`].
pub fn create_cors_layer(allowed_origins: &str) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(parse_allowed_origins(allowed_origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::ORIGIN,
            HeaderName::from_static("x-requested-with"),
            HeaderName::from_static("x-session-token"),
        ])
        .expose_headers([header::CONTENT_LENGTH, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(PREFLIGHT_MAX_AGE_SECS))
}

fn parse_allowed_origins(origins: &str) -> AllowOrigin {
    let (valid, invalid): (Vec<_>, Vec<_>) = origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(|origin| (origin, origin.parse::<HeaderValue>()))
        .partition(|(_, parsed)| parsed.is_ok());

    for (origin, _) in &invalid {
        tracing::warn!(%origin, "ignoring unparseable CORS origin");
    }

    let valid: Vec<HeaderValue> = valid.into_iter().filter_map(|(_, v)| v.ok()).collect();
    if valid.is_empty() {
        // Credentialed CORS never mirrors or wildcards the request origin
        tracing::warn!(
            defaults = DEFAULT_ALLOWED_ORIGINS,
            "no usable CORS origins configured, using defaults"
        );
        return AllowOrigin::list(default_origins());
    }
    tracing::debug!(count = valid.len(), "CORS origins configured");
    AllowOrigin::list(valid)
}

fn default_origins() -> Vec<HeaderValue> {
    DEFAULT_ALLOWED_ORIGINS
        .split(',')
        .map(|origin| HeaderValue::from_static(origin))
        .collect()
}
