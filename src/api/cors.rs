//! CORS policy

use axum::http::{header, HeaderValue, Method, Uri};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::CorsConfig;

/// Allow local development origins and the configured hosting suffixes.
/// Requests without an `Origin` header are not subject to CORS.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let suffixes = config.allowed_origin_suffixes.clone();

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            origin
                .to_str()
                .is_ok_and(|origin| is_allowed_origin(origin, &suffixes))
        }))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Matches on the parsed host only, so `localhost.example.com` or a suffix
/// in the path never qualifies.
fn is_allowed_origin(origin: &str, suffixes: &[String]) -> bool {
    let Ok(uri) = origin.parse::<Uri>() else {
        return false;
    };
    let Some(host) = uri.host() else {
        return false;
    };
    let host = host.to_ascii_lowercase();

    host == "localhost"
        || suffixes
            .iter()
            .any(|suffix| host.ends_with(suffix.to_ascii_lowercase().as_str()))
}
