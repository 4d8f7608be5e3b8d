use axum::http::HeaderMap;

use crate::config::ConfigV1;

/// Effective request origin (scheme + host), used to build the OAuth
/// redirect URI. A configured external base URL wins; otherwise the
/// origin is derived per request, since the same deployment may be
/// reached under different hostnames (local dev vs. hosted).
pub fn request_origin(headers: &HeaderMap, config: &ConfigV1) -> String {
    if let Some(base) = &config.external_base_url {
        return base.trim_end_matches('/').to_string();
    }

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");

    let host = headers
        .get("host")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    format!("{}://{}", scheme, host)
}
