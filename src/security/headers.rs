//! Security headers for HTTP responses
//!
//! Every API response carries these. Uploaded images are served through the
//! same wrapper, so the policy must not block plain image loads.

use warp::http::header::{HeaderMap, HeaderName, HeaderValue};

/// Strict Content Security Policy for API endpoints
const STRICT_CSP: &str = "default-src 'none'; img-src 'self'; frame-ancestors 'none';";

const PERMISSIONS_POLICY: &str =
    "geolocation=(), microphone=(), camera=(), payment=(), usb=(), magnetometer=(), gyroscope=(), accelerometer=()";

const API_HEADERS: &[(&str, &str)] = &[
    ("x-frame-options", "DENY"),
    ("x-content-type-options", "nosniff"),
    ("referrer-policy", "no-referrer"),
    ("content-security-policy", STRICT_CSP),
    ("cache-control", "no-cache, no-store, must-revalidate"),
    ("permissions-policy", PERMISSIONS_POLICY),
];

/// Strict security headers for API endpoints
pub fn api_security_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    for &(name, value) in API_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    headers
}

/// Filter wrapper applying `api_security_headers` to every reply
pub fn with_api_security_headers() -> warp::filters::reply::WithHeaders {
    warp::reply::with::headers(api_security_headers())
}
