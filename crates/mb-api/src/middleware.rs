//! # Middleware
//!
//! Access logging, CORS and the response headers every route carries.

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::middleware::{DefaultHeaders, Logger};

/// Access log in actix's default format, routed into tracing.
pub fn standard_middleware() -> Logger {
    Logger::default()
}

/// The board front-end may be served from another origin.
pub fn cors_policy() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
        .allow_any_header()
        .max_age(3600)
}

/// Same-origin framing and referrers, no DNS prefetch, no MIME sniffing.
pub fn security_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add((header::X_FRAME_OPTIONS, "SAMEORIGIN"))
        .add((header::X_DNS_PREFETCH_CONTROL, "off"))
        .add((header::REFERRER_POLICY, "same-origin"))
        .add((header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
}
