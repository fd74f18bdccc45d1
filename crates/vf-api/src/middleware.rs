//! verde-forum/crates/vf-api/src/middleware.rs Middleware
//!
//! Request logging, CORS and security headers.

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::middleware::{DefaultHeaders, Logger};

/// Access log in the default format, emitted through the `log` facade and
/// picked up by the tracing subscriber.
pub fn standard_middleware() -> Logger {
    Logger::default().exclude("/api/health")
}

/// Any origin may call the API with a bearer token; cookies are not used.
pub fn cors_policy() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(3600)
}

pub fn security_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add((header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
        .add((header::REFERRER_POLICY, "strict-origin-when-cross-origin"))
        .add((header::X_FRAME_OPTIONS, "DENY"))
}
