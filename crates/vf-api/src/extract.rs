//! Session extractors built on the `Authorization: Bearer <token>` header.

use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};
use chrono::Utc;
use uuid::Uuid;
use vf_core::error::AppError;

use crate::error::ApiError;
use crate::AppState;

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn resolve(req: &HttpRequest) -> Result<Option<Uuid>, ApiError> {
    let Some(token) = bearer_token(req) else {
        return Ok(None);
    };
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| ApiError(AppError::Internal("application state missing".into())))?;
    state
        .accounts
        .authenticate(token, Utc::now())
        .map(Some)
        .map_err(ApiError)
}

/// The signed-in user, if any. A bad or expired token reads as anonymous.
#[derive(Debug, Clone, Copy)]
pub struct Viewer(pub Option<Uuid>);

impl FromRequest for Viewer {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let viewer = match resolve(req) {
            Ok(viewer) => viewer,
            Err(error) => {
                tracing::debug!(error = %error, "ignoring invalid session on public route");
                None
            }
        };
        ready(Ok(Viewer(viewer)))
    }
}

/// A signed-in user; rejects the request with 401 otherwise.
#[derive(Debug, Clone, Copy)]
pub struct SignedIn(pub Uuid);

impl FromRequest for SignedIn {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(resolve(req).and_then(|user| {
            user.map(SignedIn)
                .ok_or_else(|| ApiError(AppError::Unauthorized("sign in required".into())))
        }))
    }
}
