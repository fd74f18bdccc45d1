//! Server-rendered HTML pages.

use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use askama::Template;
use chrono::Utc;
use uuid::Uuid;
use vf_ui::{ErrorTemplate, FeedTemplate, PostTemplate};

use crate::error::ApiError;
use crate::extract::Viewer;
use crate::handlers::FeedQueryParams;
use crate::AppState;

fn html<T: Template>(status: StatusCode, template: T) -> HttpResponse {
    match template.render() {
        Ok(body) => HttpResponse::build(status)
            .content_type("text/html; charset=utf-8")
            .body(body),
        Err(error) => {
            tracing::error!(scope = "render", error = %error, "template rendering failed");
            HttpResponse::InternalServerError()
                .content_type("text/plain; charset=utf-8")
                .body("internal server error")
        }
    }
}

fn error_page(error: ApiError) -> HttpResponse {
    let status = error.status_code();
    html(status, ErrorTemplate::new(status.as_u16(), error.public_message()))
}

/// Renders the feed (`/`). Category list failures degrade to an empty nav.
pub async fn feed_page(
    state: web::Data<AppState>,
    viewer: Viewer,
    query: web::Query<FeedQueryParams>,
) -> HttpResponse {
    let filters = query.filters();
    let page = state.forum.feed(&filters, viewer.0, Utc::now()).await;
    let categories = state.forum.categories().await.unwrap_or_default();
    html(StatusCode::OK, FeedTemplate::new(&page, &categories, &filters))
}

/// Renders a post with its comments (`/posts/{id}`).
pub async fn post_page(
    state: web::Data<AppState>,
    viewer: Viewer,
    path: web::Path<Uuid>,
) -> HttpResponse {
    match state.forum.post_detail(path.into_inner(), viewer.0).await {
        Ok(page) => html(StatusCode::OK, PostTemplate::new(&page.post, &page.comments)),
        Err(error) => error_page(ApiError(error)),
    }
}
