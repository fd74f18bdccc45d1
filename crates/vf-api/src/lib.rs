//! # vf-api
//!
//! The web routing and orchestration layer for Verde Forum.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod pages;

use std::sync::Arc;
use std::time::Instant;

use actix_web::{web, HttpResponse};
use vf_core::error::AppError;
use vf_core::traits::{
    AuditLog, AuthProvider, CredentialRepo, ForumRepo, ModerationRepo, ProfileRepo,
};
use vf_services::{AccountService, ForumService, ModerationService, ProfileService};

use crate::error::ApiError;

/// State shared across all Actix-web workers.
pub struct AppState {
    pub forum: ForumService,
    pub profiles: ProfileService,
    pub moderation: ModerationService,
    pub accounts: AccountService,
    /// `site_url` without its trailing slash
    pub site_base: String,
    pub started_at: Instant,
}

/// The ports a running instance is assembled from.
pub struct Ports {
    pub forum: Arc<dyn ForumRepo>,
    pub profiles: Arc<dyn ProfileRepo>,
    pub moderation: Arc<dyn ModerationRepo>,
    pub credentials: Arc<dyn CredentialRepo>,
    pub audit: Arc<dyn AuditLog>,
    pub auth: Arc<dyn AuthProvider>,
}

impl AppState {
    pub fn new(ports: Ports, site_url: &str) -> Self {
        Self {
            forum: ForumService::new(ports.forum, ports.profiles.clone(), ports.audit.clone()),
            profiles: ProfileService::new(ports.profiles.clone(), ports.audit.clone()),
            moderation: ModerationService::new(ports.moderation, ports.profiles),
            accounts: AccountService::new(ports.credentials, ports.auth, ports.audit),
            site_base: site_url.trim_end_matches('/').to_string(),
            started_at: Instant::now(),
        }
    }
}

/// Rejected JSON bodies and queries answer with the error envelope; a
/// malformed path id reads as a missing resource.
fn rejected(message: String, in_path: bool) -> actix_web::Error {
    if in_path {
        ApiError(AppError::NotFound("resource".into(), message)).into()
    } else {
        ApiError(AppError::validation(message)).into()
    }
}

/// Configures every API route and the two HTML pages.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(64 * 1024)
            .error_handler(|err, _| rejected(err.to_string(), false)),
    )
    .app_data(web::PathConfig::default().error_handler(|err, _| rejected(err.to_string(), true)))
    .app_data(web::QueryConfig::default().error_handler(|err, _| rejected(err.to_string(), false)))
    .service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/public/top-posts", web::get().to(handlers::top_posts))
            .route("/tags/search", web::get().to(handlers::search_tags))
            .route("/categories", web::get().to(handlers::categories))
            .route("/feed", web::get().to(handlers::feed))
            .route("/leaderboard", web::get().to(handlers::leaderboard))
            .route("/profiles/{username}", web::get().to(handlers::public_profile))
            // Posts
            .route("/posts", web::post().to(handlers::create_post))
            .route("/posts/{id}", web::get().to(handlers::post_detail))
            .route("/posts/{id}/vote", web::post().to(handlers::vote_post))
            .route("/posts/{id}/flag", web::post().to(handlers::flag_post))
            .route("/posts/{id}/comments", web::post().to(handlers::create_comment))
            // Comments
            .route("/comments/{id}", web::patch().to(handlers::update_comment))
            .route("/comments/{id}", web::delete().to(handlers::delete_comment))
            .route("/comments/{id}/vote", web::post().to(handlers::vote_comment))
            // Accounts
            .route("/auth/sign-up", web::post().to(handlers::sign_up))
            .route("/auth/sign-in", web::post().to(handlers::sign_in))
            .route("/me/onboarding", web::post().to(handlers::complete_onboarding))
            .route("/me/privacy", web::put().to(handlers::update_privacy))
            .route("/me/achievements", web::get().to(handlers::achievements))
            // Moderation
            .route("/admin/dashboard", web::get().to(handlers::admin_dashboard))
            .route("/admin/users/{id}/status", web::post().to(handlers::admin_set_user_status))
            .route("/admin/posts/{id}/remove", web::post().to(handlers::admin_remove_post))
            .route("/admin/posts/{id}/restore", web::post().to(handlers::admin_restore_post))
            .route("/admin/flags/{id}", web::post().to(handlers::admin_review_flag))
            .route("/admin/alerts/{id}/resolve", web::post().to(handlers::admin_resolve_alert))
            .default_service(web::to(|| async {
                let error = ApiError(AppError::NotFound("route".into(), String::new()));
                HttpResponse::NotFound().json(error.body())
            })),
    )
    .route("/", web::get().to(pages::feed_page))
    .route("/posts/{id}", web::get().to(pages::post_page));
}
