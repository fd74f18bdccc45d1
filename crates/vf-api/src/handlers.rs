//! # vf-api Handlers
//!
//! JSON endpoints. Each handler reads the request, calls one service
//! operation with `Utc::now()` and serialises the result.

use actix_web::http::header::{self, CacheControl, CacheDirective};
use actix_web::{web, HttpResponse};
use askama::Template;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use vf_core::error::AppError;
use vf_core::feed::FeedFilters;
use vf_core::models::{FlagStatus, ModerationStatus, OnboardingProfile, PrivacySettings};
use vf_core::votes::{VoteTarget, VoteValue};
use vf_services::public::parse_period;
use vf_services::CreatePostInput;
use vf_ui::TopPostsRss;

use crate::error::{ApiError, ApiResult};
use crate::extract::{SignedIn, Viewer};
use crate::AppState;

/// Lenient numeric query value: anything unparsable counts as absent.
fn number<T: std::str::FromStr>(raw: &Option<String>) -> Option<T> {
    raw.as_deref().and_then(|value| value.trim().parse().ok())
}

fn no_store() -> CacheControl {
    CacheControl(vec![CacheDirective::NoStore])
}

fn public_cache(seconds: u32) -> CacheControl {
    CacheControl(vec![CacheDirective::Public, CacheDirective::MaxAge(seconds)])
}

// ---------------------------------------------------------------------------
// Public
// ---------------------------------------------------------------------------

pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().insert_header(no_store()).json(json!({
        "status": "ok",
        "uptime": state.started_at.elapsed().as_secs_f64(),
        "timestamp": Utc::now().timestamp_millis(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct TopPostsQuery {
    pub period: Option<String>,
    pub format: Option<String>,
}

/// Top 25 posts as JSON (default) or RSS (`format=rss|xml`).
pub async fn top_posts(
    state: web::Data<AppState>,
    query: web::Query<TopPostsQuery>,
) -> HttpResponse {
    let period = parse_period(query.period.as_deref());
    let as_rss = matches!(
        query.format.as_deref().map(str::to_lowercase).as_deref(),
        Some("rss" | "xml")
    );

    let listing = match state
        .forum
        .top_posts(period, &state.site_base, Utc::now())
        .await
    {
        Ok(listing) => listing,
        Err(error) => {
            let error = ApiError(error);
            return HttpResponse::InternalServerError()
                .insert_header(public_cache(60))
                .json(error.body());
        }
    };

    if !as_rss {
        return HttpResponse::Ok()
            .insert_header(public_cache(120))
            .json(listing);
    }

    match TopPostsRss::new(&listing, &state.site_base).render() {
        Ok(xml) => HttpResponse::Ok()
            .insert_header((header::CONTENT_TYPE, "application/rss+xml; charset=UTF-8"))
            .insert_header(public_cache(300))
            .body(xml),
        Err(error) => {
            tracing::error!(scope = "top_posts_rss", error = %error, "rss rendering failed");
            HttpResponse::InternalServerError()
                .insert_header(public_cache(60))
                .json(ApiError(AppError::Internal(String::new())).body())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TagSearchQuery {
    pub q: Option<String>,
    pub limit: Option<String>,
}

pub async fn search_tags(
    state: web::Data<AppState>,
    query: web::Query<TagSearchQuery>,
) -> ApiResult<HttpResponse> {
    let tags = state
        .forum
        .search_tags(query.q.as_deref(), number(&query.limit))
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "tags": tags })))
}

pub async fn categories(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let categories = state.forum.categories().await?;
    Ok(HttpResponse::Ok().json(json!({ "categories": categories })))
}

#[derive(Debug, Default, Deserialize)]
pub struct FeedQueryParams {
    pub category: Option<String>,
    pub tag: Option<String>,
    pub sort: Option<String>,
    pub period: Option<String>,
    pub page: Option<String>,
}

impl FeedQueryParams {
    pub fn filters(&self) -> FeedFilters {
        FeedFilters::from_params(
            self.category.as_deref(),
            self.tag.as_deref(),
            self.sort.as_deref(),
            self.period.as_deref(),
            number(&self.page),
        )
    }
}

pub async fn feed(
    state: web::Data<AppState>,
    viewer: Viewer,
    query: web::Query<FeedQueryParams>,
) -> HttpResponse {
    let page = state
        .forum
        .feed(&query.filters(), viewer.0, Utc::now())
        .await;
    HttpResponse::Ok().json(page)
}

pub async fn post_detail(
    state: web::Data<AppState>,
    viewer: Viewer,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let page = state.forum.post_detail(path.into_inner(), viewer.0).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<String>,
}

pub async fn leaderboard(
    state: web::Data<AppState>,
    query: web::Query<LeaderboardQuery>,
) -> ApiResult<HttpResponse> {
    let entries = state
        .profiles
        .leaderboard(Utc::now(), number(&query.limit))
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "entries": entries })))
}

pub async fn public_profile(
    state: web::Data<AppState>,
    viewer: Viewer,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let profile = state
        .profiles
        .public_profile(&path.into_inner(), viewer.0, Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(profile))
}

// ---------------------------------------------------------------------------
// Posts, comments and votes
// ---------------------------------------------------------------------------

pub async fn create_post(
    state: web::Data<AppState>,
    user: SignedIn,
    body: web::Json<CreatePostInput>,
) -> ApiResult<HttpResponse> {
    let created = state
        .forum
        .create_post(user.0, body.into_inner(), Utc::now())
        .await?;
    Ok(HttpResponse::Created().json(created))
}

#[derive(Debug, Deserialize)]
pub struct VoteBody {
    pub value: i64,
}

fn vote_value(body: &VoteBody) -> Result<VoteValue, ApiError> {
    VoteValue::try_from(body.value).map_err(|e| ApiError(AppError::validation(e.to_string())))
}

pub async fn vote_post(
    state: web::Data<AppState>,
    user: SignedIn,
    path: web::Path<Uuid>,
    body: web::Json<VoteBody>,
) -> ApiResult<HttpResponse> {
    let tally = state
        .forum
        .vote(user.0, VoteTarget::Post(path.into_inner()), vote_value(&body)?, Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(tally))
}

pub async fn vote_comment(
    state: web::Data<AppState>,
    user: SignedIn,
    path: web::Path<Uuid>,
    body: web::Json<VoteBody>,
) -> ApiResult<HttpResponse> {
    let tally = state
        .forum
        .vote(user.0, VoteTarget::Comment(path.into_inner()), vote_value(&body)?, Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(tally))
}

#[derive(Debug, Deserialize)]
pub struct FlagBody {
    pub reason: String,
}

pub async fn flag_post(
    state: web::Data<AppState>,
    user: SignedIn,
    path: web::Path<Uuid>,
    body: web::Json<FlagBody>,
) -> ApiResult<HttpResponse> {
    state
        .forum
        .flag_post(user.0, path.into_inner(), &body.reason, Utc::now())
        .await?;
    Ok(HttpResponse::Created().json(json!({ "status": FlagStatus::Pending })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentBody {
    pub body: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

pub async fn create_comment(
    state: web::Data<AppState>,
    user: SignedIn,
    path: web::Path<Uuid>,
    body: web::Json<CommentBody>,
) -> ApiResult<HttpResponse> {
    let body = body.into_inner();
    let created = state
        .forum
        .create_comment(user.0, path.into_inner(), &body.body, body.parent_id, Utc::now())
        .await?;
    Ok(HttpResponse::Created().json(created))
}

#[derive(Debug, Deserialize)]
pub struct EditCommentBody {
    pub body: String,
}

pub async fn update_comment(
    state: web::Data<AppState>,
    user: SignedIn,
    path: web::Path<Uuid>,
    body: web::Json<EditCommentBody>,
) -> ApiResult<HttpResponse> {
    state
        .forum
        .update_comment(user.0, path.into_inner(), &body.body, Utc::now())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn delete_comment(
    state: web::Data<AppState>,
    user: SignedIn,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    state
        .forum
        .delete_comment(user.0, path.into_inner(), Utc::now())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

// ---------------------------------------------------------------------------
// Accounts and the signed-in user
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CredentialsBody {
    pub email: String,
    pub password: String,
}

pub async fn sign_up(
    state: web::Data<AppState>,
    body: web::Json<CredentialsBody>,
) -> ApiResult<HttpResponse> {
    let session = state
        .accounts
        .sign_up(&body.email, &body.password, Utc::now())
        .await?;
    Ok(HttpResponse::Created().json(session))
}

pub async fn sign_in(
    state: web::Data<AppState>,
    body: web::Json<CredentialsBody>,
) -> ApiResult<HttpResponse> {
    let session = state
        .accounts
        .sign_in(&body.email, &body.password, Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(session))
}

pub async fn complete_onboarding(
    state: web::Data<AppState>,
    user: SignedIn,
    body: web::Json<OnboardingProfile>,
) -> ApiResult<HttpResponse> {
    state
        .profiles
        .complete_onboarding(user.0, body.into_inner(), Utc::now())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn update_privacy(
    state: web::Data<AppState>,
    user: SignedIn,
    body: web::Json<PrivacySettings>,
) -> ApiResult<HttpResponse> {
    state
        .profiles
        .update_privacy(user.0, body.into_inner(), Utc::now())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn achievements(state: web::Data<AppState>, user: SignedIn) -> ApiResult<HttpResponse> {
    let achievements = state.profiles.achievements(user.0).await?;
    Ok(HttpResponse::Ok().json(achievements))
}

// ---------------------------------------------------------------------------
// Moderation
// ---------------------------------------------------------------------------

pub async fn admin_dashboard(
    state: web::Data<AppState>,
    viewer: Viewer,
) -> ApiResult<HttpResponse> {
    let dashboard = state.moderation.dashboard(viewer.0).await?;
    Ok(HttpResponse::Ok().json(dashboard))
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: ModerationStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn admin_set_user_status(
    state: web::Data<AppState>,
    viewer: Viewer,
    path: web::Path<Uuid>,
    body: web::Json<StatusBody>,
) -> ApiResult<HttpResponse> {
    let body = body.into_inner();
    state
        .moderation
        .set_user_moderation_status(viewer.0, path.into_inner(), body.status, body.reason, Utc::now())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

#[derive(Debug, Default, Deserialize)]
pub struct ReasonBody {
    #[serde(default)]
    pub reason: Option<String>,
}

/// The reason body is optional on removal and restore.
fn reason(body: Option<web::Json<ReasonBody>>) -> Option<String> {
    body.and_then(|body| body.into_inner().reason)
}

pub async fn admin_remove_post(
    state: web::Data<AppState>,
    viewer: Viewer,
    path: web::Path<Uuid>,
    body: Option<web::Json<ReasonBody>>,
) -> ApiResult<HttpResponse> {
    state
        .moderation
        .remove_post(viewer.0, path.into_inner(), reason(body), Utc::now())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn admin_restore_post(
    state: web::Data<AppState>,
    viewer: Viewer,
    path: web::Path<Uuid>,
    body: Option<web::Json<ReasonBody>>,
) -> ApiResult<HttpResponse> {
    state
        .moderation
        .restore_post(viewer.0, path.into_inner(), reason(body), Utc::now())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

#[derive(Debug, Deserialize)]
pub struct FlagReviewBody {
    pub status: FlagStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

pub async fn admin_review_flag(
    state: web::Data<AppState>,
    viewer: Viewer,
    path: web::Path<Uuid>,
    body: web::Json<FlagReviewBody>,
) -> ApiResult<HttpResponse> {
    let body = body.into_inner();
    state
        .moderation
        .update_post_flag(viewer.0, path.into_inner(), body.status, body.notes, Utc::now())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn admin_resolve_alert(
    state: web::Data<AppState>,
    viewer: Viewer,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    state
        .moderation
        .resolve_alert(viewer.0, path.into_inner(), Utc::now())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}
