//! # vf-services
//!
//! Orchestration of every user-facing operation over the `vf-core` ports.
//! Services hold `Arc<dyn Port>` handles only; they validate input, log and
//! convert store failures, and write audit events.

pub mod accounts;
pub mod forum;
pub mod moderation;
pub mod profiles;
pub mod public;
pub mod snapshot;

pub use accounts::{AccountService, Session};
pub use forum::{CommentCreated, CreatePostInput, ForumService, PostCreated, PostPage};
pub use moderation::{ModerationDashboard, ModerationService};
pub use profiles::{Achievements, ProfileService, PublicProfile};
pub use public::{TopPost, TopPostsListing};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;
use vf_core::error::AppError;
use vf_core::models::{ModerationStatus, Profile};
use vf_core::traits::{AuditLog, ProfileRepo};

/// Logs a store failure under `scope` and hides its details from callers.
pub(crate) fn internal(scope: &'static str) -> impl FnOnce(anyhow::Error) -> AppError {
    move |error| {
        tracing::error!(scope, error = %error, "store operation failed");
        AppError::Internal(format!("{scope} failed"))
    }
}

/// As `internal`, but a store-reported `AppError::Conflict` reaches the caller.
pub(crate) fn conflict_or_internal(
    scope: &'static str,
) -> impl FnOnce(anyhow::Error) -> AppError {
    move |error| match error.downcast::<AppError>() {
        Ok(AppError::Conflict(message)) => AppError::Conflict(message),
        Ok(other) => internal(scope)(other.into()),
        Err(error) => internal(scope)(error),
    }
}

/// Best-effort audit write: failures are logged and swallowed.
pub(crate) async fn record_audit(
    audit: &Arc<dyn AuditLog>,
    actor: Option<Uuid>,
    action: &str,
    metadata: serde_json::Value,
    at: DateTime<Utc>,
) {
    if let Err(error) = audit.record(actor, action, metadata, at).await {
        tracing::warn!(action, error = %error, "audit event dropped");
    }
}

/// Loads the actor's profile and checks they may write content.
pub(crate) async fn require_member(
    profiles: &Arc<dyn ProfileRepo>,
    actor: Uuid,
) -> vf_core::Result<Profile> {
    let profile = profiles
        .get_profile(actor)
        .await
        .map_err(internal("load_profile"))?
        .ok_or_else(|| AppError::Forbidden("complete onboarding first".into()))?;

    if !profile.onboarding_completed {
        return Err(AppError::Forbidden("complete onboarding first".into()));
    }
    if profile.moderation_status == ModerationStatus::Banned {
        return Err(AppError::Forbidden("account is banned".into()));
    }
    Ok(profile)
}
