//! Admin-only moderation: account status, post removal, flag review and
//! alert resolution. Every write is recorded as a `ModerationAction`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use vf_core::error::{AppError, Result};
use vf_core::models::{
    FlagReview, FlagStatus, ModerationAction, ModerationAlert, ModerationStatus, PostFlag, Profile,
};
use vf_core::traits::{ModerationRepo, ProfileRepo};

use crate::internal;

const DASHBOARD_LIST_LIMIT: u32 = 50;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationDashboard {
    pub pending_flags: Vec<PostFlag>,
    pub open_alerts: Vec<ModerationAlert>,
    pub users: Vec<Profile>,
}

pub struct ModerationService {
    moderation: Arc<dyn ModerationRepo>,
    profiles: Arc<dyn ProfileRepo>,
}

fn clean_reason(reason: Option<String>) -> Option<String> {
    reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
}

impl ModerationService {
    pub fn new(moderation: Arc<dyn ModerationRepo>, profiles: Arc<dyn ProfileRepo>) -> Self {
        Self {
            moderation,
            profiles,
        }
    }

    /// Returns the caller's id when they are a signed-in admin.
    pub async fn ensure_admin(&self, caller: Option<Uuid>) -> Result<Uuid> {
        let caller = caller.ok_or_else(|| AppError::Unauthorized("sign in required".into()))?;
        let is_admin = self
            .profiles
            .get_profile(caller)
            .await
            .map_err(internal("ensure_admin"))?
            .is_some_and(|profile| profile.is_admin);
        if !is_admin {
            tracing::warn!(user_id = %caller, "non-admin reached a moderation endpoint");
            return Err(AppError::Unauthorized("admin access required".into()));
        }
        Ok(caller)
    }

    pub async fn set_user_moderation_status(
        &self,
        caller: Option<Uuid>,
        user_id: Uuid,
        status: ModerationStatus,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let admin = self.ensure_admin(caller).await?;
        let action = ModerationAction {
            actor_id: admin,
            target_type: "user",
            target_id: user_id,
            action: format!("set_status_{status}"),
            reason: clean_reason(reason),
            created_at: now,
        };
        let found = self
            .moderation
            .set_moderation_status(user_id, status, &action)
            .await
            .map_err(internal("set_moderation_status"))?;
        if !found {
            return Err(AppError::not_found("user", user_id));
        }
        Ok(())
    }

    pub async fn remove_post(
        &self,
        caller: Option<Uuid>,
        post_id: Uuid,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.set_post_deleted(caller, post_id, true, reason, now)
            .await
    }

    pub async fn restore_post(
        &self,
        caller: Option<Uuid>,
        post_id: Uuid,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.set_post_deleted(caller, post_id, false, reason, now)
            .await
    }

    async fn set_post_deleted(
        &self,
        caller: Option<Uuid>,
        post_id: Uuid,
        deleted: bool,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let admin = self.ensure_admin(caller).await?;
        let action = ModerationAction {
            actor_id: admin,
            target_type: "post",
            target_id: post_id,
            action: if deleted { "remove_post" } else { "restore_post" }.to_string(),
            reason: clean_reason(reason),
            created_at: now,
        };
        let found = self
            .moderation
            .set_post_deleted(post_id, deleted, &action)
            .await
            .map_err(internal("set_post_deleted"))?;
        if !found {
            return Err(AppError::not_found("post", post_id));
        }
        Ok(())
    }

    /// Flags move to `reviewed` or `dismissed`, never back to `pending`.
    pub async fn update_post_flag(
        &self,
        caller: Option<Uuid>,
        flag_id: Uuid,
        status: FlagStatus,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let admin = self.ensure_admin(caller).await?;
        if status == FlagStatus::Pending {
            return Err(AppError::validation(
                "a flag can only be marked reviewed or dismissed",
            ));
        }

        let review = FlagReview {
            status,
            notes: clean_reason(notes),
            reviewer_id: admin,
            reviewed_at: now,
        };
        let found = self
            .moderation
            .review_flag(flag_id, &review)
            .await
            .map_err(internal("review_flag"))?;
        if !found {
            return Err(AppError::not_found("flag", flag_id));
        }
        Ok(())
    }

    pub async fn resolve_alert(
        &self,
        caller: Option<Uuid>,
        alert_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let admin = self.ensure_admin(caller).await?;
        let found = self
            .moderation
            .resolve_alert(alert_id, admin, now)
            .await
            .map_err(internal("resolve_alert"))?;
        if !found {
            return Err(AppError::not_found("alert", alert_id));
        }
        Ok(())
    }

    pub async fn dashboard(&self, caller: Option<Uuid>) -> Result<ModerationDashboard> {
        self.ensure_admin(caller).await?;
        let pending_flags = self
            .moderation
            .list_flags(Some(FlagStatus::Pending), DASHBOARD_LIST_LIMIT)
            .await
            .map_err(internal("dashboard"))?;
        let open_alerts = self
            .moderation
            .list_alerts(false, DASHBOARD_LIST_LIMIT)
            .await
            .map_err(internal("dashboard"))?;
        let users = self
            .moderation
            .list_users(DASHBOARD_LIST_LIMIT)
            .await
            .map_err(internal("dashboard"))?;

        Ok(ModerationDashboard {
            pending_flags,
            open_alerts,
            users,
        })
    }
}
