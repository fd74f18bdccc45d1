//! Onboarding, privacy, public profiles, achievements and the leaderboard.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;
use vf_core::error::{AppError, Result};
use vf_core::feed::FeedPost;
use vf_core::gamification::{level_progress, BadgeCode, Level, LevelProgress};
use vf_core::models::{AwardedBadge, LeaderboardEntry, OnboardingProfile, PrivacySettings};
use vf_core::traits::{AuditLog, ProfileRepo};

use crate::{conflict_or_internal, internal, record_audit};

pub const MIN_USERNAME_CHARS: usize = 3;
pub const MAX_USERNAME_CHARS: usize = 24;
pub const RECENT_POSTS_LIMIT: u32 = 5;
pub const DEFAULT_LEADERBOARD_SIZE: u32 = 10;
const MAX_LEADERBOARD_SIZE: u32 = 50;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeView {
    pub code: BadgeCode,
    pub name: &'static str,
    pub awarded_at: DateTime<Utc>,
}

impl From<AwardedBadge> for BadgeView {
    fn from(badge: AwardedBadge) -> Self {
        Self {
            code: badge.code,
            name: badge.code.name(),
            awarded_at: badge.awarded_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub username: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub level: Level,
    pub xp: i64,
    pub badges: Vec<BadgeView>,
    /// `None` when the owner keeps their activity private
    pub recent_posts: Option<Vec<FeedPost>>,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievements {
    pub progress: LevelProgress,
    pub badges: Vec<BadgeView>,
}

/// Lowercases and checks `[a-z0-9_.]{3,24}`.
pub fn normalize_username(raw: &str) -> Result<String> {
    let username = raw.trim().to_lowercase();
    let len = username.chars().count();
    if !(MIN_USERNAME_CHARS..=MAX_USERNAME_CHARS).contains(&len) {
        return Err(AppError::validation(format!(
            "username must have between {MIN_USERNAME_CHARS} and {MAX_USERNAME_CHARS} characters"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.')
    {
        return Err(AppError::validation(
            "username may only contain letters, digits, '_' and '.'",
        ));
    }
    Ok(username)
}

pub struct ProfileService {
    profiles: Arc<dyn ProfileRepo>,
    audit: Arc<dyn AuditLog>,
}

impl ProfileService {
    pub fn new(profiles: Arc<dyn ProfileRepo>, audit: Arc<dyn AuditLog>) -> Self {
        Self { profiles, audit }
    }

    /// Creates or refreshes the actor's profile. A repeated onboarding keeps
    /// XP, level and badges.
    pub async fn complete_onboarding(
        &self,
        actor: Uuid,
        mut input: OnboardingProfile,
        now: DateTime<Utc>,
    ) -> Result<()> {
        input.username = normalize_username(&input.username)?;
        input.avatar_url = input
            .avatar_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        let holder = self
            .profiles
            .get_profile_by_username(&input.username)
            .await
            .map_err(internal("onboarding"))?;
        if holder.is_some_and(|holder| holder.id != actor) {
            return Err(AppError::Conflict(format!(
                "username '{}' is already taken",
                input.username
            )));
        }

        self.profiles
            .upsert_onboarding(actor, &input, now)
            .await
            .map_err(conflict_or_internal("onboarding"))?;

        record_audit(
            &self.audit,
            Some(actor),
            "onboarding_completed",
            serde_json::json!({
                "username": input.username,
                "persona": input.persona.label(),
                "anonymousMode": input.anonymous_mode,
            }),
            now,
        )
        .await;
        tracing::info!(user_id = %actor, username = %input.username, "onboarding completed");
        Ok(())
    }

    pub async fn update_privacy(
        &self,
        actor: Uuid,
        settings: PrivacySettings,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let exists = self
            .profiles
            .get_profile(actor)
            .await
            .map_err(internal("update_privacy"))?
            .is_some();
        if !exists {
            return Err(AppError::Forbidden("complete onboarding first".into()));
        }

        self.profiles
            .update_privacy(actor, settings, now)
            .await
            .map_err(internal("update_privacy"))?;
        record_audit(
            &self.audit,
            Some(actor),
            "privacy_settings_updated",
            serde_json::to_value(settings).unwrap_or_default(),
            now,
        )
        .await;
        Ok(())
    }

    pub async fn public_profile(
        &self,
        username: &str,
        viewer: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<PublicProfile> {
        let username = username.trim().to_lowercase();
        let profile = self
            .profiles
            .get_profile_by_username(&username)
            .await
            .map_err(internal("public_profile"))?
            .filter(|profile| profile.onboarding_completed)
            .ok_or_else(|| AppError::not_found("profile", &username))?;

        let badges = self.badges(profile.id).await?;
        let is_owner = viewer == Some(profile.id);
        let recent_posts = if profile.share_activity || is_owner {
            let rows = self
                .profiles
                .recent_posts_by(profile.id, viewer, RECENT_POSTS_LIMIT)
                .await
                .map_err(internal("public_profile"))?;
            Some(rows.into_iter().map(|row| FeedPost::from_row(row, now)).collect())
        } else {
            None
        };

        Ok(PublicProfile {
            username: profile.username,
            avatar_url: profile.avatar_url,
            bio: profile.bio,
            level: profile.level,
            xp: profile.xp,
            badges,
            recent_posts,
            joined_at: profile.created_at,
        })
    }

    pub async fn achievements(&self, actor: Uuid) -> Result<Achievements> {
        let profile = self
            .profiles
            .get_profile(actor)
            .await
            .map_err(internal("achievements"))?
            .ok_or_else(|| AppError::not_found("profile", actor))?;

        Ok(Achievements {
            progress: level_progress(profile.xp),
            badges: self.badges(actor).await?,
        })
    }

    /// XP gained in the seven days before `now`; `limit` defaults to 10.
    pub async fn leaderboard(
        &self,
        now: DateTime<Utc>,
        limit: Option<u32>,
    ) -> Result<Vec<LeaderboardEntry>> {
        let limit = limit
            .unwrap_or(DEFAULT_LEADERBOARD_SIZE)
            .clamp(1, MAX_LEADERBOARD_SIZE);
        self.profiles
            .weekly_leaderboard(now - Duration::days(7), limit)
            .await
            .map_err(internal("leaderboard"))
    }

    async fn badges(&self, user_id: Uuid) -> Result<Vec<BadgeView>> {
        let badges = self
            .profiles
            .list_badges(user_id)
            .await
            .map_err(internal("list_badges"))?;
        Ok(badges.into_iter().map(BadgeView::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{now, profile};
    use vf_core::models::{FeedRow, Persona};
    use vf_core::traits::{MockAuditLog, MockProfileRepo};

    fn service(profiles: MockProfileRepo, audit: MockAuditLog) -> ProfileService {
        ProfileService::new(Arc::new(profiles), Arc::new(audit))
    }

    fn quiet_audit() -> MockAuditLog {
        let mut audit = MockAuditLog::new();
        audit.expect_record().returning(|_, _, _, _| Ok(()));
        audit
    }

    fn onboarding(username: &str) -> OnboardingProfile {
        OnboardingProfile {
            username: username.to_string(),
            avatar_url: Some("   ".into()),
            persona: Persona::Guardiao,
            anonymous_mode: true,
        }
    }

    #[test]
    fn usernames_are_checked() {
        assert_eq!(normalize_username("  Ana.Grow_1 ").unwrap(), "ana.grow_1");
        assert!(normalize_username("ab").is_err());
        assert!(normalize_username(&"a".repeat(25)).is_err());
        assert!(normalize_username("ana grow").is_err());
        assert!(normalize_username("joão").is_err());
    }

    #[tokio::test]
    async fn onboarding_rejects_taken_username() {
        let mut profiles = MockProfileRepo::new();
        profiles
            .expect_get_profile_by_username()
            .returning(|name| Ok(Some(profile(Uuid::now_v7(), name))));
        profiles.expect_upsert_onboarding().never();

        let err = service(profiles, MockAuditLog::new())
            .complete_onboarding(Uuid::now_v7(), onboarding("ana"), now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn username_taken_at_write_time_still_conflicts() {
        let mut profiles = MockProfileRepo::new();
        profiles.expect_get_profile_by_username().returning(|_| Ok(None));
        profiles.expect_upsert_onboarding().returning(|_, _, _| {
            Err(AppError::Conflict("username is already taken".into()).into())
        });

        let err = service(profiles, MockAuditLog::new())
            .complete_onboarding(Uuid::now_v7(), onboarding("ana"), now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn other_store_failures_stay_internal() {
        let mut profiles = MockProfileRepo::new();
        profiles.expect_get_profile_by_username().returning(|_| Ok(None));
        profiles
            .expect_upsert_onboarding()
            .returning(|_, _, _| Err(anyhow::anyhow!("database is locked")));

        let err = service(profiles, MockAuditLog::new())
            .complete_onboarding(Uuid::now_v7(), onboarding("ana"), now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn onboarding_normalises_and_audits() {
        let actor = Uuid::now_v7();
        let mut profiles = MockProfileRepo::new();
        // The actor already owns the name: re-onboarding is allowed.
        profiles
            .expect_get_profile_by_username()
            .returning(move |name| Ok(Some(profile(actor, name))));
        profiles
            .expect_upsert_onboarding()
            .withf(move |id, p, _| *id == actor && p.username == "ana" && p.avatar_url.is_none())
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut audit = MockAuditLog::new();
        audit
            .expect_record()
            .withf(|_, action, meta, _| {
                action == "onboarding_completed" && meta["persona"] == "Guardião"
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        service(profiles, audit)
            .complete_onboarding(actor, onboarding(" ANA "), now())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn audit_failure_does_not_fail_privacy_update() {
        let mut profiles = MockProfileRepo::new();
        profiles
            .expect_get_profile()
            .returning(|id| Ok(Some(profile(id, "ana"))));
        profiles
            .expect_update_privacy()
            .returning(|_, _, _| Ok(()));
        let mut audit = MockAuditLog::new();
        audit
            .expect_record()
            .returning(|_, _, _, _| Err(anyhow::anyhow!("disk full")));

        let settings = PrivacySettings {
            pseudonymous: true,
            share_activity: false,
            email_notifications: false,
        };
        service(profiles, audit)
            .update_privacy(Uuid::now_v7(), settings, now())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn private_activity_is_shown_to_the_owner_only() {
        let owner = Uuid::now_v7();
        let mut profiles = MockProfileRepo::new();
        profiles.expect_get_profile_by_username().returning(move |name| {
            let mut p = profile(owner, name);
            p.share_activity = false;
            Ok(Some(p))
        });
        profiles.expect_list_badges().returning(|_| Ok(vec![]));
        profiles
            .expect_recent_posts_by()
            .withf(move |author, viewer, _| *author == owner && *viewer == Some(owner))
            .times(1)
            .returning(|_, _, _| {
                Ok(vec![FeedRow {
                    id: Uuid::now_v7(),
                    title: "minha planta".into(),
                    content: None,
                    created_at: now(),
                    category: None,
                    author: None,
                    upvotes: 1,
                    downvotes: 0,
                    comments: 0,
                    tags: vec![],
                }])
            });
        let svc = service(profiles, quiet_audit());

        let stranger = svc.public_profile("ana", Some(Uuid::now_v7()), now()).await.unwrap();
        assert!(stranger.recent_posts.is_none());

        let own = svc.public_profile("ana", Some(owner), now()).await.unwrap();
        assert_eq!(own.recent_posts.map(|posts| posts.len()), Some(1));
    }

    #[tokio::test]
    async fn incomplete_profiles_are_not_public() {
        let mut profiles = MockProfileRepo::new();
        profiles.expect_get_profile_by_username().returning(|name| {
            let mut p = profile(Uuid::now_v7(), name);
            p.onboarding_completed = false;
            Ok(Some(p))
        });
        let err = service(profiles, quiet_audit())
            .public_profile("ana", None, now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(..)));
    }

    #[tokio::test]
    async fn achievements_carry_badge_names() {
        let mut profiles = MockProfileRepo::new();
        profiles.expect_get_profile().returning(|id| {
            let mut p = profile(id, "ana");
            p.xp = 40;
            Ok(Some(p))
        });
        profiles.expect_list_badges().returning(|_| {
            Ok(vec![AwardedBadge {
                code: BadgeCode::CuriosoIluminado,
                awarded_at: now(),
            }])
        });

        let achievements = service(profiles, quiet_audit())
            .achievements(Uuid::now_v7())
            .await
            .unwrap();
        assert_eq!(achievements.progress.xp, 40);
        assert_eq!(achievements.badges[0].name, "Curioso Iluminado");
    }

    #[tokio::test]
    async fn leaderboard_looks_back_one_week() {
        let mut profiles = MockProfileRepo::new();
        profiles
            .expect_weekly_leaderboard()
            .withf(|since, limit| *since == now() - Duration::days(7) && *limit == 10)
            .returning(|_, _| Ok(vec![]));

        let board = service(profiles, quiet_audit())
            .leaderboard(now(), None)
            .await
            .unwrap();
        assert!(board.is_empty());
    }
}
