use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Row, Sqlite};
use uuid::Uuid;
use vf_core::gamification::BadgeCode;
use vf_core::models::{
    AwardedBadge, FeedRow, LeaderboardEntry, OnboardingProfile, PrivacySettings, Profile,
};
use vf_core::traits::ProfileRepo;

use crate::{
    attach_tags, blob_to_uuid, feed_row_from_row, from_millis, profile_from_row,
    push_author_visible, to_millis, unique_as_conflict, uuid_to_blob, SqliteForumRepo,
    POST_LISTING_SELECT,
};

#[async_trait]
impl ProfileRepo for SqliteForumRepo {
    async fn get_profile(&self, user_id: Uuid) -> anyhow::Result<Option<Profile>> {
        sqlx::query("SELECT * FROM profiles WHERE id = ?")
            .bind(uuid_to_blob(user_id))
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(profile_from_row)
            .transpose()
    }

    async fn get_profile_by_username(&self, username: &str) -> anyhow::Result<Option<Profile>> {
        sqlx::query("SELECT * FROM profiles WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(profile_from_row)
            .transpose()
    }

    async fn list_badges(&self, user_id: Uuid) -> anyhow::Result<Vec<AwardedBadge>> {
        let rows = sqlx::query(
            "SELECT badge_code, awarded_at FROM user_badges WHERE user_id = ? \
             ORDER BY awarded_at ASC, badge_code ASC",
        )
        .bind(uuid_to_blob(user_id))
        .fetch_all(&self.pool)
        .await?;

        let mut badges = Vec::with_capacity(rows.len());
        for row in rows {
            let code: String = row.try_get("badge_code")?;
            match code.parse::<BadgeCode>() {
                Ok(code) => badges.push(AwardedBadge {
                    code,
                    awarded_at: from_millis(row.try_get("awarded_at")?),
                }),
                Err(_) => tracing::warn!(%user_id, code, "skipping unknown badge code"),
            }
        }
        Ok(badges)
    }

    /// XP and level keep their stored values when the profile already exists.
    async fn upsert_onboarding(
        &self,
        user_id: Uuid,
        profile: &OnboardingProfile,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO profiles (id, username, avatar_url, persona, xp, level, pseudonymous, \
                share_activity, email_notifications, onboarding_completed, created_at, updated_at) \
             VALUES (?, ?, ?, ?, 0, 'Iniciante', ?, ?, 0, 1, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
                username = excluded.username, \
                avatar_url = excluded.avatar_url, \
                persona = excluded.persona, \
                pseudonymous = excluded.pseudonymous, \
                share_activity = excluded.share_activity, \
                email_notifications = 0, \
                onboarding_completed = 1, \
                updated_at = excluded.updated_at",
        )
        .bind(uuid_to_blob(user_id))
        .bind(&profile.username)
        .bind(&profile.avatar_url)
        .bind(profile.persona.label())
        .bind(profile.anonymous_mode)
        .bind(!profile.anonymous_mode)
        .bind(to_millis(at))
        .bind(to_millis(at))
        .execute(&self.pool)
        .await
        .map_err(unique_as_conflict("username is already taken"))?;
        Ok(())
    }

    async fn update_privacy(
        &self,
        user_id: Uuid,
        settings: PrivacySettings,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE profiles SET pseudonymous = ?, share_activity = ?, email_notifications = ?, \
             updated_at = ? WHERE id = ?",
        )
        .bind(settings.pseudonymous)
        .bind(settings.share_activity)
        .bind(settings.email_notifications)
        .bind(to_millis(at))
        .bind(uuid_to_blob(user_id))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_posts_by(
        &self,
        author_id: Uuid,
        viewer: Option<Uuid>,
        limit: u32,
    ) -> anyhow::Result<Vec<FeedRow>> {
        let mut qb = QueryBuilder::<Sqlite>::new(POST_LISTING_SELECT);
        qb.push(" WHERE p.is_deleted = 0 AND p.author_id = ")
            .push_bind(uuid_to_blob(author_id));
        push_author_visible(&mut qb, "p.author_id", viewer);
        qb.push(" ORDER BY p.created_at DESC LIMIT ")
            .push_bind(i64::from(limit));

        let mut rows = qb
            .build()
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(feed_row_from_row)
            .collect::<anyhow::Result<Vec<FeedRow>>>()?;
        attach_tags(&self.pool, &mut rows).await?;
        Ok(rows)
    }

    /// Ranks active users by the XP they gained since `since`. Ties go to the
    /// alphabetically first username.
    async fn weekly_leaderboard(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> anyhow::Result<Vec<LeaderboardEntry>> {
        let rows = sqlx::query(
            "SELECT p.id, p.username, SUM(x.delta) AS xp_gain \
             FROM xp_history x JOIN profiles p ON p.id = x.user_id \
             WHERE x.created_at >= ? AND p.moderation_status = 'active' \
             GROUP BY p.id, p.username \
             HAVING SUM(x.delta) > 0 \
             ORDER BY xp_gain DESC, p.username ASC \
             LIMIT ?",
        )
        .bind(to_millis(since))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .zip(1u32..)
            .map(|(row, rank)| {
                Ok(LeaderboardEntry {
                    user_id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("id")?),
                    username: row.try_get("username")?,
                    xp_gain: row.try_get("xp_gain")?,
                    rank,
                })
            })
            .collect()
    }
}
