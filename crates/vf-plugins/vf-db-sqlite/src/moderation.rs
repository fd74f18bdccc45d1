use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use uuid::Uuid;
use vf_core::models::{
    FlagReview, FlagStatus, ModerationAction, ModerationAlert, ModerationStatus, PostFlag, Profile,
};
use vf_core::traits::ModerationRepo;

use crate::{
    blob_to_uuid, from_millis, opt_time, opt_uuid, profile_from_row, to_millis, uuid_to_blob,
    SqliteForumRepo,
};

async fn insert_action(conn: &mut SqliteConnection, action: &ModerationAction) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO moderation_actions (id, actor_id, target_type, target_id, action, reason, \
         created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(uuid_to_blob(Uuid::now_v7()))
    .bind(uuid_to_blob(action.actor_id))
    .bind(action.target_type)
    .bind(uuid_to_blob(action.target_id))
    .bind(&action.action)
    .bind(&action.reason)
    .bind(to_millis(action.created_at))
    .execute(conn)
    .await?;

    tracing::info!(
        actor_id = %action.actor_id,
        target_type = action.target_type,
        target_id = %action.target_id,
        action = %action.action,
        "moderation action recorded"
    );
    Ok(())
}

fn flag_from_row(row: &SqliteRow) -> anyhow::Result<PostFlag> {
    let status: String = row.try_get("status")?;
    Ok(PostFlag {
        id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("id")?),
        post_id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("post_id")?),
        post_title: row.try_get::<Option<String>, _>("post_title")?.unwrap_or_default(),
        reporter_id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("reporter_id")?),
        reason: row.try_get("reason")?,
        status: status
            .parse()
            .map_err(|_| anyhow::anyhow!("unknown flag status {status}"))?,
        created_at: from_millis(row.try_get("created_at")?),
        reviewed_at: opt_time(row, "reviewed_at")?,
        reviewer_id: opt_uuid(row, "reviewer_id")?,
        resolution_notes: row.try_get("resolution_notes")?,
    })
}

fn alert_from_row(row: &SqliteRow) -> anyhow::Result<ModerationAlert> {
    let metadata: String = row.try_get("metadata")?;
    Ok(ModerationAlert {
        id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("id")?),
        user_id: opt_uuid(row, "user_id")?,
        alert_type: row.try_get("alert_type")?,
        severity: row.try_get("severity")?,
        metadata: serde_json::from_str(&metadata).unwrap_or_default(),
        created_at: from_millis(row.try_get("created_at")?),
        resolved_at: opt_time(row, "resolved_at")?,
        resolved_by: opt_uuid(row, "resolved_by")?,
    })
}

#[async_trait]
impl ModerationRepo for SqliteForumRepo {
    async fn set_moderation_status(
        &self,
        user_id: Uuid,
        status: ModerationStatus,
        action: &ModerationAction,
    ) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query("UPDATE profiles SET moderation_status = ?, updated_at = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(to_millis(action.created_at))
            .bind(uuid_to_blob(user_id))
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if updated == 0 {
            return Ok(false);
        }

        insert_action(&mut tx, action).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn set_post_deleted(
        &self,
        post_id: Uuid,
        deleted: bool,
        action: &ModerationAction,
    ) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query("UPDATE posts SET is_deleted = ?, updated_at = ? WHERE id = ?")
            .bind(deleted)
            .bind(to_millis(action.created_at))
            .bind(uuid_to_blob(post_id))
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if updated == 0 {
            return Ok(false);
        }

        insert_action(&mut tx, action).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn review_flag(&self, flag_id: Uuid, review: &FlagReview) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            "UPDATE post_flags SET status = ?, resolution_notes = ?, reviewer_id = ?, \
             reviewed_at = ? WHERE id = ?",
        )
        .bind(review.status.to_string())
        .bind(&review.notes)
        .bind(uuid_to_blob(review.reviewer_id))
        .bind(to_millis(review.reviewed_at))
        .bind(uuid_to_blob(flag_id))
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if updated == 0 {
            return Ok(false);
        }

        let action = ModerationAction {
            actor_id: review.reviewer_id,
            target_type: "flag",
            target_id: flag_id,
            action: format!("flag_{}", review.status),
            reason: review.notes.clone(),
            created_at: review.reviewed_at,
        };
        insert_action(&mut tx, &action).await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Resolving an already resolved alert keeps the first resolver.
    async fn resolve_alert(
        &self,
        alert_id: Uuid,
        resolver: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            "UPDATE moderation_alerts SET resolved_at = COALESCE(resolved_at, ?), \
             resolved_by = COALESCE(resolved_by, ?) WHERE id = ?",
        )
        .bind(to_millis(at))
        .bind(uuid_to_blob(resolver))
        .bind(uuid_to_blob(alert_id))
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if updated == 0 {
            return Ok(false);
        }

        let action = ModerationAction {
            actor_id: resolver,
            target_type: "alert",
            target_id: alert_id,
            action: "resolve_alert".to_string(),
            reason: None,
            created_at: at,
        };
        insert_action(&mut tx, &action).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn list_flags(
        &self,
        status: Option<FlagStatus>,
        limit: u32,
    ) -> anyhow::Result<Vec<PostFlag>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT f.*, p.title AS post_title FROM post_flags f \
             LEFT JOIN posts p ON p.id = f.post_id",
        );
        if let Some(status) = status {
            qb.push(" WHERE f.status = ").push_bind(status.to_string());
        }
        qb.push(" ORDER BY f.created_at DESC LIMIT ")
            .push_bind(i64::from(limit));

        qb.build()
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(flag_from_row)
            .collect()
    }

    async fn list_alerts(
        &self,
        include_resolved: bool,
        limit: u32,
    ) -> anyhow::Result<Vec<ModerationAlert>> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM moderation_alerts");
        if !include_resolved {
            qb.push(" WHERE resolved_at IS NULL");
        }
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(i64::from(limit));

        qb.build()
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(alert_from_row)
            .collect()
    }

    async fn list_users(&self, limit: u32) -> anyhow::Result<Vec<Profile>> {
        sqlx::query("SELECT * FROM profiles ORDER BY created_at DESC LIMIT ?")
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(profile_from_row)
            .collect()
    }
}
