//! XP awards, level sync and badge grants. Every function runs on the caller's
//! connection so it joins the surrounding transaction.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;
use vf_core::gamification::{badges_earned, level_for_xp, ActivityStats};
use vf_core::scoring::popularity_score;

use crate::{count, to_millis, uuid_to_blob};

/// Credits `delta` XP once per `(user, source, ref_key)`.
///
/// Returns `false` when the award was already granted.
pub(crate) async fn award_xp(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    delta: i64,
    source: &str,
    ref_key: &str,
    at: DateTime<Utc>,
) -> anyhow::Result<bool> {
    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO xp_history (user_id, delta, source, ref_key, created_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(uuid_to_blob(user_id))
    .bind(delta)
    .bind(source)
    .bind(ref_key)
    .bind(to_millis(at))
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if inserted == 0 {
        return Ok(false);
    }

    sqlx::query("UPDATE profiles SET xp = xp + ?, updated_at = ? WHERE id = ?")
        .bind(delta)
        .bind(to_millis(at))
        .bind(uuid_to_blob(user_id))
        .execute(&mut *conn)
        .await?;

    sync_level_and_badges(conn, user_id, at).await?;
    Ok(true)
}

/// Recomputes the stored level from XP and inserts any badge the user now
/// qualifies for.
pub(crate) async fn sync_level_and_badges(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    at: DateTime<Utc>,
) -> anyhow::Result<()> {
    let blob = uuid_to_blob(user_id);
    let row = sqlx::query(
        "SELECT p.xp, \
                (SELECT COUNT(*) FROM posts WHERE author_id = p.id) AS posts, \
                (SELECT COUNT(*) FROM comments WHERE author_id = p.id) AS comments, \
                (SELECT COALESCE(MAX(upvotes_count), 0) FROM posts WHERE author_id = p.id) AS best \
         FROM profiles p WHERE p.id = ?",
    )
    .bind(&blob)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(());
    };

    let stats = ActivityStats {
        xp: row.try_get("xp")?,
        posts: count(row.try_get("posts")?),
        comments: count(row.try_get("comments")?),
        best_post_upvotes: count(row.try_get("best")?),
    };

    sqlx::query("UPDATE profiles SET level = ? WHERE id = ?")
        .bind(level_for_xp(stats.xp).label())
        .bind(&blob)
        .execute(&mut *conn)
        .await?;

    for badge in badges_earned(&stats) {
        let granted = sqlx::query(
            "INSERT OR IGNORE INTO user_badges (user_id, badge_code, awarded_at) VALUES (?, ?, ?)",
        )
        .bind(&blob)
        .bind(badge.as_str())
        .bind(to_millis(at))
        .execute(&mut *conn)
        .await?
        .rows_affected();

        if granted > 0 {
            tracing::info!(%user_id, badge = badge.as_str(), "badge awarded");
        }
    }
    Ok(())
}

/// Rewrites the cached score of one post from its current counters.
pub(crate) async fn refresh_post_score(
    conn: &mut SqliteConnection,
    post_id: Uuid,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let row = sqlx::query(
        "SELECT upvotes_count, downvotes_count, comments_count, created_at FROM posts WHERE id = ?",
    )
    .bind(uuid_to_blob(post_id))
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(row) = row {
        let score = popularity_score(
            count(row.try_get("upvotes_count")?),
            count(row.try_get("downvotes_count")?),
            count(row.try_get("comments_count")?),
            crate::from_millis(row.try_get("created_at")?),
            now,
        );
        sqlx::query("UPDATE posts SET popularity_score = ? WHERE id = ?")
            .bind(score)
            .bind(uuid_to_blob(post_id))
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}
