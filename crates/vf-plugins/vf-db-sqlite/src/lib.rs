//! # vf-db-sqlite Implementation
//!
//! This crate implements the data mapping between the SQLite relational model
//! and the `vf-core` domain models. One `SqliteForumRepo` serves every
//! storage port.

mod accounts;
mod forum;
mod moderation;
mod profiles;
mod rewards;
mod schema;

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use uuid::Uuid;
use vf_core::error::AppError;
use vf_core::gamification::Level;
use vf_core::models::{AuthorRef, CategoryRef, FeedRow, ModerationStatus, Profile, TagRef};

pub struct SqliteForumRepo {
    pool: SqlitePool,
}

impl SqliteForumRepo {
    /// Connects and applies the schema.
    ///
    /// `sqlite::memory:` URLs get a single long-lived connection, otherwise
    /// every pooled connection would see its own empty database.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = database_url.contains(":memory:");
        let mut pool_options = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 5 });
        if in_memory {
            pool_options = pool_options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await?;
        let repo = Self { pool };
        repo.migrate().await?;
        tracing::info!(database_url, "sqlite store ready");
        Ok(repo)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        for statement in schema::SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        let now = to_millis(Utc::now());
        for (slug, label, icon) in schema::DEFAULT_CATEGORIES {
            sqlx::query(
                "INSERT OR IGNORE INTO categories (slug, label, icon, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(slug)
            .bind(label)
            .bind(icon)
            .bind(now)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    /// Grants or revokes the admin flag. Returns `false` if the profile is missing.
    pub async fn set_admin(&self, user_id: Uuid, is_admin: bool) -> anyhow::Result<bool> {
        let result = sqlx::query("UPDATE profiles SET is_admin = ?, updated_at = ? WHERE id = ?")
            .bind(is_admin)
            .bind(to_millis(Utc::now()))
            .bind(uuid_to_blob(user_id))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// Helpers for UUID and timestamp conversion
pub(crate) fn uuid_to_blob(id: Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

pub(crate) fn blob_to_uuid(blob: &[u8]) -> Uuid {
    Uuid::from_slice(blob).unwrap_or_default()
}

pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

pub(crate) fn count(value: i64) -> u64 {
    value.max(0) as u64
}

fn opt_uuid(row: &SqliteRow, column: &str) -> anyhow::Result<Option<Uuid>> {
    Ok(row
        .try_get::<Option<Vec<u8>>, _>(column)?
        .map(|blob| blob_to_uuid(&blob)))
}

fn opt_time(row: &SqliteRow, column: &str) -> anyhow::Result<Option<DateTime<Utc>>> {
    Ok(row.try_get::<Option<i64>, _>(column)?.map(from_millis))
}

/// Joined columns shared by every post listing.
pub(crate) const POST_LISTING_SELECT: &str = "\
    SELECT p.id, p.title, p.content, p.created_at, p.upvotes_count, p.downvotes_count, \
           p.comments_count, c.slug AS category_slug, c.label AS category_label, \
           c.icon AS category_icon, a.id AS author_id, a.username AS author_username, \
           a.avatar_url AS author_avatar_url, a.level AS author_level \
    FROM posts p \
    LEFT JOIN categories c ON c.id = p.category_id \
    LEFT JOIN profiles a ON a.id = p.author_id";

/// Restricts rows joined to author `a` to active authors, unless `viewer` is
/// the row's author (`author_column`) or an admin.
pub(crate) fn push_author_visible(
    qb: &mut QueryBuilder<'_, Sqlite>,
    author_column: &str,
    viewer: Option<Uuid>,
) {
    qb.push(" AND (COALESCE(a.moderation_status, 'active') = 'active'");
    if let Some(viewer) = viewer {
        let viewer = uuid_to_blob(viewer);
        qb.push(" OR ")
            .push(author_column)
            .push(" = ")
            .push_bind(viewer.clone())
            .push(" OR EXISTS (SELECT 1 FROM profiles v WHERE v.id = ")
            .push_bind(viewer)
            .push(" AND v.is_admin = 1)");
    }
    qb.push(")");
}

/// Reports a UNIQUE constraint failure as `AppError::Conflict` so callers
/// racing past their own existence check still see a conflict.
pub(crate) fn unique_as_conflict(
    message: &'static str,
) -> impl FnOnce(sqlx::Error) -> anyhow::Error {
    move |error| {
        let unique = matches!(&error, sqlx::Error::Database(db) if db.is_unique_violation());
        if unique {
            AppError::Conflict(message.into()).into()
        } else {
            error.into()
        }
    }
}

pub(crate) fn push_visibility(qb: &mut QueryBuilder<'_, Sqlite>, viewer: Option<Uuid>) {
    qb.push(" WHERE p.is_deleted = 0 AND (COALESCE(a.moderation_status, 'active') = 'active'");
    if let Some(viewer) = viewer {
        qb.push(" OR p.author_id = ").push_bind(uuid_to_blob(viewer));
    }
    qb.push(")");
}

pub(crate) fn author_from_row(row: &SqliteRow) -> anyhow::Result<Option<AuthorRef>> {
    let Some(id) = opt_uuid(row, "author_id")? else {
        return Ok(None);
    };
    let level: Option<String> = row.try_get("author_level")?;
    Ok(Some(AuthorRef {
        id,
        username: row.try_get("author_username")?,
        avatar_url: row.try_get("author_avatar_url")?,
        level: level
            .and_then(|label| label.parse().ok())
            .unwrap_or_default(),
    }))
}

pub(crate) fn category_from_row(row: &SqliteRow) -> anyhow::Result<Option<CategoryRef>> {
    let slug: Option<String> = row.try_get("category_slug")?;
    let label: Option<String> = row.try_get("category_label")?;
    Ok(match (slug, label) {
        (Some(slug), Some(label)) => Some(CategoryRef {
            slug,
            label,
            icon: row.try_get("category_icon")?,
        }),
        _ => None,
    })
}

pub(crate) fn feed_row_from_row(row: &SqliteRow) -> anyhow::Result<FeedRow> {
    Ok(FeedRow {
        id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("id")?),
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        created_at: from_millis(row.try_get("created_at")?),
        category: category_from_row(row)?,
        author: author_from_row(row)?,
        upvotes: count(row.try_get("upvotes_count")?),
        downvotes: count(row.try_get("downvotes_count")?),
        comments: count(row.try_get("comments_count")?),
        tags: Vec::new(),
    })
}

pub(crate) fn profile_from_row(row: &SqliteRow) -> anyhow::Result<Profile> {
    let level: String = row.try_get("level")?;
    let status: String = row.try_get("moderation_status")?;
    Ok(Profile {
        id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("id")?),
        username: row.try_get("username")?,
        avatar_url: row.try_get("avatar_url")?,
        bio: row.try_get("bio")?,
        xp: row.try_get("xp")?,
        level: level.parse().unwrap_or(Level::Iniciante),
        pseudonymous: row.try_get("pseudonymous")?,
        share_activity: row.try_get("share_activity")?,
        email_notifications: row.try_get("email_notifications")?,
        onboarding_completed: row.try_get("onboarding_completed")?,
        moderation_status: status.parse().unwrap_or(ModerationStatus::Active),
        is_admin: row.try_get("is_admin")?,
        created_at: from_millis(row.try_get("created_at")?),
        updated_at: from_millis(row.try_get("updated_at")?),
    })
}

/// Fetches the tags of `rows` in one query and attaches them in slug order.
pub(crate) async fn attach_tags(pool: &SqlitePool, rows: &mut [FeedRow]) -> anyhow::Result<()> {
    if rows.is_empty() {
        return Ok(());
    }

    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT pt.post_id, t.slug, t.label FROM post_tags pt \
         JOIN tags t ON t.id = pt.tag_id WHERE pt.post_id IN (",
    );
    let mut ids = qb.separated(", ");
    for row in rows.iter() {
        ids.push_bind(uuid_to_blob(row.id));
    }
    qb.push(") ORDER BY t.slug ASC");

    let mut by_post: HashMap<Uuid, Vec<TagRef>> = HashMap::new();
    for tag_row in qb.build().fetch_all(pool).await? {
        let post_id = blob_to_uuid(&tag_row.try_get::<Vec<u8>, _>("post_id")?);
        by_post.entry(post_id).or_default().push(TagRef {
            slug: tag_row.try_get("slug")?,
            label: tag_row.try_get("label")?,
        });
    }

    for row in rows.iter_mut() {
        row.tags = by_post.remove(&row.id).unwrap_or_default();
    }
    Ok(())
}

#[cfg(test)]
mod tests;
