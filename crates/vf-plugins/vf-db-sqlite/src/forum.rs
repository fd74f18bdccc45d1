use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use uuid::Uuid;
use vf_core::feed::{FeedOrder, FeedQuery, FeedRows};
use vf_core::gamification::{XP_PER_COMMENT, XP_PER_POST, XP_PER_UPVOTE_RECEIVED};
use vf_core::models::{
    Category, Comment, CommentView, FeedRow, NewComment, NewPost, Post, PostDetail, Tag,
    FLAG_ALERT_THRESHOLD,
};
use vf_core::scoring::popularity_score;
use vf_core::slug::{label_from_slug, slugify_tag};
use vf_core::traits::ForumRepo;
use vf_core::votes::{VoteChange, VoteTally, VoteTarget, VoteValue};

use crate::rewards::{award_xp, refresh_post_score, sync_level_and_badges};
use crate::{
    attach_tags, author_from_row, blob_to_uuid, count, feed_row_from_row, from_millis,
    push_author_visible, push_visibility, to_millis, uuid_to_blob, SqliteForumRepo,
    POST_LISTING_SELECT,
};

const LISTING_FROM: &str = "\
    FROM posts p \
    LEFT JOIN categories c ON c.id = p.category_id \
    LEFT JOIN profiles a ON a.id = p.author_id";

/// Extra candidates fetched for the top-posts listing, which is re-ranked by
/// fresh score after the cached-score cut.
const TOP_POSTS_CANDIDATE_FACTOR: u32 = 4;

fn push_feed_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &FeedQuery) {
    push_visibility(qb, query.viewer);
    if let Some(category) = &query.category_slug {
        qb.push(" AND c.slug = ").push_bind(category.clone());
    }
    if let Some(tag) = &query.tag_slug {
        qb.push(
            " AND EXISTS (SELECT 1 FROM post_tags pt JOIN tags t ON t.id = pt.tag_id \
             WHERE pt.post_id = p.id AND t.slug = ",
        )
        .push_bind(tag.clone())
        .push(")");
    }
    if let Some(since) = query.since {
        qb.push(" AND p.created_at >= ").push_bind(to_millis(since));
    }
}

fn category_from_row(row: &SqliteRow) -> anyhow::Result<Category> {
    Ok(Category {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        label: row.try_get("label")?,
        icon: row.try_get("icon")?,
        description: row.try_get("description")?,
    })
}

fn tag_from_row(row: &SqliteRow) -> anyhow::Result<Tag> {
    Ok(Tag {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        label: row.try_get("label")?,
        usage_count: row.try_get("usage_count")?,
    })
}

fn depth_from_row(row: &SqliteRow) -> anyhow::Result<u8> {
    let depth: i64 = row.try_get("depth")?;
    Ok(u8::try_from(depth)?)
}

fn post_from_row(row: &SqliteRow) -> anyhow::Result<Post> {
    Ok(Post {
        id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("id")?),
        author_id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("author_id")?),
        category_id: row.try_get("category_id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        media_type: row.try_get("media_type")?,
        is_pinned: row.try_get("is_pinned")?,
        is_deleted: row.try_get("is_deleted")?,
        upvotes: count(row.try_get("upvotes_count")?),
        downvotes: count(row.try_get("downvotes_count")?),
        comments_count: count(row.try_get("comments_count")?),
        popularity_score: row.try_get("popularity_score")?,
        created_at: from_millis(row.try_get("created_at")?),
        updated_at: from_millis(row.try_get("updated_at")?),
    })
}

fn comment_from_row(row: &SqliteRow) -> anyhow::Result<Comment> {
    Ok(Comment {
        id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("id")?),
        post_id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("post_id")?),
        author_id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("author_id")?),
        parent_id: row
            .try_get::<Option<Vec<u8>>, _>("parent_comment_id")?
            .map(|blob| blob_to_uuid(&blob)),
        depth: depth_from_row(row)?,
        body: row.try_get("body")?,
        upvotes: count(row.try_get("upvotes_count")?),
        downvotes: count(row.try_get("downvotes_count")?),
        is_deleted: row.try_get("is_deleted")?,
        created_at: from_millis(row.try_get("created_at")?),
        updated_at: from_millis(row.try_get("updated_at")?),
    })
}

/// Rewrites the aggregate counters of a vote target from its vote rows.
async fn recount_votes(conn: &mut SqliteConnection, target: VoteTarget) -> anyhow::Result<(u64, u64)> {
    let (table, votes_table, key) = match target {
        VoteTarget::Post(_) => ("posts", "post_votes", "post_id"),
        VoteTarget::Comment(_) => ("comments", "comment_votes", "comment_id"),
    };
    let blob = uuid_to_blob(target.id());

    let row = sqlx::query(&format!(
        "SELECT \
            (SELECT COUNT(*) FROM {votes_table} WHERE {key} = ? AND value = 1) AS up, \
            (SELECT COUNT(*) FROM {votes_table} WHERE {key} = ? AND value = -1) AS down"
    ))
    .bind(&blob)
    .bind(&blob)
    .fetch_one(&mut *conn)
    .await?;
    let up: i64 = row.try_get("up")?;
    let down: i64 = row.try_get("down")?;

    sqlx::query(&format!(
        "UPDATE {table} SET upvotes_count = ?, downvotes_count = ? WHERE id = ?"
    ))
    .bind(up)
    .bind(down)
    .bind(&blob)
    .execute(&mut *conn)
    .await?;

    Ok((count(up), count(down)))
}

#[async_trait]
impl ForumRepo for SqliteForumRepo {
    async fn list_categories(&self) -> anyhow::Result<Vec<Category>> {
        sqlx::query("SELECT id, slug, label, icon, description FROM categories ORDER BY label ASC")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(category_from_row)
            .collect()
    }

    async fn get_category(&self, slug: &str) -> anyhow::Result<Option<Category>> {
        sqlx::query("SELECT id, slug, label, icon, description FROM categories WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(category_from_row)
            .transpose()
    }

    async fn get_post(&self, id: Uuid) -> anyhow::Result<Option<Post>> {
        sqlx::query("SELECT * FROM posts WHERE id = ?")
            .bind(uuid_to_blob(id))
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(post_from_row)
            .transpose()
    }

    /// The insert and the author's XP credit commit together.
    async fn create_post(&self, post: NewPost) -> anyhow::Result<Uuid> {
        let id = Uuid::now_v7();
        let created = to_millis(post.created_at);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO posts (id, author_id, category_id, title, content, media_type, \
             created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(id))
        .bind(uuid_to_blob(post.author_id))
        .bind(post.category_id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.media_type)
        .bind(created)
        .bind(created)
        .execute(&mut *tx)
        .await?;

        award_xp(
            &mut tx,
            post.author_id,
            XP_PER_POST,
            "post",
            &id.to_string(),
            post.created_at,
        )
        .await?;

        tx.commit().await?;
        Ok(id)
    }

    /// The total and the page are read in one transaction so they agree.
    async fn query_feed(&self, query: &FeedQuery) -> anyhow::Result<FeedRows> {
        let mut tx = self.pool.begin().await?;

        let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) AS total ");
        count_qb.push(LISTING_FROM);
        push_feed_filters(&mut count_qb, query);
        let total: i64 = count_qb
            .build()
            .fetch_one(&mut *tx)
            .await?
            .try_get("total")?;

        let mut qb = QueryBuilder::<Sqlite>::new(POST_LISTING_SELECT);
        push_feed_filters(&mut qb, query);
        qb.push(match query.order {
            FeedOrder::Recent => " ORDER BY p.created_at DESC",
            FeedOrder::Popularity => " ORDER BY p.popularity_score DESC, p.created_at DESC",
        });
        qb.push(" LIMIT ")
            .push_bind(i64::from(query.limit))
            .push(" OFFSET ")
            .push_bind(i64::try_from(query.offset)?);

        let mut rows = qb
            .build()
            .fetch_all(&mut *tx)
            .await?
            .iter()
            .map(feed_row_from_row)
            .collect::<anyhow::Result<Vec<FeedRow>>>()?;
        tx.commit().await?;
        attach_tags(&self.pool, &mut rows).await?;

        Ok(FeedRows {
            rows,
            total: Some(count(total)),
        })
    }

    async fn top_posts(
        &self,
        since: Option<DateTime<Utc>>,
        limit: u32,
    ) -> anyhow::Result<Vec<FeedRow>> {
        let mut qb = QueryBuilder::<Sqlite>::new(POST_LISTING_SELECT);
        push_visibility(&mut qb, None);
        if let Some(since) = since {
            qb.push(" AND p.created_at >= ").push_bind(to_millis(since));
        }
        qb.push(" ORDER BY p.popularity_score DESC, p.created_at DESC LIMIT ")
            .push_bind(i64::from(limit.saturating_mul(TOP_POSTS_CANDIDATE_FACTOR)));

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

    /// Hidden authors' posts are returned to the author and to admins only.
    /// Deleted posts are returned with `is_deleted` set; callers decide.
    async fn get_post_detail(
        &self,
        id: Uuid,
        viewer: Option<Uuid>,
    ) -> anyhow::Result<Option<PostDetail>> {
        let mut qb = QueryBuilder::<Sqlite>::new(POST_LISTING_SELECT.replace(
            "SELECT p.id,",
            "SELECT p.media_type, p.is_deleted, p.id,",
        ));
        qb.push(" WHERE p.id = ").push_bind(uuid_to_blob(id));
        push_author_visible(&mut qb, "p.author_id", viewer);

        let Some(row) = qb.build().fetch_optional(&self.pool).await? else {
            return Ok(None);
        };
        let media_type: Option<String> = row.try_get("media_type")?;
        let is_deleted: bool = row.try_get("is_deleted")?;
        let mut listing = [feed_row_from_row(&row)?];
        attach_tags(&self.pool, &mut listing).await?;
        let [post] = listing;

        let user_vote = match viewer {
            Some(viewer) => self.find_vote(VoteTarget::Post(id), viewer).await?,
            None => None,
        };

        Ok(Some(PostDetail {
            id: post.id,
            title: post.title,
            content: post.content,
            created_at: post.created_at,
            media_type,
            is_deleted,
            category: post.category,
            author: post.author,
            upvotes: post.upvotes,
            downvotes: post.downvotes,
            comments_count: post.comments,
            tags: post.tags,
            user_vote,
        }))
    }

    async fn refresh_popularity_scores(&self, now: DateTime<Utc>) -> anyhow::Result<u64> {
        let rows = sqlx::query(
            "SELECT id, upvotes_count, downvotes_count, comments_count, created_at \
             FROM posts WHERE is_deleted = 0",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut tx = self.pool.begin().await?;
        let mut touched = 0;
        for row in &rows {
            let score = popularity_score(
                count(row.try_get("upvotes_count")?),
                count(row.try_get("downvotes_count")?),
                count(row.try_get("comments_count")?),
                from_millis(row.try_get("created_at")?),
                now,
            );
            touched += sqlx::query("UPDATE posts SET popularity_score = ? WHERE id = ?")
                .bind(score)
                .bind(row.try_get::<Vec<u8>, _>("id")?)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        Ok(touched)
    }

    async fn upsert_tags(&self, slugs: &[String]) -> anyhow::Result<Vec<Tag>> {
        let now = to_millis(Utc::now());
        let mut tags = Vec::with_capacity(slugs.len());
        for slug in slugs {
            sqlx::query(
                "INSERT INTO tags (slug, label, usage_count, created_at) VALUES (?, ?, 0, ?) \
                 ON CONFLICT(slug) DO NOTHING",
            )
            .bind(slug)
            .bind(label_from_slug(slug))
            .bind(now)
            .execute(&self.pool)
            .await?;

            let row = sqlx::query("SELECT id, slug, label, usage_count FROM tags WHERE slug = ?")
                .bind(slug)
                .fetch_one(&self.pool)
                .await?;
            tags.push(tag_from_row(&row)?);
        }
        Ok(tags)
    }

    async fn link_tags(&self, post_id: Uuid, tag_ids: &[i64]) -> anyhow::Result<()> {
        let now = to_millis(Utc::now());
        let mut tx = self.pool.begin().await?;
        for tag_id in tag_ids {
            let linked = sqlx::query(
                "INSERT OR IGNORE INTO post_tags (post_id, tag_id, created_at) VALUES (?, ?, ?)",
            )
            .bind(uuid_to_blob(post_id))
            .bind(tag_id)
            .bind(now)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if linked > 0 {
                sqlx::query("UPDATE tags SET usage_count = usage_count + 1 WHERE id = ?")
                    .bind(tag_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn search_tags(&self, term: &str, limit: u32) -> anyhow::Result<Vec<Tag>> {
        let term = term.trim();
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id, slug, label, usage_count FROM tags");

        if !term.is_empty() {
            let slug = slugify_tag(term);
            qb.push(" WHERE lower(label) LIKE ")
                .push_bind(format!("%{}%", term.to_lowercase()));
            if !slug.is_empty() {
                qb.push(" OR slug LIKE ").push_bind(format!("%{slug}%"));
            }
        }
        qb.push(" ORDER BY usage_count DESC, slug ASC LIMIT ")
            .push_bind(i64::from(limit));

        qb.build()
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(tag_from_row)
            .collect()
    }

    async fn list_comments(
        &self,
        post_id: Uuid,
        viewer: Option<Uuid>,
    ) -> anyhow::Result<Vec<CommentView>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT cm.id, cm.post_id, cm.parent_comment_id, cm.depth, cm.body, \
                    cm.upvotes_count, cm.downvotes_count, cm.is_deleted, cm.created_at, \
                    a.id AS author_id, a.username AS author_username, \
                    a.avatar_url AS author_avatar_url, a.level AS author_level \
             FROM comments cm LEFT JOIN profiles a ON a.id = cm.author_id \
             WHERE cm.post_id = ",
        );
        qb.push_bind(uuid_to_blob(post_id));
        push_author_visible(&mut qb, "cm.author_id", viewer);
        qb.push(" ORDER BY cm.created_at ASC");
        let rows = qb.build().fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| {
                Ok(CommentView {
                    id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("id")?),
                    post_id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("post_id")?),
                    body: row.try_get("body")?,
                    created_at: from_millis(row.try_get("created_at")?),
                    depth: depth_from_row(row)?,
                    parent_id: row
                        .try_get::<Option<Vec<u8>>, _>("parent_comment_id")?
                        .map(|blob| blob_to_uuid(&blob)),
                    upvotes: count(row.try_get("upvotes_count")?),
                    downvotes: count(row.try_get("downvotes_count")?),
                    author: author_from_row(row)?,
                    is_deleted: row.try_get("is_deleted")?,
                })
            })
            .collect()
    }

    async fn get_comment(&self, id: Uuid) -> anyhow::Result<Option<Comment>> {
        sqlx::query("SELECT * FROM comments WHERE id = ?")
            .bind(uuid_to_blob(id))
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(comment_from_row)
            .transpose()
    }

    async fn create_comment(&self, comment: NewComment) -> anyhow::Result<Uuid> {
        let id = Uuid::now_v7();
        let created = to_millis(comment.created_at);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO comments (id, post_id, author_id, parent_comment_id, depth, body, \
             created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(id))
        .bind(uuid_to_blob(comment.post_id))
        .bind(uuid_to_blob(comment.author_id))
        .bind(comment.parent_id.map(uuid_to_blob))
        .bind(i64::from(comment.depth))
        .bind(&comment.body)
        .bind(created)
        .bind(created)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE posts SET comments_count = comments_count + 1 WHERE id = ?")
            .bind(uuid_to_blob(comment.post_id))
            .execute(&mut *tx)
            .await?;
        refresh_post_score(&mut tx, comment.post_id, comment.created_at).await?;

        award_xp(
            &mut tx,
            comment.author_id,
            XP_PER_COMMENT,
            "comment",
            &id.to_string(),
            comment.created_at,
        )
        .await?;

        tx.commit().await?;
        Ok(id)
    }

    async fn update_comment_body(
        &self,
        id: Uuid,
        body: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE comments SET body = ?, updated_at = ? WHERE id = ?")
            .bind(body)
            .bind(to_millis(at))
            .bind(uuid_to_blob(id))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn soft_delete_comment(
        &self,
        id: Uuid,
        placeholder: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE comments SET body = ?, is_deleted = 1, updated_at = ? WHERE id = ?")
            .bind(placeholder)
            .bind(to_millis(at))
            .bind(uuid_to_blob(id))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_vote(
        &self,
        target: VoteTarget,
        user_id: Uuid,
    ) -> anyhow::Result<Option<VoteValue>> {
        let sql = match target {
            VoteTarget::Post(_) => "SELECT value FROM post_votes WHERE post_id = ? AND user_id = ?",
            VoteTarget::Comment(_) => {
                "SELECT value FROM comment_votes WHERE comment_id = ? AND user_id = ?"
            }
        };
        let row = sqlx::query(sql)
            .bind(uuid_to_blob(target.id()))
            .bind(uuid_to_blob(user_id))
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(VoteValue::try_from(row.try_get::<i64, _>("value")?)?)),
            None => Ok(None),
        }
    }

    /// Upvote XP is keyed by (post, voter), so retracting and re-casting an
    /// upvote does not credit the author twice.
    async fn apply_vote(
        &self,
        target: VoteTarget,
        user_id: Uuid,
        change: VoteChange,
        at: DateTime<Utc>,
    ) -> anyhow::Result<VoteTally> {
        let (table, owner_table, key) = match target {
            VoteTarget::Post(_) => ("post_votes", "posts", "post_id"),
            VoteTarget::Comment(_) => ("comment_votes", "comments", "comment_id"),
        };
        let target_blob = uuid_to_blob(target.id());
        let user_blob = uuid_to_blob(user_id);
        let mut tx = self.pool.begin().await?;

        let owner = sqlx::query(&format!("SELECT author_id FROM {owner_table} WHERE id = ?"))
            .bind(&target_blob)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(owner) = owner else {
            anyhow::bail!("{} {} not found", target.kind(), target.id());
        };
        let author_id = blob_to_uuid(&owner.try_get::<Vec<u8>, _>("author_id")?);

        match change {
            VoteChange::Insert(value) => {
                sqlx::query(&format!(
                    "INSERT INTO {table} ({key}, user_id, value, created_at) VALUES (?, ?, ?, ?)"
                ))
                .bind(&target_blob)
                .bind(&user_blob)
                .bind(value.as_i64())
                .bind(to_millis(at))
                .execute(&mut *tx)
                .await?;
            }
            VoteChange::Update(value) => {
                sqlx::query(&format!(
                    "UPDATE {table} SET value = ?, created_at = ? WHERE {key} = ? AND user_id = ?"
                ))
                .bind(value.as_i64())
                .bind(to_millis(at))
                .bind(&target_blob)
                .bind(&user_blob)
                .execute(&mut *tx)
                .await?;
            }
            VoteChange::Retract => {
                sqlx::query(&format!("DELETE FROM {table} WHERE {key} = ? AND user_id = ?"))
                    .bind(&target_blob)
                    .bind(&user_blob)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        let (upvotes, downvotes) = recount_votes(&mut tx, target).await?;

        if let VoteTarget::Post(post_id) = target {
            refresh_post_score(&mut tx, post_id, at).await?;

            if change.casts_new_upvote() {
                let awarded = author_id != user_id
                    && award_xp(
                        &mut tx,
                        author_id,
                        XP_PER_UPVOTE_RECEIVED,
                        "upvote",
                        &format!("{post_id}:{user_id}"),
                        at,
                    )
                    .await?;
                if !awarded {
                    sync_level_and_badges(&mut tx, author_id, at).await?;
                }
            }
        }

        tx.commit().await?;
        Ok(VoteTally {
            upvotes,
            downvotes,
            user_vote: change.resulting_value(),
        })
    }

    /// Raises one open `post_flag_threshold` alert per post once enough
    /// flags are pending.
    async fn upsert_flag(
        &self,
        post_id: Uuid,
        reporter_id: Uuid,
        reason: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let post_blob = uuid_to_blob(post_id);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO post_flags (id, post_id, reporter_id, reason, status, created_at) \
             VALUES (?, ?, ?, ?, 'pending', ?) \
             ON CONFLICT(post_id, reporter_id) DO UPDATE SET \
                reason = excluded.reason, status = 'pending', created_at = excluded.created_at, \
                reviewed_at = NULL, reviewer_id = NULL, resolution_notes = NULL",
        )
        .bind(uuid_to_blob(Uuid::now_v7()))
        .bind(&post_blob)
        .bind(uuid_to_blob(reporter_id))
        .bind(reason)
        .bind(to_millis(at))
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(
            "SELECT \
                (SELECT COUNT(*) FROM post_flags WHERE post_id = ? AND status = 'pending') AS pending, \
                (SELECT COUNT(*) FROM moderation_alerts WHERE post_id = ? \
                    AND alert_type = 'post_flag_threshold' AND resolved_at IS NULL) AS open_alerts, \
                (SELECT author_id FROM posts WHERE id = ?) AS author_id",
        )
        .bind(&post_blob)
        .bind(&post_blob)
        .bind(&post_blob)
        .fetch_one(&mut *tx)
        .await?;
        let pending: i64 = row.try_get("pending")?;
        let open_alerts: i64 = row.try_get("open_alerts")?;

        if pending >= FLAG_ALERT_THRESHOLD && open_alerts == 0 {
            let metadata = serde_json::json!({ "postId": post_id, "pendingFlags": pending });
            sqlx::query(
                "INSERT INTO moderation_alerts (id, user_id, post_id, alert_type, severity, \
                 metadata, created_at) VALUES (?, ?, ?, 'post_flag_threshold', 'high', ?, ?)",
            )
            .bind(uuid_to_blob(Uuid::now_v7()))
            .bind(row.try_get::<Option<Vec<u8>>, _>("author_id")?)
            .bind(&post_blob)
            .bind(metadata.to_string())
            .bind(to_millis(at))
            .execute(&mut *tx)
            .await?;
            tracing::warn!(%post_id, pending, "flag threshold reached, moderation alert raised");
        }

        tx.commit().await?;
        Ok(())
    }
}
