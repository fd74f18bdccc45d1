//! Feed, posts, votes, comments, flags and tags.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vf_core::comments::{normalize_body, reply_depth, REMOVED_COMMENT_BODY};
use vf_core::error::{AppError, Result};
use vf_core::feed::{compose_page, FeedFilters, FeedPage, FeedPeriod};
use vf_core::gamification::{diff_snapshots, GamificationDiff};
use vf_core::models::{Category, CommentView, NewComment, NewPost, PostDetail, Tag};
use vf_core::slug::slugify_tag;
use vf_core::traits::{AuditLog, ForumRepo, ProfileRepo};
use vf_core::votes::{VoteChange, VoteTally, VoteTarget, VoteValue};

use crate::public::{rank_top_posts, TopPostsListing, TOP_POSTS_LIMIT};
use crate::snapshot::fetch_snapshot;
use crate::{internal, record_audit, require_member};

pub const MIN_TITLE_CHARS: usize = 3;
pub const MAX_TITLE_CHARS: usize = 140;
pub const MAX_CONTENT_CHARS: usize = 10_000;
pub const MAX_TAGS: usize = 5;
pub const MIN_FLAG_REASON_CHARS: usize = 8;
pub const DEFAULT_TAG_SEARCH_LIMIT: u32 = 8;
pub const MAX_TAG_SEARCH_LIMIT: u32 = 20;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostInput {
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    pub category_slug: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// MIME label of an attachment, if the composer announced one
    #[serde(default)]
    pub media_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostCreated {
    pub post_id: Uuid,
    pub gamification: GamificationDiff,
    pub tags: Vec<String>,
    /// False when the post was published but its tags could not be linked
    pub tags_linked: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentCreated {
    pub comment_id: Uuid,
    pub gamification: GamificationDiff,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPage {
    pub post: PostDetail,
    pub comments: Vec<CommentView>,
}

/// Validates title and content lengths and returns them trimmed.
pub fn validate_post_text(title: &str, content: Option<&str>) -> Result<(String, Option<String>)> {
    let title = title.trim();
    let title_len = title.chars().count();
    if !(MIN_TITLE_CHARS..=MAX_TITLE_CHARS).contains(&title_len) {
        return Err(AppError::validation(format!(
            "title must have between {MIN_TITLE_CHARS} and {MAX_TITLE_CHARS} characters"
        )));
    }

    let content = content.map(str::trim).filter(|c| !c.is_empty());
    if content.is_some_and(|c| c.chars().count() > MAX_CONTENT_CHARS) {
        return Err(AppError::validation(format!(
            "content must be at most {MAX_CONTENT_CHARS} characters"
        )));
    }
    Ok((title.to_string(), content.map(str::to_string)))
}

/// Slugifies, drops empties and duplicates (first occurrence wins).
pub fn prepare_tags(raw: &[String]) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let slugs: Vec<String> = raw
        .iter()
        .map(|tag| slugify_tag(tag.trim()))
        .filter(|slug| !slug.is_empty())
        .filter(|slug| seen.insert(slug.clone()))
        .collect();

    if slugs.len() > MAX_TAGS {
        return Err(AppError::validation(format!("at most {MAX_TAGS} tags per post")));
    }
    Ok(slugs)
}

/// Missing or unparsable limits use the default; others are clamped to 1..=20.
pub fn tag_search_limit(limit: Option<u32>) -> u32 {
    limit
        .map(|l| l.clamp(1, MAX_TAG_SEARCH_LIMIT))
        .unwrap_or(DEFAULT_TAG_SEARCH_LIMIT)
}

pub struct ForumService {
    forum: Arc<dyn ForumRepo>,
    profiles: Arc<dyn ProfileRepo>,
    audit: Arc<dyn AuditLog>,
}

impl ForumService {
    pub fn new(
        forum: Arc<dyn ForumRepo>,
        profiles: Arc<dyn ProfileRepo>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            forum,
            profiles,
            audit,
        }
    }

    pub async fn categories(&self) -> Result<Vec<Category>> {
        self.forum
            .list_categories()
            .await
            .map_err(internal("list_categories"))
    }

    /// Never fails: a store error is logged and yields an empty page.
    pub async fn feed(
        &self,
        filters: &FeedFilters,
        viewer: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> FeedPage {
        let query = filters.resolve(viewer, now);
        match self.forum.query_feed(&query).await {
            Ok(rows) => compose_page(&query, rows, now),
            Err(error) => {
                tracing::error!(
                    scope = "feed",
                    error = %error,
                    sort = %filters.effective_sort(),
                    page = query.page,
                    "feed query failed"
                );
                FeedPage::empty(query.page)
            }
        }
    }

    pub async fn top_posts(
        &self,
        period: FeedPeriod,
        site_base: &str,
        now: DateTime<Utc>,
    ) -> Result<TopPostsListing> {
        let rows = self
            .forum
            .top_posts(period.since(now), TOP_POSTS_LIMIT)
            .await
            .map_err(internal("top_posts"))?;

        Ok(TopPostsListing {
            generated_at: now,
            posts: rank_top_posts(rows, site_base, now),
            period,
        })
    }

    /// Deleted posts are shown to admins only.
    pub async fn post_detail(&self, id: Uuid, viewer: Option<Uuid>) -> Result<PostPage> {
        let post = self
            .forum
            .get_post_detail(id, viewer)
            .await
            .map_err(internal("post_detail"))?
            .ok_or_else(|| AppError::not_found("post", id))?;

        if post.is_deleted && !self.is_admin(viewer).await? {
            return Err(AppError::not_found("post", id));
        }

        let comments = self
            .forum
            .list_comments(id, viewer)
            .await
            .map_err(internal("list_comments"))?;
        Ok(PostPage { post, comments })
    }

    pub async fn create_post(
        &self,
        actor: Uuid,
        input: CreatePostInput,
        now: DateTime<Utc>,
    ) -> Result<PostCreated> {
        require_member(&self.profiles, actor).await?;
        let (title, content) = validate_post_text(&input.title, input.content.as_deref())?;
        let tags = prepare_tags(&input.tags)?;

        let before = fetch_snapshot(&self.profiles, actor).await;

        let category = self
            .forum
            .get_category(input.category_slug.trim())
            .await
            .map_err(internal("create_post"))?
            .ok_or_else(|| {
                tracing::warn!(category = %input.category_slug, "post for unknown category");
                AppError::validation("selected category does not exist")
            })?;

        let post_id = self
            .forum
            .create_post(NewPost {
                author_id: actor,
                category_id: category.id,
                title,
                content,
                media_type: input.media_type.clone(),
                created_at: now,
            })
            .await
            .map_err(internal("create_post"))?;

        let tags_linked = self.attach_tags(post_id, &tags).await;

        let after = fetch_snapshot(&self.profiles, actor).await;
        let gamification = diff_snapshots(&before, &after);

        record_audit(
            &self.audit,
            Some(actor),
            "post_created",
            serde_json::json!({
                "postId": post_id,
                "category": category.slug,
                "tags": tags,
                "media": input.media_type,
            }),
            now,
        )
        .await;

        tracing::info!(%post_id, author = %actor, "post published");
        Ok(PostCreated {
            post_id,
            gamification,
            tags,
            tags_linked,
        })
    }

    /// Upserts and links tags. Failures are logged and leave the post as is.
    async fn attach_tags(&self, post_id: Uuid, slugs: &[String]) -> bool {
        if slugs.is_empty() {
            return true;
        }
        let tags = match self.forum.upsert_tags(slugs).await {
            Ok(tags) => tags,
            Err(error) => {
                tracing::warn!(scope = "create_post", step = "tag_upsert", %post_id, error = %error, "tag upsert failed");
                return false;
            }
        };
        let ids: Vec<i64> = tags.iter().map(|tag| tag.id).collect();
        if let Err(error) = self.forum.link_tags(post_id, &ids).await {
            tracing::warn!(scope = "create_post", step = "post_tags_insert", %post_id, error = %error, "failed to link tags to post");
            return false;
        }
        true
    }

    /// Casting the current vote again retracts it.
    pub async fn vote(
        &self,
        actor: Uuid,
        target: VoteTarget,
        value: VoteValue,
        now: DateTime<Utc>,
    ) -> Result<VoteTally> {
        require_member(&self.profiles, actor).await?;
        self.ensure_vote_target(target).await?;

        let existing = self
            .forum
            .find_vote(target, actor)
            .await
            .map_err(internal("vote"))?;
        let change = VoteChange::resolve(existing, value);
        let tally = self
            .forum
            .apply_vote(target, actor, change, now)
            .await
            .map_err(internal("vote"))?;

        record_audit(
            &self.audit,
            Some(actor),
            &format!("{}_voted", target.kind()),
            serde_json::json!({ "targetId": target.id(), "value": change.resulting_value() }),
            now,
        )
        .await;
        Ok(tally)
    }

    async fn ensure_vote_target(&self, target: VoteTarget) -> Result<()> {
        let exists = match target {
            VoteTarget::Post(id) => self
                .forum
                .get_post(id)
                .await
                .map_err(internal("vote"))?
                .is_some_and(|post| !post.is_deleted),
            VoteTarget::Comment(id) => self
                .forum
                .get_comment(id)
                .await
                .map_err(internal("vote"))?
                .is_some_and(|comment| !comment.is_deleted),
        };
        if exists {
            Ok(())
        } else {
            Err(AppError::not_found(target.kind(), target.id()))
        }
    }

    pub async fn create_comment(
        &self,
        actor: Uuid,
        post_id: Uuid,
        body: &str,
        parent_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<CommentCreated> {
        require_member(&self.profiles, actor).await?;
        let body = normalize_body(body)?;

        let post = self
            .forum
            .get_post(post_id)
            .await
            .map_err(internal("create_comment"))?;
        if !post.is_some_and(|post| !post.is_deleted) {
            return Err(AppError::not_found("post", post_id));
        }

        let depth = match parent_id {
            Some(parent_id) => {
                let parent = self
                    .forum
                    .get_comment(parent_id)
                    .await
                    .map_err(internal("create_comment"))?
                    .ok_or_else(|| AppError::not_found("comment", parent_id))?;
                if parent.post_id != post_id {
                    return Err(AppError::validation(
                        "a reply must belong to the same post as its parent",
                    ));
                }
                reply_depth(Some(parent.depth))?
            }
            None => reply_depth(None)?,
        };

        let before = fetch_snapshot(&self.profiles, actor).await;
        let comment_id = self
            .forum
            .create_comment(NewComment {
                post_id,
                author_id: actor,
                parent_id,
                depth,
                body,
                created_at: now,
            })
            .await
            .map_err(internal("create_comment"))?;
        let after = fetch_snapshot(&self.profiles, actor).await;

        record_audit(
            &self.audit,
            Some(actor),
            "comment_created",
            serde_json::json!({ "commentId": comment_id, "postId": post_id, "parentId": parent_id }),
            now,
        )
        .await;

        Ok(CommentCreated {
            comment_id,
            gamification: diff_snapshots(&before, &after),
        })
    }

    pub async fn update_comment(
        &self,
        actor: Uuid,
        comment_id: Uuid,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let body = normalize_body(body)?;
        let comment = self.own_comment(actor, comment_id, "edit").await?;
        if comment.is_deleted {
            return Err(AppError::validation("a removed comment cannot be edited"));
        }

        self.forum
            .update_comment_body(comment_id, &body, now)
            .await
            .map_err(internal("update_comment"))?;
        record_audit(
            &self.audit,
            Some(actor),
            "comment_updated",
            serde_json::json!({ "commentId": comment_id, "postId": comment.post_id }),
            now,
        )
        .await;
        Ok(())
    }

    /// Soft delete: the body is replaced, the row and its replies stay.
    pub async fn delete_comment(&self, actor: Uuid, comment_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        let comment = self.own_comment(actor, comment_id, "delete").await?;
        if comment.is_deleted {
            return Ok(());
        }

        self.forum
            .soft_delete_comment(comment_id, REMOVED_COMMENT_BODY, now)
            .await
            .map_err(internal("delete_comment"))?;
        record_audit(
            &self.audit,
            Some(actor),
            "comment_deleted",
            serde_json::json!({ "commentId": comment_id, "postId": comment.post_id }),
            now,
        )
        .await;
        Ok(())
    }

    async fn own_comment(
        &self,
        actor: Uuid,
        comment_id: Uuid,
        verb: &str,
    ) -> Result<vf_core::models::Comment> {
        let comment = self
            .forum
            .get_comment(comment_id)
            .await
            .map_err(internal("load_comment"))?
            .ok_or_else(|| AppError::not_found("comment", comment_id))?;
        if comment.author_id != actor {
            return Err(AppError::Forbidden(format!(
                "you can only {verb} your own comments"
            )));
        }
        Ok(comment)
    }

    pub async fn flag_post(
        &self,
        actor: Uuid,
        post_id: Uuid,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let reason = reason.trim();
        if reason.chars().count() < MIN_FLAG_REASON_CHARS {
            return Err(AppError::validation(format!(
                "describe the reason in at least {MIN_FLAG_REASON_CHARS} characters"
            )));
        }

        let post = self
            .forum
            .get_post(post_id)
            .await
            .map_err(internal("flag_post"))?;
        if !post.is_some_and(|post| !post.is_deleted) {
            return Err(AppError::not_found("post", post_id));
        }

        self.forum
            .upsert_flag(post_id, actor, reason, now)
            .await
            .map_err(internal("flag_post"))?;
        record_audit(
            &self.audit,
            Some(actor),
            "post_flagged",
            serde_json::json!({ "postId": post_id }),
            now,
        )
        .await;
        Ok(())
    }

    pub async fn search_tags(&self, term: Option<&str>, limit: Option<u32>) -> Result<Vec<Tag>> {
        self.forum
            .search_tags(term.unwrap_or_default().trim(), tag_search_limit(limit))
            .await
            .map_err(internal("search_tags"))
    }

    async fn is_admin(&self, viewer: Option<Uuid>) -> Result<bool> {
        let Some(viewer) = viewer else {
            return Ok(false);
        };
        Ok(self
            .profiles
            .get_profile(viewer)
            .await
            .map_err(internal("load_profile"))?
            .is_some_and(|profile| profile.is_admin))
    }
}
