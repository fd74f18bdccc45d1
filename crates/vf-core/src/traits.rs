//! # Core Traits (Ports)
//!
//! Any storage or auth plugin must implement these traits to be used by the
//! binary. Store methods return `anyhow::Result`; services decide how a
//! failure surfaces to users.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::feed::{FeedQuery, FeedRows};
use crate::models::{
    AwardedBadge, Category, Comment, CommentView, Credentials, FeedRow, FlagReview, FlagStatus,
    LeaderboardEntry, ModerationAction, ModerationAlert, ModerationStatus, NewComment, NewPost,
    OnboardingProfile, Post, PostDetail, PostFlag, PrivacySettings, Profile, Tag,
};
use crate::votes::{VoteChange, VoteTally, VoteTarget, VoteValue};

/// Persistence contract for categories, posts, comments, votes, tags and flags.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ForumRepo: Send + Sync {
    // Categories
    async fn list_categories(&self) -> anyhow::Result<Vec<Category>>;
    async fn get_category(&self, slug: &str) -> anyhow::Result<Option<Category>>;

    // Posts
    async fn get_post(&self, id: Uuid) -> anyhow::Result<Option<Post>>;
    /// Inserts the post and credits the author's XP in the same transaction.
    async fn create_post(&self, post: NewPost) -> anyhow::Result<Uuid>;
    async fn query_feed(&self, query: &FeedQuery) -> anyhow::Result<FeedRows>;
    /// Visible, non-deleted posts created at or after `since`, best first.
    async fn top_posts(
        &self,
        since: Option<DateTime<Utc>>,
        limit: u32,
    ) -> anyhow::Result<Vec<FeedRow>>;
    async fn get_post_detail(
        &self,
        id: Uuid,
        viewer: Option<Uuid>,
    ) -> anyhow::Result<Option<PostDetail>>;
    /// Rewrites the cached score column; returns the number of rows touched.
    async fn refresh_popularity_scores(&self, now: DateTime<Utc>) -> anyhow::Result<u64>;

    // Tags
    async fn upsert_tags(&self, slugs: &[String]) -> anyhow::Result<Vec<Tag>>;
    async fn link_tags(&self, post_id: Uuid, tag_ids: &[i64]) -> anyhow::Result<()>;
    /// Blank `term` lists the most used tags.
    async fn search_tags(&self, term: &str, limit: u32) -> anyhow::Result<Vec<Tag>>;

    // Comments
    /// Comments by hidden authors are returned to the author and to admins only.
    async fn list_comments(
        &self,
        post_id: Uuid,
        viewer: Option<Uuid>,
    ) -> anyhow::Result<Vec<CommentView>>;
    async fn get_comment(&self, id: Uuid) -> anyhow::Result<Option<Comment>>;
    /// Inserts the comment, bumps the post's counters and credits XP.
    async fn create_comment(&self, comment: NewComment) -> anyhow::Result<Uuid>;
    async fn update_comment_body(
        &self,
        id: Uuid,
        body: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()>;
    async fn soft_delete_comment(
        &self,
        id: Uuid,
        placeholder: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    // Votes
    async fn find_vote(
        &self,
        target: VoteTarget,
        user_id: Uuid,
    ) -> anyhow::Result<Option<VoteValue>>;
    /// Applies the change, recounts the target and returns the new tally.
    async fn apply_vote(
        &self,
        target: VoteTarget,
        user_id: Uuid,
        change: VoteChange,
        at: DateTime<Utc>,
    ) -> anyhow::Result<VoteTally>;

    // Flags
    /// One flag per (post, reporter); re-flagging resets it to pending.
    async fn upsert_flag(
        &self,
        post_id: Uuid,
        reporter_id: Uuid,
        reason: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()>;
}

/// Profiles, badges and XP history.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ProfileRepo: Send + Sync {
    async fn get_profile(&self, user_id: Uuid) -> anyhow::Result<Option<Profile>>;
    async fn get_profile_by_username(&self, username: &str) -> anyhow::Result<Option<Profile>>;
    async fn list_badges(&self, user_id: Uuid) -> anyhow::Result<Vec<AwardedBadge>>;
    /// A username held by another user fails with `AppError::Conflict`.
    async fn upsert_onboarding(
        &self,
        user_id: Uuid,
        profile: &OnboardingProfile,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()>;
    async fn update_privacy(
        &self,
        user_id: Uuid,
        settings: PrivacySettings,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()>;
    /// Empty for a hidden author unless `viewer` is that author or an admin.
    async fn recent_posts_by(
        &self,
        author_id: Uuid,
        viewer: Option<Uuid>,
        limit: u32,
    ) -> anyhow::Result<Vec<FeedRow>>;
    async fn weekly_leaderboard(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> anyhow::Result<Vec<LeaderboardEntry>>;
}

/// Admin dashboard reads and moderation writes. Write methods return
/// `false` when the target does not exist.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ModerationRepo: Send + Sync {
    async fn set_moderation_status(
        &self,
        user_id: Uuid,
        status: ModerationStatus,
        action: &ModerationAction,
    ) -> anyhow::Result<bool>;
    async fn set_post_deleted(
        &self,
        post_id: Uuid,
        deleted: bool,
        action: &ModerationAction,
    ) -> anyhow::Result<bool>;
    async fn review_flag(&self, flag_id: Uuid, review: &FlagReview) -> anyhow::Result<bool>;
    async fn resolve_alert(
        &self,
        alert_id: Uuid,
        resolver: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool>;
    async fn list_flags(
        &self,
        status: Option<FlagStatus>,
        limit: u32,
    ) -> anyhow::Result<Vec<PostFlag>>;
    async fn list_alerts(
        &self,
        include_resolved: bool,
        limit: u32,
    ) -> anyhow::Result<Vec<ModerationAlert>>;
    async fn list_users(&self, limit: u32) -> anyhow::Result<Vec<Profile>>;
}

/// Email/password records backing sign-in.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CredentialRepo: Send + Sync {
    /// A registered email fails with `AppError::Conflict`.
    async fn create_credentials(
        &self,
        email: &str,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<Uuid>;
    async fn find_credentials(&self, email: &str) -> anyhow::Result<Option<Credentials>>;
}

/// Append-only record of user actions.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(
        &self,
        actor: Option<Uuid>,
        action: &str,
        metadata: serde_json::Value,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()>;
}

/// Password hashing and session tokens.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn hash_password(&self, password: &str) -> anyhow::Result<String>;

    /// Verifies a password against a stored hash.
    async fn verify_password(&self, password: &str, hash: &str) -> bool;

    /// Issues a bearer token for `user_id`, valid from `now`.
    fn issue_token(&self, user_id: Uuid, now: DateTime<Utc>) -> String;

    /// Returns the user a token was issued to, if it is authentic and unexpired.
    fn verify_token(&self, token: &str, now: DateTime<Utc>) -> Option<Uuid>;
}
