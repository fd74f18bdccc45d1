//! # Domain Models
//!
//! These structs represent the core entities of Verde Forum.
//! Posts, comments and flags use UUID v7 for time-ordered identification;
//! categories and tags keep small integer keys.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::gamification::{BadgeCode, Level};
use crate::votes::VoteValue;

/// A top-level section of the forum (e.g. "cultivo", "memes").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    /// The URL slug used by feed filters
    pub slug: String,
    pub label: String,
    pub icon: Option<String>,
    pub description: Option<String>,
}

/// The stored post row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub category_id: i64,
    pub title: String,
    pub content: Option<String>,
    /// MIME label of an attachment announced by the composer, if any
    pub media_type: Option<String>,
    pub is_pinned: bool,
    pub is_deleted: bool,
    pub upvotes: u64,
    pub downvotes: u64,
    pub comments_count: u64,
    /// Cached value written by the store. Readers recompute it.
    pub popularity_score: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a post; counters start at zero.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub author_id: Uuid,
    pub category_id: i64,
    pub title: String,
    pub content: Option<String>,
    pub media_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub slug: String,
    pub label: String,
    pub usage_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRef {
    pub slug: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub slug: String,
    pub label: String,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorRef {
    pub id: Uuid,
    pub username: String,
    pub avatar_url: Option<String>,
    pub level: Level,
}

/// A post row as returned by feed and listing queries, already normalised
/// into a single shape by the store (joined category/author/tags).
#[derive(Debug, Clone, PartialEq)]
pub struct FeedRow {
    pub id: Uuid,
    pub title: String,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub category: Option<CategoryRef>,
    pub author: Option<AuthorRef>,
    pub upvotes: u64,
    pub downvotes: u64,
    pub comments: u64,
    pub tags: Vec<TagRef>,
}

/// Full post view for the post page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetail {
    pub id: Uuid,
    pub title: String,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub media_type: Option<String>,
    pub is_deleted: bool,
    pub category: Option<CategoryRef>,
    pub author: Option<AuthorRef>,
    pub upvotes: u64,
    pub downvotes: u64,
    pub comments_count: u64,
    pub tags: Vec<TagRef>,
    /// The viewer's own vote, if signed in and voted
    pub user_vote: Option<VoteValue>,
}

/// Stored comment row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub parent_id: Option<Uuid>,
    /// 0 for top-level comments, 1 for replies
    pub depth: u8,
    pub body: String,
    pub upvotes: u64,
    pub downvotes: u64,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub depth: u8,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: Uuid,
    pub post_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub depth: u8,
    pub parent_id: Option<Uuid>,
    pub upvotes: u64,
    pub downvotes: u64,
    pub author: Option<AuthorRef>,
    pub is_deleted: bool,
}

/// Account state controlled by moderators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationStatus {
    Active,
    /// Content is visible only to its author
    Shadowbanned,
    Banned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownVariant;

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown variant")
    }
}

impl fmt::Display for ModerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Shadowbanned => write!(f, "shadowbanned"),
            Self::Banned => write!(f, "banned"),
        }
    }
}

impl FromStr for ModerationStatus {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "shadowbanned" => Ok(Self::Shadowbanned),
            "banned" => Ok(Self::Banned),
            _ => Err(UnknownVariant),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub xp: i64,
    pub level: Level,
    pub pseudonymous: bool,
    pub share_activity: bool,
    pub email_notifications: bool,
    pub onboarding_completed: bool,
    pub moderation_status: ModerationStatus,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Persona {
    Cultivador,
    Curioso,
    Viajado,
    #[serde(rename = "Guardião")]
    Guardiao,
}

impl Persona {
    pub fn label(self) -> &'static str {
        match self {
            Persona::Cultivador => "Cultivador",
            Persona::Curioso => "Curioso",
            Persona::Viajado => "Viajado",
            Persona::Guardiao => "Guardião",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingProfile {
    pub username: String,
    pub avatar_url: Option<String>,
    pub persona: Persona,
    pub anonymous_mode: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivacySettings {
    pub pseudonymous: bool,
    pub share_activity: bool,
    pub email_notifications: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_id: Uuid,
    pub username: String,
    pub xp_gain: i64,
    pub rank: u32,
}

/// Badge as shown on a profile.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardedBadge {
    pub code: BadgeCode,
    pub awarded_at: DateTime<Utc>,
}

/// Pending flags on one post that raise a moderation alert.
pub const FLAG_ALERT_THRESHOLD: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagStatus {
    Pending,
    Reviewed,
    Dismissed,
}

impl fmt::Display for FlagStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Reviewed => write!(f, "reviewed"),
            Self::Dismissed => write!(f, "dismissed"),
        }
    }
}

impl FromStr for FlagStatus {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "reviewed" => Ok(Self::Reviewed),
            "dismissed" => Ok(Self::Dismissed),
            _ => Err(UnknownVariant),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostFlag {
    pub id: Uuid,
    pub post_id: Uuid,
    pub post_title: String,
    pub reporter_id: Uuid,
    pub reason: String,
    pub status: FlagStatus,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewer_id: Option<Uuid>,
    pub resolution_notes: Option<String>,
}

/// A review decision on a flag. Flags are never moved back to pending.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagReview {
    pub status: FlagStatus,
    pub notes: Option<String>,
    pub reviewer_id: Uuid,
    pub reviewed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationAlert {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub alert_type: String,
    pub severity: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<Uuid>,
}

/// Record written for every admin action.
#[derive(Debug, Clone, PartialEq)]
pub struct ModerationAction {
    pub actor_id: Uuid,
    pub target_type: &'static str,
    pub target_id: Uuid,
    pub action: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Login material kept by the credentials store.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user_id: Uuid,
    pub email: String,
    pub password_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moderation_status_round_trips_through_text() {
        for status in [
            ModerationStatus::Active,
            ModerationStatus::Shadowbanned,
            ModerationStatus::Banned,
        ] {
            assert_eq!(status.to_string().parse::<ModerationStatus>(), Ok(status));
        }
        assert!("suspended".parse::<ModerationStatus>().is_err());
    }

    #[test]
    fn persona_accepts_accented_label() {
        let persona: Persona = serde_json::from_str("\"Guardião\"").unwrap();
        assert_eq!(persona, Persona::Guardiao);
    }
}
