//! The public "top posts" listing served as JSON and RSS.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use vf_core::feed::{sort_by_popularity, FeedPeriod, FeedPost};
use vf_core::models::{FeedRow, TagRef};
use vf_core::scoring::round_score;

pub const TOP_POSTS_LIMIT: u32 = 25;
pub const EXCERPT_CHARS: usize = 240;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPost {
    pub id: Uuid,
    pub title: String,
    pub excerpt: String,
    pub created_at: DateTime<Utc>,
    pub popularity_score: f64,
    pub upvotes: u64,
    pub downvotes: u64,
    pub vote_balance: i64,
    pub tags: Vec<TagRef>,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPostsListing {
    pub generated_at: DateTime<Utc>,
    pub posts: Vec<TopPost>,
    pub period: FeedPeriod,
}

/// Unknown or missing text means `week`.
pub fn parse_period(raw: Option<&str>) -> FeedPeriod {
    raw.map(|p| p.trim().to_lowercase())
        .and_then(|p| FeedPeriod::from_str(&p).ok())
        .unwrap_or(FeedPeriod::Week)
}

pub fn excerpt(content: Option<&str>) -> String {
    content
        .unwrap_or_default()
        .chars()
        .take(EXCERPT_CHARS)
        .collect()
}

pub fn post_url(site_base: &str, id: Uuid) -> String {
    format!("{}/posts/{id}", site_base.trim_end_matches('/'))
}

/// Scores every candidate against `now`, keeps the best `TOP_POSTS_LIMIT`.
pub fn rank_top_posts(rows: Vec<FeedRow>, site_base: &str, now: DateTime<Utc>) -> Vec<TopPost> {
    let mut posts: Vec<FeedPost> = rows
        .into_iter()
        .map(|row| FeedPost::from_row(row, now))
        .collect();
    sort_by_popularity(&mut posts);
    posts.truncate(TOP_POSTS_LIMIT as usize);

    posts
        .into_iter()
        .map(|post| TopPost {
            excerpt: excerpt(post.content.as_deref()),
            url: post_url(site_base, post.id),
            popularity_score: round_score(post.popularity_score),
            vote_balance: post.upvotes as i64 - post.downvotes as i64,
            id: post.id,
            title: post.title,
            created_at: post.created_at,
            upvotes: post.upvotes,
            downvotes: post.downvotes,
            tags: post.tags,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::now;
    use chrono::Duration;

    fn row(title: &str, upvotes: u64, downvotes: u64, age_days: i64) -> FeedRow {
        FeedRow {
            id: Uuid::now_v7(),
            title: title.to_string(),
            content: Some("x".repeat(300)),
            created_at: now() - Duration::days(age_days),
            category: None,
            author: None,
            upvotes,
            downvotes,
            comments: 0,
            tags: Vec::new(),
        }
    }

    #[test]
    fn periods_default_to_week() {
        assert_eq!(parse_period(None), FeedPeriod::Week);
        assert_eq!(parse_period(Some("MONTH")), FeedPeriod::Month);
        assert_eq!(parse_period(Some("all")), FeedPeriod::All);
        assert_eq!(parse_period(Some("year")), FeedPeriod::Week);
    }

    #[test]
    fn ranking_uses_fresh_scores() {
        let rows = vec![
            row("old but loved", 10, 0, 30),
            row("fresh", 3, 0, 0),
            row("disliked", 0, 4, 0),
        ];
        let ranked = rank_top_posts(rows, "https://verde.example/", now());
        let titles: Vec<&str> = ranked.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["fresh", "old but loved", "disliked"]);

        assert_eq!(ranked[0].popularity_score, 12.0);
        assert_eq!(ranked[2].vote_balance, -4);
        assert_eq!(ranked[0].excerpt.chars().count(), EXCERPT_CHARS);
        assert_eq!(ranked[0].url, format!("https://verde.example/posts/{}", ranked[0].id));
    }

    #[test]
    fn listing_is_capped() {
        let rows = (0..40).map(|i| row("p", i, 0, 1)).collect();
        assert_eq!(rank_top_posts(rows, "http://x", now()).len(), 25);
    }

    #[test]
    fn excerpt_counts_characters_not_bytes() {
        let text = "ç".repeat(300);
        assert_eq!(excerpt(Some(&text)).chars().count(), 240);
        assert_eq!(excerpt(None), "");
    }
}
