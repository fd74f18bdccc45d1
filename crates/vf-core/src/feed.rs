//! # Feed composition
//!
//! Turns user-facing feed filters into a store query and assembles the page
//! the store returns, recomputing every popularity score against `now`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::models::{AuthorRef, CategoryRef, FeedRow, TagRef, UnknownVariant};
use crate::scoring::{popularity_score, round_score};

pub const FEED_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedSort {
    #[default]
    Recent,
    Popular,
    TopWeek,
    TopMonth,
}

impl FeedSort {
    /// Period used when the caller did not pick one.
    pub fn default_period(self) -> FeedPeriod {
        match self {
            FeedSort::Recent => FeedPeriod::All,
            FeedSort::TopMonth => FeedPeriod::Month,
            FeedSort::Popular | FeedSort::TopWeek => FeedPeriod::Week,
        }
    }

    pub fn order(self) -> FeedOrder {
        match self {
            FeedSort::Recent => FeedOrder::Recent,
            FeedSort::Popular | FeedSort::TopWeek | FeedSort::TopMonth => FeedOrder::Popularity,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeedSort::Recent => "recent",
            FeedSort::Popular => "popular",
            FeedSort::TopWeek => "top-week",
            FeedSort::TopMonth => "top-month",
        }
    }
}

impl fmt::Display for FeedSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedSort {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "recent" => Ok(Self::Recent),
            "popular" => Ok(Self::Popular),
            "top-week" => Ok(Self::TopWeek),
            "top-month" => Ok(Self::TopMonth),
            _ => Err(UnknownVariant),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedPeriod {
    Week,
    Month,
    All,
}

impl FeedPeriod {
    /// Lower bound on `created_at`, or `None` for all time.
    pub fn since(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            FeedPeriod::Week => Some(now - Duration::days(7)),
            FeedPeriod::Month => Some(now - Duration::days(30)),
            FeedPeriod::All => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeedPeriod::Week => "week",
            FeedPeriod::Month => "month",
            FeedPeriod::All => "all",
        }
    }
}

impl fmt::Display for FeedPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedPeriod {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "all" => Ok(Self::All),
            _ => Err(UnknownVariant),
        }
    }
}

/// Sort key the store applies before paging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOrder {
    /// `created_at` descending
    Recent,
    /// popularity descending, ties by `created_at` descending
    Popularity,
}

/// Filters as chosen by the reader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedFilters {
    pub category_slug: Option<String>,
    pub tag_slug: Option<String>,
    pub sort: Option<FeedSort>,
    pub period: Option<FeedPeriod>,
    pub page: Option<u32>,
}

impl FeedFilters {
    /// Builds filters from raw query-string values. Unknown sorts fall back to
    /// `recent`, unknown periods count as unspecified, blank slugs are ignored.
    pub fn from_params(
        category: Option<&str>,
        tag: Option<&str>,
        sort: Option<&str>,
        period: Option<&str>,
        page: Option<u32>,
    ) -> Self {
        let slug = |value: Option<&str>| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            category_slug: slug(category),
            tag_slug: slug(tag),
            sort: sort.and_then(|s| s.parse().ok()),
            period: period.and_then(|p| p.parse().ok()),
            page,
        }
    }

    pub fn effective_sort(&self) -> FeedSort {
        self.sort.unwrap_or_default()
    }

    pub fn effective_period(&self) -> FeedPeriod {
        self.period
            .unwrap_or_else(|| self.effective_sort().default_period())
    }

    pub fn effective_page(&self) -> u32 {
        match self.page {
            Some(page) if page > 0 => page,
            _ => 1,
        }
    }

    pub fn resolve(&self, viewer: Option<Uuid>, now: DateTime<Utc>) -> FeedQuery {
        let page = self.effective_page();
        FeedQuery {
            category_slug: self.category_slug.clone(),
            tag_slug: self.tag_slug.clone(),
            order: self.effective_sort().order(),
            since: self.effective_period().since(now),
            viewer,
            page,
            limit: FEED_PAGE_SIZE,
            offset: u64::from(page - 1) * u64::from(FEED_PAGE_SIZE),
        }
    }
}

/// Store-level query derived from [`FeedFilters`].
#[derive(Debug, Clone, PartialEq)]
pub struct FeedQuery {
    pub category_slug: Option<String>,
    pub tag_slug: Option<String>,
    pub order: FeedOrder,
    pub since: Option<DateTime<Utc>>,
    /// Authors see their own posts even while shadowbanned
    pub viewer: Option<Uuid>,
    pub page: u32,
    pub limit: u32,
    pub offset: u64,
}

/// One page of rows plus the total matching count, when the store knows it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedRows {
    pub rows: Vec<FeedRow>,
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPost {
    pub id: Uuid,
    pub title: String,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_score")]
    pub popularity_score: f64,
    pub category: Option<CategoryRef>,
    pub author: Option<AuthorRef>,
    pub upvotes: u64,
    pub downvotes: u64,
    pub comments: u64,
    pub tags: Vec<TagRef>,
}

impl FeedPost {
    /// Builds the output post, scoring it against `now`.
    pub fn from_row(row: FeedRow, now: DateTime<Utc>) -> Self {
        let popularity_score =
            popularity_score(row.upvotes, row.downvotes, row.comments, row.created_at, now);
        Self {
            id: row.id,
            title: row.title,
            content: row.content,
            created_at: row.created_at,
            popularity_score,
            category: row.category,
            author: row.author,
            upvotes: row.upvotes,
            downvotes: row.downvotes,
            comments: row.comments,
            tags: row.tags,
        }
    }
}

fn serialize_score<S: Serializer>(score: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_score(*score))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub posts: Vec<FeedPost>,
    pub has_more: bool,
    pub page: u32,
}

impl FeedPage {
    pub fn empty(page: u32) -> Self {
        Self {
            posts: Vec::new(),
            has_more: false,
            page,
        }
    }
}

/// Whether another page exists. Uses the exact total when known, otherwise
/// assumes more rows exist whenever the page came back full.
pub fn has_more(total: Option<u64>, offset: u64, page_size: u32, returned: usize) -> bool {
    match total {
        Some(total) => total > offset + u64::from(page_size),
        None => returned == page_size as usize,
    }
}

/// Orders posts by fresh score (ties by newest first).
pub fn sort_by_popularity(posts: &mut [FeedPost]) {
    posts.sort_by(|a, b| {
        b.popularity_score
            .total_cmp(&a.popularity_score)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

/// Assembles a page from the rows the store returned for `query`.
pub fn compose_page(query: &FeedQuery, rows: FeedRows, now: DateTime<Utc>) -> FeedPage {
    let returned = rows.rows.len();
    let mut posts: Vec<FeedPost> = rows
        .rows
        .into_iter()
        .map(|row| FeedPost::from_row(row, now))
        .collect();

    if query.order == FeedOrder::Popularity {
        sort_by_popularity(&mut posts);
    }

    FeedPage {
        posts,
        has_more: has_more(rows.total, query.offset, query.limit, returned),
        page: query.page,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn row(title: &str, upvotes: u64, age_hours: i64) -> FeedRow {
        FeedRow {
            id: Uuid::now_v7(),
            title: title.to_string(),
            content: None,
            created_at: now() - Duration::hours(age_hours),
            category: None,
            author: None,
            upvotes,
            downvotes: 0,
            comments: 0,
            tags: Vec::new(),
        }
    }

    #[test]
    fn default_period_follows_sort() {
        let period = |sort| {
            FeedFilters {
                sort,
                ..Default::default()
            }
            .effective_period()
        };
        assert_eq!(period(None), FeedPeriod::All);
        assert_eq!(period(Some(FeedSort::Recent)), FeedPeriod::All);
        assert_eq!(period(Some(FeedSort::Popular)), FeedPeriod::Week);
        assert_eq!(period(Some(FeedSort::TopWeek)), FeedPeriod::Week);
        assert_eq!(period(Some(FeedSort::TopMonth)), FeedPeriod::Month);
    }

    #[test]
    fn explicit_period_wins_over_inference() {
        let filters = FeedFilters {
            sort: Some(FeedSort::TopMonth),
            period: Some(FeedPeriod::All),
            ..Default::default()
        };
        assert_eq!(filters.resolve(None, now()).since, None);
    }

    #[test]
    fn resolve_computes_offset_and_window() {
        let filters = FeedFilters {
            sort: Some(FeedSort::TopWeek),
            page: Some(3),
            ..Default::default()
        };
        let query = filters.resolve(None, now());
        assert_eq!(query.offset, 40);
        assert_eq!(query.limit, FEED_PAGE_SIZE);
        assert_eq!(query.order, FeedOrder::Popularity);
        assert_eq!(query.since, Some(now() - Duration::days(7)));
    }

    #[test]
    fn non_positive_pages_become_first_page() {
        for page in [None, Some(0)] {
            let filters = FeedFilters {
                page,
                ..Default::default()
            };
            assert_eq!(filters.resolve(None, now()).offset, 0);
            assert_eq!(filters.effective_page(), 1);
        }
    }

    #[test]
    fn raw_params_fall_back_to_defaults() {
        let filters =
            FeedFilters::from_params(Some("  "), Some("indoor"), Some("hot"), Some("year"), None);
        assert_eq!(filters.category_slug, None);
        assert_eq!(filters.tag_slug.as_deref(), Some("indoor"));
        assert_eq!(filters.effective_sort(), FeedSort::Recent);
        assert_eq!(filters.period, None);
    }

    #[test]
    fn exactly_one_full_page_has_more_only_if_a_21st_row_exists() {
        assert!(!has_more(Some(20), 0, 20, 20));
        assert!(has_more(Some(21), 0, 20, 20));
        assert!(has_more(None, 0, 20, 20));
        assert!(!has_more(None, 0, 20, 19));
        assert!(!has_more(Some(40), 20, 20, 20));
    }

    #[test]
    fn popularity_pages_are_resorted_by_fresh_score() {
        let query = FeedFilters {
            sort: Some(FeedSort::Popular),
            ..Default::default()
        }
        .resolve(None, now());
        let rows = FeedRows {
            rows: vec![row("old", 10, 24 * 20), row("new", 5, 1), row("tie-older", 0, 5), row("tie-newer", 0, 2)],
            total: Some(4),
        };

        let page = compose_page(&query, rows, now());
        let titles: Vec<_> = page.posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["new", "old", "tie-newer", "tie-older"]);
        assert!(!page.has_more);
        assert!((page.posts[0].popularity_score - popularity_score(5, 0, 0, now() - Duration::hours(1), now())).abs() < 1e-12);
    }

    #[test]
    fn recent_pages_keep_store_order() {
        let query = FeedFilters::default().resolve(None, now());
        let rows = FeedRows {
            rows: vec![row("a", 0, 1), row("b", 50, 2)],
            total: None,
        };
        let page = compose_page(&query, rows, now());
        assert_eq!(page.posts[0].title, "a");
        assert!(!page.has_more);
    }

    #[test]
    fn serialized_score_is_rounded() {
        let mut post = FeedPost::from_row(row("x", 1, 0), now());
        post.popularity_score = 1.234_567_89;
        let json = serde_json::to_value(&post).unwrap();
        assert_eq!(json["popularityScore"], serde_json::json!(1.2346));
        assert!(json.get("createdAt").is_some());
    }
}
