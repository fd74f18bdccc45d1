//! # vf-ui
//!
//! Server-rendered pages and the RSS feed, as Askama templates. Handlers
//! build the view structs below from service results and call `render()`.

use askama::Template;
use chrono::{DateTime, Utc};
use url::form_urlencoded;
use uuid::Uuid;
use vf_core::feed::{FeedFilters, FeedPage, FeedPost, FeedSort};
use vf_core::models::{Category, CommentView, PostDetail, TagRef};
use vf_services::public::TopPostsListing;

pub const SITE_NAME: &str = "Verde Forum";
const CARD_EXCERPT_CHARS: usize = 280;

fn display_date(at: DateTime<Utc>) -> String {
    at.format("%d/%m/%Y %H:%M").to_string()
}

fn clip(text: &str, max: usize) -> String {
    let mut clipped: String = text.chars().take(max).collect();
    if text.chars().count() > max {
        clipped.push('…');
    }
    clipped
}

/// One post in a feed listing.
pub struct PostCard {
    pub id: Uuid,
    pub title: String,
    pub excerpt: String,
    pub category: String,
    pub author: String,
    pub level: String,
    pub created: String,
    pub upvotes: u64,
    pub downvotes: u64,
    pub comments: u64,
    pub score: String,
    pub tags: Vec<TagRef>,
}

impl From<&FeedPost> for PostCard {
    fn from(post: &FeedPost) -> Self {
        Self {
            id: post.id,
            title: post.title.clone(),
            excerpt: clip(post.content.as_deref().unwrap_or_default(), CARD_EXCERPT_CHARS),
            category: post
                .category
                .as_ref()
                .map(|c| c.label.clone())
                .unwrap_or_default(),
            author: post
                .author
                .as_ref()
                .map(|a| a.username.clone())
                .unwrap_or_else(|| "anônimo".into()),
            level: post
                .author
                .as_ref()
                .map(|a| a.level.label().to_string())
                .unwrap_or_default(),
            created: display_date(post.created_at),
            upvotes: post.upvotes,
            downvotes: post.downvotes,
            comments: post.comments,
            score: format!("{:.1}", post.popularity_score),
            tags: post.tags.clone(),
        }
    }
}

pub struct NavLink {
    pub label: String,
    pub href: String,
    pub active: bool,
}

/// `/` with the given filters; defaults are left out.
pub fn feed_href(category: Option<&str>, tag: Option<&str>, sort: FeedSort, page: u32) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    if let Some(category) = category {
        query.append_pair("category", category);
    }
    if let Some(tag) = tag {
        query.append_pair("tag", tag);
    }
    if sort != FeedSort::Recent {
        query.append_pair("sort", sort.as_str());
    }
    if page > 1 {
        query.append_pair("page", &page.to_string());
    }

    let query = query.finish();
    if query.is_empty() {
        "/".to_string()
    } else {
        format!("/?{query}")
    }
}

#[derive(Template)]
#[template(path = "feed.html")]
pub struct FeedTemplate {
    pub title: String,
    pub cards: Vec<PostCard>,
    pub categories: Vec<NavLink>,
    pub sorts: Vec<NavLink>,
    pub active_tag: String,
    pub page: u32,
    pub prev_href: String,
    pub next_href: String,
}

impl FeedTemplate {
    pub fn new(page: &FeedPage, categories: &[Category], filters: &FeedFilters) -> Self {
        let category = filters.category_slug.as_deref();
        let tag = filters.tag_slug.as_deref();
        let sort = filters.effective_sort();

        let mut category_links = vec![NavLink {
            label: "Tudo".into(),
            href: feed_href(None, tag, sort, 1),
            active: category.is_none(),
        }];
        category_links.extend(categories.iter().map(|c| NavLink {
            label: c.label.clone(),
            href: feed_href(Some(c.slug.as_str()), tag, sort, 1),
            active: category == Some(c.slug.as_str()),
        }));

        let sorts = [
            (FeedSort::Recent, "Recentes"),
            (FeedSort::Popular, "Populares"),
            (FeedSort::TopWeek, "Top da semana"),
            (FeedSort::TopMonth, "Top do mês"),
        ]
        .into_iter()
        .map(|(option, label)| NavLink {
            label: label.into(),
            href: feed_href(category, tag, option, 1),
            active: option == sort,
        })
        .collect();

        let title = match categories.iter().find(|c| Some(c.slug.as_str()) == category) {
            Some(c) => format!("{} · {SITE_NAME}", c.label),
            None => SITE_NAME.to_string(),
        };

        Self {
            title,
            cards: page.posts.iter().map(PostCard::from).collect(),
            categories: category_links,
            sorts,
            active_tag: tag.unwrap_or_default().to_string(),
            page: page.page,
            prev_href: if page.page > 1 {
                feed_href(category, tag, sort, page.page - 1)
            } else {
                String::new()
            },
            next_href: if page.has_more {
                feed_href(category, tag, sort, page.page + 1)
            } else {
                String::new()
            },
        }
    }
}

pub struct CommentItem {
    pub id: Uuid,
    pub author: String,
    pub body: String,
    pub created: String,
    pub is_reply: bool,
    pub is_deleted: bool,
    pub upvotes: u64,
    pub downvotes: u64,
}

impl From<&CommentView> for CommentItem {
    fn from(comment: &CommentView) -> Self {
        Self {
            id: comment.id,
            author: comment
                .author
                .as_ref()
                .map(|a| a.username.clone())
                .unwrap_or_else(|| "anônimo".into()),
            body: comment.body.clone(),
            created: display_date(comment.created_at),
            is_reply: comment.depth > 0,
            is_deleted: comment.is_deleted,
            upvotes: comment.upvotes,
            downvotes: comment.downvotes,
        }
    }
}

/// Orders comments so every reply follows its parent.
fn threaded(comments: &[CommentView]) -> Vec<CommentItem> {
    let mut items = Vec::with_capacity(comments.len());
    for top in comments.iter().filter(|c| c.parent_id.is_none()) {
        items.push(CommentItem::from(top));
        items.extend(
            comments
                .iter()
                .filter(|c| c.parent_id == Some(top.id))
                .map(CommentItem::from),
        );
    }
    items
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub title: String,
    pub post_title: String,
    pub paragraphs: Vec<String>,
    pub category: String,
    pub author: String,
    pub created: String,
    pub removed: bool,
    pub upvotes: u64,
    pub downvotes: u64,
    pub comments_count: u64,
    pub tags: Vec<TagRef>,
    pub comments: Vec<CommentItem>,
}

impl PostTemplate {
    pub fn new(post: &PostDetail, comments: &[CommentView]) -> Self {
        Self {
            title: format!("{} · {SITE_NAME}", post.title),
            post_title: post.title.clone(),
            paragraphs: post
                .content
                .as_deref()
                .unwrap_or_default()
                .split("\n\n")
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
            category: post
                .category
                .as_ref()
                .map(|c| c.label.clone())
                .unwrap_or_default(),
            author: post
                .author
                .as_ref()
                .map(|a| a.username.clone())
                .unwrap_or_else(|| "anônimo".into()),
            created: display_date(post.created_at),
            removed: post.is_deleted,
            upvotes: post.upvotes,
            downvotes: post.downvotes,
            comments_count: post.comments_count,
            tags: post.tags.clone(),
            comments: threaded(comments),
        }
    }
}

pub struct RssItem {
    pub title: String,
    pub link: String,
    pub pub_date: String,
    pub description: String,
}

/// RSS 2.0 channel of the most voted posts.
#[derive(Template)]
#[template(path = "top_posts.xml", escape = "html")]
pub struct TopPostsRss {
    pub channel_title: String,
    pub site_link: String,
    pub period: String,
    pub last_build: String,
    pub items: Vec<RssItem>,
}

impl TopPostsRss {
    pub fn new(listing: &TopPostsListing, site_base: &str) -> Self {
        Self {
            channel_title: format!("{SITE_NAME} · Posts mais votados"),
            site_link: site_base.trim_end_matches('/').to_string(),
            period: listing.period.to_string(),
            last_build: listing.generated_at.to_rfc2822(),
            items: listing
                .posts
                .iter()
                .map(|post| RssItem {
                    title: post.title.clone(),
                    link: post.url.clone(),
                    pub_date: post.created_at.to_rfc2822(),
                    description: post.excerpt.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub title: String,
    pub status: u16,
    pub message: String,
}

impl ErrorTemplate {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            title: format!("{status} · {SITE_NAME}"),
            status,
            message: message.into(),
        }
    }
}
