use chrono::{Duration, Utc};
use sqlx::Row;
use uuid::Uuid;
use vf_core::error::AppError;
use vf_core::feed::{FeedFilters, FeedOrder};
use vf_core::gamification::{BadgeCode, Level};
use vf_core::models::{
    FlagReview, FlagStatus, ModerationAction, ModerationStatus, NewComment, NewPost,
    OnboardingProfile, Persona, PrivacySettings,
};
use vf_core::traits::{AuditLog, CredentialRepo, ForumRepo, ModerationRepo, ProfileRepo};
use vf_core::votes::{VoteChange, VoteTarget, VoteValue};

use super::*;

async fn repo() -> SqliteForumRepo {
    SqliteForumRepo::new("sqlite::memory:").await.unwrap()
}

async fn member(repo: &SqliteForumRepo, username: &str) -> Uuid {
    let id = Uuid::now_v7();
    let onboarding = OnboardingProfile {
        username: username.to_string(),
        avatar_url: None,
        persona: Persona::Cultivador,
        anonymous_mode: false,
    };
    repo.upsert_onboarding(id, &onboarding, Utc::now()).await.unwrap();
    id
}

async fn publish(repo: &SqliteForumRepo, author: Uuid, category: &str, title: &str, age: Duration) -> Uuid {
    let category = repo.get_category(category).await.unwrap().unwrap();
    repo.create_post(NewPost {
        author_id: author,
        category_id: category.id,
        title: title.to_string(),
        content: Some(format!("{title} body")),
        media_type: None,
        created_at: Utc::now() - age,
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn default_categories_are_seeded_once() {
    let repo = repo().await;
    repo.migrate().await.unwrap();

    let categories = repo.list_categories().await.unwrap();
    let labels: Vec<&str> = categories.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["Cultivo", "Experiências", "Memes", "Redução de Danos"]);
    assert!(repo.get_category("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn publishing_awards_xp_and_first_badge() {
    let repo = repo().await;
    let ana = member(&repo, "ana").await;

    let post_id = publish(&repo, ana, "cultivo", "Primeira rega", Duration::zero()).await;

    let post = repo.get_post(post_id).await.unwrap().unwrap();
    assert_eq!(post.author_id, ana);
    assert!(!post.is_deleted);

    let profile = repo.get_profile(ana).await.unwrap().unwrap();
    assert_eq!(profile.xp, 5);
    assert_eq!(profile.level, Level::Iniciante);

    let badges = repo.list_badges(ana).await.unwrap();
    assert_eq!(badges.len(), 1);
    assert_eq!(badges[0].code, BadgeCode::PrimeiraColheita);
}

#[tokio::test]
async fn onboarding_again_keeps_xp() {
    let repo = repo().await;
    let ana = member(&repo, "ana").await;
    publish(&repo, ana, "memes", "Meme", Duration::zero()).await;

    let again = OnboardingProfile {
        username: "ana.grower".into(),
        avatar_url: Some("https://cdn.example/ana.png".into()),
        persona: Persona::Guardiao,
        anonymous_mode: true,
    };
    repo.upsert_onboarding(ana, &again, Utc::now()).await.unwrap();

    let profile = repo.get_profile_by_username("ana.grower").await.unwrap().unwrap();
    assert_eq!(profile.xp, 5);
    assert!(profile.pseudonymous);
    assert!(!profile.share_activity);
    assert!(profile.onboarding_completed);
}

#[tokio::test]
async fn feed_filters_by_category_tag_and_period() {
    let repo = repo().await;
    let ana = member(&repo, "ana").await;

    let fresh = publish(&repo, ana, "cultivo", "Fresco", Duration::hours(1)).await;
    let old = publish(&repo, ana, "cultivo", "Antigo", Duration::days(12)).await;
    publish(&repo, ana, "memes", "Meme", Duration::hours(2)).await;

    let tags = repo.upsert_tags(&["led".to_string()]).await.unwrap();
    repo.link_tags(old, &[tags[0].id]).await.unwrap();

    let now = Utc::now();
    let all = FeedFilters::from_params(Some("cultivo"), None, Some("recent"), None, None)
        .resolve(None, now);
    let rows = repo.query_feed(&all).await.unwrap();
    assert_eq!(rows.total, Some(2));
    assert_eq!(rows.rows[0].id, fresh);
    assert_eq!(rows.rows[0].category.as_ref().unwrap().slug, "cultivo");
    assert_eq!(rows.rows[0].author.as_ref().unwrap().username, "ana");

    let week = FeedFilters::from_params(Some("cultivo"), None, Some("popular"), None, None)
        .resolve(None, now);
    assert_eq!(week.order, FeedOrder::Popularity);
    let rows = repo.query_feed(&week).await.unwrap();
    assert_eq!(rows.rows.len(), 1);
    assert_eq!(rows.rows[0].id, fresh);

    let tagged = FeedFilters::from_params(None, Some("led"), None, None, None).resolve(None, now);
    let rows = repo.query_feed(&tagged).await.unwrap();
    assert_eq!(rows.total, Some(1));
    assert_eq!(rows.rows[0].id, old);
    assert_eq!(rows.rows[0].tags[0].label, "led");
}

#[tokio::test]
async fn feed_pages_report_the_total() {
    let repo = repo().await;
    let ana = member(&repo, "ana").await;
    for i in 0..21 {
        publish(&repo, ana, "memes", &format!("Meme {i}"), Duration::minutes(i)).await;
    }

    let now = Utc::now();
    let first = FeedFilters::default().resolve(None, now);
    let rows = repo.query_feed(&first).await.unwrap();
    assert_eq!(rows.rows.len(), 20);
    assert_eq!(rows.total, Some(21));

    let second = FeedFilters { page: Some(2), ..Default::default() }.resolve(None, now);
    let rows = repo.query_feed(&second).await.unwrap();
    assert_eq!(rows.rows.len(), 1);
    assert_eq!(rows.rows[0].title, "Meme 20");
    assert_eq!(rows.total, Some(21));

    let past_end = FeedFilters { page: Some(3), ..Default::default() }.resolve(None, now);
    let rows = repo.query_feed(&past_end).await.unwrap();
    assert!(rows.rows.is_empty());
    assert_eq!(rows.total, Some(21));

    // The read transaction is released, so later writes land and are counted.
    publish(&repo, ana, "memes", "Meme 21", Duration::zero()).await;
    assert_eq!(repo.query_feed(&first).await.unwrap().total, Some(22));
}

#[tokio::test]
async fn shadowbanned_posts_are_only_visible_to_their_author() {
    let repo = repo().await;
    let admin = member(&repo, "admin").await;
    let troll = member(&repo, "troll").await;
    let reader = member(&repo, "reader").await;
    let post_id = publish(&repo, troll, "memes", "Spam", Duration::zero()).await;

    let action = ModerationAction {
        actor_id: admin,
        target_type: "user",
        target_id: troll,
        action: "set_status_shadowbanned".into(),
        reason: Some("spam".into()),
        created_at: Utc::now(),
    };
    assert!(repo
        .set_moderation_status(troll, ModerationStatus::Shadowbanned, &action)
        .await
        .unwrap());

    let now = Utc::now();
    let as_reader = FeedFilters::default().resolve(Some(reader), now);
    assert_eq!(repo.query_feed(&as_reader).await.unwrap().total, Some(0));
    let as_author = FeedFilters::default().resolve(Some(troll), now);
    assert_eq!(repo.query_feed(&as_author).await.unwrap().total, Some(1));

    assert!(repo.get_post_detail(post_id, Some(reader)).await.unwrap().is_none());
    assert!(repo.get_post_detail(post_id, None).await.unwrap().is_none());
    assert!(repo.get_post_detail(post_id, Some(troll)).await.unwrap().is_some());
    assert!(repo.top_posts(None, 25).await.unwrap().is_empty());

    let actions: i64 = sqlx::query("SELECT COUNT(*) AS n FROM moderation_actions")
        .fetch_one(repo.pool())
        .await
        .unwrap()
        .get("n");
    assert_eq!(actions, 1);
}

#[tokio::test]
async fn votes_toggle_and_credit_the_author_once() {
    let repo = repo().await;
    let ana = member(&repo, "ana").await;
    let bia = member(&repo, "bia").await;
    let post_id = publish(&repo, ana, "cultivo", "Colheita", Duration::zero()).await;
    let target = VoteTarget::Post(post_id);

    let tally = repo
        .apply_vote(target, bia, VoteChange::Insert(VoteValue::Up), Utc::now())
        .await
        .unwrap();
    assert_eq!((tally.upvotes, tally.downvotes), (1, 0));
    assert_eq!(tally.user_vote, Some(VoteValue::Up));
    assert_eq!(repo.find_vote(target, bia).await.unwrap(), Some(VoteValue::Up));

    let tally = repo.apply_vote(target, bia, VoteChange::Retract, Utc::now()).await.unwrap();
    assert_eq!((tally.upvotes, tally.user_vote), (0, None));

    repo.apply_vote(target, bia, VoteChange::Insert(VoteValue::Up), Utc::now())
        .await
        .unwrap();
    let tally = repo
        .apply_vote(target, bia, VoteChange::Update(VoteValue::Down), Utc::now())
        .await
        .unwrap();
    assert_eq!((tally.upvotes, tally.downvotes), (0, 1));

    // 5 for the post, 1 for bia's first upvote only
    assert_eq!(repo.get_profile(ana).await.unwrap().unwrap().xp, 6);

    let post = repo.get_post(post_id).await.unwrap().unwrap();
    assert_eq!((post.upvotes, post.downvotes), (0, 1));
    assert!(post.popularity_score < 0.0);

    let detail = repo.get_post_detail(post_id, Some(bia)).await.unwrap().unwrap();
    assert_eq!(detail.user_vote, Some(VoteValue::Down));
}

#[tokio::test]
async fn self_upvotes_earn_nothing() {
    let repo = repo().await;
    let ana = member(&repo, "ana").await;
    let post_id = publish(&repo, ana, "cultivo", "Meu post", Duration::zero()).await;

    repo.apply_vote(VoteTarget::Post(post_id), ana, VoteChange::Insert(VoteValue::Up), Utc::now())
        .await
        .unwrap();
    assert_eq!(repo.get_profile(ana).await.unwrap().unwrap().xp, 5);
}

#[tokio::test]
async fn voting_on_a_missing_target_fails() {
    let repo = repo().await;
    let ana = member(&repo, "ana").await;
    let result = repo
        .apply_vote(
            VoteTarget::Comment(Uuid::now_v7()),
            ana,
            VoteChange::Insert(VoteValue::Up),
            Utc::now(),
        )
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn shadowbanned_comments_and_profile_posts_stay_hidden() {
    let repo = repo().await;
    let admin = member(&repo, "admin").await;
    repo.set_admin(admin, true).await.unwrap();
    let bia = member(&repo, "bia").await;
    let ana = member(&repo, "ana").await;
    let reader = member(&repo, "reader").await;
    let post_id = publish(&repo, bia, "cultivo", "Rega", Duration::zero()).await;
    publish(&repo, ana, "cultivo", "Spam", Duration::zero()).await;
    repo.create_comment(NewComment {
        post_id,
        author_id: ana,
        parent_id: None,
        depth: 0,
        body: "compre aqui".into(),
        created_at: Utc::now(),
    })
    .await
    .unwrap();

    let action = ModerationAction {
        actor_id: admin,
        target_type: "user",
        target_id: ana,
        action: "set_status_shadowbanned".into(),
        reason: None,
        created_at: Utc::now(),
    };
    repo.set_moderation_status(ana, ModerationStatus::Shadowbanned, &action)
        .await
        .unwrap();

    assert!(repo.list_comments(post_id, None).await.unwrap().is_empty());
    assert!(repo.list_comments(post_id, Some(reader)).await.unwrap().is_empty());
    assert_eq!(repo.list_comments(post_id, Some(ana)).await.unwrap().len(), 1);
    assert_eq!(repo.list_comments(post_id, Some(admin)).await.unwrap().len(), 1);

    assert!(repo.recent_posts_by(ana, None, 5).await.unwrap().is_empty());
    assert!(repo.recent_posts_by(ana, Some(reader), 5).await.unwrap().is_empty());
    assert_eq!(repo.recent_posts_by(ana, Some(ana), 5).await.unwrap().len(), 1);
    assert_eq!(repo.recent_posts_by(ana, Some(admin), 5).await.unwrap().len(), 1);
    assert_eq!(repo.recent_posts_by(bia, None, 5).await.unwrap().len(), 1);
}

#[tokio::test]
async fn comments_bump_counters_and_soft_delete() {
    let repo = repo().await;
    let ana = member(&repo, "ana").await;
    let bia = member(&repo, "bia").await;
    let post_id = publish(&repo, ana, "experiencias", "Relato", Duration::zero()).await;

    let parent = repo
        .create_comment(NewComment {
            post_id,
            author_id: bia,
            parent_id: None,
            depth: 0,
            body: "Muito bom".into(),
            created_at: Utc::now(),
        })
        .await
        .unwrap();
    let reply = repo
        .create_comment(NewComment {
            post_id,
            author_id: ana,
            parent_id: Some(parent),
            depth: 1,
            body: "Valeu!".into(),
            created_at: Utc::now() + Duration::seconds(1),
        })
        .await
        .unwrap();

    assert_eq!(repo.get_post(post_id).await.unwrap().unwrap().comments_count, 2);
    assert_eq!(repo.get_profile(bia).await.unwrap().unwrap().xp, 2);

    repo.soft_delete_comment(parent, "[removido]", Utc::now()).await.unwrap();
    let comments = repo.list_comments(post_id, None).await.unwrap();
    assert_eq!(comments.len(), 2);
    assert!(comments[0].is_deleted);
    assert_eq!(comments[0].body, "[removido]");
    assert_eq!(comments[1].id, reply);
    assert_eq!(comments[1].parent_id, Some(parent));
    assert_eq!(comments[1].author.as_ref().unwrap().username, "ana");

    repo.update_comment_body(reply, "Valeu demais!", Utc::now()).await.unwrap();
    let stored = repo.get_comment(reply).await.unwrap().unwrap();
    assert_eq!(stored.body, "Valeu demais!");
    assert_eq!(stored.depth, 1);
}

#[tokio::test]
async fn third_pending_flag_raises_a_single_alert() {
    let repo = repo().await;
    let ana = member(&repo, "ana").await;
    let post_id = publish(&repo, ana, "memes", "Polêmico", Duration::zero()).await;

    let mut reporters = Vec::new();
    for name in ["r1", "r2", "r3", "r4"] {
        reporters.push(member(&repo, name).await);
    }

    repo.upsert_flag(post_id, reporters[0], "conteúdo ofensivo", Utc::now()).await.unwrap();
    repo.upsert_flag(post_id, reporters[0], "conteúdo muito ofensivo", Utc::now()).await.unwrap();
    repo.upsert_flag(post_id, reporters[1], "spam descarado", Utc::now()).await.unwrap();
    assert!(repo.list_alerts(false, 10).await.unwrap().is_empty());

    repo.upsert_flag(post_id, reporters[2], "desinformação", Utc::now()).await.unwrap();
    repo.upsert_flag(post_id, reporters[3], "fora do tema", Utc::now()).await.unwrap();

    let alerts = repo.list_alerts(false, 10).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, "post_flag_threshold");
    assert_eq!(alerts[0].user_id, Some(ana));

    let flags = repo.list_flags(Some(FlagStatus::Pending), 50).await.unwrap();
    assert_eq!(flags.len(), 4);
    assert_eq!(flags.iter().filter(|f| f.reporter_id == reporters[0]).count(), 1);
    assert_eq!(flags[0].post_title, "Polêmico");
}

#[tokio::test]
async fn reviewing_flags_and_resolving_alerts() {
    let repo = repo().await;
    let admin = member(&repo, "admin").await;
    let ana = member(&repo, "ana").await;
    let post_id = publish(&repo, ana, "memes", "Post", Duration::zero()).await;
    repo.upsert_flag(post_id, admin, "teste de flag", Utc::now()).await.unwrap();
    let flag = repo.list_flags(None, 10).await.unwrap().remove(0);

    let review = FlagReview {
        status: FlagStatus::Dismissed,
        notes: Some("ok".into()),
        reviewer_id: admin,
        reviewed_at: Utc::now(),
    };
    assert!(repo.review_flag(flag.id, &review).await.unwrap());
    assert!(!repo.review_flag(Uuid::now_v7(), &review).await.unwrap());

    let reviewed = repo.list_flags(Some(FlagStatus::Dismissed), 10).await.unwrap();
    assert_eq!(reviewed[0].reviewer_id, Some(admin));
    assert!(reviewed[0].reviewed_at.is_some());

    assert!(!repo.resolve_alert(Uuid::now_v7(), admin, Utc::now()).await.unwrap());

    let action = ModerationAction {
        actor_id: admin,
        target_type: "post",
        target_id: post_id,
        action: "remove_post".into(),
        reason: None,
        created_at: Utc::now(),
    };
    assert!(repo.set_post_deleted(post_id, true, &action).await.unwrap());
    let detail = repo.get_post_detail(post_id, None).await.unwrap().unwrap();
    assert!(detail.is_deleted);
    let feed = FeedFilters::default().resolve(None, Utc::now());
    assert_eq!(repo.query_feed(&feed).await.unwrap().total, Some(0));
}

#[tokio::test]
async fn tag_search_ranks_by_usage() {
    let repo = repo().await;
    let ana = member(&repo, "ana").await;
    let p1 = publish(&repo, ana, "cultivo", "Um", Duration::zero()).await;
    let p2 = publish(&repo, ana, "cultivo", "Dois", Duration::zero()).await;

    let tags = repo
        .upsert_tags(&["led-full-spectrum".to_string(), "ledger".to_string(), "solo".to_string()])
        .await
        .unwrap();
    assert_eq!(tags[0].label, "led full spectrum");

    repo.link_tags(p1, &[tags[0].id, tags[1].id]).await.unwrap();
    repo.link_tags(p2, &[tags[1].id]).await.unwrap();
    repo.link_tags(p2, &[tags[1].id]).await.unwrap();

    let found = repo.search_tags("LED", 8).await.unwrap();
    let slugs: Vec<&str> = found.iter().map(|t| t.slug.as_str()).collect();
    assert_eq!(slugs, vec!["ledger", "led-full-spectrum"]);
    assert_eq!(found[0].usage_count, 2);

    let popular = repo.search_tags("  ", 2).await.unwrap();
    assert_eq!(popular.len(), 2);
    assert_eq!(popular[0].slug, "ledger");
}

#[tokio::test]
async fn leaderboard_sums_recent_xp() {
    let repo = repo().await;
    let ana = member(&repo, "ana").await;
    let bia = member(&repo, "bia").await;
    publish(&repo, ana, "memes", "A", Duration::zero()).await;
    publish(&repo, bia, "memes", "B", Duration::zero()).await;
    publish(&repo, bia, "memes", "C", Duration::zero()).await;

    let board = repo
        .weekly_leaderboard(Utc::now() - Duration::days(7), 10)
        .await
        .unwrap();
    assert_eq!(board.len(), 2);
    assert_eq!((board[0].username.as_str(), board[0].xp_gain, board[0].rank), ("bia", 10, 1));
    assert_eq!((board[1].user_id, board[1].rank), (ana, 2));

    let future = repo.weekly_leaderboard(Utc::now() + Duration::days(1), 10).await.unwrap();
    assert!(future.is_empty());
}

#[tokio::test]
async fn privacy_and_recent_posts() {
    let repo = repo().await;
    let ana = member(&repo, "ana").await;
    publish(&repo, ana, "memes", "Velho", Duration::hours(3)).await;
    publish(&repo, ana, "memes", "Novo", Duration::hours(1)).await;

    let settings = PrivacySettings {
        pseudonymous: true,
        share_activity: false,
        email_notifications: true,
    };
    repo.update_privacy(ana, settings, Utc::now()).await.unwrap();
    let profile = repo.get_profile(ana).await.unwrap().unwrap();
    assert!(profile.email_notifications);
    assert!(!profile.share_activity);

    let recent = repo.recent_posts_by(ana, None, 1).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].title, "Novo");
}

#[tokio::test]
async fn score_refresh_rewrites_cached_column() {
    let repo = repo().await;
    let ana = member(&repo, "ana").await;
    let bia = member(&repo, "bia").await;
    let post_id = publish(&repo, ana, "cultivo", "Velho", Duration::days(10)).await;
    repo.apply_vote(VoteTarget::Post(post_id), bia, VoteChange::Insert(VoteValue::Up), Utc::now())
        .await
        .unwrap();

    let touched = repo.refresh_popularity_scores(Utc::now() + Duration::days(30)).await.unwrap();
    assert_eq!(touched, 1);
    let post = repo.get_post(post_id).await.unwrap().unwrap();
    assert!(post.popularity_score > 0.0 && post.popularity_score < 0.1);
}

#[tokio::test]
async fn credentials_and_audit_rows() {
    let repo = repo().await;
    let user_id = repo
        .create_credentials("ana@example.com", "$argon2id$fake", Utc::now())
        .await
        .unwrap();
    let found = repo.find_credentials("ana@example.com").await.unwrap().unwrap();
    assert_eq!(found.user_id, user_id);
    assert!(repo.find_credentials("bia@example.com").await.unwrap().is_none());
    let duplicate = repo
        .create_credentials("ana@example.com", "$argon2id$other", Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(
        duplicate.downcast_ref::<AppError>(),
        Some(AppError::Conflict(_))
    ));

    repo.record(Some(user_id), "post_created", serde_json::json!({"title": "x"}), Utc::now())
        .await
        .unwrap();
    let row = sqlx::query("SELECT action, metadata FROM audit_logs")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(row.get::<String, _>("action"), "post_created");
}

#[tokio::test]
async fn taken_usernames_surface_as_conflicts() {
    let repo = repo().await;
    member(&repo, "ana").await;
    let onboarding = OnboardingProfile {
        username: "ana".into(),
        avatar_url: None,
        persona: Persona::Curioso,
        anonymous_mode: false,
    };
    let error = repo
        .upsert_onboarding(Uuid::now_v7(), &onboarding, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(error.downcast_ref::<AppError>(), Some(AppError::Conflict(_))));
}

#[tokio::test]
async fn set_admin_flags_existing_profiles_only() {
    let repo = repo().await;
    let ana = member(&repo, "ana").await;
    assert!(repo.set_admin(ana, true).await.unwrap());
    assert!(repo.get_profile(ana).await.unwrap().unwrap().is_admin);
    assert!(!repo.set_admin(Uuid::now_v7(), true).await.unwrap());
}
