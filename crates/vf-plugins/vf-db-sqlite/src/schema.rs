//! Table definitions, applied in order on startup.
//!
//! UUIDs are stored as 16-byte BLOBs and timestamps as Unix milliseconds so
//! range filters compare numerically.

pub(crate) const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS profiles (
        id                  BLOB PRIMARY KEY,
        username            TEXT NOT NULL UNIQUE,
        avatar_url          TEXT,
        bio                 TEXT,
        persona             TEXT,
        xp                  INTEGER NOT NULL DEFAULT 0,
        level               TEXT NOT NULL DEFAULT 'Iniciante',
        pseudonymous        INTEGER NOT NULL DEFAULT 0,
        share_activity      INTEGER NOT NULL DEFAULT 1,
        email_notifications INTEGER NOT NULL DEFAULT 0,
        onboarding_completed INTEGER NOT NULL DEFAULT 0,
        moderation_status   TEXT NOT NULL DEFAULT 'active',
        is_admin            INTEGER NOT NULL DEFAULT 0,
        created_at          INTEGER NOT NULL,
        updated_at          INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS credentials (
        user_id       BLOB PRIMARY KEY,
        email         TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        created_at    INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        slug        TEXT NOT NULL UNIQUE,
        label       TEXT NOT NULL,
        description TEXT,
        icon        TEXT,
        created_at  INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS posts (
        id               BLOB PRIMARY KEY,
        author_id        BLOB NOT NULL REFERENCES profiles(id),
        category_id      INTEGER NOT NULL REFERENCES categories(id),
        title            TEXT NOT NULL,
        content          TEXT,
        media_type       TEXT,
        is_pinned        INTEGER NOT NULL DEFAULT 0,
        is_deleted       INTEGER NOT NULL DEFAULT 0,
        upvotes_count    INTEGER NOT NULL DEFAULT 0,
        downvotes_count  INTEGER NOT NULL DEFAULT 0,
        comments_count   INTEGER NOT NULL DEFAULT 0,
        popularity_score REAL NOT NULL DEFAULT 0,
        created_at       INTEGER NOT NULL,
        updated_at       INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_posts_score ON posts(popularity_score DESC, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id, created_at DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS post_votes (
        post_id    BLOB NOT NULL REFERENCES posts(id),
        user_id    BLOB NOT NULL,
        value      INTEGER NOT NULL CHECK (value IN (1, -1)),
        created_at INTEGER NOT NULL,
        PRIMARY KEY (post_id, user_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS comments (
        id                BLOB PRIMARY KEY,
        post_id           BLOB NOT NULL REFERENCES posts(id),
        author_id         BLOB NOT NULL,
        parent_comment_id BLOB REFERENCES comments(id),
        depth             INTEGER NOT NULL DEFAULT 0 CHECK (depth BETWEEN 0 AND 1),
        body              TEXT NOT NULL,
        upvotes_count     INTEGER NOT NULL DEFAULT 0,
        downvotes_count   INTEGER NOT NULL DEFAULT 0,
        is_deleted        INTEGER NOT NULL DEFAULT 0,
        created_at        INTEGER NOT NULL,
        updated_at        INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS comment_votes (
        comment_id BLOB NOT NULL REFERENCES comments(id),
        user_id    BLOB NOT NULL,
        value      INTEGER NOT NULL CHECK (value IN (1, -1)),
        created_at INTEGER NOT NULL,
        PRIMARY KEY (comment_id, user_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tags (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        slug        TEXT NOT NULL UNIQUE,
        label       TEXT NOT NULL,
        usage_count INTEGER NOT NULL DEFAULT 0,
        created_at  INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS post_tags (
        post_id    BLOB NOT NULL REFERENCES posts(id),
        tag_id     INTEGER NOT NULL REFERENCES tags(id),
        created_at INTEGER NOT NULL,
        PRIMARY KEY (post_id, tag_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS post_flags (
        id               BLOB PRIMARY KEY,
        post_id          BLOB NOT NULL REFERENCES posts(id),
        reporter_id      BLOB NOT NULL,
        reason           TEXT NOT NULL,
        status           TEXT NOT NULL DEFAULT 'pending',
        created_at       INTEGER NOT NULL,
        reviewed_at      INTEGER,
        reviewer_id      BLOB,
        resolution_notes TEXT,
        UNIQUE (post_id, reporter_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS moderation_alerts (
        id          BLOB PRIMARY KEY,
        user_id     BLOB,
        post_id     BLOB,
        alert_type  TEXT NOT NULL,
        severity    TEXT NOT NULL DEFAULT 'medium',
        metadata    TEXT NOT NULL DEFAULT '{}',
        created_at  INTEGER NOT NULL,
        resolved_at INTEGER,
        resolved_by BLOB
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS moderation_actions (
        id          BLOB PRIMARY KEY,
        actor_id    BLOB,
        target_type TEXT NOT NULL,
        target_id   BLOB NOT NULL,
        action      TEXT NOT NULL,
        reason      TEXT,
        created_at  INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_badges (
        user_id    BLOB NOT NULL,
        badge_code TEXT NOT NULL,
        awarded_at INTEGER NOT NULL,
        PRIMARY KEY (user_id, badge_code)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS xp_history (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id    BLOB NOT NULL,
        delta      INTEGER NOT NULL,
        source     TEXT NOT NULL,
        ref_key    TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        UNIQUE (user_id, source, ref_key)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_xp_history_created ON xp_history(created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS audit_logs (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id    BLOB,
        action     TEXT NOT NULL,
        metadata   TEXT NOT NULL DEFAULT '{}',
        created_at INTEGER NOT NULL
    )
    "#,
];

/// Categories every fresh database starts with: (slug, label, icon).
pub(crate) const DEFAULT_CATEGORIES: &[(&str, &str, &str)] = &[
    ("experiencias", "Experiências", "🌿"),
    ("cultivo", "Cultivo", "🌱"),
    ("reducao-de-danos", "Redução de Danos", "🛟"),
    ("memes", "Memes", "😂"),
];
