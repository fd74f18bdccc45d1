//! # Verde Forum Binary
//!
//! The entry point that assembles the application based on compile-time features.

use std::sync::Arc;
use std::time::Duration;

use actix_files::Files;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use chrono::Utc;
use secrecy::ExposeSecret;
use vf_api::middleware::{cors_policy, security_headers, standard_middleware};
use vf_api::{configure_routes, AppState, Ports};
use vf_config::AppConfig;
use vf_core::traits::{CredentialRepo, ForumRepo};

// Feature-gated imports: the storage and auth plugins are picked at build time
#[cfg(feature = "db-sqlite")]
use vf_db_sqlite::SqliteForumRepo;

#[cfg(feature = "auth-simple")]
use vf_auth_simple::SimpleAuthProvider;

#[cfg(not(all(feature = "db-sqlite", feature = "auth-simple")))]
compile_error!("verde-forum needs the `db-sqlite` and `auth-simple` features");

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    vf_config::init_tracing(&config)?;

    // 1. Initialize Database Implementation
    let repo = Arc::new(
        SqliteForumRepo::new(&config.database_url)
            .await
            .context("failed to open the SQLite store")?,
    );

    // 2. Initialize Auth Implementation
    let auth = SimpleAuthProvider::new(
        config.session_secret.expose_secret(),
        chrono::Duration::hours(config.session_ttl_hours),
    )?;

    if let Some(email) = config.bootstrap_admin_email.as_deref() {
        bootstrap_admin(&repo, email).await;
    }
    spawn_score_refresher(repo.clone(), config.score_refresh_secs);

    // 3. Wrap in AppState (dynamic dispatch over the ports)
    let ports = Ports {
        forum: repo.clone(),
        profiles: repo.clone(),
        moderation: repo.clone(),
        credentials: repo.clone(),
        audit: repo,
        auth: Arc::new(auth),
    };
    let state = web::Data::new(AppState::new(ports, config.site_base()));
    let static_dir = config.static_dir.clone();

    let (host, port) = config.bind_addr();
    tracing::info!(%host, port, env = %config.app_env, "Verde Forum starting");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(security_headers())
            .wrap(cors_policy())
            .wrap(standard_middleware())
            .configure(configure_routes)
            .service(Files::new("/static", &static_dir))
    })
    .bind((host, port))?
    .run()
    .await?;

    Ok(())
}

/// Grants admin to the account registered under `email`, once it has a profile.
async fn bootstrap_admin(repo: &SqliteForumRepo, email: &str) {
    let email = email.trim().to_lowercase();
    let credentials = match repo.find_credentials(&email).await {
        Ok(Some(credentials)) => credentials,
        Ok(None) => {
            tracing::warn!(%email, "bootstrap admin has no account yet");
            return;
        }
        Err(error) => {
            tracing::error!(scope = "bootstrap_admin", error = %error, "credential lookup failed");
            return;
        }
    };

    match repo.set_admin(credentials.user_id, true).await {
        Ok(true) => tracing::info!(user_id = %credentials.user_id, "bootstrap admin granted"),
        Ok(false) => tracing::warn!(%email, "bootstrap admin has not completed onboarding"),
        Err(error) => tracing::error!(scope = "bootstrap_admin", error = %error, "failed to grant admin"),
    }
}

/// Periodically rewrites the cached popularity scores. `0` disables it.
fn spawn_score_refresher(forum: Arc<dyn ForumRepo>, every_secs: u64) {
    if every_secs == 0 {
        tracing::info!("score refresher disabled");
        return;
    }

    actix_web::rt::spawn(async move {
        let mut ticker = actix_web::rt::time::interval(Duration::from_secs(every_secs));
        loop {
            ticker.tick().await;
            match forum.refresh_popularity_scores(Utc::now()).await {
                Ok(rows) => tracing::debug!(rows, "popularity scores refreshed"),
                Err(error) => tracing::warn!(error = %error, "popularity score refresh failed"),
            }
        }
    });
}
