//! Runtime configuration and tracing setup for the Verde Forum binary.

mod logging;

pub use logging::init_tracing;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Placeholder secret; refused when `app_env` is production.
pub const DEV_SESSION_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_env: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: String,
    pub session_secret: SecretString,
    pub session_ttl_hours: i64,
    /// Absolute base used for links in the public listings
    pub site_url: String,
    /// Period of the cached score refresher; 0 disables it
    pub score_refresh_secs: u64,
    /// Directory served under `/static`
    pub static_dir: String,
    /// Account promoted to admin at startup, if it exists
    pub bootstrap_admin_email: Option<String>,
}

impl AppConfig {
    /// Reads `.env` (if present), then defaults overridden by environment
    /// variables. Nested keys use `__` as separator.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::build(config::Environment::default())
    }

    fn build(env: config::Environment) -> Result<Self, ConfigError> {
        let cfg = config::Config::builder()
            .set_default("app_env", "development")?
            .set_default("host", "127.0.0.1")?
            .set_default("port", 8080)?
            .set_default("log_level", "info")?
            .set_default("database_url", "sqlite:verde_forum.db")?
            .set_default("session_secret", DEV_SESSION_SECRET)?
            .set_default("session_ttl_hours", 720)?
            .set_default("site_url", "http://127.0.0.1:8080")?
            .set_default("score_refresh_secs", 300)?
            .set_default("static_dir", "static")?
            .add_source(env.separator("__"))
            .build()?;

        let config: Self = cfg.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.session_ttl_hours <= 0 {
            return Err(ConfigError::Invalid("session_ttl_hours must be positive".into()));
        }
        if self.is_production() && self.session_secret.expose_secret() == DEV_SESSION_SECRET {
            return Err(ConfigError::Invalid(
                "session_secret must be set in production".into(),
            ));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }

    /// `site_url` without a trailing slash.
    pub fn site_base(&self) -> &str {
        self.site_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> config::Environment {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::default().source(Some(map))
    }

    #[test]
    fn defaults_apply_without_environment() {
        let config = AppConfig::build(env(&[])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_url, "sqlite:verde_forum.db");
        assert_eq!(config.score_refresh_secs, 300);
        assert!(config.bootstrap_admin_email.is_none());
        assert!(!config.is_production());
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = AppConfig::build(env(&[
            ("PORT", "9090"),
            ("SITE_URL", "https://verde.example/"),
            ("BOOTSTRAP_ADMIN_EMAIL", "admin@verde.example"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.site_base(), "https://verde.example");
        assert_eq!(config.bootstrap_admin_email.as_deref(), Some("admin@verde.example"));
    }

    #[test]
    fn production_requires_a_real_secret() {
        let result = AppConfig::build(env(&[("APP_ENV", "production")]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let config = AppConfig::build(env(&[
            ("APP_ENV", "Production"),
            ("SESSION_SECRET", "a-long-random-secret"),
        ]))
        .unwrap();
        assert!(config.is_production());
    }
}
