use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

use crate::AppConfig;

/// Installs the global subscriber: JSON lines in production, compact text
/// otherwise. `log` records (actix-web's `Logger`) are captured as well.
pub fn init_tracing(config: &AppConfig) -> Result<()> {
    let filter =
        EnvFilter::try_new(config.log_level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.is_production() {
        fmt()
            .with_env_filter(filter)
            .json()
            .with_target(false)
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;
    }

    Ok(())
}
