pub mod accounts;
pub mod api;
pub mod config;
pub mod core_state;
pub mod crypto;
pub mod db;
pub mod directory;
pub mod fleet;
pub mod models;
pub mod tracker;
pub mod workflow;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::core_state::CoreState;

/// How often the buffered audit trail is written out.
const AUDIT_FLUSH_INTERVAL: Duration = Duration::from_secs(60);

/// Start the service and block until Ctrl-C.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = config::AppConfig::from_env()?;
    let bind_addr = config.bind_addr;
    let core = Arc::new(CoreState::new(config));
    core.init_storage()?;
    bootstrap_admin(&core)?;

    let flusher = {
        let core = core.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(AUDIT_FLUSH_INTERVAL);
            loop {
                interval.tick().await;
                if let Err(e) = core.flush_and_prune_audit() {
                    tracing::warn!("Audit flush failed: {e}");
                }
            }
        })
    };

    let server = api::start_server_on(core.clone(), bind_addr).await?;
    tracing::info!(addr = %server.addr, "Listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    server.stop().await;
    flusher.abort();

    let flushed = core.flush_and_prune_audit()?;
    tracing::info!(flushed, "Audit trail flushed");
    Ok(())
}

fn bootstrap_admin(core: &CoreState) -> Result<(), Box<dyn std::error::Error>> {
    let (Some(email), Some(password)) = (&core.config.admin_email, &core.config.admin_password) else {
        return Ok(());
    };
    let conn = core.open_db()?;
    if accounts::ensure_admin(&conn, email, password, chrono::Utc::now())? {
        tracing::info!(%email, "Bootstrap administrator created");
    }
    Ok(())
}
