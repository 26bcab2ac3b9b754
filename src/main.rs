use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use slotbook::config::AppConfig;
use slotbook::db;
use slotbook::routes;
use slotbook::services::auth;
use slotbook::services::notify::webhook::WebhookNotifier;
use slotbook::services::notify::{NoopNotifier, Notifier};
use slotbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    if config.admin_token == "changeme" {
        tracing::warn!("ADMIN_TOKEN is the default value, set it before exposing the server");
    }

    let conn = db::init_db(&config.database_url)
        .with_context(|| format!("failed to open database at {}", config.database_url))?;

    let cutoff =
        chrono::Utc::now().naive_utc() - chrono::Duration::days(config.change_log_retention_days);
    let pruned = db::queries::prune_changes_before(&conn, &cutoff)
        .context("failed to prune change log")?;
    if pruned > 0 {
        tracing::info!(pruned, "old change log rows removed");
    }

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        auth::ensure_admin(&conn, email, password).context("failed to create bootstrap admin")?;
    }

    let notifier: Box<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => {
            tracing::info!("booking notifications go to {url}");
            Box::new(WebhookNotifier::new(url.clone()))
        }
        None => {
            tracing::info!("no NOTIFY_WEBHOOK_URL set, booking notifications disabled");
            Box::new(NoopNotifier)
        }
    };

    let addr = format!("0.0.0.0:{}", config.port);
    let state = Arc::new(AppState::new(conn, config, notifier));
    let app = routes::app(state);

    tracing::info!("starting server on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
