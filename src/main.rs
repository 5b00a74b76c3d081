mod admission;
mod aggregate;
mod cache;
mod config;
mod error;
mod format;
mod platform;
mod providers;
mod scheduler;
mod server;
#[cfg(test)]
mod test_support;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::Bot;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::admission::AdmissionFilter;
use crate::aggregate::Aggregator;
use crate::config::Config;
use crate::platform::telegram::{register_webhook, TelegramReplier};
use crate::providers::Providers;
use crate::scheduler::Scheduler;
use crate::server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,grumpybot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Token contract: {}", config.charity.token_contract);
    info!("  Cache TTL: {}s", config.cache.ttl_secs);
    info!("  Upstream timeout: {}s", config.upstream.timeout_secs);

    let bot = Bot::new(&config.telegram.bot_token);
    if let Some(url) = &config.telegram.webhook_url {
        if let Err(e) = register_webhook(&bot, url, &config.server.public_key_path).await {
            warn!("Webhook registration failed: {:#}", e);
        }
    }

    let providers = Providers::from_config(&config)?;
    let state = Arc::new(AppState {
        filter: AdmissionFilter::from_config(&config.admission),
        aggregator: Aggregator::new(providers, config.charity.clone(), config.cache.ttl()),
        replier: Arc::new(TelegramReplier::new(bot)),
        public_key_path: config.server.public_key_path.clone(),
    });

    let mut scheduler = Scheduler::new().await?;
    scheduler::tasks::register_builtin_tasks(&scheduler, state.clone()).await?;
    scheduler.start().await?;

    server::serve(state, &config.server).await?;

    scheduler.shutdown().await?;
    Ok(())
}
