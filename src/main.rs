mod bot;
mod classifier;
mod config;
mod dispatcher;
mod llm;
mod platform;
mod poller;
mod responder;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::ShinobuBot;
use crate::config::Config;
use crate::llm::LlmClient;
use crate::platform::telegram::TelegramPlatform;
use crate::responder::Responder;

#[tokio::main]
async fn main() -> Result<()> {
    // Secrets may come from a local .env during development
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,shinobu_bot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::var("SHINOBU_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    if config_path.exists() {
        info!("Loading configuration from: {}", config_path.display());
    } else {
        info!("No config file at {}, using defaults", config_path.display());
    }
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Model: {} ({})", config.llm.model, config.llm.provider);
    info!(
        "  Assets: {} sticker(s), {} voice(s), {} animation(s)",
        config.assets.stickers.len(),
        config.assets.voices.len(),
        config.assets.animations.len()
    );

    let platform = TelegramPlatform::new(&config.telegram)?;
    let llm = LlmClient::new(config.llm.clone(), &config.telegram.user_agent)?;
    let responder = Responder::new(llm, config.persona.clone(), config.assets.clone());

    info!("Shinobu Bot starting...");
    let bot = ShinobuBot::start(platform, responder, &config).await?;
    bot.run().await?;

    Ok(())
}
