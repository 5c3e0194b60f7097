use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use speakmate::bot::{Bot, BotDeps};
use speakmate::channels::{Channel, CliChannel, TelegramChannel};
use speakmate::config::{BotConfig, ChannelKind};
use speakmate::matching::RandomPicker;
use speakmate::store::{LibSqlBackend, ProfileStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = BotConfig::from_env().context("Invalid configuration")?;

    // Initialize tracing: stderr plus a daily-rolling file.
    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("Failed to create log dir {}", config.log_dir.display()))?;
    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "speakmate.log");
    let (file_writer, _log_guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    eprintln!("🗣  speakmate v{}", env!("CARGO_PKG_VERSION"));

    // ── Database ─────────────────────────────────────────────────────────
    let store: Arc<dyn ProfileStore> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?,
    );
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Logs: {}", config.log_dir.display());

    // ── Channel ──────────────────────────────────────────────────────────
    let channel: Arc<dyn Channel> = match (config.channel, &config.telegram) {
        (ChannelKind::Telegram, Some(telegram)) => {
            eprintln!(
                "   Telegram: enabled (allowed: {})",
                if telegram.allowed_users.iter().any(|u| u == "*") {
                    "everyone".to_string()
                } else {
                    telegram.allowed_users.join(", ")
                }
            );
            Arc::new(TelegramChannel::new(
                telegram.bot_token.clone(),
                telegram.allowed_users.clone(),
            ))
        }
        (ChannelKind::Telegram, None) => {
            anyhow::bail!("TELEGRAM_BOT_TOKEN is required for the telegram channel")
        }
        (ChannelKind::Cli, _) => {
            eprintln!("   CLI: type a message and press Enter. Ctrl+D to exit.");
            Arc::new(CliChannel::new())
        }
    };
    eprintln!("   Pacing: {} ms\n", config.pacing.as_millis());

    let deps = BotDeps {
        store,
        channel,
        picker: Arc::new(RandomPicker),
    };

    let bot = Arc::new(Bot::new(deps, config.pacing));
    bot.run().await.context("Bot stopped with an error")?;

    Ok(())
}
