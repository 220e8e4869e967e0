use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use telefit::adapters::telegram::{callback_endpoint, message_endpoint};
use telefit::adapters::{HttpImageAnalyzer, InMemoryPersistence, Persistence, TelegramTransport};
use telefit::bot::DialogRouter;
use telefit::config::{BotConfig, LogFormat};
use telefit::db::PgPersistence;
use telefit::session_store::{spawn_sweeper, SessionStore};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = BotConfig::from_env()?;
    init_tracing(config.log_format);

    info!("Starting Telefit Telegram Bot");

    let persistence: Arc<dyn Persistence> = match &config.database_url {
        Some(url) => {
            info!("Connecting to PostgreSQL");
            Arc::new(PgPersistence::connect(url).await?)
        }
        None => {
            info!("DATABASE_URL not set, keeping records in memory");
            Arc::new(InMemoryPersistence::new())
        }
    };

    let bot = Bot::new(config.telegram_bot_token.clone());
    let sessions = Arc::new(SessionStore::new());
    let _sweeper = spawn_sweeper(
        Arc::clone(&sessions),
        config.session.sweep_interval,
        config.session.idle_ttl,
    );

    let router = Arc::new(DialogRouter::new(
        Arc::new(TelegramTransport::new(
            bot.clone(),
            config.analysis.max_image_size,
        )),
        Arc::new(HttpImageAnalyzer::new(config.analysis.clone())),
        persistence,
        sessions,
    ));

    info!(endpoint = %config.analysis.endpoint, "Bot initialized, starting dispatcher");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(message_endpoint))
        .branch(Update::filter_callback_query().endpoint(callback_endpoint));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![router])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
