//! Hao87bot - Telegram group activity counter
//!
//! Counts messages, links, photos and stickers per group and member, and
//! answers mentions with an AI-generated reply.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `database` - Stores (MongoDB or in-process) and record types
//! - `cache` - Small Moka caches
//! - `telegram` - Update types and the outbound Bot API transport
//! - `ai` - Ollama / OpenAI reply gateway
//! - `imaging` - Pixel-art generation and object storage
//! - `bot` - Dispatcher, HTTP routes and runtime
//! - `plugins` - Command handlers
//! - `events` - Membership, mention and activity handlers
//! - `utils` - Text helpers

mod ai;
mod bot;
mod cache;
mod config;
mod database;
mod error;
mod events;
mod imaging;
mod plugins;
mod telegram;
mod utils;

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ai::{AiGateway, OllamaBackend, OpenAiBackend};
use bot::AppState;
use config::Config;
use database::{Database, MemoryStore, MongoSettingsRepository, SettingsRepository, StatsRepository, StatsStore};
use imaging::{DalleGenerator, GcsStorage, ImagePipeline, ObjectStorage};
use telegram::TelegramTransport;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("hao87bot=info,teloxide=warn,tower_http=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    info!("Starting Hao87bot...");

    let config = Config::from_env();
    info!("Configuration loaded");

    let (store, settings): (Arc<dyn StatsStore>, Arc<dyn SettingsRepository>) =
        match config.mongodb_uri.as_deref() {
            Some(uri) => {
                // Connects lazily on first use
                let db = Arc::new(Database::new(uri, &config.mongodb_database));
                info!("Using MongoDB database '{}'", config.mongodb_database);
                (
                    Arc::new(StatsRepository::new(db.clone())),
                    Arc::new(MongoSettingsRepository::new(db)),
                )
            }
            None => {
                warn!("MONGODB_URI not set, using the in-memory store (nothing is persisted)");
                let memory = Arc::new(MemoryStore::new());
                (memory.clone(), memory)
            }
        };

    if let Err(e) = settings.record_restart(chrono::Utc::now().timestamp()).await {
        warn!("Failed to record restart time: {:#}", e);
    }

    // One HTTP client shared by every outbound integration
    let http = reqwest::Client::new();

    let transport = Arc::new(TelegramTransport::new(&config));
    match transport.bot() {
        Some(_) => info!("Bot initialized with rate limiting (Throttle)"),
        None => warn!("TELEGRAM_BOT_TOKEN not set, replies will fail"),
    }

    let ai = Arc::new(AiGateway::new(
        settings.clone(),
        Arc::new(OllamaBackend::new(http.clone(), config.ollama_url.clone())),
        Arc::new(OpenAiBackend::new(http.clone(), config.openai_api_key.clone())),
    ));

    let storage: Option<Arc<dyn ObjectStorage>> = config.storage_bucket.clone().map(|bucket| {
        Arc::new(GcsStorage::new(
            http.clone(),
            bucket,
            config.storage_access_token.clone(),
        )) as Arc<dyn ObjectStorage>
    });

    let images = Arc::new(ImagePipeline::new(
        Arc::new(DalleGenerator::new(http.clone(), config.openai_api_key.clone())),
        storage.clone(),
        store.clone(),
    ));

    let state = AppState {
        config: Arc::new(config),
        store,
        settings,
        transport: transport.clone(),
        ai,
        images,
        storage,
    };

    bot::run(state, &transport).await
}
