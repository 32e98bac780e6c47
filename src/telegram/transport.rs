//! Outbound Telegram Bot API calls.

use anyhow::Context;
use async_trait::async_trait;
use teloxide::adaptors::throttle::Limits;
use teloxide::adaptors::Throttle;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::cache::{CacheConfig, TypedCache};
use crate::config::Config;

/// Bot type with Throttle adaptor for automatic rate limiting.
pub type ThrottledBot = Throttle<Bot>;

const IDENTITY_KEY: &str = "username";

/// File lookup failures, mapped to distinct HTTP statuses by the sticker endpoint.
#[derive(Debug, Error)]
pub enum FileUrlError {
    #[error("TELEGRAM_BOT_TOKEN is not configured")]
    MissingToken,
    #[error("Telegram file lookup failed: {0}")]
    Lookup(String),
}

/// The chat operations the dispatcher and HTTP layer need.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send an HTML-formatted message. Fails on any non-success response.
    async fn send_message(&self, chat_id: i64, html: &str) -> anyhow::Result<()>;

    /// The bot's username without `@`. Never fails; `None` when unknown.
    async fn bot_username(&self) -> Option<String>;

    /// Download URL for a file. The URL embeds the token and expires upstream.
    async fn file_url(&self, file_id: &str) -> Result<String, FileUrlError>;
}

/// teloxide-backed transport.
pub struct TelegramTransport {
    bot: Option<ThrottledBot>,
    token: Option<String>,
    configured_username: Option<String>,
    identity: TypedCache<&'static str, String>,
}

impl TelegramTransport {
    /// Build the transport. Without a token every call fails or yields `None`.
    pub fn new(config: &Config) -> Self {
        // Telegram limits: 30 msg/s globally, 20 msg/min per group
        let bot = config
            .bot_token
            .as_ref()
            .map(|token| Bot::new(token).throttle(Limits::default()));

        Self {
            bot,
            token: config.bot_token.clone(),
            configured_username: config.bot_username.clone(),
            identity: TypedCache::new("bot_identity", CacheConfig::bot_identity()),
        }
    }

    pub fn bot(&self) -> Option<&ThrottledBot> {
        self.bot.as_ref()
    }

    fn require_bot(&self) -> anyhow::Result<&ThrottledBot> {
        self.bot
            .as_ref()
            .context("TELEGRAM_BOT_TOKEN is not configured. Set it in the environment or .env")
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_message(&self, chat_id: i64, html: &str) -> anyhow::Result<()> {
        let bot = self.require_bot()?;

        bot.send_message(ChatId(chat_id), html)
            .parse_mode(ParseMode::Html)
            .await
            .map_err(|e| {
                error!("sendMessage to {} failed: {}", chat_id, e);
                anyhow::anyhow!("Telegram API error: {}", e)
            })?;

        debug!("Sent message to {}", chat_id);
        Ok(())
    }

    async fn bot_username(&self) -> Option<String> {
        if let Some(username) = &self.configured_username {
            return Some(username.clone());
        }
        if let Some(username) = self.identity.get(&IDENTITY_KEY) {
            return Some(username);
        }

        let bot = self.bot.as_ref()?;
        match bot.get_me().await {
            Ok(me) => {
                let username = me.user.username.clone()?;
                self.identity.insert(IDENTITY_KEY, username.clone());
                Some(username)
            }
            Err(e) => {
                warn!("getMe failed: {}", e);
                None
            }
        }
    }

    async fn file_url(&self, file_id: &str) -> Result<String, FileUrlError> {
        let (Some(bot), Some(token)) = (self.bot.as_ref(), self.token.as_deref()) else {
            return Err(FileUrlError::MissingToken);
        };

        let file = bot
            .get_file(file_id.to_string())
            .await
            .map_err(|e| FileUrlError::Lookup(e.to_string()))?;

        Ok(file_download_url(token, &file.path))
    }
}

fn file_download_url(token: &str, path: &str) -> String {
    format!("https://api.telegram.org/file/bot{}/{}", token, path)
}
