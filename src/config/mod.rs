//! Configuration module for Hao87bot.
//!
//! Loads configuration from environment variables. Secrets are optional here:
//! a missing secret only fails the operation that needs it.

use std::env;
use std::net::SocketAddr;

use tracing::warn;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub bot_token: Option<String>,
    /// Bot username (without @). Fetched via getMe when not set.
    pub bot_username: Option<String>,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,

    /// Address the HTTP server binds to.
    pub listen_addr: SocketAddr,

    // MongoDB
    pub mongodb_uri: Option<String>,
    pub mongodb_database: String,

    // AI backends
    pub openai_api_key: Option<String>,
    pub ollama_url: Option<String>,

    // Object storage
    pub storage_bucket: Option<String>,
    pub storage_access_token: Option<String>,

    /// Public stats page base URL, linked from `/show`.
    pub stats_base_url: Option<String>,

    /// Bearer key guarding `/api/*`. Admin routes are disabled when unset.
    pub admin_api_key: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty strings count as unset
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bot_username = var("BOT_USERNAME")
            .map(|s| s.trim_start_matches('@').to_string())
            .filter(|s| !s.is_empty());

        let mut listen_addr = match var("LISTEN_ADDR") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!("Invalid LISTEN_ADDR '{}', using {}", raw, DEFAULT_LISTEN_ADDR);
                default_listen_addr()
            }),
            None => default_listen_addr(),
        };
        if let Some(port) = var("PORT").and_then(|p| p.parse::<u16>().ok()) {
            listen_addr.set_port(port);
        }

        Self {
            bot_token: var("TELEGRAM_BOT_TOKEN").or_else(|| var("BOT_TOKEN")),
            bot_username,
            webhook_url: var("WEBHOOK_URL"),
            webhook_secret: var("WEBHOOK_SECRET"),
            listen_addr,
            mongodb_uri: var("MONGODB_URI"),
            mongodb_database: var("MONGODB_DATABASE").unwrap_or_else(|| "hao87bot".to_string()),
            openai_api_key: var("OPENAI_API_KEY"),
            ollama_url: var("NGROK_OLLAMA_URL"),
            storage_bucket: var("STORAGE_BUCKET"),
            storage_access_token: var("STORAGE_ACCESS_TOKEN"),
            stats_base_url: var("STATS_BASE_URL").map(|u| u.trim_end_matches('/').to_string()),
            admin_api_key: var("ADMIN_API_KEY"),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults_when_empty() {
        let config = config_from(&[]);
        assert!(config.bot_token.is_none());
        assert!(config.mongodb_uri.is_none());
        assert_eq!(config.mongodb_database, "hao87bot");
        assert_eq!(config.listen_addr.to_string(), DEFAULT_LISTEN_ADDR);
    }

    #[test]
    fn test_empty_values_are_unset() {
        let config = config_from(&[("OPENAI_API_KEY", "  "), ("NGROK_OLLAMA_URL", "")]);
        assert!(config.openai_api_key.is_none());
        assert!(config.ollama_url.is_none());
    }

    #[test]
    fn test_bot_token_fallback_and_username_strip() {
        let config = config_from(&[("BOT_TOKEN", "123:abc"), ("BOT_USERNAME", "@hao87bot")]);
        assert_eq!(config.bot_token.as_deref(), Some("123:abc"));
        assert_eq!(config.bot_username.as_deref(), Some("hao87bot"));
    }

    #[test]
    fn test_port_overrides_listen_addr() {
        let config = config_from(&[("LISTEN_ADDR", "not an addr"), ("PORT", "9090")]);
        assert_eq!(config.listen_addr.port(), 9090);
    }

    #[test]
    fn test_stats_base_url_trailing_slash() {
        let config = config_from(&[("STATS_BASE_URL", "https://stats.example/")]);
        assert_eq!(config.stats_base_url.as_deref(), Some("https://stats.example"));
    }
}
