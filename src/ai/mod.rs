//! Text-generation gateway.
//!
//! Two interchangeable backends behind [`ReplyBackend`]. [`AiGateway`] picks
//! one per call from the stored provider setting.

mod error;
mod ollama;
mod openai;
pub mod prompt;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error};

use crate::database::{AiProvider, AiSettings, SettingsRepository};

pub use error::AiError;
pub use ollama::OllamaBackend;
pub(crate) use openai::{KEY_HINT as OPENAI_KEY_HINT, OPENAI_API_BASE};
pub use openai::OpenAiBackend;

/// Result of a backend health probe.
#[derive(Debug, Clone, Serialize)]
pub struct AiHealth {
    pub healthy: bool,
    pub message: String,
    /// Models the backend serves (Ollama).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<String>>,
    /// Model in use (OpenAI).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl AiHealth {
    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: message.into(),
            models: None,
            model: None,
        }
    }
}

#[async_trait]
pub trait ReplyBackend: Send + Sync {
    fn provider(&self) -> AiProvider;

    /// One completion for a chat message. The result is capped in length.
    async fn generate_reply(&self, user_text: &str, settings: &AiSettings) -> Result<String, AiError>;

    async fn check_health(&self, settings: &AiSettings) -> AiHealth;
}

/// Provider-agnostic entry point.
pub struct AiGateway {
    settings: Arc<dyn SettingsRepository>,
    ollama: Arc<dyn ReplyBackend>,
    openai: Arc<dyn ReplyBackend>,
}

impl AiGateway {
    pub fn new(
        settings: Arc<dyn SettingsRepository>,
        ollama: Arc<dyn ReplyBackend>,
        openai: Arc<dyn ReplyBackend>,
    ) -> Self {
        Self {
            settings,
            ollama,
            openai,
        }
    }

    /// Stored AI settings; a failed read falls back to defaults.
    async fn current_settings(&self) -> AiSettings {
        match self.settings.ai_settings().await {
            Ok(settings) => settings,
            Err(e) => {
                error!("Failed to load AI settings, using defaults: {:#}", e);
                AiSettings::default()
            }
        }
    }

    fn backend(&self, provider: AiProvider) -> &dyn ReplyBackend {
        match provider {
            AiProvider::Ollama => self.ollama.as_ref(),
            AiProvider::OpenAi => self.openai.as_ref(),
        }
    }

    pub async fn generate_reply(&self, user_text: &str) -> Result<String, AiError> {
        let settings = self.current_settings().await;
        let backend = self.backend(settings.provider);
        debug!("Generating reply via {}", backend.provider());
        backend.generate_reply(user_text, &settings).await
    }

    /// Health of the currently selected backend.
    pub async fn check_health(&self) -> (AiProvider, AiHealth) {
        let settings = self.current_settings().await;
        let health = self.backend(settings.provider).check_health(&settings).await;
        (settings.provider, health)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use parking_lot::Mutex;

    use super::*;

    /// Backend that answers with a fixed reply and records its inputs.
    pub struct StubBackend {
        provider: AiProvider,
        reply: Result<String, String>,
        pub calls: Mutex<Vec<(String, AiSettings)>>,
    }

    impl StubBackend {
        pub fn replying(provider: AiProvider, reply: &str) -> Arc<Self> {
            Arc::new(Self {
                provider,
                reply: Ok(reply.to_string()),
                calls: Mutex::new(Vec::new()),
            })
        }

        pub fn failing(provider: AiProvider, message: &str) -> Arc<Self> {
            Arc::new(Self {
                provider,
                reply: Err(message.to_string()),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ReplyBackend for StubBackend {
        fn provider(&self) -> AiProvider {
            self.provider
        }

        async fn generate_reply(
            &self,
            user_text: &str,
            settings: &AiSettings,
        ) -> Result<String, AiError> {
            self.calls
                .lock()
                .push((user_text.to_string(), settings.clone()));
            self.reply.clone().map_err(AiError::Api)
        }

        async fn check_health(&self, _settings: &AiSettings) -> AiHealth {
            AiHealth {
                healthy: self.reply.is_ok(),
                message: format!("{} stub", self.provider),
                models: None,
                model: None,
            }
        }
    }
}
