//! Self-hosted Ollama backend reached through an ngrok tunnel.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use super::prompt::{clean_user_message, finish_reply, system_prompt};
use super::{AiError, AiHealth, ReplyBackend};
use crate::database::{AiProvider, AiSettings};
use crate::error::{require, MissingSecret};

pub const DEFAULT_OLLAMA_MODEL: &str = "qwen3:8b";

const SERVICE: &str = "Ollama";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; hao87bot/3.0)";
const SKIP_WARNING_HEADER: &str = "ngrok-skip-browser-warning";
const URL_HINT: &str = "Set NGROK_OLLAMA_URL to the public tunnel URL of the Ollama server.";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

pub struct OllamaBackend {
    client: Client,
    base_url: Option<String>,
}

impl OllamaBackend {
    pub fn new(client: Client, base_url: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    fn base_url(&self) -> Result<&str, MissingSecret> {
        require(self.base_url.as_deref(), "NGROK_OLLAMA_URL", URL_HINT)
    }

    /// Prime ngrok's interstitial cookie. Failures are irrelevant.
    async fn preflight(&self, base_url: &str) {
        if let Err(e) = self
            .client
            .get(base_url)
            .header(SKIP_WARNING_HEADER, "true")
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
        {
            warn!("Ollama preflight failed (ignored): {}", e);
        }
    }
}

/// Prompt sent to `/api/generate`: system prompt, blank line, cleaned message.
fn build_prompt(user_text: &str, settings: &AiSettings) -> String {
    format!(
        "{}\n\n{}",
        system_prompt(settings),
        clean_user_message(user_text)
    )
}

fn is_ngrok_interstitial(body: &str) -> bool {
    body.contains("ngrok") || body.contains("browser warning") || body.contains("Visit Site")
}

fn status_error(status: StatusCode, body: &str, base_url: &str) -> AiError {
    if status == StatusCode::FORBIDDEN {
        if is_ngrok_interstitial(body) {
            return AiError::NgrokInterstitial {
                base_url: base_url.to_string(),
            };
        }
        return AiError::Forbidden(body.chars().take(200).collect());
    }
    AiError::Status {
        service: SERVICE,
        status,
    }
}

#[async_trait]
impl ReplyBackend for OllamaBackend {
    fn provider(&self) -> AiProvider {
        AiProvider::Ollama
    }

    async fn generate_reply(&self, user_text: &str, settings: &AiSettings) -> Result<String, AiError> {
        let base_url = self.base_url()?;
        self.preflight(base_url).await;

        let request = GenerateRequest {
            model: settings.model.as_deref().unwrap_or(DEFAULT_OLLAMA_MODEL),
            prompt: build_prompt(user_text, settings),
            stream: false,
            options: GenerateOptions {
                temperature: 0.7,
                top_p: 0.9,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", base_url))
            .header(SKIP_WARNING_HEADER, "true")
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Ollama request failed: {}", e);
                AiError::Unreachable(SERVICE, "Check that the ngrok tunnel is running.")
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(1000).collect();
            error!("Ollama API error: {} - {}", status, preview);
            return Err(status_error(status, &body, base_url));
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            error!("Ollama response was not JSON: {}", e);
            AiError::Format(SERVICE, "invalid JSON")
        })?;

        reply_text(body)
    }

    async fn check_health(&self, _settings: &AiSettings) -> AiHealth {
        let base_url = match self.base_url() {
            Ok(url) => url,
            Err(e) => return AiHealth::unhealthy(e.to_string()),
        };

        let response = self
            .client
            .get(format!("{}/api/tags", base_url))
            .header(SKIP_WARNING_HEADER, "true")
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                error!("Ollama health check failed: {}", e);
                return AiHealth::unhealthy(
                    "Could not reach the Ollama service. Check that the ngrok tunnel is running.",
                );
            }
        };

        if !response.status().is_success() {
            return AiHealth::unhealthy(format!(
                "Ollama API connection failed: {}",
                response.status()
            ));
        }

        match response.json::<TagsResponse>().await {
            Ok(tags) => AiHealth {
                healthy: true,
                message: "Ollama service is up".to_string(),
                models: Some(tags.models.into_iter().map(|m| m.name).collect()),
                model: None,
            },
            Err(e) => AiHealth::unhealthy(format!("Ollama health check failed: {}", e)),
        }
    }
}

/// Blank output counts as a missing reply.
fn reply_text(body: GenerateResponse) -> Result<String, AiError> {
    match body.response.filter(|text| !text.trim().is_empty()) {
        Some(text) => Ok(finish_reply(&text)),
        None => {
            warn!("Ollama response has no `response` text");
            Err(AiError::Format(SERVICE, "missing `response` field"))
        }
    }
}
