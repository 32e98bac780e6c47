//! Hosted OpenAI chat completions backend.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::error;

use super::prompt::{clean_user_message, finish_reply, system_prompt};
use super::{AiError, AiHealth, ReplyBackend};
use crate::database::{AiProvider, AiSettings};
use crate::error::{require, MissingSecret};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

pub(crate) const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub(crate) const KEY_HINT: &str = "Set OPENAI_API_KEY in the environment or .env.";

const SERVICE: &str = "OpenAI";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

pub struct OpenAiBackend {
    client: Client,
    api_key: Option<String>,
}

impl OpenAiBackend {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }

    fn api_key(&self) -> Result<&str, MissingSecret> {
        require(self.api_key.as_deref(), "OPENAI_API_KEY", KEY_HINT)
    }
}

fn status_error(status: StatusCode, body: &str) -> AiError {
    match status {
        StatusCode::UNAUTHORIZED => AiError::InvalidKey,
        StatusCode::TOO_MANY_REQUESTS => AiError::RateLimited,
        StatusCode::INTERNAL_SERVER_ERROR => AiError::Unavailable,
        _ => {
            let message = serde_json::from_str::<ErrorEnvelope>(body)
                .ok()
                .and_then(|e| e.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            AiError::Api(message)
        }
    }
}

fn first_content(response: ChatResponse) -> Option<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
}

#[async_trait]
impl ReplyBackend for OpenAiBackend {
    fn provider(&self) -> AiProvider {
        AiProvider::OpenAi
    }

    async fn generate_reply(&self, user_text: &str, settings: &AiSettings) -> Result<String, AiError> {
        let api_key = self.api_key()?;
        let cleaned = clean_user_message(user_text);

        let request = ChatRequest {
            model: settings.model.as_deref().unwrap_or(DEFAULT_OPENAI_MODEL),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt(settings),
                },
                ChatMessage {
                    role: "user",
                    content: &cleaned,
                },
            ],
            temperature: 0.7,
            max_tokens: 500,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", OPENAI_API_BASE))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("OpenAI request failed: {}", e);
                AiError::Unreachable(SERVICE, "Check the network connection.")
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("OpenAI API error: {} - {}", status, body);
            return Err(status_error(status, &body));
        }

        let body: ChatResponse = response.json().await.map_err(|e| {
            error!("OpenAI response was not JSON: {}", e);
            AiError::Format(SERVICE, "invalid JSON")
        })?;

        first_content(body)
            .map(|text| finish_reply(&text))
            .ok_or(AiError::Format(SERVICE, "missing choices or message"))
    }

    async fn check_health(&self, settings: &AiSettings) -> AiHealth {
        let api_key = match self.api_key() {
            Ok(key) => key,
            Err(e) => return AiHealth::unhealthy(e.to_string()),
        };

        let response = match self
            .client
            .get(format!("{}/models", OPENAI_API_BASE))
            .bearer_auth(api_key)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                error!("OpenAI health check failed: {}", e);
                return AiHealth::unhealthy(
                    "Could not reach the OpenAI service. Check the network connection.",
                );
            }
        };

        match response.status() {
            StatusCode::UNAUTHORIZED => AiHealth::unhealthy(AiError::InvalidKey.to_string()),
            StatusCode::TOO_MANY_REQUESTS => AiHealth::unhealthy(AiError::RateLimited.to_string()),
            status if !status.is_success() => {
                AiHealth::unhealthy(format!("OpenAI API connection failed: {}", status))
            }
            _ => AiHealth {
                healthy: true,
                message: "OpenAI service is up".to_string(),
                models: None,
                model: Some(
                    settings
                        .model
                        .clone()
                        .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(status_error(StatusCode::UNAUTHORIZED, ""), AiError::InvalidKey));
        assert!(matches!(status_error(StatusCode::TOO_MANY_REQUESTS, ""), AiError::RateLimited));
        assert!(matches!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR, ""),
            AiError::Unavailable
        ));

        let body = json!({ "error": { "message": "model not found" } }).to_string();
        assert_eq!(
            status_error(StatusCode::NOT_FOUND, &body).to_string(),
            "OpenAI API error: model not found"
        );
        assert_eq!(
            status_error(StatusCode::BAD_REQUEST, "oops").to_string(),
            "OpenAI API error: HTTP 400"
        );
    }

    #[test]
    fn test_first_content() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [{ "message": { "role": "assistant", "content": "hey" } }]
        }))
        .unwrap();
        assert_eq!(first_content(response).as_deref(), Some("hey"));

        let empty: ChatResponse = serde_json::from_value(json!({})).unwrap();
        assert!(first_content(empty).is_none());
    }

    #[tokio::test]
    async fn test_missing_key() {
        let backend = OpenAiBackend::new(Client::new(), None);
        let err = backend
            .generate_reply("hi", &AiSettings::default())
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("OPENAI_API_KEY is not configured"));

        let health = backend.check_health(&AiSettings::default()).await;
        assert!(!health.healthy);
        assert!(health.model.is_none());
    }
}
