//! Global settings singleton.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Document ID of the singleton.
pub const GLOBAL_SETTINGS_ID: &str = "global";

/// Activation threshold used when none is stored.
pub const DEFAULT_THRESHOLD: i64 = 100;

/// Text-generation backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    /// Self-hosted model behind a tunnel
    #[default]
    Ollama,
    #[serde(rename = "openai")]
    OpenAi,
}

impl AiProvider {
    /// Parse a stored provider name. Unknown names select the default.
    pub fn from_stored(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("openai") => Self::OpenAi,
            _ => Self::Ollama,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
        }
    }
}

impl fmt::Display for AiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw `settings/global` document. Every field may be missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalSettings {
    #[serde(rename = "_id", default)]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_provider: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_system_prompt: Option<String>,

    /// Unix timestamp (seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_restart_at: Option<i64>,
}

impl GlobalSettings {
    /// Stored threshold, if it is a usable value.
    pub fn valid_threshold(&self) -> Option<i64> {
        self.threshold.filter(|t| *t >= 1)
    }

    /// AI settings with each field defaulted independently.
    pub fn ai_settings(&self) -> AiSettings {
        AiSettings {
            provider: AiProvider::from_stored(self.ai_provider.as_deref()),
            model: non_empty(self.ai_model.as_deref()),
            system_prompt: non_empty(self.ai_system_prompt.as_deref()),
        }
    }

    /// Merge a partial AI settings update.
    pub fn apply_ai_update(&mut self, update: &AiSettingsUpdate) {
        if let Some(provider) = update.provider {
            self.ai_provider = Some(provider.as_str().to_string());
        }
        if let Some(model) = &update.model {
            self.ai_model = Some(model.clone());
        }
        if let Some(prompt) = &update.system_prompt {
            self.ai_system_prompt = Some(prompt.clone());
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Effective AI configuration. `None` means "use the backend's default".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AiSettings {
    pub provider: AiProvider,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
}

/// Partial AI settings update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AiSettingsUpdate {
    #[serde(default)]
    pub provider: Option<AiProvider>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
}
