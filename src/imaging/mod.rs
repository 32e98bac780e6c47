//! Pixel-art image generation for a group.
//!
//! Prompt from recent messages, one DALL-E image, public upload, then a
//! metadata record carrying the group's message-count snapshot. No retries.

mod keywords;
mod storage;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ai::{OPENAI_API_BASE, OPENAI_KEY_HINT};
use crate::database::{GeneratedImage, StatsStore};
use crate::error::require;

use keywords::pixel_art_prompt;
pub use storage::{GcsStorage, ObjectStorage, StorageError};

/// Produces image bytes for a prompt.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>>;
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'static str,
    prompt: &'a str,
    n: u8,
    size: &'static str,
    quality: &'static str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
}

/// DALL-E 3 over the OpenAI images API.
pub struct DalleGenerator {
    client: Client,
    api_key: Option<String>,
}

impl DalleGenerator {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl ImageGenerator for DalleGenerator {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>> {
        let api_key = require(self.api_key.as_deref(), "OPENAI_API_KEY", OPENAI_KEY_HINT)?;

        let request = ImageRequest {
            model: "dall-e-3",
            prompt,
            n: 1,
            size: "1024x1024",
            quality: "standard",
        };

        let response = self
            .client
            .post(format!("{}/images/generations", OPENAI_API_BASE))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send image generation request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Image generation failed: {} - {}", status, body);
        }

        let body: ImageResponse = response
            .json()
            .await
            .context("Failed to parse image generation response")?;
        let url = body
            .data
            .into_iter()
            .find_map(|d| d.url)
            .context("Image generation returned no URL")?;

        let bytes = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .context("Failed to download generated image")?
            .bytes()
            .await?;

        Ok(bytes.to_vec())
    }
}

pub struct ImagePipeline {
    generator: Arc<dyn ImageGenerator>,
    storage: Option<Arc<dyn ObjectStorage>>,
    store: Arc<dyn StatsStore>,
}

impl ImagePipeline {
    pub fn new(
        generator: Arc<dyn ImageGenerator>,
        storage: Option<Arc<dyn ObjectStorage>>,
        store: Arc<dyn StatsStore>,
    ) -> Self {
        Self {
            generator,
            storage,
            store,
        }
    }

    /// Generate, upload and record one image. Returns the public URL.
    pub async fn generate_pixel_art<S: AsRef<str> + Sync>(
        &self,
        group_id: i64,
        messages: &[S],
    ) -> Result<String> {
        let storage = self
            .storage
            .as_ref()
            .context("STORAGE_BUCKET is not configured. Set it to enable image uploads.")?;

        let prompt = pixel_art_prompt(messages);
        let bytes = self.generator.generate(&prompt).await?;

        let generated_at = chrono::Utc::now().timestamp_millis();
        let path = image_path(group_id, generated_at);
        let url = storage.upload_public(&path, bytes, "image/png").await?;

        match self.store.get_group(group_id).await? {
            Some(group) => {
                let image = GeneratedImage {
                    id: None,
                    group_id,
                    url: url.clone(),
                    prompt,
                    generated_at,
                    message_count_snapshot: group.message_count,
                };
                self.store.insert_image(&image).await?;
                self.store
                    .set_last_image_at(group_id, group.message_count)
                    .await?;
                info!("Generated image for group {}: {}", group_id, url);
            }
            None => warn!("Group {} not found, image record not saved", group_id),
        }

        Ok(url)
    }
}

pub fn image_path(group_id: i64, epoch_millis: i64) -> String {
    format!("groups/{}/images/{}.png", group_id, epoch_millis)
}
