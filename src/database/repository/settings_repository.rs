//! MongoDB-backed global settings.
//!
//! The singleton lives at `settings/{_id: "global"}`; every write is a
//! merging `$set` so unrelated fields survive.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::Collection;
use tracing::{debug, info};

use crate::database::models::{
    AiSettings, AiSettingsUpdate, GlobalSettings, DEFAULT_THRESHOLD, GLOBAL_SETTINGS_ID,
};
use crate::database::store::SettingsRepository;
use crate::database::Database;

pub struct MongoSettingsRepository {
    db: Arc<Database>,
}

impl MongoSettingsRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    async fn collection(&self) -> Result<Collection<GlobalSettings>> {
        self.db.collection("settings").await
    }

    async fn load(&self) -> Result<GlobalSettings> {
        let settings = self
            .collection()
            .await?
            .find_one(doc! { "_id": GLOBAL_SETTINGS_ID })
            .await?;
        Ok(settings.unwrap_or_default())
    }

    async fn merge(&self, fields: Document) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }

        self.collection()
            .await?
            .update_one(doc! { "_id": GLOBAL_SETTINGS_ID }, doc! { "$set": fields })
            .upsert(true)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SettingsRepository for MongoSettingsRepository {
    async fn global_threshold(&self) -> Result<i64> {
        if let Some(threshold) = self.load().await?.valid_threshold() {
            return Ok(threshold);
        }

        self.merge(doc! { "threshold": DEFAULT_THRESHOLD }).await?;
        info!("Global threshold unset, wrote default {}", DEFAULT_THRESHOLD);
        Ok(DEFAULT_THRESHOLD)
    }

    async fn set_global_threshold(&self, threshold: i64) -> Result<()> {
        self.merge(doc! { "threshold": threshold }).await?;
        debug!("Global threshold set to {}", threshold);
        Ok(())
    }

    async fn ai_settings(&self) -> Result<AiSettings> {
        Ok(self.load().await?.ai_settings())
    }

    async fn update_ai_settings(&self, update: &AiSettingsUpdate) -> Result<()> {
        let mut fields = Document::new();
        if let Some(provider) = update.provider {
            fields.insert("ai_provider", provider.as_str());
        }
        if let Some(model) = &update.model {
            fields.insert("ai_model", model);
        }
        if let Some(prompt) = &update.system_prompt {
            fields.insert("ai_system_prompt", prompt);
        }
        self.merge(fields).await
    }

    async fn last_restart_at(&self) -> Result<Option<i64>> {
        Ok(self.load().await?.last_restart_at)
    }

    async fn record_restart(&self, at: i64) -> Result<()> {
        self.merge(doc! { "last_restart_at": at }).await
    }
}
