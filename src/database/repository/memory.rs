//! In-process store.
//!
//! Used when no `MONGODB_URI` is configured and by the test suite. Mirrors the
//! MongoDB semantics: upserts, merge-on-absence, capped windows and the
//! per-read counter backfill. Nothing survives a restart.

use std::cmp::Reverse;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::database::models::{
    AiSettings, AiSettingsUpdate, GeneratedImage, GlobalSettings, GroupCounter, GroupDocument,
    GroupRecord, MemberActivity, MemberRecord, StickerRecord, StickerUse, StoredMessage,
    DEFAULT_THRESHOLD,
};
use crate::database::store::{SettingsRepository, StatsStore};

use super::stats_repository::tail;

#[derive(Default)]
pub struct MemoryStore {
    groups: DashMap<i64, GroupDocument>,
    members: DashMap<(i64, i64), MemberRecord>,
    stickers: DashMap<(i64, String), StickerRecord>,
    images: RwLock<Vec<GeneratedImage>>,
    settings: RwLock<GlobalSettings>,
    backfill_writes: AtomicUsize,
    /// Makes counter increments fail, to exercise store outages.
    #[cfg(test)]
    fail_counters: std::sync::atomic::AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of counter backfills written so far.
    pub fn backfill_writes(&self) -> usize {
        self.backfill_writes.load(Ordering::Relaxed)
    }

    /// Seed a raw group document, e.g. one predating newer counters.
    #[cfg(test)]
    pub fn insert_group_document(&self, document: GroupDocument) {
        self.groups.insert(document.group_id, document);
    }

    #[cfg(test)]
    pub fn fail_counter_writes(&self) {
        self.fail_counters.store(true, Ordering::Relaxed);
    }

    #[cfg(test)]
    pub fn member(&self, group_id: i64, user_id: i64) -> Option<MemberRecord> {
        self.members.get(&(group_id, user_id)).map(|m| m.clone())
    }

    #[cfg(test)]
    pub fn sticker(&self, group_id: i64, file_unique_id: &str) -> Option<StickerRecord> {
        self.stickers
            .get(&(group_id, file_unique_id.to_string()))
            .map(|s| s.clone())
    }

    fn backfill(&self, group_id: i64) -> Option<GroupRecord> {
        let mut document = self.groups.get_mut(&group_id)?;

        if !document.missing_counters().is_empty() {
            document.link_count.get_or_insert(0);
            document.photo_count.get_or_insert(0);
            document.sticker_count.get_or_insert(0);
            document.bot_mention_count.get_or_insert(0);
            self.backfill_writes.fetch_add(1, Ordering::Relaxed);
        }

        Some(document.clone().into_record())
    }
}

#[async_trait]
impl StatsStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn get_or_create_group(&self, group_id: i64, title: &str) -> Result<GroupRecord> {
        self.groups.entry(group_id).or_insert_with(|| {
            let now = chrono::Utc::now().timestamp();
            GroupDocument::from(GroupRecord::new(group_id, title, now))
        });

        self.backfill(group_id)
            .ok_or_else(|| anyhow::anyhow!("group {} vanished after insert", group_id))
    }

    async fn get_group(&self, group_id: i64) -> Result<Option<GroupRecord>> {
        Ok(self.backfill(group_id))
    }

    async fn increment_group_counter(
        &self,
        group_id: i64,
        counter: GroupCounter,
    ) -> Result<Option<i64>> {
        #[cfg(test)]
        if self.fail_counters.load(Ordering::Relaxed) {
            anyhow::bail!("store unavailable");
        }

        let Some(mut document) = self.groups.get_mut(&group_id) else {
            return Ok(None);
        };

        let mut record = document.clone().into_record();
        let value = counter.bump(&mut record);
        *document = GroupDocument::from(record);
        Ok(Some(value))
    }

    async fn set_last_image_at(&self, group_id: i64, message_count: i64) -> Result<()> {
        if let Some(mut document) = self.groups.get_mut(&group_id) {
            document.last_image_at = message_count;
        }
        Ok(())
    }

    async fn upsert_member(&self, group_id: i64, activity: &MemberActivity) -> Result<()> {
        self.members
            .entry((group_id, activity.user_id))
            .or_insert_with(|| MemberRecord::new(group_id, activity.user_id))
            .apply_activity(activity);
        Ok(())
    }

    async fn append_recent_message(
        &self,
        group_id: i64,
        user_id: i64,
        message: StoredMessage,
    ) -> Result<()> {
        self.members
            .entry((group_id, user_id))
            .or_insert_with(|| MemberRecord::new(group_id, user_id))
            .push_recent(message);
        Ok(())
    }

    async fn increment_member_link_count(&self, group_id: i64, user_id: i64) -> Result<()> {
        if let Some(mut member) = self.members.get_mut(&(group_id, user_id)) {
            member.link_count += 1;
        }
        Ok(())
    }

    async fn list_members(&self, group_id: i64) -> Result<Vec<MemberRecord>> {
        let mut members: Vec<MemberRecord> = self
            .members
            .iter()
            .filter(|entry| entry.key().0 == group_id)
            .map(|entry| entry.value().clone())
            .collect();

        // Ties fall back to user ID order
        members.sort_by_key(|m| (Reverse(m.message_count), m.user_id));
        Ok(members)
    }

    async fn recent_messages(
        &self,
        group_id: i64,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        Ok(self
            .members
            .get(&(group_id, user_id))
            .map(|m| tail(m.recent_messages.clone(), limit))
            .unwrap_or_default())
    }

    async fn upsert_sticker(&self, group_id: i64, usage: &StickerUse) -> Result<()> {
        self.stickers
            .entry((group_id, usage.file_unique_id.clone()))
            .or_insert_with(|| StickerRecord::new(group_id, &usage.file_unique_id))
            .apply_use(usage);
        Ok(())
    }

    async fn top_stickers(&self, group_id: i64, limit: usize) -> Result<Vec<StickerRecord>> {
        let mut stickers: Vec<StickerRecord> = self
            .stickers
            .iter()
            .filter(|entry| entry.key().0 == group_id)
            .map(|entry| entry.value().clone())
            .collect();

        stickers.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.file_unique_id.cmp(&b.file_unique_id))
        });
        stickers.truncate(limit);
        Ok(stickers)
    }

    async fn insert_image(&self, image: &GeneratedImage) -> Result<()> {
        self.images.write().push(image.clone());
        Ok(())
    }

    async fn list_images(&self, group_id: i64, limit: usize) -> Result<Vec<GeneratedImage>> {
        let mut images: Vec<GeneratedImage> = self
            .images
            .read()
            .iter()
            .filter(|image| image.group_id == group_id)
            .cloned()
            .collect();

        images.sort_by_key(|image| Reverse(image.generated_at));
        images.truncate(limit);
        Ok(images)
    }
}

#[async_trait]
impl SettingsRepository for MemoryStore {
    async fn global_threshold(&self) -> Result<i64> {
        let mut settings = self.settings.write();
        match settings.valid_threshold() {
            Some(threshold) => Ok(threshold),
            None => {
                settings.threshold = Some(DEFAULT_THRESHOLD);
                Ok(DEFAULT_THRESHOLD)
            }
        }
    }

    async fn set_global_threshold(&self, threshold: i64) -> Result<()> {
        self.settings.write().threshold = Some(threshold);
        Ok(())
    }

    async fn ai_settings(&self) -> Result<AiSettings> {
        Ok(self.settings.read().ai_settings())
    }

    async fn update_ai_settings(&self, update: &AiSettingsUpdate) -> Result<()> {
        self.settings.write().apply_ai_update(update);
        Ok(())
    }

    async fn last_restart_at(&self) -> Result<Option<i64>> {
        Ok(self.settings.read().last_restart_at)
    }

    async fn record_restart(&self, at: i64) -> Result<()> {
        self.settings.write().last_restart_at = Some(at);
        Ok(())
    }
}
