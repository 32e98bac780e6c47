//! MongoDB-backed stats store.
//!
//! Counters are bumped with `$inc` and the recent-message window with a capped
//! `$push`, so concurrent deliveries for the same group do not lose updates.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, doc, Document};
use mongodb::options::ReturnDocument;
use mongodb::Collection;
use tracing::{debug, info};

use crate::database::models::{
    GeneratedImage, GroupCounter, GroupDocument, GroupRecord, MemberActivity, MemberRecord,
    StickerRecord, StickerUse, StoredMessage, RECENT_MESSAGE_CAP,
};
use crate::database::store::StatsStore;
use crate::database::Database;

/// Stats store over the `groups`, `members`, `stickers` and `images` collections.
pub struct StatsRepository {
    db: Arc<Database>,
}

impl StatsRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    async fn groups(&self) -> Result<Collection<GroupDocument>> {
        self.db.collection("groups").await
    }

    async fn members(&self) -> Result<Collection<MemberRecord>> {
        self.db.collection("members").await
    }

    async fn stickers(&self) -> Result<Collection<StickerRecord>> {
        self.db.collection("stickers").await
    }

    async fn images(&self) -> Result<Collection<GeneratedImage>> {
        self.db.collection("images").await
    }

    /// Persist zeroes for counters an older record lacks, then return the patched view.
    async fn backfill(&self, document: GroupDocument) -> Result<GroupRecord> {
        let missing = document.missing_counters();
        if !missing.is_empty() {
            let mut patch = Document::new();
            for field in &missing {
                patch.insert(*field, 0_i64);
            }

            self.groups()
                .await?
                .update_one(doc! { "group_id": document.group_id }, doc! { "$set": patch })
                .await?;

            info!(
                "Backfilled counters {:?} for group {}",
                missing, document.group_id
            );
        }

        Ok(document.into_record())
    }
}

#[async_trait]
impl StatsStore for StatsRepository {
    async fn ping(&self) -> Result<()> {
        self.db.ping().await
    }

    async fn get_or_create_group(&self, group_id: i64, title: &str) -> Result<GroupRecord> {
        let now = chrono::Utc::now().timestamp();
        let mut fresh = bson::to_document(&GroupDocument::from(GroupRecord::new(
            group_id, title, now,
        )))?;
        // Supplied by the equality filter on insert
        fresh.remove("group_id");

        let document = self
            .groups()
            .await?
            .find_one_and_update(doc! { "group_id": group_id }, doc! { "$setOnInsert": fresh })
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await?
            .with_context(|| format!("upsert of group {} returned no document", group_id))?;

        self.backfill(document).await
    }

    async fn get_group(&self, group_id: i64) -> Result<Option<GroupRecord>> {
        let document = self
            .groups()
            .await?
            .find_one(doc! { "group_id": group_id })
            .await?;

        match document {
            Some(document) => Ok(Some(self.backfill(document).await?)),
            None => Ok(None),
        }
    }

    async fn increment_group_counter(
        &self,
        group_id: i64,
        counter: GroupCounter,
    ) -> Result<Option<i64>> {
        let mut inc = Document::new();
        inc.insert(counter.field(), 1_i64);

        let updated = self
            .groups()
            .await?
            .find_one_and_update(doc! { "group_id": group_id }, doc! { "$inc": inc })
            .return_document(ReturnDocument::After)
            .await?;

        debug!("Incremented {} for group {}", counter.field(), group_id);
        Ok(updated.map(|d| counter.value(&d.into_record())))
    }

    async fn set_last_image_at(&self, group_id: i64, message_count: i64) -> Result<()> {
        self.groups()
            .await?
            .update_one(
                doc! { "group_id": group_id },
                doc! { "$set": { "last_image_at": message_count } },
            )
            .await?;
        Ok(())
    }

    async fn upsert_member(&self, group_id: i64, activity: &MemberActivity) -> Result<()> {
        self.members()
            .await?
            .update_one(
                doc! { "group_id": group_id, "user_id": activity.user_id },
                member_update(activity),
            )
            .upsert(true)
            .await?;

        debug!(
            "Upserted member {} in group {} ({:?})",
            activity.user_id, group_id, activity.kind
        );
        Ok(())
    }

    async fn append_recent_message(
        &self,
        group_id: i64,
        user_id: i64,
        message: StoredMessage,
    ) -> Result<()> {
        let entry = bson::to_bson(&message)?;
        let keep = -(RECENT_MESSAGE_CAP as i64);

        self.members()
            .await?
            .update_one(
                doc! { "group_id": group_id, "user_id": user_id },
                doc! {
                    "$push": {
                        "recent_messages": {
                            "$each": [entry],
                            "$slice": keep,
                        }
                    }
                },
            )
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn increment_member_link_count(&self, group_id: i64, user_id: i64) -> Result<()> {
        self.members()
            .await?
            .update_one(
                doc! { "group_id": group_id, "user_id": user_id },
                doc! { "$inc": { "link_count": 1_i64 } },
            )
            .await?;
        Ok(())
    }

    async fn list_members(&self, group_id: i64) -> Result<Vec<MemberRecord>> {
        let members: Vec<MemberRecord> = self
            .members()
            .await?
            .find(doc! { "group_id": group_id })
            .sort(doc! { "message_count": -1 })
            .await?
            .try_collect()
            .await?;
        Ok(members)
    }

    async fn recent_messages(
        &self,
        group_id: i64,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        let member = self
            .members()
            .await?
            .find_one(doc! { "group_id": group_id, "user_id": user_id })
            .await?;

        Ok(member
            .map(|m| tail(m.recent_messages, limit))
            .unwrap_or_default())
    }

    async fn upsert_sticker(&self, group_id: i64, usage: &StickerUse) -> Result<()> {
        self.stickers()
            .await?
            .update_one(
                doc! { "group_id": group_id, "file_unique_id": &usage.file_unique_id },
                sticker_update(usage),
            )
            .upsert(true)
            .await?;

        debug!("Recorded sticker {} in group {}", usage.file_unique_id, group_id);
        Ok(())
    }

    async fn top_stickers(&self, group_id: i64, limit: usize) -> Result<Vec<StickerRecord>> {
        let stickers: Vec<StickerRecord> = self
            .stickers()
            .await?
            .find(doc! { "group_id": group_id })
            .sort(doc! { "count": -1 })
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .await?
            .try_collect()
            .await?;
        Ok(stickers)
    }

    async fn insert_image(&self, image: &GeneratedImage) -> Result<()> {
        self.images().await?.insert_one(image).await?;
        Ok(())
    }

    async fn list_images(&self, group_id: i64, limit: usize) -> Result<Vec<GeneratedImage>> {
        let images: Vec<GeneratedImage> = self
            .images()
            .await?
            .find(doc! { "group_id": group_id })
            .sort(doc! { "generated_at": -1 })
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .await?
            .try_collect()
            .await?;
        Ok(images)
    }
}

/// Member upsert: bump `message_count` plus the per-kind counter. Absent
/// profile fields keep whatever is stored.
fn member_update(activity: &MemberActivity) -> Document {
    let mut inc = doc! { "message_count": 1_i64 };
    if let Some(field) = activity.kind.counter_field() {
        inc.insert(field, 1_i64);
    }

    let mut set = doc! {
        "last_message": &activity.text,
        "last_active_at": activity.at,
    };
    if let Some(username) = &activity.username {
        set.insert("username", username);
    }
    if let Some(first_name) = &activity.first_name {
        set.insert("first_name", first_name);
    }

    doc! { "$inc": inc, "$set": set }
}

/// Sticker upsert with the same merge-on-absence rule.
fn sticker_update(usage: &StickerUse) -> Document {
    let mut set = doc! {
        "last_used_at": usage.at,
        "last_used_by": usage.user_id,
    };
    if let Some(file_id) = &usage.file_id {
        set.insert("file_id", file_id);
    }
    if let Some(emoji) = &usage.emoji {
        set.insert("emoji", emoji);
    }
    if let Some(set_name) = &usage.set_name {
        set.insert("set_name", set_name);
    }

    doc! { "$inc": { "count": 1_i64 }, "$set": set }
}

/// Keep the last `limit` items.
pub(crate) fn tail<T>(mut items: Vec<T>, limit: usize) -> Vec<T> {
    if items.len() > limit {
        items.drain(..items.len() - limit);
    }
    items
}
