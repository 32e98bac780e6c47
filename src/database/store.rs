//! Store interfaces.
//!
//! Handlers depend on these traits, not on a concrete backend. Every method is
//! a single document operation; nothing spans documents transactionally.

use anyhow::Result;
use async_trait::async_trait;

use super::models::{
    AiSettings, AiSettingsUpdate, GeneratedImage, GroupCounter, GroupRecord, MemberActivity,
    MemberRecord, StickerRecord, StickerUse, StoredMessage,
};

/// Group, member, sticker and image records.
#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Check connectivity.
    async fn ping(&self) -> Result<()>;

    /// Fetch a group, creating it with zeroed counters if absent.
    async fn get_or_create_group(&self, group_id: i64, title: &str) -> Result<GroupRecord>;

    /// Fetch a group. Counter fields missing from older records are
    /// written back as zero before returning.
    async fn get_group(&self, group_id: i64) -> Result<Option<GroupRecord>>;

    /// Increment one group counter. Returns the new value, or `None` if the
    /// group does not exist.
    async fn increment_group_counter(
        &self,
        group_id: i64,
        counter: GroupCounter,
    ) -> Result<Option<i64>>;

    /// Record the watermark of the last generated image.
    async fn set_last_image_at(&self, group_id: i64, message_count: i64) -> Result<()>;

    /// Create or update a member's aggregate counters for one activity.
    async fn upsert_member(&self, group_id: i64, activity: &MemberActivity) -> Result<()>;

    /// Append to a member's recent-message window, keeping the newest 100.
    async fn append_recent_message(
        &self,
        group_id: i64,
        user_id: i64,
        message: StoredMessage,
    ) -> Result<()>;

    /// Bump only the member's link counter.
    async fn increment_member_link_count(&self, group_id: i64, user_id: i64) -> Result<()>;

    /// Members ordered by message count, descending.
    async fn list_members(&self, group_id: i64) -> Result<Vec<MemberRecord>>;

    /// Last `limit` entries of a member's window, oldest first.
    async fn recent_messages(
        &self,
        group_id: i64,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<StoredMessage>>;

    /// Create or update a sticker usage record.
    async fn upsert_sticker(&self, group_id: i64, usage: &StickerUse) -> Result<()>;

    /// Most used stickers, descending.
    async fn top_stickers(&self, group_id: i64, limit: usize) -> Result<Vec<StickerRecord>>;

    async fn insert_image(&self, image: &GeneratedImage) -> Result<()>;

    /// Newest images first.
    async fn list_images(&self, group_id: i64, limit: usize) -> Result<Vec<GeneratedImage>>;
}

/// The global settings singleton.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Activation threshold. Writes the default back when unset.
    async fn global_threshold(&self) -> Result<i64>;

    async fn set_global_threshold(&self, threshold: i64) -> Result<()>;

    async fn ai_settings(&self) -> Result<AiSettings>;

    async fn update_ai_settings(&self, update: &AiSettingsUpdate) -> Result<()>;

    async fn last_restart_at(&self) -> Result<Option<i64>>;

    async fn record_restart(&self, at: i64) -> Result<()>;
}
