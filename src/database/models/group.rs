//! Group record model.

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Legacy per-group threshold written on creation. The live threshold is global.
pub const LEGACY_GROUP_THRESHOLD: i64 = 100;

/// Per-group aggregate counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Telegram chat ID
    pub group_id: i64,

    pub title: String,
    pub message_count: i64,
    pub link_count: i64,
    pub photo_count: i64,
    pub sticker_count: i64,
    pub bot_mention_count: i64,

    /// Message count at the last image generation.
    pub last_image_at: i64,

    /// Superseded by the global threshold; kept for older readers.
    pub threshold: i64,

    /// Unix timestamp (seconds)
    pub created_at: i64,
}

impl GroupRecord {
    pub fn new(group_id: i64, title: &str, now: i64) -> Self {
        Self {
            id: None,
            group_id,
            title: title.to_string(),
            message_count: 0,
            link_count: 0,
            photo_count: 0,
            sticker_count: 0,
            bot_mention_count: 0,
            last_image_at: 0,
            threshold: LEGACY_GROUP_THRESHOLD,
            created_at: now,
        }
    }
}

/// A group document as stored, tolerating records written before the
/// link/photo/sticker/bot-mention counters existed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub group_id: i64,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub message_count: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_count: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_count: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticker_count: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_mention_count: Option<i64>,

    #[serde(default)]
    pub last_image_at: i64,

    #[serde(default = "legacy_threshold")]
    pub threshold: i64,

    #[serde(default)]
    pub created_at: i64,
}

fn legacy_threshold() -> i64 {
    LEGACY_GROUP_THRESHOLD
}

impl GroupDocument {
    /// Counter fields absent from this document.
    pub fn missing_counters(&self) -> Vec<&'static str> {
        let fields = [
            (GroupCounter::Link, self.link_count),
            (GroupCounter::Photo, self.photo_count),
            (GroupCounter::Sticker, self.sticker_count),
            (GroupCounter::BotMention, self.bot_mention_count),
        ];

        fields
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(counter, _)| counter.field())
            .collect()
    }

    /// Zero-filled view of the document.
    pub fn into_record(self) -> GroupRecord {
        GroupRecord {
            id: self.id,
            group_id: self.group_id,
            title: self.title,
            message_count: self.message_count,
            link_count: self.link_count.unwrap_or(0),
            photo_count: self.photo_count.unwrap_or(0),
            sticker_count: self.sticker_count.unwrap_or(0),
            bot_mention_count: self.bot_mention_count.unwrap_or(0),
            last_image_at: self.last_image_at,
            threshold: self.threshold,
            created_at: self.created_at,
        }
    }
}

impl From<GroupRecord> for GroupDocument {
    fn from(record: GroupRecord) -> Self {
        Self {
            id: record.id,
            group_id: record.group_id,
            title: record.title,
            message_count: record.message_count,
            link_count: Some(record.link_count),
            photo_count: Some(record.photo_count),
            sticker_count: Some(record.sticker_count),
            bot_mention_count: Some(record.bot_mention_count),
            last_image_at: record.last_image_at,
            threshold: record.threshold,
            created_at: record.created_at,
        }
    }
}

/// Group-level counters that can be incremented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupCounter {
    Message,
    Link,
    Photo,
    Sticker,
    BotMention,
}

impl GroupCounter {
    /// Stored field name.
    pub fn field(self) -> &'static str {
        match self {
            Self::Message => "message_count",
            Self::Link => "link_count",
            Self::Photo => "photo_count",
            Self::Sticker => "sticker_count",
            Self::BotMention => "bot_mention_count",
        }
    }

    /// Current value on a record.
    pub fn value(self, record: &GroupRecord) -> i64 {
        match self {
            Self::Message => record.message_count,
            Self::Link => record.link_count,
            Self::Photo => record.photo_count,
            Self::Sticker => record.sticker_count,
            Self::BotMention => record.bot_mention_count,
        }
    }

    /// Increment this counter on an in-memory record, returning the new value.
    pub fn bump(self, record: &mut GroupRecord) -> i64 {
        let slot = match self {
            Self::Message => &mut record.message_count,
            Self::Link => &mut record.link_count,
            Self::Photo => &mut record.photo_count,
            Self::Sticker => &mut record.sticker_count,
            Self::BotMention => &mut record.bot_mention_count,
        };
        *slot += 1;
        *slot
    }
}
