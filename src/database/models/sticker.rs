//! Sticker usage model.

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Per-(group, sticker) usage counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StickerRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub group_id: i64,

    /// Stable across bots and time.
    pub file_unique_id: String,

    /// Transient download reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_name: Option<String>,

    #[serde(default)]
    pub count: i64,

    #[serde(default)]
    pub last_used_at: i64,

    #[serde(default)]
    pub last_used_by: i64,
}

/// One observed use of a sticker.
#[derive(Debug, Clone)]
pub struct StickerUse {
    pub file_unique_id: String,
    pub file_id: Option<String>,
    pub emoji: Option<String>,
    pub set_name: Option<String>,
    pub user_id: i64,
    pub at: i64,
}

impl StickerRecord {
    pub fn new(group_id: i64, file_unique_id: &str) -> Self {
        Self {
            id: None,
            group_id,
            file_unique_id: file_unique_id.to_string(),
            file_id: None,
            emoji: None,
            set_name: None,
            count: 0,
            last_used_at: 0,
            last_used_by: 0,
        }
    }

    /// Count a use. Absent optional fields keep their stored values.
    pub fn apply_use(&mut self, usage: &StickerUse) {
        self.count += 1;
        self.last_used_at = usage.at;
        self.last_used_by = usage.user_id;

        if usage.file_id.is_some() {
            self.file_id = usage.file_id.clone();
        }
        if usage.emoji.is_some() {
            self.emoji = usage.emoji.clone();
        }
        if usage.set_name.is_some() {
            self.set_name = usage.set_name.clone();
        }
    }
}
