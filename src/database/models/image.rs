//! Generated image model.

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Metadata of one generated image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub group_id: i64,
    pub url: String,
    pub prompt: String,

    /// Unix timestamp (milliseconds)
    pub generated_at: i64,

    /// Group message count when the image was generated.
    pub message_count_snapshot: i64,
}
