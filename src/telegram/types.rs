//! Inbound Telegram update types.
//!
//! Only the fields the dispatcher reads. Everything is optional so that an
//! unexpected payload shape degrades to "ignored" instead of a 4xx.

use serde::{Deserialize, Serialize};

/// Telegram Update object (simplified)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Update {
    #[serde(default)]
    pub update_id: i64,
    pub message: Option<Message>,
    pub my_chat_member: Option<ChatMemberUpdated>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Message {
    #[serde(default)]
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub date: i64,
    pub text: Option<String>,
    pub caption: Option<String>,
    /// All sizes of the photo, smallest first.
    pub photo: Option<Vec<PhotoSize>>,
    pub sticker: Option<Sticker>,
    pub entities: Option<Vec<MessageEntity>>,
    pub caption_entities: Option<Vec<MessageEntity>>,
}

impl Message {
    pub fn trimmed_text(&self) -> &str {
        self.text.as_deref().map(str::trim).unwrap_or_default()
    }

    /// Text, falling back to the caption.
    pub fn text_or_caption(&self) -> &str {
        self.text
            .as_deref()
            .or(self.caption.as_deref())
            .unwrap_or_default()
    }

    pub fn has_photo(&self) -> bool {
        self.photo.as_ref().is_some_and(|sizes| !sizes.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Chat {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub title: Option<String>,
}

impl Chat {
    pub fn is_group(&self) -> bool {
        matches!(self.kind.as_str(), "group" | "supergroup")
    }

    pub fn is_private(&self) -> bool {
        self.kind == "private"
    }

    pub fn title_or_default(&self) -> &str {
        self.title.as_deref().unwrap_or("Unknown Group")
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub file_unique_id: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Sticker {
    pub file_id: Option<String>,
    pub file_unique_id: Option<String>,
    pub emoji: Option<String>,
    pub set_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub length: i64,
}

impl MessageEntity {
    pub fn is_link(&self) -> bool {
        matches!(self.kind.as_str(), "url" | "text_link")
    }

    pub fn is_bot_command(&self) -> bool {
        self.kind == "bot_command"
    }
}

/// The bot's own membership changed in a chat.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChatMemberUpdated {
    pub chat: Chat,
    pub new_chat_member: ChatMember,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChatMember {
    #[serde(default)]
    pub status: String,
}
