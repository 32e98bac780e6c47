//! Member record model and the recent-message window.

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Capacity of a member's recent-message window.
pub const RECENT_MESSAGE_CAP: usize = 100;

/// Content type of a counted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Photo,
    Sticker,
    Link,
}

impl MessageKind {
    /// Member counter bumped for this kind, besides `message_count`.
    pub fn counter_field(self) -> Option<&'static str> {
        match self {
            Self::Text => None,
            Self::Photo => Some("photo_count"),
            Self::Sticker => Some("sticker_count"),
            Self::Link => Some("link_count"),
        }
    }
}

/// One entry of the recent-message window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub text: String,
    /// Unix timestamp (seconds)
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

/// Per-(group, user) aggregate counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub group_id: i64,
    pub user_id: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(default)]
    pub message_count: i64,
    #[serde(default)]
    pub link_count: i64,
    #[serde(default)]
    pub photo_count: i64,
    #[serde(default)]
    pub sticker_count: i64,

    #[serde(default)]
    pub last_message: String,

    /// Oldest first, at most [`RECENT_MESSAGE_CAP`] entries.
    #[serde(default)]
    pub recent_messages: Vec<StoredMessage>,

    #[serde(default)]
    pub last_active_at: i64,
}

/// A classified message attributed to a member.
#[derive(Debug, Clone)]
pub struct MemberActivity {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub text: String,
    pub kind: MessageKind,
    pub at: i64,
}

impl MemberActivity {
    pub fn stored_message(&self) -> StoredMessage {
        StoredMessage {
            text: self.text.clone(),
            timestamp: self.at,
            kind: self.kind,
        }
    }
}

impl MemberRecord {
    pub fn new(group_id: i64, user_id: i64) -> Self {
        Self {
            id: None,
            group_id,
            user_id,
            username: None,
            first_name: None,
            message_count: 0,
            link_count: 0,
            photo_count: 0,
            sticker_count: 0,
            last_message: String::new(),
            recent_messages: Vec::new(),
            last_active_at: 0,
        }
    }

    /// Apply the aggregate part of an activity.
    ///
    /// Optional profile fields keep their stored value when the activity
    /// does not carry one.
    pub fn apply_activity(&mut self, activity: &MemberActivity) {
        if let Some(username) = &activity.username {
            self.username = Some(username.clone());
        }
        if let Some(first_name) = &activity.first_name {
            self.first_name = Some(first_name.clone());
        }

        self.message_count += 1;
        match activity.kind {
            MessageKind::Text => {}
            MessageKind::Photo => self.photo_count += 1,
            MessageKind::Sticker => self.sticker_count += 1,
            MessageKind::Link => self.link_count += 1,
        }

        self.last_message = activity.text.clone();
        self.last_active_at = activity.at;
    }

    /// Append to the recent-message window, evicting the oldest entries past the cap.
    pub fn push_recent(&mut self, message: StoredMessage) {
        self.recent_messages.push(message);
        if self.recent_messages.len() > RECENT_MESSAGE_CAP {
            let overflow = self.recent_messages.len() - RECENT_MESSAGE_CAP;
            self.recent_messages.drain(..overflow);
        }
    }

    /// Name shown in summaries.
    pub fn display_name(&self) -> String {
        self.first_name
            .clone()
            .or_else(|| self.username.clone())
            .unwrap_or_else(|| format!("User {}", self.user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(kind: MessageKind, username: Option<&str>) -> MemberActivity {
        MemberActivity {
            user_id: 7,
            username: username.map(str::to_string),
            first_name: Some("Amy".into()),
            text: "hi".into(),
            kind,
            at: 1_700_000_000,
        }
    }

    #[test]
    fn test_apply_activity_counts_one_type() {
        let mut member = MemberRecord::new(-1, 7);
        member.apply_activity(&activity(MessageKind::Link, Some("amy")));
        member.apply_activity(&activity(MessageKind::Text, None));

        assert_eq!(member.message_count, 2);
        assert_eq!(member.link_count, 1);
        assert_eq!(member.photo_count, 0);
        assert_eq!(member.sticker_count, 0);
    }

    #[test]
    fn test_absent_username_keeps_previous() {
        let mut member = MemberRecord::new(-1, 7);
        member.apply_activity(&activity(MessageKind::Text, Some("amy")));
        member.apply_activity(&activity(MessageKind::Text, None));
        assert_eq!(member.username.as_deref(), Some("amy"));
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut member = MemberRecord::new(-1, 7);
        for i in 0..=RECENT_MESSAGE_CAP {
            member.push_recent(StoredMessage {
                text: format!("m{}", i),
                timestamp: i as i64,
                kind: MessageKind::Text,
            });
        }

        assert_eq!(member.recent_messages.len(), RECENT_MESSAGE_CAP);
        assert_eq!(member.recent_messages[0].text, "m1");
        assert_eq!(member.recent_messages.last().unwrap().text, "m100");
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut member = MemberRecord::new(-1, 7);
        assert_eq!(member.display_name(), "User 7");
        member.username = Some("amy".into());
        assert_eq!(member.display_name(), "amy");
        member.first_name = Some("Amy".into());
        assert_eq!(member.display_name(), "Amy");
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        let json = serde_json::to_string(&MessageKind::Sticker).unwrap();
        assert_eq!(json, "\"sticker\"");
    }
}
