//! Content classification and counter updates for ordinary group messages.

use tracing::{debug, warn};

use crate::bot::AppState;
use crate::database::{GroupCounter, MemberActivity, MessageKind, StickerUse};
use crate::telegram::types::{Message, MessageEntity, User};

/// Outcome of classifying one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub kind: MessageKind,
    /// Text stored in the member's window.
    pub text: String,
    pub has_link: bool,
}

fn any_link(entities: Option<&Vec<MessageEntity>>) -> bool {
    entities.is_some_and(|entities| entities.iter().any(MessageEntity::is_link))
}

/// Sticker, then photo, then text. Anything else is `None`.
pub fn classify(message: &Message) -> Option<Classified> {
    if let Some(sticker) = &message.sticker {
        return Some(Classified {
            kind: MessageKind::Sticker,
            text: sticker.emoji.clone().unwrap_or_else(|| "Sticker".to_string()),
            has_link: false,
        });
    }

    if message.has_photo() {
        let has_link =
            message.caption.is_some() && any_link(message.caption_entities.as_ref());
        return Some(Classified {
            kind: MessageKind::Photo,
            text: message.caption.clone().unwrap_or_else(|| "Photo".to_string()),
            has_link,
        });
    }

    let text = message.text.as_ref()?;
    let has_link = any_link(message.entities.as_ref());
    Some(Classified {
        kind: if has_link { MessageKind::Link } else { MessageKind::Text },
        text: text.clone(),
        has_link,
    })
}

/// Apply one classified message to the group, sticker and member records.
///
/// Each write is independent. A failure aborts the remaining writes and
/// earlier ones stay committed.
pub async fn record_activity(
    state: &AppState,
    message: &Message,
    user: &User,
    classified: Classified,
) -> anyhow::Result<()> {
    let group_id = message.chat.id;
    let store = &state.store;

    store
        .get_or_create_group(group_id, message.chat.title_or_default())
        .await?;

    match classified.kind {
        MessageKind::Sticker => {
            store
                .increment_group_counter(group_id, GroupCounter::Sticker)
                .await?;
            record_sticker(state, message, user).await?;
        }
        MessageKind::Photo => {
            store
                .increment_group_counter(group_id, GroupCounter::Photo)
                .await?;
        }
        MessageKind::Text | MessageKind::Link => {}
    }

    store
        .increment_group_counter(group_id, GroupCounter::Message)
        .await?;
    if classified.has_link {
        store
            .increment_group_counter(group_id, GroupCounter::Link)
            .await?;
    }

    let activity = MemberActivity {
        user_id: user.id,
        username: user.username.clone(),
        first_name: user.first_name.clone(),
        text: classified.text,
        kind: classified.kind,
        at: message_time(message),
    };
    store.upsert_member(group_id, &activity).await?;
    store
        .append_recent_message(group_id, user.id, activity.stored_message())
        .await?;

    // The member's link counter only follows the primary kind
    if classified.kind == MessageKind::Photo && classified.has_link {
        store.increment_member_link_count(group_id, user.id).await?;
    }

    debug!(
        "Recorded {:?} from {} in group {} (link: {})",
        activity.kind, user.id, group_id, classified.has_link
    );
    Ok(())
}

async fn record_sticker(state: &AppState, message: &Message, user: &User) -> anyhow::Result<()> {
    let Some(sticker) = &message.sticker else {
        return Ok(());
    };

    let (Some(file_id), Some(file_unique_id)) = (&sticker.file_id, &sticker.file_unique_id) else {
        warn!(
            "Sticker in group {} is missing file_id or file_unique_id",
            message.chat.id
        );
        return Ok(());
    };

    let usage = StickerUse {
        file_unique_id: file_unique_id.clone(),
        file_id: Some(file_id.clone()),
        emoji: sticker.emoji.clone(),
        set_name: sticker.set_name.clone(),
        user_id: user.id,
        at: message_time(message),
    };
    state.store.upsert_sticker(message.chat.id, &usage).await
}

/// Message date, or now when Telegram omitted it.
fn message_time(message: &Message) -> i64 {
    if message.date > 0 {
        message.date
    } else {
        chrono::Utc::now().timestamp()
    }
}
