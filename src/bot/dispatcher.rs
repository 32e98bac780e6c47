//! Update classification.
//!
//! First match wins: membership change, `/health`, `/set-activate-th`,
//! `/show`, non-group chats (ignored), then group content.

use tracing::{debug, warn};

use super::AppState;
use crate::events::{activity, membership, mention};
use crate::plugins::{health, show, threshold};
use crate::telegram::types::Message;
use crate::telegram::Update;

/// Handle one inbound update. Errors mean the delivery failed as a whole.
pub async fn handle_update(state: &AppState, update: Update) -> anyhow::Result<()> {
    if let Some(change) = &update.my_chat_member {
        return membership::handle_membership(state, change).await;
    }

    match &update.message {
        Some(message) => handle_message(state, message).await,
        None => {
            debug!("Ignoring update {} without a message", update.update_id);
            Ok(())
        }
    }
}

/// `/name` alone or addressed as `/name@bot`.
fn is_command(text: &str, name: &str) -> bool {
    text == name
        || text
            .strip_prefix(name)
            .is_some_and(|rest| rest.starts_with('@'))
}

async fn handle_message(state: &AppState, message: &Message) -> anyhow::Result<()> {
    if message.from.as_ref().is_some_and(|user| user.is_bot) {
        return Ok(());
    }

    let text = message.trimmed_text();
    if is_command(text, "/health") {
        return health::health_command(state, message.chat.id).await;
    }
    if text.starts_with("/set-activate-th") {
        return threshold::set_threshold_command(state, message).await;
    }
    if is_command(text, "/show") {
        return show::show_command(state, message).await;
    }

    if !message.chat.is_group() {
        return Ok(());
    }

    let bot_username = state.transport.bot_username().await;
    if mention::is_bot_mentioned(message, bot_username.as_deref()) {
        state
            .store
            .get_or_create_group(message.chat.id, message.chat.title_or_default())
            .await?;
        return mention::reply_with_ai(state, message).await;
    }

    let Some(classified) = activity::classify(message) else {
        debug!("Ignoring unsupported content in group {}", message.chat.id);
        return Ok(());
    };

    let Some(user) = &message.from else {
        warn!(
            "Message {} in group {} has no sender, skipping",
            message.message_id, message.chat.id
        );
        return Ok(());
    };

    activity::record_activity(state, message, user, classified).await
}
