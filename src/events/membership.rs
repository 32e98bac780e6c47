//! Bot membership changes.

use tracing::{debug, info};

use crate::bot::AppState;
use crate::telegram::types::ChatMemberUpdated;

/// When the bot becomes a member of a chat, make sure its group record exists.
pub async fn handle_membership(state: &AppState, change: &ChatMemberUpdated) -> anyhow::Result<()> {
    if change.new_chat_member.status != "member" {
        debug!(
            "Ignoring membership status '{}' in chat {}",
            change.new_chat_member.status, change.chat.id
        );
        return Ok(());
    }

    let group = state
        .store
        .get_or_create_group(change.chat.id, change.chat.title_or_default())
        .await?;
    info!("Joined group {} ({})", group.group_id, group.title);

    Ok(())
}
