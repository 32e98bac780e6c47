//! Mention detection and the AI reply path.

use tracing::{debug, error, warn};

use crate::bot::AppState;
use crate::database::GroupCounter;
use crate::telegram::types::Message;
use crate::utils::html_escape;

/// Commands with their own handlers never count as mentions.
const HANDLED_COMMANDS: [&str; 2] = ["/set-activate-th", "/health"];

/// Whether a message is addressed to the bot.
///
/// Slash commands other than the handled ones count. A `bot_command` entity
/// counts unless the text @-mentions someone other than the bot. A plain
/// `@botname` anywhere in the text counts.
pub fn is_bot_mentioned(message: &Message, bot_username: Option<&str>) -> bool {
    let text = message.text.as_deref().unwrap_or_default();
    let trimmed = text.trim();

    if trimmed.starts_with('/') {
        return !HANDLED_COMMANDS.iter().any(|cmd| trimmed.starts_with(cmd));
    }

    let has_command_entity = message
        .entities
        .as_ref()
        .is_some_and(|entities| entities.iter().any(|e| e.is_bot_command()));
    if has_command_entity {
        return match bot_username {
            Some(name) => text.contains(&format!("@{}", name)) || !text.contains('@'),
            None => true,
        };
    }

    bot_username.is_some_and(|name| text.contains(&format!("@{}", name)))
}

/// Forward the message to the AI gateway and relay the answer.
///
/// Gateway failures become an apology in the chat and a failed mention
/// counter is only logged; transport errors propagate.
pub async fn reply_with_ai(state: &AppState, message: &Message) -> anyhow::Result<()> {
    let chat_id = message.chat.id;
    if let Err(e) = state
        .store
        .increment_group_counter(chat_id, GroupCounter::BotMention)
        .await
    {
        warn!("Failed to count bot mention in chat {}: {:#}", chat_id, e);
    }

    let reply = match state.ai.generate_reply(message.text_or_caption()).await {
        Ok(text) => {
            debug!("AI reply for chat {} ({} chars)", chat_id, text.chars().count());
            html_escape(&text)
        }
        Err(e) => {
            error!("AI reply failed for chat {}: {}", chat_id, e);
            format!(
                "🤖 Sorry, I can't reply right now. Error: {}",
                html_escape(&e.to_string())
            )
        }
    };

    state.transport.send_message(chat_id, &reply).await
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ai::testing::StubBackend;
    use crate::ai::AiGateway;
    use crate::bot::dispatcher::handle_update;
    use crate::bot::testing::{group_message, Harness, GROUP_ID};
    use crate::database::{AiProvider, StatsStore};

    fn message(fields: serde_json::Value) -> Message {
        group_message(fields).message.unwrap()
    }

    #[test]
    fn test_slash_commands_are_mentions() {
        assert!(is_bot_mentioned(&message(json!({ "text": "/roll" })), None));
        assert!(is_bot_mentioned(&message(json!({ "text": "  /ask what" })), None));
        assert!(!is_bot_mentioned(&message(json!({ "text": "/health" })), None));
        assert!(!is_bot_mentioned(&message(json!({ "text": "/set-activate-th 5" })), None));
    }

    #[test]
    fn test_explicit_at_mention() {
        let msg = message(json!({ "text": "hey @hao87bot how are you" }));
        assert!(is_bot_mentioned(&msg, Some("hao87bot")));
        assert!(!is_bot_mentioned(&msg, None));

        let other = message(json!({ "text": "hey @someone_else" }));
        assert!(!is_bot_mentioned(&other, Some("hao87bot")));
    }

    #[test]
    fn test_command_entity_respects_target() {
        // Command entity not at the start of the text
        let generic = message(json!({
            "text": "try roll",
            "entities": [{ "type": "bot_command", "offset": 4, "length": 4 }]
        }));
        assert!(is_bot_mentioned(&generic, Some("hao87bot")));

        let for_other = message(json!({
            "text": "try /roll@otherbot",
            "entities": [{ "type": "bot_command", "offset": 4, "length": 14 }]
        }));
        assert!(!is_bot_mentioned(&for_other, Some("hao87bot")));
        assert!(is_bot_mentioned(&for_other, None));
    }

    #[test]
    fn test_plain_text_is_not_mention() {
        assert!(!is_bot_mentioned(&message(json!({ "text": "hello all" })), Some("hao87bot")));
        assert!(!is_bot_mentioned(&message(json!({ "sticker": {} })), Some("hao87bot")));
    }

    #[tokio::test]
    async fn test_mention_replies_with_escaped_ai_text() {
        let h = Harness::new();
        handle_update(&h.state, group_message(json!({ "text": "@hao87bot tell a joke" })))
            .await
            .unwrap();

        assert_eq!(h.ollama.calls.lock()[0].0, "@hao87bot tell a joke");
        assert_eq!(
            h.transport.last_text().as_deref(),
            Some("&lt;hi&gt; from the model")
        );

        let group = h.store.get_group(GROUP_ID).await.unwrap().unwrap();
        assert_eq!(group.bot_mention_count, 1);
        assert_eq!(group.message_count, 0);
        assert!(h.store.member(GROUP_ID, 42).is_none());
    }

    #[tokio::test]
    async fn test_mention_with_sticker_skips_counters() {
        let h = Harness::new();
        let update = group_message(json!({
            "caption": "ignored",
            "text": "/roll",
            "sticker": { "file_id": "f", "file_unique_id": "u", "emoji": "😀" }
        }));
        handle_update(&h.state, update).await.unwrap();

        let group = h.store.get_group(GROUP_ID).await.unwrap().unwrap();
        assert_eq!(group.sticker_count, 0);
        assert_eq!(group.message_count, 0);
        assert!(h.store.sticker(GROUP_ID, "u").is_none());
        assert_eq!(h.transport.count(), 1);
    }

    #[tokio::test]
    async fn test_ai_failure_sends_apology() {
        let mut h = Harness::new();
        h.state.ai = std::sync::Arc::new(AiGateway::new(
            h.store.clone(),
            StubBackend::failing(AiProvider::Ollama, "tunnel down"),
            StubBackend::replying(AiProvider::OpenAi, ""),
        ));

        handle_update(&h.state, group_message(json!({ "text": "/ask anything" })))
            .await
            .unwrap();

        let reply = h.transport.last_text().unwrap();
        assert!(reply.starts_with("🤖 Sorry, I can't reply right now."));
        assert!(reply.contains("tunnel down"));
    }

    #[tokio::test]
    async fn test_counter_failure_still_replies() {
        let h = Harness::new();
        h.store.fail_counter_writes();

        handle_update(&h.state, group_message(json!({ "text": "@hao87bot hello" })))
            .await
            .unwrap();

        assert_eq!(
            h.transport.last_text().as_deref(),
            Some("&lt;hi&gt; from the model")
        );
    }
}
