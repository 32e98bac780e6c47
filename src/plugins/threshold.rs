//! /set-activate-th command.

use thiserror::Error;
use tracing::{error, info};

use crate::bot::AppState;
use crate::telegram::types::Message;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThresholdError {
    #[error(
        "❌ Please provide a threshold\n\n\
         Usage: /set-activate-th &lt;number&gt;\n\
         Example: /set-activate-th 100"
    )]
    Missing,
    #[error("❌ Invalid threshold. Enter a positive integer (at least 1)")]
    Invalid,
}

/// Parse the first argument as a positive integer.
pub fn parse_threshold(text: &str) -> Result<i64, ThresholdError> {
    let arg = text
        .split_whitespace()
        .nth(1)
        .ok_or(ThresholdError::Missing)?;

    match arg.parse::<i64>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(ThresholdError::Invalid),
    }
}

/// Handle `/set-activate-th <n>`. Usable in any chat.
pub async fn set_threshold_command(state: &AppState, message: &Message) -> anyhow::Result<()> {
    let chat_id = message.chat.id;

    let threshold = match parse_threshold(message.trimmed_text()) {
        Ok(n) => n,
        Err(e) => return state.transport.send_message(chat_id, &e.to_string()).await,
    };

    let reply = match apply(state, message, threshold).await {
        Ok(reply) => reply,
        Err(e) => {
            error!("Failed to set threshold: {:#}", e);
            "❌ Failed to update the threshold, please try again later".to_string()
        }
    };
    state.transport.send_message(chat_id, &reply).await
}

async fn apply(state: &AppState, message: &Message, threshold: i64) -> anyhow::Result<String> {
    state.settings.set_global_threshold(threshold).await?;
    let global = state.settings.global_threshold().await?;
    info!("Global activation threshold set to {}", global);

    let headline = format!("✅ Global activation threshold set to {} messages", threshold);
    let chat = &message.chat;

    if chat.is_private() {
        Ok(format!("{}\n\nThis applies to all groups.", headline))
    } else if chat.is_group() {
        let group = state
            .store
            .get_or_create_group(chat.id, chat.title_or_default())
            .await?;
        Ok(format!(
            "{}\n\nCurrent message count: {} / {}",
            headline, group.message_count, global
        ))
    } else {
        Ok(headline)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::bot::dispatcher::handle_update;
    use crate::bot::testing::{group_message, private_message, Harness};
    use crate::database::SettingsRepository;

    #[test]
    fn test_parse_threshold() {
        assert_eq!(parse_threshold("/set-activate-th 250"), Ok(250));
        assert_eq!(parse_threshold("/set-activate-th@hao87bot   7"), Ok(7));
        assert_eq!(parse_threshold("/set-activate-th"), Err(ThresholdError::Missing));
        assert_eq!(parse_threshold("/set-activate-th 0"), Err(ThresholdError::Invalid));
        assert_eq!(parse_threshold("/set-activate-th -5"), Err(ThresholdError::Invalid));
        assert_eq!(parse_threshold("/set-activate-th abc"), Err(ThresholdError::Invalid));
        assert_eq!(parse_threshold("/set-activate-th 12abc"), Err(ThresholdError::Invalid));
    }

    #[tokio::test]
    async fn test_rejections_leave_threshold_unchanged() {
        let h = Harness::new();
        h.store.set_global_threshold(250).await.unwrap();
        for text in [
            "/set-activate-th 0",
            "/set-activate-th -5",
            "/set-activate-th abc",
            "/set-activate-th",
        ] {
            handle_update(&h.state, private_message(json!({ "text": text })))
                .await
                .unwrap();
            assert!(h.transport.last_text().unwrap().starts_with("❌"));
        }
        assert_eq!(h.store.global_threshold().await.unwrap(), 250);
    }

    #[tokio::test]
    async fn test_set_is_idempotent() {
        let h = Harness::new();
        for _ in 0..2 {
            handle_update(&h.state, private_message(json!({ "text": "/set-activate-th 250" })))
                .await
                .unwrap();
            assert_eq!(h.store.global_threshold().await.unwrap(), 250);
        }
        assert_eq!(
            h.transport.last_text().as_deref(),
            Some("✅ Global activation threshold set to 250 messages\n\nThis applies to all groups.")
        );
    }

    #[tokio::test]
    async fn test_group_reply_shows_progress() {
        let h = Harness::new();
        handle_update(&h.state, group_message(json!({ "text": "hello" })))
            .await
            .unwrap();
        handle_update(&h.state, group_message(json!({ "text": "/set-activate-th 30" })))
            .await
            .unwrap();

        assert!(h
            .transport
            .last_text()
            .unwrap()
            .ends_with("Current message count: 1 / 30"));
    }
}
