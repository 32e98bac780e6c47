//! /show command - group statistics summary.

use chrono::{DateTime, Utc};
use tracing::error;

use crate::bot::AppState;
use crate::database::{GroupRecord, MemberRecord};
use crate::telegram::types::Message;
use crate::utils::{format_relative_age, html_escape};

const TOP_MEMBERS: usize = 5;

/// Handle `/show`. Group chats only.
pub async fn show_command(state: &AppState, message: &Message) -> anyhow::Result<()> {
    let chat_id = message.chat.id;

    if !message.chat.is_group() {
        return state
            .transport
            .send_message(chat_id, "❌ /show only works in group chats")
            .await;
    }

    let reply = match build_summary(state, message).await {
        Ok(reply) => reply,
        Err(e) => {
            error!("Failed to build stats for {}: {:#}", chat_id, e);
            "❌ Could not load stats, please try again later".to_string()
        }
    };
    state.transport.send_message(chat_id, &reply).await
}

async fn build_summary(state: &AppState, message: &Message) -> anyhow::Result<String> {
    let chat = &message.chat;
    let group = state
        .store
        .get_or_create_group(chat.id, chat.title_or_default())
        .await?;
    let members = state.store.list_members(chat.id).await?;
    let threshold = state.settings.global_threshold().await?;
    let last_restart = state.settings.last_restart_at().await?;

    let stats_url = state
        .config
        .stats_base_url
        .as_deref()
        .map(|base| format!("{}/stats/{}", base, chat.id));

    Ok(render_summary(
        &group,
        &members,
        threshold,
        last_restart,
        stats_url.as_deref(),
        Utc::now(),
    ))
}

fn render_summary(
    group: &GroupRecord,
    members: &[MemberRecord],
    threshold: i64,
    last_restart: Option<i64>,
    stats_url: Option<&str>,
    now: DateTime<Utc>,
) -> String {
    let mut text = String::from("<b>📊 Group stats</b>\n\n");

    if let Some(url) = stats_url {
        text.push_str(&format!("🔗 <a href=\"{}\">Full stats</a>\n\n", url));
    }

    text.push_str("<b>Group totals:</b>\n");
    text.push_str(&format!("📝 Messages: {}\n", group.message_count));
    text.push_str(&format!("🔗 Links: {}\n", group.link_count));
    text.push_str(&format!("📷 Photos: {}\n", group.photo_count));
    text.push_str(&format!("😊 Stickers: {}\n", group.sticker_count));
    text.push_str(&format!("🤖 Mentions: {}\n", group.bot_mention_count));
    text.push_str(&format!("🎯 Activation threshold: {}\n\n", threshold));

    if !members.is_empty() {
        text.push_str("<b>🏆 Top 5 members:</b>\n");
        for (i, member) in members.iter().take(TOP_MEMBERS).enumerate() {
            text.push_str(&format!(
                "{}. {}: {} messages\n",
                i + 1,
                html_escape(&member.display_name()),
                member.message_count
            ));
        }
        text.push('\n');
    }

    text.push_str("<b>🔄 System:</b>\n");
    text.push_str(&format!("Last restart: {}", restart_text(last_restart, now)));
    text
}

fn restart_text(last_restart: Option<i64>, now: DateTime<Utc>) -> String {
    let Some(at) = last_restart else {
        return "not recorded yet".to_string();
    };
    let Some(when) = DateTime::<Utc>::from_timestamp(at, 0) else {
        return "not recorded yet".to_string();
    };

    format!(
        "{} ({})",
        format_relative_age(now.timestamp() - at),
        when.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::bot::dispatcher::handle_update;
    use crate::bot::testing::{group_message, private_message, Harness, GROUP_ID};
    use crate::config::Config;
    use crate::database::{SettingsRepository, StatsStore};

    #[test]
    fn test_restart_text() {
        let now = DateTime::<Utc>::from_timestamp(1_700_007_200, 0).unwrap();
        assert_eq!(
            restart_text(Some(1_700_000_000), now),
            "2 hours ago (2023-11-14 22:13:20 UTC)"
        );
        assert_eq!(restart_text(None, now), "not recorded yet");
    }

    #[tokio::test]
    async fn test_rejected_outside_groups() {
        let h = Harness::new();
        handle_update(&h.state, private_message(json!({ "text": "/show" })))
            .await
            .unwrap();
        assert_eq!(
            h.transport.last_text().as_deref(),
            Some("❌ /show only works in group chats")
        );
    }

    #[tokio::test]
    async fn test_summary_lists_top_members_without_mutation() {
        let config = Config::from_lookup(|name| match name {
            "STATS_BASE_URL" => Some("https://stats.example/".to_string()),
            _ => None,
        });
        let h = Harness::with_config(config);
        h.store.record_restart(chrono::Utc::now().timestamp()).await.unwrap();

        for (user_id, name, messages) in [(1, "Ann", 2), (2, "<Bo>", 3)] {
            for _ in 0..messages {
                let update = group_message(json!({
                    "text": "hi",
                    "from": { "id": user_id, "is_bot": false, "first_name": name }
                }));
                handle_update(&h.state, update).await.unwrap();
            }
        }

        handle_update(&h.state, group_message(json!({ "text": "/show@hao87bot" })))
            .await
            .unwrap();

        let text = h.transport.last_text().unwrap();
        assert!(text.contains(&format!("https://stats.example/stats/{}", GROUP_ID)));
        assert!(text.contains("📝 Messages: 5"));
        assert!(text.contains("🎯 Activation threshold: 100"));
        assert!(text.contains("1. &lt;Bo&gt;: 3 messages\n2. Ann: 2 messages"));
        assert!(text.contains("Last restart: just now"));

        let group = h.store.get_group(GROUP_ID).await.unwrap().unwrap();
        assert_eq!(group.message_count, 5);
    }
}
