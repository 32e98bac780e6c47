//! /health command.
//!
//! Reports configured secrets and the reachability of the store, object
//! storage and the selected AI backend. Never touches counters.

use tracing::error;

use crate::bot::AppState;

struct Checks {
    lines: Vec<String>,
    healthy: bool,
}

impl Checks {
    fn pass(&mut self, line: String) {
        self.lines.push(format!("✅ {}", line));
    }

    fn fail(&mut self, line: String) {
        self.lines.push(format!("❌ {}", line));
        self.healthy = false;
    }

    fn warn(&mut self, line: String) {
        self.lines.push(format!("⚠️ {}", line));
        self.healthy = false;
    }

    fn configured(&mut self, label: &str, present: bool) {
        if present {
            self.pass(format!("{}: configured", label));
        } else {
            self.fail(format!("{}: not configured", label));
        }
    }
}

pub async fn build_report(state: &AppState) -> String {
    let mut checks = Checks {
        lines: Vec::new(),
        healthy: true,
    };

    checks.configured("Telegram bot token", state.config.bot_token.is_some());
    checks.configured("OpenAI API key", state.config.openai_api_key.is_some());

    let store_label = format!("Document store ({})", state.config.mongodb_database);
    match state.store.ping().await {
        Ok(()) => checks.pass(format!("{}: connected", store_label)),
        Err(e) => checks.fail(format!("{}: connection failed ({})", store_label, e)),
    }

    match &state.storage {
        None => checks.warn("Object storage: STORAGE_BUCKET not configured".to_string()),
        Some(storage) => match storage.bucket_exists().await {
            Ok(true) => checks.pass(format!("Object storage ({}): reachable", storage.bucket())),
            Ok(false) => checks.warn(format!("Object storage ({}): bucket does not exist", storage.bucket())),
            Err(e) => checks.fail(format!("Object storage: connection failed ({})", e)),
        },
    }

    let (provider, ai) = state.ai.check_health().await;
    let mut ai_line = format!("AI ({}): {}", provider, ai.message);
    if let Some(model) = &ai.model {
        ai_line.push_str(&format!(" [{}]", model));
    }
    if let Some(models) = ai.models.as_ref().filter(|m| !m.is_empty()) {
        ai_line.push_str(&format!(" [{}]", models.join(", ")));
    }
    if ai.healthy {
        checks.pass(ai_line);
    } else {
        checks.fail(ai_line);
    }

    let status = if checks.healthy { "🟢 Healthy" } else { "🔴 Degraded" };
    format!(
        "<b>Hao87bot 3.0 health check</b>\n\n\
         Status: {}\n\
         Time: {}\n\n\
         <b>Checks:</b>\n{}",
        status,
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        crate::utils::html_escape(&checks.lines.join("\n"))
    )
}

/// Handle `/health`. Usable in any chat.
pub async fn health_command(state: &AppState, chat_id: i64) -> anyhow::Result<()> {
    let report = build_report(state).await;
    if let Err(e) = state.transport.send_message(chat_id, &report).await {
        error!("Failed to send health report: {:#}", e);
        state
            .transport
            .send_message(chat_id, "❌ Health check failed: could not report system status")
            .await?;
    }
    Ok(())
}
