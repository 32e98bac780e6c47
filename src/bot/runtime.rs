//! Process runtime: webhook registration and the HTTP server.

use teloxide::prelude::*;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use url::Url;

use super::{server, AppState};
use crate::telegram::TelegramTransport;

/// Register the webhook with Telegram when a public URL is configured.
///
/// Failures are logged; the server still starts so a later redeploy or a
/// manual `setWebhook` can recover.
async fn register_webhook(state: &AppState, transport: &TelegramTransport) {
    let Some(raw_url) = state.config.webhook_url.as_deref() else {
        info!("WEBHOOK_URL not set, skipping webhook registration");
        return;
    };
    let Some(bot) = transport.bot() else {
        warn!("WEBHOOK_URL is set but TELEGRAM_BOT_TOKEN is not, skipping registration");
        return;
    };

    let url = match Url::parse(raw_url) {
        Ok(url) => url,
        Err(e) => {
            error!("Invalid WEBHOOK_URL '{}': {}", raw_url, e);
            return;
        }
    };

    let mut request = bot.set_webhook(url.clone());
    if let Some(secret) = &state.config.webhook_secret {
        request = request.secret_token(secret.clone());
        info!("Webhook secret token configured");
    }

    match request.await {
        Ok(_) => info!("🔗 Webhook registered: {}", url),
        Err(e) => error!("setWebhook failed: {}", e),
    }
}

/// Serve until Ctrl+C.
pub async fn run(state: AppState, transport: &TelegramTransport) -> anyhow::Result<()> {
    register_webhook(&state, transport).await;

    let address = state.config.listen_addr;
    let listener = TcpListener::bind(address).await?;
    info!("📡 Listening on: {}", address);

    axum::serve(listener, server::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
