//! HTTP surface: Telegram webhook, sticker URL lookup and the admin API.

use axum::extract::{Path, Query, Request, State};
use axum::http::{header, HeaderMap, HeaderName, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, warn};

use super::{dispatcher, AppState};
use crate::database::AiSettingsUpdate;
use crate::telegram::{FileUrlError, Update};

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";
const DEFAULT_STICKER_LIMIT: usize = 10;
const MAX_STICKER_LIMIT: usize = 100;
const IMAGE_LIST_LIMIT: usize = 20;
const WINDOW_LIMIT: usize = 100;

const CORS: [(HeaderName, &str); 3] = [
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, OPTIONS"),
    (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
];

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/groups/:group_id", get(group_stats))
        .route("/groups/:group_id/stickers", get(group_stickers))
        .route("/groups/:group_id/images", get(list_images).post(create_image))
        .route("/settings", get(get_settings).put(update_settings))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/webhook", post(webhook))
        .route("/sticker-url", get(sticker_url).options(sticker_preflight))
        .nest("/api", api)
        .with_state(state)
}

/// 500 with a JSON body for unexpected handler failures.
struct ApiError(anyhow::Error);

impl<E: Into<anyhow::Error>> From<E> for ApiError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("API request failed: {:#}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Internal Server Error" })),
        )
            .into_response()
    }
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> Response {
    if let Some(expected) = state.config.webhook_secret.as_deref() {
        let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if provided != Some(expected) {
            warn!("Webhook secret mismatch for update {}", update.update_id);
            return (StatusCode::UNAUTHORIZED, Json(json!({ "ok": false }))).into_response();
        }
    }

    match dispatcher::handle_update(&state, update).await {
        Ok(()) => Json(json!({ "ok": true })).into_response(),
        Err(e) => {
            error!("Webhook handling failed: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal Server Error" })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct StickerQuery {
    file_id: Option<String>,
}

async fn sticker_url(State(state): State<AppState>, Query(query): Query<StickerQuery>) -> Response {
    let Some(file_id) = query.file_id.filter(|id| !id.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            CORS,
            Json(json!({ "error": "Missing file_id parameter" })),
        )
            .into_response();
    };

    match state.transport.file_url(&file_id).await {
        Ok(url) => (StatusCode::OK, CORS, Json(json!({ "url": url }))).into_response(),
        Err(e @ FileUrlError::MissingToken) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            CORS,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
        Err(FileUrlError::Lookup(details)) => {
            warn!("Sticker lookup for {} failed: {}", file_id, details);
            (
                StatusCode::NOT_FOUND,
                CORS,
                Json(json!({ "error": "Failed to get file", "details": details })),
            )
                .into_response()
        }
    }
}

async fn sticker_preflight() -> impl IntoResponse {
    (StatusCode::NO_CONTENT, CORS)
}

/// Bearer check for `/api/*`. Without a configured key the API is off.
async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.config.admin_api_key.as_deref() else {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Admin API is disabled" })),
        )
            .into_response();
    };

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if provided != Some(expected) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Unauthorized" }))).into_response();
    }

    next.run(request).await
}

async fn group_stats(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
) -> Result<Response, ApiError> {
    let Some(group) = state.store.get_group(group_id).await? else {
        return Ok((StatusCode::NOT_FOUND, Json(json!({ "error": "Group not found" }))).into_response());
    };
    let members = state.store.list_members(group_id).await?;

    Ok(Json(json!({ "group": group, "members": members })).into_response())
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

async fn group_stickers(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_STICKER_LIMIT)
        .min(MAX_STICKER_LIMIT);
    let stickers = state.store.top_stickers(group_id, limit).await?;
    Ok(Json(json!({ "stickers": stickers })))
}

async fn list_images(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let images = state.store.list_images(group_id, IMAGE_LIST_LIMIT).await?;
    Ok(Json(json!({ "images": images })))
}

#[derive(Debug, Deserialize)]
struct ImageRequest {
    messages: Option<Vec<String>>,
    user_id: Option<i64>,
}

async fn create_image(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
    Json(body): Json<ImageRequest>,
) -> Result<Response, ApiError> {
    let messages = match (body.messages, body.user_id) {
        (Some(messages), _) => messages,
        (None, Some(user_id)) => state
            .store
            .recent_messages(group_id, user_id, WINDOW_LIMIT)
            .await?
            .into_iter()
            .map(|m| m.text)
            .collect(),
        (None, None) => return Ok(bad_request("Provide either messages or user_id")),
    };

    if messages.is_empty() {
        return Ok(bad_request("No messages to build a prompt from"));
    }

    let url = state.images.generate_pixel_art(group_id, &messages).await?;
    Ok(Json(json!({ "url": url })).into_response())
}

async fn settings_body(state: &AppState) -> anyhow::Result<Value> {
    Ok(json!({
        "threshold": state.settings.global_threshold().await?,
        "ai": state.settings.ai_settings().await?,
        "last_restart_at": state.settings.last_restart_at().await?,
    }))
}

async fn get_settings(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(settings_body(&state).await?))
}

#[derive(Debug, Deserialize)]
struct SettingsUpdate {
    threshold: Option<i64>,
    #[serde(flatten)]
    ai: AiSettingsUpdate,
}

async fn update_settings(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Response, ApiError> {
    if let Some(threshold) = update.threshold {
        if threshold < 1 {
            return Ok(bad_request("threshold must be a positive integer"));
        }
        state.settings.set_global_threshold(threshold).await?;
    }
    state.settings.update_ai_settings(&update.ai).await?;

    Ok(Json(settings_body(&state).await?).into_response())
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::bot::testing::{group_message, Harness, GROUP_ID};
    use crate::config::Config;
    use crate::database::{AiProvider, SettingsRepository, StatsStore, StickerUse};

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn admin_harness() -> Harness {
        Harness::with_config(Config::from_lookup(|name| match name {
            "ADMIN_API_KEY" => Some("k3y".to_string()),
            "WEBHOOK_SECRET" => Some("s3cret".to_string()),
            _ => None,
        }))
    }

    #[tokio::test]
    async fn test_webhook_counts_message() {
        let h = Harness::new();
        let update = serde_json::to_value(group_message(json!({ "text": "hi" }))).unwrap();

        let (status, body) = call(router(h.state.clone()), post_json("/webhook", &update)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));

        let group = h.store.get_group(GROUP_ID).await.unwrap().unwrap();
        assert_eq!(group.message_count, 1);
    }

    #[tokio::test]
    async fn test_webhook_rejects_get_and_bad_secret() {
        let h = admin_harness();
        let request = Request::get("/webhook").body(Body::empty()).unwrap();
        let (status, _) = call(router(h.state.clone()), request).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

        let update = serde_json::to_value(group_message(json!({ "text": "hi" }))).unwrap();
        let (status, _) = call(router(h.state.clone()), post_json("/webhook", &update)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(h.store.get_group(GROUP_ID).await.unwrap().is_none());

        let request = Request::post("/webhook")
            .header(header::CONTENT_TYPE, "application/json")
            .header(SECRET_HEADER, "s3cret")
            .body(Body::from(update.to_string()))
            .unwrap();
        let (status, _) = call(router(h.state.clone()), request).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_sticker_url_responses() {
        let h = Harness::new();
        let app = router(h.state.clone());

        let request = Request::get("/sticker-url").body(Body::empty()).unwrap();
        let (status, body) = call(app.clone(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing file_id parameter");

        let request = Request::get("/sticker-url?file_id=abc").body(Body::empty()).unwrap();
        let (status, body) = call(app.clone(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["url"], "https://api.telegram.org/file/botTOKEN/abc.webp");

        let request = Request::get("/sticker-url?file_id=missing").body(Body::empty()).unwrap();
        let (status, body) = call(app.clone(), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["details"].as_str().unwrap().contains("invalid file_id"));

        let request = Request::options("/sticker-url").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }

    #[tokio::test]
    async fn test_admin_api_requires_key() {
        let disabled = Harness::new();
        let request = Request::get("/api/settings").body(Body::empty()).unwrap();
        let (status, _) = call(router(disabled.state.clone()), request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let h = admin_harness();
        let request = Request::get("/api/settings")
            .header(header::AUTHORIZATION, "Bearer wrong")
            .body(Body::empty())
            .unwrap();
        let (status, _) = call(router(h.state.clone()), request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_settings_roundtrip() {
        let h = admin_harness();
        let request = Request::put("/api/settings")
            .header(header::AUTHORIZATION, "Bearer k3y")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "threshold": 42, "provider": "openai", "model": "gpt-4o" }).to_string(),
            ))
            .unwrap();
        let (status, body) = call(router(h.state.clone()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["threshold"], 42);
        assert_eq!(body["ai"]["provider"], "openai");

        let ai = h.store.ai_settings().await.unwrap();
        assert_eq!(ai.provider, AiProvider::OpenAi);
        assert_eq!(ai.model.as_deref(), Some("gpt-4o"));
    }

    #[tokio::test]
    async fn test_group_endpoints() {
        let h = admin_harness();
        let auth = |uri: &str| {
            Request::get(uri)
                .header(header::AUTHORIZATION, "Bearer k3y")
                .body(Body::empty())
                .unwrap()
        };

        let (status, _) = call(router(h.state.clone()), auth("/api/groups/-5")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        crate::bot::dispatcher::handle_update(&h.state, group_message(json!({ "text": "a b" })))
            .await
            .unwrap();

        let uri = format!("/api/groups/{}", GROUP_ID);
        let (status, body) = call(router(h.state.clone()), auth(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["group"]["message_count"], 1);
        assert_eq!(body["members"][0]["user_id"], 42);

        let request = Request::post(format!("/api/groups/{}/images", GROUP_ID))
            .header(header::AUTHORIZATION, "Bearer k3y")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "user_id": 42 }).to_string()))
            .unwrap();
        let (status, body) = call(router(h.state.clone()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["url"].as_str().unwrap().contains("/groups/-1001/images/"));

        let (status, body) =
            call(router(h.state.clone()), auth(&format!("/api/groups/{}/images", GROUP_ID))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["images"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sticker_limit_is_capped() {
        let h = admin_harness();
        for i in 0..(MAX_STICKER_LIMIT + 5) {
            let usage = StickerUse {
                file_unique_id: format!("sticker-{}", i),
                file_id: None,
                emoji: None,
                set_name: None,
                user_id: 42,
                at: 1,
            };
            h.store.upsert_sticker(GROUP_ID, &usage).await.unwrap();
        }

        let uri = format!("/api/groups/{}/stickers?limit={}", GROUP_ID, u64::MAX);
        let request = Request::get(uri)
            .header(header::AUTHORIZATION, "Bearer k3y")
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(router(h.state.clone()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stickers"].as_array().unwrap().len(), MAX_STICKER_LIMIT);
    }
}
