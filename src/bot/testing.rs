//! Fixtures for handler tests: memory store, recording transport, stub AI.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use super::AppState;
use crate::ai::testing::StubBackend;
use crate::ai::AiGateway;
use crate::config::Config;
use crate::database::{AiProvider, MemoryStore};
use crate::imaging::testing::{MemoryBucket, StubGenerator};
use crate::imaging::{ImagePipeline, ObjectStorage};
use crate::telegram::{ChatTransport, FileUrlError, Update};

pub const GROUP_ID: i64 = -1001;
pub const BOT_USERNAME: &str = "hao87bot";

/// Transport that records sent messages instead of calling Telegram.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<(i64, String)>>,
}

impl RecordingTransport {
    pub fn last_text(&self) -> Option<String> {
        self.sent.lock().last().map(|(_, text)| text.clone())
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_message(&self, chat_id: i64, html: &str) -> anyhow::Result<()> {
        self.sent.lock().push((chat_id, html.to_string()));
        Ok(())
    }

    async fn bot_username(&self) -> Option<String> {
        Some(BOT_USERNAME.to_string())
    }

    async fn file_url(&self, file_id: &str) -> Result<String, FileUrlError> {
        match file_id {
            "missing" => Err(FileUrlError::Lookup("Bad Request: invalid file_id".into())),
            _ => Ok(format!("https://api.telegram.org/file/botTOKEN/{}.webp", file_id)),
        }
    }
}

pub struct Harness {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub transport: Arc<RecordingTransport>,
    pub ollama: Arc<StubBackend>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(Config::from_lookup(|_| None))
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(RecordingTransport::default());
        let ollama = StubBackend::replying(AiProvider::Ollama, "<hi> from the model");
        let openai = StubBackend::replying(AiProvider::OpenAi, "from openai");
        let bucket: Arc<dyn ObjectStorage> = MemoryBucket::new();

        let state = AppState {
            config: Arc::new(config),
            store: store.clone(),
            settings: store.clone(),
            transport: transport.clone(),
            ai: Arc::new(AiGateway::new(store.clone(), ollama.clone(), openai)),
            images: Arc::new(ImagePipeline::new(
                StubGenerator::new(),
                Some(bucket.clone()),
                store.clone(),
            )),
            storage: Some(bucket),
        };

        Self {
            state,
            store,
            transport,
            ollama,
        }
    }
}

/// A group message update from user 42 with extra message fields merged in.
pub fn group_message(fields: Value) -> Update {
    let mut message = json!({
        "message_id": 1,
        "date": 1_700_000_000,
        "from": { "id": 42, "is_bot": false, "first_name": "Mei", "username": "mei" },
        "chat": { "id": GROUP_ID, "type": "supergroup", "title": "Lobby" }
    });
    merge(&mut message, fields);
    update_with(message)
}

pub fn private_message(fields: Value) -> Update {
    let mut message = json!({
        "message_id": 1,
        "date": 1_700_000_000,
        "from": { "id": 42, "is_bot": false, "first_name": "Mei" },
        "chat": { "id": 42, "type": "private" }
    });
    merge(&mut message, fields);
    update_with(message)
}

fn update_with(message: Value) -> Update {
    serde_json::from_value(json!({ "update_id": 1, "message": message }))
        .expect("fixture is a valid update")
}

fn merge(target: &mut Value, fields: Value) {
    if let (Some(target), Value::Object(fields)) = (target.as_object_mut(), fields) {
        target.extend(fields);
    }
}
