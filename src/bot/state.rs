//! Shared application state.

use std::sync::Arc;

use crate::ai::AiGateway;
use crate::config::Config;
use crate::database::{SettingsRepository, StatsStore};
use crate::imaging::{ImagePipeline, ObjectStorage};
use crate::telegram::ChatTransport;

/// Handles shared by every delivery. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    /// Group, member, sticker and image records.
    pub store: Arc<dyn StatsStore>,

    /// Global settings singleton.
    pub settings: Arc<dyn SettingsRepository>,

    pub transport: Arc<dyn ChatTransport>,
    pub ai: Arc<AiGateway>,
    pub images: Arc<ImagePipeline>,

    /// Object storage, when a bucket is configured. Probed by `/health`.
    pub storage: Option<Arc<dyn ObjectStorage>>,
}
