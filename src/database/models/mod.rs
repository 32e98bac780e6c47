//! Database models.

pub mod group;
pub mod image;
pub mod member;
pub mod settings;
pub mod sticker;

pub use group::{GroupCounter, GroupDocument, GroupRecord};
pub use image::GeneratedImage;
pub use member::{MemberActivity, MemberRecord, MessageKind, StoredMessage, RECENT_MESSAGE_CAP};
pub use settings::{
    AiProvider, AiSettings, AiSettingsUpdate, GlobalSettings, DEFAULT_THRESHOLD, GLOBAL_SETTINGS_ID,
};
pub use sticker::{StickerRecord, StickerUse};
