//! Telegram integration.
//!
//! Inbound updates are plain serde types; outbound calls go through teloxide.

mod transport;
pub mod types;

pub use transport::{ChatTransport, FileUrlError, TelegramTransport};
pub use types::Update;
