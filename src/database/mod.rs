//! Database module exports.

pub mod models;
mod mongo;
mod repository;
mod store;

pub use models::*;
pub use mongo::Database;
pub use repository::{MemoryStore, MongoSettingsRepository, StatsRepository};
pub use store::{SettingsRepository, StatsStore};
