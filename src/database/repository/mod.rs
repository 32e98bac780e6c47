//! Store implementations.

mod memory;
mod settings_repository;
mod stats_repository;

pub use memory::MemoryStore;
pub use settings_repository::MongoSettingsRepository;
pub use stats_repository::StatsRepository;
