//! Cache module - small typed caches over Moka.
//!
//! Only process-wide, effectively-stateless lookups are cached here (the bot
//! identity). Counters and settings are always read from the store.

mod config;
mod typed;

pub use config::CacheConfig;
pub use typed::TypedCache;
