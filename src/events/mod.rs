//! Update handlers other than commands.
//!
//! - `membership` - the bot joining a group
//! - `mention` - messages addressed to the bot, answered by the AI gateway
//! - `activity` - everything else in a group, counted

pub mod activity;
pub mod membership;
pub mod mention;
