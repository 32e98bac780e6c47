//! Bot commands.
//!
//! Each command replies on its own failures instead of failing the webhook.

pub mod health;
pub mod show;
pub mod threshold;
