//! Utility functions.
//!
//! Text helpers shared by the command replies and the AI gateway.

pub mod text;

pub use text::{format_relative_age, html_escape, truncate_chars};
