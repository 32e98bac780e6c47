//! Text formatting helpers.

/// Escape text for Telegram's HTML parse mode.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Truncate to at most `max` characters, appending `...` when cut.
///
/// Counts `char`s, so multi-byte text is never split mid-codepoint.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}...", &s[..byte_idx]),
        None => s.to_string(),
    }
}

/// Render an elapsed duration as a coarse relative age.
pub fn format_relative_age(secs: i64) -> String {
    let mins = secs.max(0) / 60;
    let hours = mins / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{} day{} ago", days, plural(days))
    } else if hours > 0 {
        format!("{} hour{} ago", hours, plural(hours))
    } else if mins > 0 {
        format!("{} minute{} ago", mins, plural(mins))
    } else {
        "just now".to_string()
    }
}

fn plural(n: i64) -> &'static str {
    if n == 1 { "" } else { "s" }
}
