//! Prompt construction from chat messages.

/// Messages considered when extracting keywords.
const SCANNED_MESSAGES: usize = 10;
const WORDS_PER_MESSAGE: usize = 2;
const MAX_KEYWORDS: usize = 5;

/// First two words longer than two characters from each of the first ten
/// messages, capped at five overall.
pub fn extract_keywords<S: AsRef<str>>(messages: &[S]) -> Vec<String> {
    let mut keywords = Vec::new();

    for message in messages.iter().take(SCANNED_MESSAGES) {
        keywords.extend(
            message
                .as_ref()
                .split_whitespace()
                .filter(|word| word.chars().count() > 2)
                .take(WORDS_PER_MESSAGE)
                .map(str::to_string),
        );
        if keywords.len() >= MAX_KEYWORDS {
            break;
        }
    }

    keywords.truncate(MAX_KEYWORDS);
    keywords
}

pub fn pixel_art_prompt<S: AsRef<str>>(messages: &[S]) -> String {
    format!(
        "Pixel art style, 8-bit retro game aesthetic, {}. Colorful, vibrant, nostalgic video game sprite art.",
        extract_keywords(messages).join(", ")
    )
}
