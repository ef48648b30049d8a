/// Basic URL validation: non-empty, http or https.
pub fn validate_url(url: &str) -> bool {
    let url = url.trim();
    !url.is_empty() && (url.starts_with("http://") || url.starts_with("https://"))
}

/// Collapse every whitespace run to a single space.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut `text` to at most `max` characters, appending `...` if anything was dropped.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Number of characters (not bytes).
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
