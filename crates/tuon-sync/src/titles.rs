//! When to ask for a title suggestion, and cleaning up what comes back.

use tuon_common::SyncConfig;
use tuon_editor_core::{Block, text_len};

/// Longest title kept from a suggestion, in characters.
const MAX_TITLE_CHARS: usize = 120;

/// A suggestion is worth requesting only for documents nobody named yet
/// that have enough text to summarise.
pub fn should_suggest_title(
    title: &str,
    title_locked: bool,
    content: &[Block],
    config: &SyncConfig,
) -> bool {
    !title_locked
        && config.is_placeholder_title(title)
        && text_len(content) >= config.min_title_chars
}

/// Trim quotes and whitespace a suggestion service tends to add, and cap
/// the length. Returns `None` when nothing usable is left.
pub fn clean_suggestion(raw: &str, config: &SyncConfig) -> Option<String> {
    let first_line = raw.lines().find(|l| !l.trim().is_empty())?;
    let title: String = first_line
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '`' | '“' | '”'))
        .trim()
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect();
    let title = title.trim_end().to_string();
    if config.is_placeholder_title(&title) {
        None
    } else {
        Some(title)
    }
}
