//! Plain-text extraction from block content.

use serde_json::Value;

use crate::types::{Block, is_block_value};

/// Keys that never contain user-visible text.
const SKIP_KEYS: &[&str] = &["type", "id", "props", "styles", "href"];

/// Text of `blocks`, one line per block that has text, depth-first.
pub fn plain_text(blocks: &[Block]) -> String {
    let mut lines = Vec::new();
    for block in blocks {
        collect_block(block, &mut lines);
    }
    lines.join("\n")
}

/// Number of characters of text in `blocks`, ignoring surrounding whitespace.
pub fn text_len(blocks: &[Block]) -> usize {
    plain_text(blocks).trim().chars().count()
}

fn collect_block(block: &Block, lines: &mut Vec<String>) {
    let mut line = String::new();
    if let Some(content) = &block.content {
        collect_value(content, &mut line, lines);
    }
    push_line(line, lines);

    for child in &block.children {
        collect_block(child, lines);
    }
}

fn collect_value(value: &Value, line: &mut String, lines: &mut Vec<String>) {
    match value {
        Value::String(s) => line.push_str(s),
        Value::Array(items) => {
            for item in items {
                if is_block_value(item) {
                    // nested block: finish the current line, then give it its own
                    push_line(std::mem::take(line), lines);
                    let mut nested = String::new();
                    collect_object(item, &mut nested, lines);
                    push_line(nested, lines);
                } else {
                    collect_value(item, line, lines);
                }
            }
        }
        Value::Object(_) => collect_object(value, line, lines),
        _ => {}
    }
}

fn collect_object(value: &Value, line: &mut String, lines: &mut Vec<String>) {
    let Some(obj) = value.as_object() else {
        return;
    };
    for (key, v) in obj {
        if SKIP_KEYS.contains(&key.as_str()) {
            continue;
        }
        match (key.as_str(), v) {
            ("text", Value::String(s)) => line.push_str(s),
            (_, Value::Array(_) | Value::Object(_)) => collect_value(v, line, lines),
            _ => {}
        }
    }
}

fn push_line(line: String, lines: &mut Vec<String>) {
    if !line.is_empty() {
        lines.push(line);
    }
}
