//! Image reference rewriting between durable and display form.
//!
//! Durable form: an image block's `url` prop is a relative storage path.
//! Display form: `url` is a short-lived signed URL and the relative path is
//! kept next to it in `storagePath`.
//!
//! Both directions walk the tree depth-first (typed children as well as
//! block arrays nested inside raw `content`), keep block order, and return a
//! rewritten copy; the input is never touched.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::types::{Block, IMAGE_BLOCK, STORAGE_PATH_PROP, URL_PROP};

type Props = Map<String, Value>;

const ABSOLUTE_PREFIXES: &[&str] = &["http://", "https://", "data:", "blob:"];

/// Whether `url` is a relative storage path rather than a fetchable URL.
pub fn is_relative_path(url: &str) -> bool {
    let url = url.trim();
    !url.is_empty()
        && !ABSOLUTE_PREFIXES.iter().any(|prefix| {
            url.get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        })
}

/// Relative path backing an image's props, whichever form they are in.
fn storage_path(props: &Props) -> Option<&str> {
    if let Some(path) = props.get(STORAGE_PATH_PROP).and_then(Value::as_str) {
        return Some(path);
    }
    props
        .get(URL_PROP)
        .and_then(Value::as_str)
        .filter(|url| is_relative_path(url))
}

/// Whether any image block exists anywhere in `blocks`.
pub fn contains_image(blocks: &[Block]) -> bool {
    let mut found = false;
    visit_blocks(blocks, &mut |_| found = true);
    found
}

/// Distinct relative image paths in `blocks`, in first-seen order.
pub fn relative_paths(blocks: &[Block]) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    visit_blocks(blocks, &mut |props| {
        if let Some(path) = storage_path(props) {
            if !paths.iter().any(|p| p == path) {
                paths.push(path.to_string());
            }
        }
    });
    paths
}

/// Rewrite `blocks` for display.
///
/// Every image whose relative path appears in `resolved` gets the resolved
/// URL in `url` and keeps the path in `storagePath`. Images with no entry
/// (resolution failed) are left as they are.
pub fn to_display(blocks: &[Block], resolved: &HashMap<String, String>) -> Vec<Block> {
    let mut out = blocks.to_vec();
    rewrite_blocks(&mut out, &mut |props| {
        let Some(path) = storage_path(props).map(str::to_string) else {
            return;
        };
        if let Some(url) = resolved.get(&path) {
            props.insert(URL_PROP.into(), Value::String(url.clone()));
            props.insert(STORAGE_PATH_PROP.into(), Value::String(path));
        }
    });
    out
}

/// Rewrite `blocks` for persistence: display URLs go back to the retained
/// relative path and `storagePath` is dropped.
pub fn to_durable(blocks: &[Block]) -> Vec<Block> {
    let mut out = blocks.to_vec();
    rewrite_blocks(&mut out, &mut |props| {
        if let Some(path) = props.remove(STORAGE_PATH_PROP) {
            props.insert(URL_PROP.into(), path);
        }
    });
    out
}

fn is_image_value(obj: &Props) -> bool {
    obj.get("type").and_then(Value::as_str) == Some(IMAGE_BLOCK)
}

fn visit_blocks<F: FnMut(&Props)>(blocks: &[Block], f: &mut F) {
    for block in blocks {
        if block.is_image() {
            f(&block.props);
        }
        if let Some(content) = &block.content {
            visit_value(content, f);
        }
        visit_blocks(&block.children, f);
    }
}

fn visit_value<F: FnMut(&Props)>(value: &Value, f: &mut F) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| visit_value(item, f)),
        Value::Object(obj) => {
            if is_image_value(obj) {
                if let Some(Value::Object(props)) = obj.get("props") {
                    f(props);
                }
            }
            for (key, v) in obj {
                if key != "props" {
                    visit_value(v, f);
                }
            }
        }
        _ => {}
    }
}

fn rewrite_blocks<F: FnMut(&mut Props)>(blocks: &mut [Block], f: &mut F) {
    for block in blocks {
        if block.is_image() {
            f(&mut block.props);
        }
        if let Some(content) = &mut block.content {
            rewrite_value(content, f);
        }
        rewrite_blocks(&mut block.children, f);
    }
}

fn rewrite_value<F: FnMut(&mut Props)>(value: &mut Value, f: &mut F) {
    match value {
        Value::Array(items) => items.iter_mut().for_each(|item| rewrite_value(item, f)),
        Value::Object(obj) => {
            if is_image_value(obj) {
                if let Some(Value::Object(props)) = obj.get_mut("props") {
                    f(props);
                }
            }
            for (key, v) in obj.iter_mut() {
                if key != "props" {
                    rewrite_value(v, f);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn signed(path: &str) -> String {
        format!("https://storage.example.com/sign/{path}?token=abc")
    }

    fn resolved_for(blocks: &[Block]) -> HashMap<String, String> {
        relative_paths(blocks)
            .into_iter()
            .map(|p| {
                let url = signed(&p);
                (p, url)
            })
            .collect()
    }

    fn nested_doc() -> Vec<Block> {
        vec![
            Block::paragraph("intro"),
            Block::image("user-1/cat.png").with_id("img-top"),
            Block::new("bulletListItem")
                .with_children(vec![Block::image("user-1/dog.png").with_id("img-child")]),
            Block::new("columnList").with_content(json!([
                {"id": "col", "type": "column", "children": [
                    {"id": "img-nested", "type": "image", "props": {"url": "user-1/owl.png", "caption": "owl"}}
                ]}
            ])),
            Block::image("https://elsewhere.example.com/static.png"),
        ]
    }

    #[test]
    fn test_relative_path_detection() {
        assert!(is_relative_path("user-1/cat.png"));
        assert!(is_relative_path("/uploads/cat.png"));
        assert!(!is_relative_path("https://cdn/cat.png"));
        assert!(!is_relative_path("HTTP://cdn/cat.png"));
        assert!(!is_relative_path("data:image/png;base64,AAAA"));
        assert!(!is_relative_path("blob:https://app/123"));
        assert!(!is_relative_path(""));
    }

    #[test]
    fn test_relative_paths_walks_whole_tree() {
        assert_eq!(
            relative_paths(&nested_doc()),
            vec!["user-1/cat.png", "user-1/dog.png", "user-1/owl.png"]
        );
    }

    #[test]
    fn test_display_form_keeps_storage_path() {
        let doc = nested_doc();
        let display = to_display(&doc, &resolved_for(&doc));

        assert_eq!(display[1].prop_str(URL_PROP), Some(signed("user-1/cat.png").as_str()));
        assert_eq!(display[1].prop_str(STORAGE_PATH_PROP), Some("user-1/cat.png"));
        assert_eq!(
            display[2].children[0].prop_str(URL_PROP),
            Some(signed("user-1/dog.png").as_str())
        );
        let nested = &display[3].content.as_ref().unwrap()[0]["children"][0]["props"];
        assert_eq!(nested["url"], json!(signed("user-1/owl.png")));
        assert_eq!(nested["storagePath"], json!("user-1/owl.png"));
        assert_eq!(nested["caption"], json!("owl"));
        // absolute URLs are left alone
        assert_eq!(display[4], doc[4]);
    }

    #[test]
    fn test_input_is_not_mutated() {
        let doc = nested_doc();
        let before = doc.clone();
        let display = to_display(&doc, &resolved_for(&doc));
        let _ = to_durable(&display);
        assert_eq!(doc, before);
        assert_ne!(display, before);
    }

    #[test]
    fn test_round_trip_restores_relative_paths() {
        let doc = nested_doc();
        let display = to_display(&doc, &resolved_for(&doc));
        assert_eq!(to_durable(&display), doc);
    }

    #[test]
    fn test_unresolved_images_stay_relative() {
        let doc = vec![Block::image("user-1/cat.png"), Block::image("user-1/dog.png")];
        let mut resolved = HashMap::new();
        resolved.insert("user-1/dog.png".to_string(), signed("user-1/dog.png"));

        let display = to_display(&doc, &resolved);
        assert_eq!(display[0], doc[0]);
        assert_eq!(display[1].prop_str(STORAGE_PATH_PROP), Some("user-1/dog.png"));
    }

    #[test]
    fn test_display_form_can_be_refreshed() {
        let doc = vec![Block::image("user-1/cat.png")];
        let display = to_display(&doc, &resolved_for(&doc));

        // paths are still discoverable from display form
        assert_eq!(relative_paths(&display), vec!["user-1/cat.png"]);

        let mut fresh = HashMap::new();
        fresh.insert("user-1/cat.png".to_string(), "https://new/cat".to_string());
        let refreshed = to_display(&display, &fresh);
        assert_eq!(refreshed[0].prop_str(URL_PROP), Some("https://new/cat"));
        assert_eq!(to_durable(&refreshed), doc);
    }

    #[test]
    fn test_contains_image() {
        assert!(contains_image(&nested_doc()));
        assert!(!contains_image(&[Block::paragraph("text only")]));
    }
}
