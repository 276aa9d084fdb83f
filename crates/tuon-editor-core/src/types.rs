//! Core content types: blocks and the block tree.
//!
//! These types mirror the JSON the block editor produces. Anything the sync
//! layer does not need to understand (inline content, styling props) is kept
//! as raw JSON so it round-trips untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use smol_str::SmolStr;

/// Block type used for images.
pub const IMAGE_BLOCK: &str = "image";

/// Prop holding the image location (relative path or display URL).
pub const URL_PROP: &str = "url";

/// Prop holding the relative path while `url` carries a display URL.
pub const STORAGE_PATH_PROP: &str = "storagePath";

/// Ordered list of top-level blocks.
pub type Content = Vec<Block>;

/// A single block in the document tree.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct Block {
    /// Editor-assigned block id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<SmolStr>,

    /// Block type, e.g. `paragraph`, `heading`, `image`.
    #[serde(rename = "type")]
    pub kind: SmolStr,

    /// Free-form block properties.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub props: Map<String, Value>,

    /// Inline content. May also hold nested block arrays (tables, columns).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,

    /// Nested child blocks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Block>,
}

impl Block {
    pub fn new(kind: impl Into<SmolStr>) -> Self {
        Self {
            kind: kind.into(),
            ..Default::default()
        }
    }

    /// A paragraph holding one unstyled text run.
    pub fn paragraph(text: impl Into<String>) -> Self {
        let mut run = Map::new();
        run.insert("type".into(), Value::String("text".into()));
        run.insert("text".into(), Value::String(text.into()));
        run.insert("styles".into(), Value::Object(Map::new()));

        Self {
            content: Some(Value::Array(vec![Value::Object(run)])),
            ..Self::new("paragraph")
        }
    }

    /// An image block pointing at `url`.
    pub fn image(url: impl Into<String>) -> Self {
        let mut block = Self::new(IMAGE_BLOCK);
        block
            .props
            .insert(URL_PROP.into(), Value::String(url.into()));
        block
    }

    pub fn with_id(mut self, id: impl Into<SmolStr>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_children(mut self, children: Vec<Block>) -> Self {
        self.children = children;
        self
    }

    pub fn with_content(mut self, content: Value) -> Self {
        self.content = Some(content);
        self
    }

    pub fn is_image(&self) -> bool {
        self.kind == IMAGE_BLOCK
    }

    /// String value of a prop, if present.
    pub fn prop_str(&self, key: &str) -> Option<&str> {
        self.props.get(key).and_then(Value::as_str)
    }
}

/// Whether a JSON value looks like a serialized block.
///
/// Inline runs also carry a `type`, so a block is recognised by having
/// a `type` plus at least one of the block-only keys.
pub(crate) fn is_block_value(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    obj.get("type").is_some_and(Value::is_string)
        && (obj.contains_key("props") || obj.contains_key("children") || obj.contains_key("id"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_block_json_shape() {
        let block = Block::paragraph("hello").with_id("b1");
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "b1",
                "type": "paragraph",
                "content": [{"type": "text", "text": "hello", "styles": {}}]
            })
        );
    }

    #[test]
    fn test_unknown_props_survive_round_trip() {
        let raw = json!({
            "id": "x",
            "type": "heading",
            "props": {"level": 2, "textColor": "default"},
            "content": [{"type": "text", "text": "Title", "styles": {"bold": true}}],
            "children": [{"type": "paragraph", "content": []}]
        });
        let block: Block = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(block.kind, "heading");
        assert_eq!(block.children.len(), 1);
        assert_eq!(serde_json::to_value(&block).unwrap(), raw);
    }

    #[test]
    fn test_image_block() {
        let block = Block::image("images/cat.png");
        assert!(block.is_image());
        assert_eq!(block.prop_str(URL_PROP), Some("images/cat.png"));
    }

    #[test]
    fn test_inline_run_is_not_block() {
        assert!(!is_block_value(&json!({"type": "text", "text": "hi", "styles": {}})));
        assert!(is_block_value(&json!({"type": "image", "props": {"url": "a.png"}})));
        assert!(is_block_value(&json!({"id": "c", "type": "column"})));
        assert!(!is_block_value(&json!("text")));
    }
}
