//! The document as the editor sees it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::images::contains_image;
use crate::text::plain_text;
use crate::types::{Block, Content};

/// A document: identifier, title, block content and last-modified time.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: SmolStr,
    pub title: String,
    #[serde(default)]
    pub content: Content,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// An empty document stamped with the current time.
    pub fn empty(id: impl Into<SmolStr>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn with_content(mut self, content: Vec<Block>) -> Self {
        self.content = content;
        self
    }
}

/// Whether `content` holds no text and no images.
pub fn content_is_blank(content: &[Block]) -> bool {
    plain_text(content).trim().is_empty() && !contains_image(content)
}
