//! tuon-editor-core: document model without framework dependencies.
//!
//! This crate provides:
//! - `Block` / `Content` - the block tree the editor produces
//! - `Document` - id, title, content and modification time
//! - Plain-text extraction for titles and blank checks
//! - Image reference rewriting between durable and display form

pub mod document;
pub mod images;
pub mod text;
pub mod types;

pub use document::{Document, content_is_blank};
pub use images::{contains_image, is_relative_path, relative_paths, to_display, to_durable};
pub use smol_str::SmolStr;
pub use text::{plain_text, text_len};
pub use types::{Block, Content, IMAGE_BLOCK, STORAGE_PATH_PROP, URL_PROP};
