//! Remote persistence contract.
//!
//! The hosted backend is authoritative. Calls either fail outright
//! (`Err`, e.g. network down) or answer with a success flag, matching the
//! backend's own API shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tuon_editor_core::Block;

use crate::error::Result;

/// A document as stored remotely.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    #[serde(default)]
    pub content: Vec<Block>,
    #[serde(default)]
    pub title: String,
    pub updated_at: DateTime<Utc>,
}

/// Remote document store.
///
/// Implement [`RemoteStore`]; the local (non-`Send`) variant is generated for
/// single-threaded targets.
#[trait_variant::make(RemoteStore: Send)]
pub trait LocalRemoteStore {
    /// Fetch a document; `Ok(None)` when it does not exist.
    async fn get(&self, id: &str) -> Result<Option<RemoteRecord>>;

    /// Create a document under a caller-chosen id.
    async fn create_with_id(
        &self,
        id: &str,
        user_id: &str,
        title: &str,
        content: &[Block],
    ) -> Result<bool>;

    async fn update_title(&self, id: &str, title: &str) -> Result<bool>;

    async fn update_content(&self, id: &str, content: &[Block], user_id: &str) -> Result<bool>;
}
