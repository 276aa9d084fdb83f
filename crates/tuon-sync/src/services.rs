//! Collaborator contracts besides the stores: identity, image URL signing
//! and title suggestion.

use smol_str::SmolStr;
use tuon_editor_core::Block;

use crate::error::Result;

/// Source of the current user id. Available synchronously once signed in.
pub trait Identity: Send + Sync + 'static {
    fn current_user(&self) -> Option<SmolStr>;
}

/// Fixed identity, for tests and single-user tools.
#[derive(Clone, Debug, Default)]
pub struct StaticIdentity(pub Option<SmolStr>);

impl StaticIdentity {
    pub fn signed_in(user: impl Into<SmolStr>) -> Self {
        Self(Some(user.into()))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl Identity for StaticIdentity {
    fn current_user(&self) -> Option<SmolStr> {
        self.0.clone()
    }
}

/// Turns a relative storage path into a time-limited display URL.
#[trait_variant::make(MediaResolver: Send)]
pub trait LocalMediaResolver {
    async fn display_url(&self, relative_path: &str) -> Result<String>;
}

/// Suggests a title for a document's content.
#[trait_variant::make(TitleSuggester: Send)]
pub trait LocalTitleSuggester {
    async fn suggest_title(&self, content: &[Block]) -> Result<String>;
}

/// Resolver for public buckets: the display URL is the path under a base URL.
#[derive(Clone, Debug)]
pub struct PublicMedia {
    base_url: String,
}

impl PublicMedia {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl MediaResolver for PublicMedia {
    async fn display_url(&self, relative_path: &str) -> Result<String> {
        Ok(format!(
            "{}/{}",
            self.base_url,
            relative_path.trim_start_matches('/')
        ))
    }
}

/// Suggester that never suggests anything.
#[derive(Clone, Debug, Default)]
pub struct NoTitles;

impl TitleSuggester for NoTitles {
    async fn suggest_title(&self, _content: &[Block]) -> Result<String> {
        Err(crate::error::SyncError::Service(
            "title suggestions are disabled".into(),
        ))
    }
}
