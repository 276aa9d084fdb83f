//! Display URL resolution for image blocks.

use std::collections::HashMap;

use tuon_common::{SyncConfig, TtlCache};
use tuon_editor_core::{Block, relative_paths, to_display};

use crate::services::MediaResolver;

/// Resolves relative image paths to display URLs, caching each URL for a
/// little less than its validity.
pub struct DisplayUrls<M> {
    resolver: M,
    cache: TtlCache<String, String>,
}

impl<M: MediaResolver> DisplayUrls<M> {
    pub fn new(resolver: M, config: &SyncConfig) -> Self {
        Self {
            resolver,
            cache: TtlCache::new(
                config.display_url_cache_capacity,
                config.display_url_cache_ttl(),
            ),
        }
    }

    /// Resolve `paths`, concurrently for the ones not already cached.
    ///
    /// Paths that fail to resolve are logged and left out of the map.
    pub async fn resolve_all(&self, paths: &[String]) -> HashMap<String, String> {
        let mut resolved = HashMap::new();
        let mut missing = Vec::new();
        for path in paths {
            match self.cache.get(path) {
                Some(url) => {
                    resolved.insert(path.clone(), url);
                }
                None => missing.push(path.clone()),
            }
        }

        let fetched = n0_future::join_all(missing.iter().map(|path| async move {
            (path, self.resolver.display_url(path).await)
        }))
        .await;

        for (path, result) in fetched {
            match result {
                Ok(url) => {
                    self.cache.insert(path.clone(), url.clone());
                    resolved.insert(path.clone(), url);
                }
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "failed to resolve image display URL");
                }
            }
        }
        resolved
    }

    /// Copy of `content` with every resolvable image in display form.
    pub async fn prepare_for_display(&self, content: &[Block]) -> Vec<Block> {
        let paths = relative_paths(content);
        if paths.is_empty() {
            return content.to_vec();
        }
        let resolved = self.resolve_all(&paths).await;
        to_display(content, &resolved)
    }
}
