use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tuning for the artifact sync engine.
///
/// All timing values are stored in whole milliseconds/seconds so the struct
/// serializes cleanly; use the accessor methods to get [`Duration`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    /// Quiet period before an edit is written to the local cache.
    pub local_save_debounce_ms: u64,
    /// Minimum spacing between remote writes for one document.
    pub remote_sync_interval_ms: u64,
    /// Title given to documents nobody has named yet.
    pub placeholder_title: String,
    /// Plain-text length needed before a title suggestion is requested.
    pub min_title_chars: usize,
    /// How long a resolved display URL stays valid.
    pub display_url_ttl_secs: u64,
    /// Maximum number of resolved display URLs kept in memory.
    pub display_url_cache_capacity: u64,
    /// Kick the throttle again after a failed remote write.
    pub retry_failed_syncs: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            local_save_debounce_ms: 1000,
            remote_sync_interval_ms: 3000,
            placeholder_title: Self::DEFAULT_PLACEHOLDER_TITLE.to_string(),
            min_title_chars: 80,
            display_url_ttl_secs: 3600,
            display_url_cache_capacity: 500,
            retry_failed_syncs: true,
        }
    }
}

impl SyncConfig {
    pub const DEFAULT_PLACEHOLDER_TITLE: &'static str = "Untitled";

    /// Load configuration from environment variables on top of the defaults.
    ///
    /// Optional env vars:
    /// - `TUON_LOCAL_SAVE_DEBOUNCE_MS`: local save quiet period (default: 1000)
    /// - `TUON_REMOTE_SYNC_INTERVAL_MS`: remote write throttle (default: 3000)
    /// - `TUON_PLACEHOLDER_TITLE`: title for unnamed documents (default: "Untitled")
    /// - `TUON_MIN_TITLE_CHARS`: content needed for a title suggestion (default: 80)
    /// - `TUON_DISPLAY_URL_TTL_SECS`: signed image URL lifetime (default: 3600)
    /// - `TUON_DISPLAY_URL_CACHE_CAPACITY`: resolved URLs kept in memory (default: 500)
    /// - `TUON_RETRY_FAILED_SYNCS`: reschedule failed remote writes (default: true)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`SyncConfig::from_env`] but reads values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) =
            parse_var(&lookup, "TUON_LOCAL_SAVE_DEBOUNCE_MS", "local_save_debounce_ms")?
        {
            config.local_save_debounce_ms = v;
        }
        if let Some(v) =
            parse_var(&lookup, "TUON_REMOTE_SYNC_INTERVAL_MS", "remote_sync_interval_ms")?
        {
            config.remote_sync_interval_ms = v;
        }
        if let Some(title) = lookup("TUON_PLACEHOLDER_TITLE") {
            config.placeholder_title = title;
        }
        if let Some(v) = parse_var(&lookup, "TUON_MIN_TITLE_CHARS", "min_title_chars")? {
            config.min_title_chars = v;
        }
        if let Some(v) = parse_var(&lookup, "TUON_DISPLAY_URL_TTL_SECS", "display_url_ttl_secs")? {
            config.display_url_ttl_secs = v;
        }
        if let Some(v) = parse_var(
            &lookup,
            "TUON_DISPLAY_URL_CACHE_CAPACITY",
            "display_url_cache_capacity",
        )? {
            config.display_url_cache_capacity = v;
        }
        if let Some(v) = parse_var(&lookup, "TUON_RETRY_FAILED_SYNCS", "retry_failed_syncs")? {
            config.retry_failed_syncs = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote_sync_interval_ms == 0 {
            return Err(ConfigError::Zero {
                field: "remote_sync_interval_ms",
            });
        }
        if self.display_url_ttl_secs == 0 {
            return Err(ConfigError::Zero {
                field: "display_url_ttl_secs",
            });
        }
        Ok(())
    }

    pub fn local_save_debounce(&self) -> Duration {
        Duration::from_millis(self.local_save_debounce_ms)
    }

    pub fn remote_sync_interval(&self) -> Duration {
        Duration::from_millis(self.remote_sync_interval_ms)
    }

    pub fn display_url_ttl(&self) -> Duration {
        Duration::from_secs(self.display_url_ttl_secs)
    }

    /// Cache lifetime for resolved URLs: a tenth shorter than the URL itself
    /// so nothing handed to the editor is about to expire.
    pub fn display_url_cache_ttl(&self) -> Duration {
        let ttl = self.display_url_ttl();
        ttl - ttl / 10
    }

    pub fn is_placeholder_title(&self, title: &str) -> bool {
        let title = title.trim();
        title.is_empty() || title == self.placeholder_title
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    field: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::Invalid {
                field,
                var,
                message: format!("{raw:?}: {e}"),
            }),
    }
}
