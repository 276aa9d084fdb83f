//! Open-time reconciliation between the local cache and the remote record.
//!
//! Last writer wins, judged by timestamp: the local cache wins only when it
//! is strictly newer than the remote record. Ties go to the remote side so
//! every device converges on the authoritative copy.

use chrono::{DateTime, Utc};
use smol_str::SmolStr;
use tuon_common::SyncConfig;
use tuon_editor_core::Block;

use crate::remote::RemoteRecord;
use crate::state::{LoadSource, SyncState};
use crate::storage::LocalCacheEntry;

/// Outcome of the remote fetch made while opening a document.
#[derive(Clone, Debug)]
pub enum RemoteFetch {
    Found(RemoteRecord),
    NotFound,
    Failed(String),
}

/// Initial state for an opened document.
#[derive(Clone, Debug, PartialEq)]
pub struct Reconciled {
    pub source: LoadSource,
    pub title: String,
    /// Content in durable form.
    pub content: Vec<Block>,
    pub state: SyncState,
    pub title_locked: bool,
    /// Timestamp of the snapshot the local cache holds after opening.
    pub baseline: Option<DateTime<Utc>>,
    pub load_error: Option<String>,
    /// New local baseline to write when the remote record won.
    pub rebase: Option<LocalCacheEntry>,
}

impl Reconciled {
    fn blank(source: LoadSource, config: &SyncConfig) -> Self {
        Self {
            source,
            title: config.placeholder_title.clone(),
            content: Vec::new(),
            state: SyncState::new(),
            title_locked: false,
            baseline: None,
            load_error: None,
            rebase: None,
        }
    }

    fn from_local(entry: LocalCacheEntry, state: SyncState) -> Self {
        Self {
            source: LoadSource::Local,
            title: entry.title,
            content: entry.content,
            state,
            title_locked: entry.title_locked,
            baseline: Some(entry.updated_at),
            load_error: None,
            rebase: None,
        }
    }
}

/// Decide what the editor starts with.
pub fn reconcile(
    id: &str,
    remote: RemoteFetch,
    local: Option<LocalCacheEntry>,
    config: &SyncConfig,
) -> Reconciled {
    match (remote, local) {
        (RemoteFetch::Found(record), Some(entry)) if entry.updated_at > record.updated_at => {
            tracing::debug!(id, "local cache is newer than remote");
            Reconciled::from_local(
                entry,
                SyncState {
                    pending: true,
                    persisted: true,
                    ..Default::default()
                },
            )
        }

        (RemoteFetch::Found(record), entry) => {
            tracing::debug!(id, had_local = entry.is_some(), "loading remote record");
            let title_locked = entry.is_some_and(|e| e.title_locked);
            let rebase = LocalCacheEntry {
                id: SmolStr::new(id),
                content: record.content.clone(),
                title: record.title.clone(),
                updated_at: record.updated_at,
                persisted: true,
                title_locked,
            };
            Reconciled {
                source: LoadSource::Remote,
                title: record.title,
                content: record.content,
                state: SyncState {
                    persisted: true,
                    ..Default::default()
                },
                title_locked,
                baseline: Some(record.updated_at),
                load_error: None,
                rebase: Some(rebase),
            }
        }

        (RemoteFetch::NotFound, Some(entry)) => {
            // never synced: a create is owed only if there is something to create
            let owed = !entry.is_blank(|t| config.is_placeholder_title(t));
            tracing::debug!(id, create_owed = owed, "document only exists locally");
            Reconciled::from_local(
                entry,
                SyncState {
                    pending: owed,
                    ..Default::default()
                },
            )
        }

        (RemoteFetch::Failed(error), Some(entry)) => {
            tracing::warn!(id, error = %error, "remote fetch failed, using local cache");
            let persisted = entry.persisted;
            Reconciled::from_local(
                entry,
                SyncState {
                    pending: true,
                    persisted,
                    ..Default::default()
                },
            )
        }

        (RemoteFetch::Failed(error), None) => {
            tracing::warn!(id, error = %error, "remote fetch failed and nothing is cached");
            Reconciled {
                load_error: Some(error),
                ..Reconciled::blank(LoadSource::Failed, config)
            }
        }

        (RemoteFetch::NotFound, None) => Reconciled::blank(LoadSource::New, config),
    }
}
