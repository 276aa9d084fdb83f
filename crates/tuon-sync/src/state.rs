//! Sync state tracking and the events the engine reports.

use smol_str::SmolStr;
use tuon_editor_core::Block;

/// Sync flags for one open document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncState {
    /// Editor changed since the last local save.
    pub dirty: bool,
    /// Local cache holds changes the remote store has not seen.
    pub pending: bool,
    /// A remote write is in flight.
    pub syncing: bool,
    /// The document exists remotely.
    pub persisted: bool,
    /// Most recent remote failure.
    pub last_error: Option<String>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nothing left to write anywhere.
    pub fn is_settled(&self) -> bool {
        !self.dirty && !self.pending && !self.syncing
    }
}

/// Point-in-time view of the active document's sync state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncStatus {
    pub id: SmolStr,
    pub state: SyncState,
    /// Set when the document could not be loaded at all.
    pub load_error: Option<String>,
}

impl SyncStatus {
    pub fn label(&self) -> &'static str {
        if self.load_error.is_some() {
            "Load error"
        } else if self.state.syncing {
            "Syncing..."
        } else if self.state.last_error.is_some() {
            "Sync error"
        } else if self.state.dirty || self.state.pending {
            "Unsynced"
        } else {
            "Synced"
        }
    }
}

/// Where the initial content of an opened document came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadSource {
    /// Local cache was newer (or the remote had nothing usable).
    Local,
    /// Remote record was at least as new as the local cache.
    Remote,
    /// Nothing existed anywhere.
    New,
    /// Remote failed and there was no local copy.
    Failed,
    /// The id was already the active document.
    AlreadyOpen,
}

/// Result of opening a document.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedDocument {
    pub id: SmolStr,
    pub title: String,
    /// Content in display form.
    pub content: Vec<Block>,
    pub source: LoadSource,
    pub status: SyncStatus,
}

/// Events published by the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum SyncEvent {
    Loaded { id: SmolStr, source: LoadSource },
    LocalSaved { id: SmolStr },
    RemoteSynced { id: SmolStr, created: bool },
    SyncFailed { id: SmolStr, error: String },
    /// A document created remotely should now appear in the navigable location.
    AttachToLocation { id: SmolStr },
    TitleSuggested { id: SmolStr, title: String },
}
