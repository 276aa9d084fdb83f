//! tuon-sync: keeps the editor, the local cache and the remote store in step.
//!
//! This crate provides:
//! - `ArtifactSync` - the engine: open, edit, flush, switch documents
//! - `LocalStore` / `RemoteStore` - the storage seams, with in-memory and
//!   file-backed local stores
//! - `reconcile` - last-writer-wins choice between cached and remote content
//! - `Debouncer` / `Throttle` - the timers behind local saves and remote writes
//! - `MediaResolver` / `TitleSuggester` - external services the engine calls

pub mod engine;
pub mod error;
pub mod media;
pub mod reconcile;
pub mod remote;
pub mod services;
pub mod state;
pub mod storage;
pub mod timing;
pub mod titles;

pub use engine::{ArtifactSync, SyncOutcome, new_document_id};
pub use error::{Result, SyncError};
pub use media::DisplayUrls;
pub use reconcile::{Reconciled, RemoteFetch, reconcile};
pub use remote::{RemoteRecord, RemoteStore};
pub use services::{
    Identity, MediaResolver, NoTitles, PublicMedia, StaticIdentity, TitleSuggester,
};
pub use state::{LoadSource, LoadedDocument, SyncEvent, SyncState, SyncStatus};
pub use storage::{CachedDocument, FileStore, LocalCacheEntry, LocalStore, MemoryStore};
pub use timing::{Debouncer, Slot, Throttle};
pub use tuon_common::SyncConfig;
