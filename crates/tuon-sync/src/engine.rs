//! The sync engine: one active document, its debounced local saves and its
//! throttled remote writes.
//!
//! Every edit marks the document dirty and (re)starts the local-save
//! debounce. A local save writes the durable snapshot, marks the document
//! pending and kicks the per-document throttle, which reads the snapshot
//! back from the local store and pushes it to the remote store. Switching
//! documents flushes the outgoing one without waiting on its remote write.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use smol_str::{SmolStr, ToSmolStr};
use tokio::sync::broadcast;
use tuon_common::SyncConfig;
use tuon_editor_core::{Block, Document, to_durable};

use crate::error::{Result, SyncError};
use crate::media::DisplayUrls;
use crate::reconcile::{RemoteFetch, reconcile};
use crate::remote::RemoteStore;
use crate::services::{Identity, MediaResolver, TitleSuggester};
use crate::state::{LoadSource, LoadedDocument, SyncEvent, SyncState, SyncStatus};
use crate::storage::{
    CachedDocument, LocalCacheEntry, LocalStore, delete_entry, list_entries, load_entry,
    load_entry_strict, save_entry,
};
use crate::timing::{Debouncer, Throttle};
use crate::titles::{clean_suggestion, should_suggest_title};

const EVENT_CAPACITY: usize = 64;

/// What a remote sync attempt did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The document was created remotely.
    Created,
    /// An existing remote document was updated.
    Updated,
    /// Nothing was pending.
    NoChanges,
    /// Another write for this document is already in flight.
    InFlight,
    /// The document is not open.
    NotOpen,
}

struct Session {
    title: String,
    /// Display form.
    content: Vec<Block>,
    title_locked: bool,
    in_location: bool,
    state: SyncState,
    load_error: Option<String>,
    /// Timestamp of the newest snapshot in the local store.
    last_saved_at: Option<DateTime<Utc>>,
    /// Bumped on every edit so a save can tell whether it captured the latest one.
    revision: u64,
    throttle: Throttle,
}

impl Session {
    fn status(&self, id: &SmolStr) -> SyncStatus {
        SyncStatus {
            id: id.clone(),
            state: self.state.clone(),
            load_error: self.load_error.clone(),
        }
    }
}

#[derive(Default)]
struct Sessions {
    active: Option<SmolStr>,
    docs: HashMap<SmolStr, Session>,
}

impl Sessions {
    fn is_active(&self, id: &str) -> bool {
        self.active.as_deref() == Some(id)
    }

    /// Forget a document that is no longer open once nothing is in flight.
    fn retire(&mut self, id: &str) {
        if self.is_active(id) {
            return;
        }
        if self.docs.get(id).is_some_and(|s| !s.state.syncing) {
            if let Some(session) = self.docs.remove(id) {
                session.throttle.cancel();
                tracing::trace!(id, "retired document session");
            }
        }
    }
}

type SharedSessions = Arc<Mutex<Sessions>>;

fn lock(sessions: &SharedSessions) -> MutexGuard<'_, Sessions> {
    sessions.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the in-flight flag however the remote write ends.
struct SyncingGuard {
    sessions: SharedSessions,
    id: SmolStr,
}

impl Drop for SyncingGuard {
    fn drop(&mut self) {
        let mut sessions = lock(&self.sessions);
        if let Some(session) = sessions.docs.get_mut(&self.id) {
            session.state.syncing = false;
        }
    }
}

/// Everything a remote write needs, captured when it starts.
struct SyncTicket {
    entry: LocalCacheEntry,
    user: SmolStr,
    persisted: bool,
    guard: SyncingGuard,
}

struct Inner<R, L, M, T> {
    config: SyncConfig,
    remote: R,
    local: L,
    media: DisplayUrls<M>,
    titles: T,
    identity: Arc<dyn Identity>,
    sessions: SharedSessions,
    local_save: Debouncer,
    opens: AtomicU64,
    events: broadcast::Sender<SyncEvent>,
}

/// Keeps the editor, the local cache and the remote store consistent for
/// the active document.
///
/// Cheap to clone; clones share the same state.
pub struct ArtifactSync<R, L, M, T> {
    inner: Arc<Inner<R, L, M, T>>,
}

impl<R, L, M, T> Clone for ArtifactSync<R, L, M, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Fresh id for a document that does not exist anywhere yet.
pub fn new_document_id() -> SmolStr {
    uuid::Uuid::now_v7().to_smolstr()
}

/// Local save timestamps never go backwards past the snapshot they replace,
/// otherwise a remote clock ahead of ours would win the next open.
fn next_stamp(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match previous {
        Some(prev) if prev >= now => prev + TimeDelta::milliseconds(1),
        _ => now,
    }
}

impl<R, L, M, T> ArtifactSync<R, L, M, T>
where
    R: RemoteStore + Sync + 'static,
    L: LocalStore,
    M: MediaResolver + Sync + 'static,
    T: TitleSuggester + Sync + 'static,
{
    pub fn new(
        config: SyncConfig,
        remote: R,
        local: L,
        media: M,
        titles: T,
        identity: Arc<dyn Identity>,
    ) -> Result<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            inner: Arc::new(Inner {
                media: DisplayUrls::new(media, &config),
                local_save: Debouncer::new(config.local_save_debounce()),
                config,
                remote,
                local,
                titles,
                identity,
                sessions: SharedSessions::default(),
                opens: AtomicU64::new(0),
                events,
            }),
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Receive engine events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    fn emit(&self, event: SyncEvent) {
        // no subscribers is fine
        let _ = self.inner.events.send(event);
    }

    fn sessions(&self) -> MutexGuard<'_, Sessions> {
        lock(&self.inner.sessions)
    }

    pub fn active_id(&self) -> Option<SmolStr> {
        self.sessions().active.clone()
    }

    /// Sync status of the active document.
    pub fn status(&self) -> Option<SyncStatus> {
        let sessions = self.sessions();
        let id = sessions.active.as_ref()?;
        sessions.docs.get(id).map(|s| s.status(id))
    }

    /// The active document as the editor shows it.
    pub fn current_document(&self) -> Option<Document> {
        let sessions = self.sessions();
        let id = sessions.active.as_ref()?;
        let session = sessions.docs.get(id)?;
        let mut document = Document::empty(id.clone(), session.title.clone())
            .with_content(session.content.clone());
        if let Some(saved_at) = session.last_saved_at {
            document.updated_at = saved_at;
        }
        Some(document)
    }

    /// Open the document named by the current location.
    pub async fn open(&self, id: impl Into<SmolStr>) -> Result<LoadedDocument> {
        self.open_with(id.into(), true).await
    }

    /// Start a brand-new document. It is attached to the location once the
    /// remote store has created it.
    pub async fn open_new(&self) -> Result<LoadedDocument> {
        self.open_with(new_document_id(), false).await
    }

    #[tracing::instrument(skip_all, fields(id = %id))]
    async fn open_with(&self, id: SmolStr, in_location: bool) -> Result<LoadedDocument> {
        if let Some(loaded) = self.already_open(&id) {
            tracing::debug!("document already open");
            return Ok(loaded);
        }

        let generation = self.inner.opens.fetch_add(1, Ordering::SeqCst) + 1;
        self.leave_active();

        let remote = match self.inner.remote.get(&id).await {
            Ok(Some(record)) => RemoteFetch::Found(record),
            Ok(None) => RemoteFetch::NotFound,
            Err(e) => RemoteFetch::Failed(e.to_string()),
        };
        let local = load_entry(&self.inner.local, &id);
        let reconciled = reconcile(&id, remote, local, &self.inner.config);

        if let Some(rebase) = &reconciled.rebase {
            if let Err(e) = save_entry(&self.inner.local, rebase) {
                tracing::warn!(error = %e, "failed to rebase local cache on remote record");
            }
        }

        let content = self.inner.media.prepare_for_display(&reconciled.content).await;

        if self.inner.opens.load(Ordering::SeqCst) != generation {
            tracing::debug!("open superseded before it finished");
            return Err(SyncError::Superseded { id: id.to_string() });
        }

        let loaded = {
            let mut sessions = self.sessions();
            // a flush of an earlier visit may still be writing
            let lingering = sessions.docs.remove(&id);
            let mut state = reconciled.state;
            state.syncing = lingering.as_ref().is_some_and(|s| s.state.syncing);
            let throttle = lingering
                .map(|s| s.throttle)
                .unwrap_or_else(|| Throttle::new(self.inner.config.remote_sync_interval()));

            let session = Session {
                title: reconciled.title,
                content,
                title_locked: reconciled.title_locked,
                in_location,
                state,
                load_error: reconciled.load_error,
                last_saved_at: reconciled.baseline,
                revision: 0,
                throttle,
            };
            let loaded = LoadedDocument {
                id: id.clone(),
                title: session.title.clone(),
                content: session.content.clone(),
                source: reconciled.source,
                status: session.status(&id),
            };
            sessions.active = Some(id.clone());
            sessions.docs.insert(id.clone(), session);
            loaded
        };

        tracing::info!(
            source = ?loaded.source,
            pending = loaded.status.state.pending,
            "opened document"
        );
        self.emit(SyncEvent::Loaded {
            id: id.clone(),
            source: loaded.source,
        });

        if loaded.status.state.pending {
            self.kick_remote(&id);
        }
        self.maybe_suggest_title(&id);
        Ok(loaded)
    }

    fn already_open(&self, id: &SmolStr) -> Option<LoadedDocument> {
        let sessions = self.sessions();
        if !sessions.is_active(id) {
            return None;
        }
        let session = sessions.docs.get(id)?;
        Some(LoadedDocument {
            id: id.clone(),
            title: session.title.clone(),
            content: session.content.clone(),
            source: LoadSource::AlreadyOpen,
            status: session.status(id),
        })
    }

    /// Flush the outgoing document: finish its debounced save now and start
    /// its remote write without waiting for it.
    fn leave_active(&self) {
        let Some(id) = self.sessions().active.take() else {
            return;
        };
        self.inner.local_save.cancel();
        self.save_local(&id);

        {
            let sessions = self.sessions();
            if let Some(session) = sessions.docs.get(&id) {
                session.throttle.cancel();
            }
        }

        self.flush_detached(id);
    }

    /// Start the remote write of a document that is no longer active, or
    /// retire it when there is nothing to send.
    fn flush_detached(&self, id: SmolStr) {
        match self.begin_sync(&id) {
            Ok(Ok(ticket)) => {
                tracing::debug!(id = %id, "flushing outgoing document");
                let this = self.clone();
                tokio::spawn(async move {
                    let _ = this.finish_sync(&id, ticket).await;
                });
            }
            Ok(Err(_)) | Err(_) => self.sessions().retire(&id),
        }
    }

    /// Replace the active document's content (display form).
    pub fn set_content(&self, content: Vec<Block>) -> Result<()> {
        let id = self.active_id().ok_or(SyncError::NoActiveDocument)?;
        self.edit(&id, |session| session.content = content);
        Ok(())
    }

    /// Rename the active document. A user-chosen title is never replaced by
    /// a suggestion.
    pub fn set_title(&self, title: impl Into<String>) -> Result<()> {
        let id = self.active_id().ok_or(SyncError::NoActiveDocument)?;
        let title = title.into();
        self.edit(&id, |session| {
            session.title = title;
            session.title_locked = true;
        });
        Ok(())
    }

    fn edit(&self, id: &SmolStr, change: impl FnOnce(&mut Session)) -> bool {
        {
            let mut sessions = self.sessions();
            if !sessions.is_active(id) {
                return false;
            }
            let Some(session) = sessions.docs.get_mut(id) else {
                return false;
            };
            change(session);
            session.state.dirty = true;
            session.revision += 1;
        }
        self.schedule_local_save(id.clone());
        true
    }

    fn schedule_local_save(&self, id: SmolStr) {
        let this = self.clone();
        self.inner.local_save.schedule(async move {
            if this.save_local(&id) {
                this.kick_remote(&id);
            }
        });
    }

    /// Write the editor state of `id` to the local store if it changed.
    /// Returns whether a snapshot was written.
    fn save_local(&self, id: &SmolStr) -> bool {
        let (entry, revision) = {
            let sessions = self.sessions();
            let Some(session) = sessions.docs.get(id) else {
                return false;
            };
            if !session.state.dirty {
                return false;
            }
            let entry = LocalCacheEntry {
                id: id.clone(),
                content: to_durable(&session.content),
                title: session.title.clone(),
                updated_at: next_stamp(session.last_saved_at),
                persisted: session.state.persisted,
                title_locked: session.title_locked,
            };
            (entry, session.revision)
        };

        if let Err(e) = save_entry(&self.inner.local, &entry) {
            // editor state stays dirty, the next edit or flush tries again
            tracing::warn!(id = %id, error = %e, "local save failed");
            return false;
        }

        {
            let mut sessions = self.sessions();
            if let Some(session) = sessions.docs.get_mut(id) {
                if session.revision == revision {
                    session.state.dirty = false;
                }
                session.state.pending = true;
                session.state.last_error = None;
                session.last_saved_at = Some(entry.updated_at);
            }
        }
        tracing::debug!(id = %id, "saved local snapshot");
        self.emit(SyncEvent::LocalSaved { id: id.clone() });
        true
    }

    /// Ask for a remote write of `id`, subject to the sync interval.
    fn kick_remote(&self, id: &SmolStr) {
        let throttle = {
            let sessions = self.sessions();
            match sessions.docs.get(id) {
                Some(session) => session.throttle.clone(),
                None => return,
            }
        };
        let this = self.clone();
        let id = id.clone();
        throttle.call(async move {
            let _ = this.sync_document(&id).await;
        });
    }

    /// Push the active document's local snapshot to the remote store now.
    pub async fn sync_now(&self) -> Result<SyncOutcome> {
        let id = self.active_id().ok_or(SyncError::NoActiveDocument)?;
        self.sync_document(&id).await
    }

    async fn sync_document(&self, id: &SmolStr) -> Result<SyncOutcome> {
        match self.begin_sync(id)? {
            Ok(ticket) => self.finish_sync(id, ticket).await,
            Err(outcome) => Ok(outcome),
        }
    }

    /// Claim the in-flight slot for `id` and capture what to send.
    fn begin_sync(&self, id: &SmolStr) -> Result<std::result::Result<SyncTicket, SyncOutcome>> {
        let failure = {
            let mut sessions = self.sessions();
            let Some(session) = sessions.docs.get_mut(id) else {
                return Ok(Err(SyncOutcome::NotOpen));
            };
            if session.state.syncing {
                tracing::trace!(id = %id, "remote write already in flight");
                return Ok(Err(SyncOutcome::InFlight));
            }
            if !session.state.pending {
                return Ok(Err(SyncOutcome::NoChanges));
            }

            let captured = load_entry_strict(&self.inner.local, id).and_then(|entry| {
                let user = self
                    .inner
                    .identity
                    .current_user()
                    .ok_or(SyncError::NotAuthenticated)?;
                Ok((entry, user))
            });
            match captured {
                Ok((entry, user)) => {
                    session.state.syncing = true;
                    return Ok(Ok(SyncTicket {
                        entry,
                        user,
                        persisted: session.state.persisted,
                        guard: SyncingGuard {
                            sessions: self.inner.sessions.clone(),
                            id: id.clone(),
                        },
                    }));
                }
                Err(e) => {
                    session.state.last_error = Some(e.to_string());
                    e
                }
            }
        };

        tracing::warn!(id = %id, error = %failure, "remote write not attempted");
        self.emit(SyncEvent::SyncFailed {
            id: id.clone(),
            error: failure.to_string(),
        });
        Err(failure)
    }

    async fn push(&self, id: &str, ticket: &SyncTicket) -> Result<bool> {
        let entry = &ticket.entry;
        if !ticket.persisted {
            let ok = self
                .inner
                .remote
                .create_with_id(id, &ticket.user, &entry.title, &entry.content)
                .await?;
            if !ok {
                return Err(SyncError::Rejected {
                    operation: "create",
                    id: id.to_string(),
                });
            }
            return Ok(true);
        }

        match self.inner.remote.update_title(id, &entry.title).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(id, "remote rejected title update"),
            Err(e) => tracing::warn!(id, error = %e, "remote title update failed"),
        }
        let ok = self
            .inner
            .remote
            .update_content(id, &entry.content, &ticket.user)
            .await?;
        if !ok {
            return Err(SyncError::Rejected {
                operation: "content update",
                id: id.to_string(),
            });
        }
        Ok(false)
    }

    #[tracing::instrument(skip_all, fields(id = %id))]
    async fn finish_sync(&self, id: &SmolStr, ticket: SyncTicket) -> Result<SyncOutcome> {
        let result = self.push(id, &ticket).await;

        if matches!(result, Ok(true)) {
            self.mark_cache_persisted(id, &ticket.entry);
        }

        let mut retry = false;
        let mut follow_up = false;
        let mut attach = false;
        {
            let mut sessions = self.sessions();
            let active = sessions.is_active(id);
            if let Some(session) = sessions.docs.get_mut(id) {
                session.state.syncing = false;
                match &result {
                    Ok(created) => {
                        if *created {
                            session.state.persisted = true;
                            if active && !session.in_location {
                                session.in_location = true;
                                attach = true;
                            }
                        }
                        // a save that landed during the write is still owed
                        let newer = session
                            .last_saved_at
                            .is_some_and(|t| t > ticket.entry.updated_at);
                        session.state.pending = newer;
                        session.state.last_error = None;
                        retry = newer && active;
                        follow_up = newer && !active;
                    }
                    Err(e) => {
                        session.state.last_error = Some(e.to_string());
                        retry = active && self.inner.config.retry_failed_syncs && e.is_retryable();
                    }
                }
            }
            if !follow_up {
                sessions.retire(id);
            }
        }
        drop(ticket.guard);
        if follow_up {
            // the document was left while this write ran
            self.flush_detached(id.clone());
        }

        match result {
            Ok(created) => {
                tracing::info!(created, "remote write succeeded");
                self.emit(SyncEvent::RemoteSynced {
                    id: id.clone(),
                    created,
                });
                if attach {
                    self.emit(SyncEvent::AttachToLocation { id: id.clone() });
                }
                if retry {
                    self.kick_remote(id);
                }
                Ok(if created {
                    SyncOutcome::Created
                } else {
                    SyncOutcome::Updated
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, "remote write failed");
                self.emit(SyncEvent::SyncFailed {
                    id: id.clone(),
                    error: e.to_string(),
                });
                if retry {
                    self.kick_remote(id);
                }
                Err(e)
            }
        }
    }

    /// Record in the cached snapshot that the document now exists remotely,
    /// unless a newer snapshot already replaced it.
    fn mark_cache_persisted(&self, id: &str, sent: &LocalCacheEntry) {
        let Some(mut entry) = load_entry(&self.inner.local, id) else {
            return;
        };
        if entry.persisted || entry.updated_at < sent.updated_at {
            return;
        }
        entry.persisted = true;
        if let Err(e) = save_entry(&self.inner.local, &entry) {
            tracing::warn!(id, error = %e, "failed to mark cached snapshot as persisted");
        }
    }

    fn maybe_suggest_title(&self, id: &SmolStr) {
        let content = {
            let sessions = self.sessions();
            let Some(session) = sessions.docs.get(id) else {
                return;
            };
            if !should_suggest_title(
                &session.title,
                session.title_locked,
                &session.content,
                &self.inner.config,
            ) {
                return;
            }
            to_durable(&session.content)
        };

        let this = self.clone();
        let id = id.clone();
        tokio::spawn(async move {
            match this.inner.titles.suggest_title(&content).await {
                Ok(raw) => match clean_suggestion(&raw, &this.inner.config) {
                    Some(title) => this.apply_suggested_title(&id, title),
                    None => tracing::debug!(id = %id, "title suggestion was empty"),
                },
                Err(e) => tracing::debug!(id = %id, error = %e, "title suggestion failed"),
            }
        });
    }

    fn apply_suggested_title(&self, id: &SmolStr, title: String) {
        let still_unnamed = {
            let sessions = self.sessions();
            sessions.is_active(id)
                && sessions.docs.get(id).is_some_and(|s| {
                    !s.title_locked && self.inner.config.is_placeholder_title(&s.title)
                })
        };
        if !still_unnamed {
            tracing::debug!(id = %id, "title changed before the suggestion arrived");
            return;
        }
        let suggested = title.clone();
        if self.edit(id, |session| session.title = suggested) {
            tracing::info!(id = %id, title = %title, "applied suggested title");
            self.emit(SyncEvent::TitleSuggested {
                id: id.clone(),
                title,
            });
        }
    }

    /// Write everything outstanding for the active document now: the
    /// debounced local save and then the remote write. For page unload.
    pub async fn flush(&self) -> Result<SyncOutcome> {
        let Some(id) = self.active_id() else {
            return Ok(SyncOutcome::NotOpen);
        };
        self.inner.local_save.cancel();
        self.save_local(&id);
        self.sync_document(&id).await
    }

    /// Flush, then stop every timer. The engine stays usable afterwards.
    pub async fn shutdown(&self) -> Result<SyncOutcome> {
        let result = self.flush().await;
        self.inner.local_save.cancel();
        let sessions = self.sessions();
        for session in sessions.docs.values() {
            session.throttle.cancel();
        }
        tracing::debug!("sync engine shut down");
        result
    }

    /// Documents present in the local cache, newest first.
    pub fn list_cached_documents(&self) -> Result<Vec<CachedDocument>> {
        list_entries(&self.inner.local)
    }

    /// Remove a document's local snapshot. The active document cannot be
    /// discarded.
    pub fn discard_local(&self, id: &str) -> Result<()> {
        if self.sessions().docs.contains_key(id) {
            tracing::warn!(id, "refusing to discard an open document");
            return Err(SyncError::LocalStore(format!("{id} is still open")));
        }
        delete_entry(&self.inner.local, id)
    }
}
