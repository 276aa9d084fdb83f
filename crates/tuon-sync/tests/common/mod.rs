//! Fakes shared by the engine tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::broadcast;
use tuon_common::telemetry::{self, TelemetryConfig};
use tuon_editor_core::Block;
use tuon_sync::{
    ArtifactSync, LocalCacheEntry, LocalStore, MediaResolver, MemoryStore, RemoteRecord,
    RemoteStore, Result, StaticIdentity, SyncConfig, SyncError, SyncEvent, TitleSuggester,
};

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Get(String),
    Create { id: String, title: String },
    UpdateTitle { id: String, title: String },
    UpdateContent { id: String },
}

#[derive(Default)]
pub struct RemoteState {
    pub records: HashMap<String, RemoteRecord>,
    pub calls: Vec<Call>,
    pub offline: bool,
    pub reject_creates: usize,
    pub write_delay: Duration,
    pub in_flight: usize,
    pub max_in_flight: usize,
}

/// Remote store backed by a map, recording every call.
#[derive(Clone, Default)]
pub struct FakeRemote {
    state: Arc<Mutex<RemoteState>>,
}

impl FakeRemote {
    pub fn state(&self) -> MutexGuard<'_, RemoteState> {
        self.state.lock().unwrap()
    }

    pub fn seed(&self, id: &str, title: &str, content: Vec<Block>, updated_at: DateTime<Utc>) {
        self.state().records.insert(
            id.to_string(),
            RemoteRecord {
                content,
                title: title.to_string(),
                updated_at,
            },
        );
    }

    pub fn record(&self, id: &str) -> Option<RemoteRecord> {
        self.state().records.get(id).cloned()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn creates(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Create { .. }))
            .count()
    }

    pub fn content_updates(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::UpdateContent { .. }))
            .count()
    }

    pub fn writes(&self) -> usize {
        self.creates() + self.content_updates()
    }

    fn begin_write(&self, call: Call) -> Result<Duration> {
        let mut state = self.state();
        state.calls.push(call);
        if state.offline {
            return Err(SyncError::Remote("network unreachable".into()));
        }
        state.in_flight += 1;
        state.max_in_flight = state.max_in_flight.max(state.in_flight);
        Ok(state.write_delay)
    }

    async fn wait(&self, delay: Duration) {
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }
    }
}

impl RemoteStore for FakeRemote {
    async fn get(&self, id: &str) -> Result<Option<RemoteRecord>> {
        let offline = {
            let mut state = self.state();
            state.calls.push(Call::Get(id.to_string()));
            state.offline
        };
        tokio::task::yield_now().await;
        if offline {
            return Err(SyncError::Remote("network unreachable".into()));
        }
        Ok(self.record(id))
    }

    async fn create_with_id(
        &self,
        id: &str,
        _user_id: &str,
        title: &str,
        content: &[Block],
    ) -> Result<bool> {
        let delay = self.begin_write(Call::Create {
            id: id.to_string(),
            title: title.to_string(),
        })?;
        self.wait(delay).await;
        let mut state = self.state();
        state.in_flight -= 1;
        if state.reject_creates > 0 {
            state.reject_creates -= 1;
            return Ok(false);
        }
        state.records.insert(
            id.to_string(),
            RemoteRecord {
                content: content.to_vec(),
                title: title.to_string(),
                updated_at: Utc::now(),
            },
        );
        Ok(true)
    }

    async fn update_title(&self, id: &str, title: &str) -> Result<bool> {
        let mut state = self.state();
        state.calls.push(Call::UpdateTitle {
            id: id.to_string(),
            title: title.to_string(),
        });
        if state.offline {
            return Err(SyncError::Remote("network unreachable".into()));
        }
        Ok(match state.records.get_mut(id) {
            Some(record) => {
                record.title = title.to_string();
                true
            }
            None => false,
        })
    }

    async fn update_content(&self, id: &str, content: &[Block], _user_id: &str) -> Result<bool> {
        let delay = self.begin_write(Call::UpdateContent { id: id.to_string() })?;
        self.wait(delay).await;
        let mut state = self.state();
        state.in_flight -= 1;
        Ok(match state.records.get_mut(id) {
            Some(record) => {
                record.content = content.to_vec();
                record.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }
}

/// Signs paths under a fixed host.
#[derive(Clone, Default)]
pub struct FakeMedia;

pub fn signed(path: &str) -> String {
    format!("https://signed.example.com/{path}?token=abc")
}

impl MediaResolver for FakeMedia {
    async fn display_url(&self, relative_path: &str) -> Result<String> {
        Ok(signed(relative_path))
    }
}

/// Answers every request with the same suggestion.
#[derive(Clone, Default)]
pub struct FakeTitles {
    pub answer: Arc<Mutex<Option<String>>>,
    pub requests: Arc<Mutex<usize>>,
}

impl FakeTitles {
    pub fn answering(title: &str) -> Self {
        let titles = Self::default();
        *titles.answer.lock().unwrap() = Some(title.to_string());
        titles
    }

    pub fn requests(&self) -> usize {
        *self.requests.lock().unwrap()
    }
}

impl TitleSuggester for FakeTitles {
    async fn suggest_title(&self, _content: &[Block]) -> Result<String> {
        *self.requests.lock().unwrap() += 1;
        tokio::task::yield_now().await;
        self.answer
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| SyncError::Service("no suggestion".into()))
    }
}

pub type Engine = ArtifactSync<FakeRemote, Arc<MemoryStore>, FakeMedia, FakeTitles>;

pub struct Harness {
    pub engine: Engine,
    pub remote: FakeRemote,
    pub local: Arc<MemoryStore>,
    pub titles: FakeTitles,
    pub events: broadcast::Receiver<SyncEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(FakeTitles::default(), StaticIdentity::signed_in("user-1"))
    }

    pub fn with_titles(titles: FakeTitles) -> Self {
        Self::build(titles, StaticIdentity::signed_in("user-1"))
    }

    pub fn signed_out() -> Self {
        Self::build(FakeTitles::default(), StaticIdentity::anonymous())
    }

    fn build(titles: FakeTitles, identity: StaticIdentity) -> Self {
        telemetry::init(TelemetryConfig::from_env("tuon-sync-tests"));
        let remote = FakeRemote::default();
        let local = Arc::new(MemoryStore::new());
        let engine = ArtifactSync::new(
            SyncConfig::default(),
            remote.clone(),
            local.clone(),
            FakeMedia,
            titles.clone(),
            Arc::new(identity),
        )
        .unwrap();
        let events = engine.subscribe();
        Self {
            engine,
            remote,
            local,
            titles,
            events,
        }
    }

    /// Events published since the last call.
    pub fn events(&mut self) -> Vec<SyncEvent> {
        let mut seen = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            seen.push(event);
        }
        seen
    }

    pub fn cached(&self, id: &str) -> Option<LocalCacheEntry> {
        tuon_sync::storage::load_entry(&self.local, id)
    }

    pub fn seed_local(&self, entry: &LocalCacheEntry) {
        tuon_sync::storage::save_entry(&self.local, entry).unwrap();
    }

    /// Store `entry` under the key of `id`, whatever id the entry carries.
    pub fn seed_local_raw(&self, id: &str, entry: &LocalCacheEntry) -> String {
        let raw = serde_json::to_string(entry).unwrap();
        LocalStore::set(&*self.local, &tuon_sync::storage::storage_key(id), &raw).unwrap();
        raw
    }

    pub fn cached_raw(&self, id: &str) -> Option<String> {
        LocalStore::get(&*self.local, &tuon_sync::storage::storage_key(id)).unwrap()
    }
}

/// Let every timer and spawned task due within `ms` run.
pub async fn settle(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

pub fn hours_ago(hours: i64) -> DateTime<Utc> {
    Utc::now() - TimeDelta::hours(hours)
}

pub fn entry(id: &str, title: &str, text: &str, updated_at: DateTime<Utc>) -> LocalCacheEntry {
    LocalCacheEntry {
        id: id.into(),
        content: vec![Block::paragraph(text)],
        title: title.to_string(),
        updated_at,
        persisted: true,
        title_locked: false,
    }
}
