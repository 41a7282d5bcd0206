use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::domain::errors::StoreError;
use crate::domain::game::{EndedGame, GameState};
use crate::domain::ports::{Clock, GameStore};

// Shared fixed time source for deterministic use-case tests.
pub(crate) struct FixedClock(pub(crate) DateTime<Utc>);

impl FixedClock {
    pub(crate) fn at(epoch_seconds: i64) -> Self {
        Self(Utc.timestamp_opt(epoch_seconds, 0).single().unwrap_or_default())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Clone, Copy, Default)]
pub(crate) struct FailureFlags {
    pub list_active: bool,
    pub save_active: bool,
    pub save_archive: bool,
    pub remove_active: bool,
}

#[derive(Default)]
struct Tables {
    active: HashMap<String, GameState>,
    archive: HashMap<String, EndedGame>,
    writes: usize,
    failures: FailureFlags,
}

// In-memory store that records every write so tests can inspect what reached storage.
#[derive(Clone, Default)]
pub(crate) struct RecordingStore {
    tables: Arc<Mutex<Tables>>,
}

impl RecordingStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_failures(&self, failures: FailureFlags) {
        self.tables.lock().expect("tables mutex poisoned").failures = failures;
    }

    pub(crate) fn active(&self, channel_id: &str) -> Option<GameState> {
        let guard = self.tables.lock().expect("tables mutex poisoned");
        guard.active.get(channel_id).cloned()
    }

    pub(crate) fn archived(&self, channel_id: &str) -> Option<EndedGame> {
        let guard = self.tables.lock().expect("tables mutex poisoned");
        guard.archive.get(channel_id).cloned()
    }

    pub(crate) fn writes(&self) -> usize {
        self.tables.lock().expect("tables mutex poisoned").writes
    }
}

#[async_trait]
impl GameStore for RecordingStore {
    async fn list_active(&self) -> Result<Vec<GameState>, StoreError> {
        let guard = self.tables.lock().expect("tables mutex poisoned");
        if guard.failures.list_active {
            return Err(StoreError::Unavailable("list failed".to_string()));
        }
        let mut games: Vec<_> = guard.active.values().cloned().collect();
        games.sort_by(|a, b| a.channel_id().cmp(b.channel_id()));
        Ok(games)
    }

    async fn save_active(&self, game: &GameState) -> Result<(), StoreError> {
        let mut guard = self.tables.lock().expect("tables mutex poisoned");
        if guard.failures.save_active {
            return Err(StoreError::Unavailable("save failed".to_string()));
        }
        guard.writes += 1;
        guard.active.insert(game.channel_id().to_string(), game.clone());
        Ok(())
    }

    async fn save_archive(&self, game: &EndedGame) -> Result<(), StoreError> {
        let mut guard = self.tables.lock().expect("tables mutex poisoned");
        if guard.failures.save_archive {
            return Err(StoreError::Unavailable("archive failed".to_string()));
        }
        guard.writes += 1;
        guard.archive.insert(game.channel_id.clone(), game.clone());
        Ok(())
    }

    async fn remove_active(&self, channel_id: &str) -> Result<(), StoreError> {
        let mut guard = self.tables.lock().expect("tables mutex poisoned");
        if guard.failures.remove_active {
            return Err(StoreError::Unavailable("remove failed".to_string()));
        }
        guard.active.remove(channel_id);
        Ok(())
    }
}
