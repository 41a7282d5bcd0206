// Shared helpers for integration tests that run against a real data directory.
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tank_tactics::domain::StartOptions;
use tank_tactics::interface_adapters::dispatch::Dispatcher;
use tank_tactics::interface_adapters::state::SystemClock;
use tank_tactics::interface_adapters::store::JsonFileStore;
use tank_tactics::use_cases::{DailyScheduler, GameRegistry, RegistrySettings};

pub type FileRegistry = GameRegistry<JsonFileStore, SystemClock>;

// Temporary data directory removed when dropped.
pub struct DataDir {
    path: PathBuf,
}

impl DataDir {
    pub fn new() -> Self {
        // Unique per test so parallel tests never share records.
        let path = std::env::temp_dir().join(format!("tank-tactics-{}", uuid::Uuid::new_v4()));
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn active(&self, channel_id: &str) -> PathBuf {
        self.path.join("active").join(format!("{channel_id}.json"))
    }

    pub fn archived(&self, channel_id: &str) -> PathBuf {
        self.path.join("archive").join(format!("{channel_id}.json"))
    }
}

impl Drop for DataDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

// Registry plus dispatcher over the file store, the same wiring the binary uses.
pub fn open(dir: &DataDir) -> (Arc<FileRegistry>, Dispatcher<JsonFileStore, SystemClock>) {
    let (registry, _tick_rx) = GameRegistry::new(
        RegistrySettings::default(),
        JsonFileStore::new(dir.path()),
        SystemClock,
        DailyScheduler::new(),
    );
    let registry = Arc::new(registry);
    let dispatcher = Dispatcher::new(registry.clone(), StartOptions::default());
    (registry, dispatcher)
}
