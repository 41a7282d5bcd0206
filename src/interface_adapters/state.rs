use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::domain::ports::Clock;
use crate::interface_adapters::dispatch::Dispatcher;
use crate::interface_adapters::store::JsonFileStore;
use crate::use_cases::GameRegistry;

pub type Registry = GameRegistry<JsonFileStore, SystemClock>;

// Application state shared by the command loop.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub dispatcher: Arc<Dispatcher<JsonFileStore, SystemClock>>,
}

// Wall clock used outside of tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
