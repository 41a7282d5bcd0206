use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::StoreError;
use crate::domain::game::{EndedGame, GameState};

// Port for durable game storage used by the registry.
// Active records are keyed by channel id; archived records live in a separate namespace.
#[async_trait]
pub trait GameStore: Send + Sync {
    // Every active record. Fails as a whole if any single record cannot be read.
    async fn list_active(&self) -> Result<Vec<GameState>, StoreError>;
    // Overwrites the channel's active record without exposing a half-written file.
    async fn save_active(&self, game: &GameState) -> Result<(), StoreError>;
    async fn save_archive(&self, game: &EndedGame) -> Result<(), StoreError>;
    // Missing records are not an error.
    async fn remove_active(&self, channel_id: &str) -> Result<(), StoreError>;
}

// Port for retrieving the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
