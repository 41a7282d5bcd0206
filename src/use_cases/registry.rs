// Per-channel game registry: the in-memory cache of live games kept in step with storage.

use crate::domain::errors::{GameError, Phase, StoreError};
use crate::domain::game::{
    ActiveGame, ChannelId, EndedGame, GameState, IdentityRequest, JoiningGame, StartOptions,
};
use crate::domain::pattern::TankPattern;
use crate::domain::ports::{Clock, GameStore};
use crate::use_cases::daily::{DailyHandle, DailyScheduler};
use chrono::NaiveTime;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{error, info, warn};

/// Settings shared by every game the registry manages.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    /// Local time of day at which active games receive their daily tick.
    pub daily_time: NaiveTime,
    /// Action points granted to each standing tank per daily tick.
    pub actions_per_day: u32,
    /// Draw budget for random identities.
    pub identity_attempts: u32,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            daily_time: NaiveTime::from_hms_opt(0, 0, 0).unwrap_or_default(),
            actions_per_day: 1,
            identity_attempts: 1000,
        }
    }
}

/// Errors returned by registry operations.
#[derive(Debug)]
pub enum RegistryError {
    Game(GameError),
    NoSuchGame,
    /// Carries the game already running on the channel.
    GameAlreadyExists(Box<GameState>),
    Storage(StoreError),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::Game(err) => err.fmt(f),
            RegistryError::NoSuchGame => f.write_str("no game on this channel"),
            RegistryError::GameAlreadyExists(_) => f.write_str("a game already exists on this channel"),
            RegistryError::Storage(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegistryError::Game(err) => Some(err),
            RegistryError::Storage(err) => Some(err),
            RegistryError::NoSuchGame | RegistryError::GameAlreadyExists(_) => None,
        }
    }
}

impl From<GameError> for RegistryError {
    fn from(err: GameError) -> Self {
        RegistryError::Game(err)
    }
}

impl From<StoreError> for RegistryError {
    fn from(err: StoreError) -> Self {
        RegistryError::Storage(err)
    }
}

// Cached aggregate for one channel. Active games own their daily hook.
enum GameEntry {
    Joining(JoiningGame),
    Active { game: ActiveGame, hook: DailyHandle },
}

impl GameEntry {
    fn snapshot(&self) -> GameState {
        match self {
            GameEntry::Joining(game) => GameState::Joining(game.clone()),
            GameEntry::Active { game, .. } => GameState::Active(game.clone()),
        }
    }

    fn phase(&self) -> Phase {
        match self {
            GameEntry::Joining(_) => Phase::Joining,
            GameEntry::Active { .. } => Phase::Active,
        }
    }

    fn release_hook(&self) {
        if let GameEntry::Active { hook, .. } = self {
            hook.release();
        }
    }
}

// Slots are never removed from the map, reload included, so a slot handle can't go stale between
// lookup and lock.
type Slot = Arc<Mutex<Option<GameEntry>>>;

/// Process-wide owner of every loaded game.
///
/// Every operation on a channel holds that channel's slot lock from read to persist, so a
/// channel never has two live aggregates and concurrent commands can't lose updates.
pub struct GameRegistry<S, C> {
    settings: RegistrySettings,
    store: S,
    clock: C,
    scheduler: DailyScheduler,
    slots: RwLock<HashMap<ChannelId, Slot>>,
    // Daily hooks push the channel id here; see `daily_tick_worker`.
    tick_tx: mpsc::UnboundedSender<ChannelId>,
    rng: std::sync::Mutex<StdRng>,
}

impl<S, C> GameRegistry<S, C>
where
    S: GameStore,
    C: Clock,
{
    /// Creates an empty registry and the receiver for its daily ticks.
    pub fn new(
        settings: RegistrySettings,
        store: S,
        clock: C,
        scheduler: DailyScheduler,
    ) -> (Self, mpsc::UnboundedReceiver<ChannelId>) {
        Self::with_rng(settings, store, clock, scheduler, StdRng::from_entropy())
    }

    pub fn with_rng(
        settings: RegistrySettings,
        store: S,
        clock: C,
        scheduler: DailyScheduler,
        rng: StdRng,
    ) -> (Self, mpsc::UnboundedReceiver<ChannelId>) {
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        let registry = Self {
            settings,
            store,
            clock,
            scheduler,
            slots: RwLock::new(HashMap::new()),
            tick_tx,
            rng: std::sync::Mutex::new(rng),
        };
        (registry, tick_rx)
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    /// Number of daily hooks currently held by cached active games.
    pub fn live_hooks(&self) -> usize {
        self.scheduler.live_hooks()
    }

    /// Rebuilds the cache from storage. Meant to run before commands are served.
    ///
    /// A record that can't be read or decoded aborts the whole reload and leaves the cache
    /// empty; the error names the offending file. Every existing slot stays locked until the
    /// cache is rebuilt, so a command that looked up its slot earlier sees the reloaded game.
    pub async fn reload(&self) -> Result<usize, RegistryError> {
        let mut slots = self.slots.write().await;
        let mut guards = HashMap::with_capacity(slots.len());
        for (channel_id, slot) in slots.iter() {
            let mut guard = slot.clone().lock_owned().await;
            if let Some(entry) = guard.take() {
                entry.release_hook();
            }
            guards.insert(channel_id.clone(), guard);
        }

        let games = self.store.list_active().await.inspect_err(|e| {
            error!(error = %e, "failed to reload active games");
        })?;

        let mut loaded = 0;
        for game in games {
            let channel_id = game.channel_id().to_string();
            let entry = match game {
                GameState::Joining(game) => GameEntry::Joining(game),
                GameState::Active(game) => {
                    let hook = self.provision_hook(&game.channel_id);
                    GameEntry::Active { game, hook }
                }
                GameState::Ended(_) => {
                    warn!(%channel_id, "ended game found among active records; skipping");
                    continue;
                }
            };
            match guards.get_mut(&channel_id) {
                Some(guard) => **guard = Some(entry),
                None => {
                    slots.insert(channel_id, Arc::new(Mutex::new(Some(entry))));
                }
            }
            loaded += 1;
        }

        info!(games = loaded, "active games reloaded");
        Ok(loaded)
    }

    /// Snapshot of the channel's game, if any. Never touches storage.
    pub async fn get(&self, channel_id: &str) -> Option<GameState> {
        let slot = self.existing_slot(channel_id).await?;
        let guard = slot.lock().await;
        guard.as_ref().map(GameEntry::snapshot)
    }

    /// Channel ids of every cached game.
    pub async fn channels(&self) -> Vec<ChannelId> {
        let slots = self.slots.read().await;
        let mut ids = Vec::with_capacity(slots.len());
        for (id, slot) in slots.iter() {
            if slot.lock().await.is_some() {
                ids.push(id.clone());
            }
        }
        ids.sort();
        ids
    }

    /// Writes the phase-appropriate record for a game.
    pub async fn persist(&self, game: &GameState) -> Result<(), RegistryError> {
        self.store.save_active(game).await.inspect_err(|e| {
            error!(channel_id = %game.channel_id(), error = %e, "failed to persist game");
        })?;
        Ok(())
    }

    /// Creates a joining game for the channel and persists it.
    pub async fn create(
        &self,
        channel_id: &str,
        game_master: &str,
    ) -> Result<JoiningGame, RegistryError> {
        let slot = self.slot(channel_id).await;
        let mut guard = slot.lock().await;
        if let Some(existing) = guard.as_ref() {
            return Err(RegistryError::GameAlreadyExists(Box::new(existing.snapshot())));
        }

        let game = JoiningGame::new(channel_id, game_master);
        *guard = Some(GameEntry::Joining(game.clone()));
        if let Err(e) = self.persist(&GameState::Joining(game.clone())).await {
            *guard = None;
            return Err(e);
        }

        info!(channel_id, game_master, "game created");
        Ok(game)
    }

    /// Adds a player to a joining game.
    pub async fn join(
        &self,
        channel_id: &str,
        player_id: &str,
        request: IdentityRequest,
    ) -> Result<TankPattern, RegistryError> {
        let slot = self.existing_slot(channel_id).await.ok_or(RegistryError::NoSuchGame)?;
        let mut guard = slot.lock().await;
        let current = joining_in(&guard, channel_id)?;

        let mut game = current.clone();
        let pattern = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            game.add_player(player_id, request, &mut *rng, self.settings.identity_attempts)?
        };

        let previous = guard.replace(GameEntry::Joining(game.clone()));
        if let Err(e) = self.persist(&GameState::Joining(game)).await {
            *guard = previous;
            return Err(e);
        }

        info!(channel_id, player_id, pattern = %pattern.display_name(), "player joined");
        Ok(pattern)
    }

    /// Removes a player from a joining game.
    pub async fn leave(&self, channel_id: &str, player_id: &str) -> Result<(), RegistryError> {
        let slot = self.existing_slot(channel_id).await.ok_or(RegistryError::NoSuchGame)?;
        let mut guard = slot.lock().await;
        let mut game = joining_in(&guard, channel_id)?.clone();
        game.remove_player(player_id)?;

        let previous = guard.replace(GameEntry::Joining(game.clone()));
        if let Err(e) = self.persist(&GameState::Joining(game)).await {
            *guard = previous;
            return Err(e);
        }

        info!(channel_id, player_id, "player left");
        Ok(())
    }

    /// Starts the channel's joining game, swapping the cached entry for the active game.
    pub async fn start_transition(
        &self,
        channel_id: &str,
        options: StartOptions,
    ) -> Result<ActiveGame, RegistryError> {
        let slot = self.existing_slot(channel_id).await.ok_or(RegistryError::NoSuchGame)?;
        let mut guard = slot.lock().await;
        let current = joining_in(&guard, channel_id)?;
        current.check_start(&options)?;

        let previous = current.clone();
        let now = self.clock.now();
        let started = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            previous.clone().start(options, &mut *rng, now)
        };
        let game = started.map_err(|(_, e)| RegistryError::Game(e))?;

        let hook = self.provision_hook(channel_id);
        *guard = Some(GameEntry::Active {
            game: game.clone(),
            hook: hook.clone(),
        });
        if let Err(e) = self.persist(&GameState::Active(game.clone())).await {
            hook.release();
            *guard = Some(GameEntry::Joining(previous));
            return Err(e);
        }

        info!(
            channel_id,
            players = game.players.len(),
            board_x = game.board_size.x,
            board_y = game.board_size.y,
            "game started"
        );
        Ok(game)
    }

    /// Ends an active game and moves its record to the archive.
    ///
    /// The archive copy is written before the active copy is removed, and the daily hook is
    /// only released once both succeeded, so a failed archive leaves the game running.
    pub async fn archive(&self, channel_id: &str) -> Result<EndedGame, RegistryError> {
        let slot = self.existing_slot(channel_id).await.ok_or(RegistryError::NoSuchGame)?;
        let mut guard = slot.lock().await;
        let (game, hook) = match guard.as_ref() {
            Some(GameEntry::Active { game, hook }) => (game.clone(), hook.clone()),
            Some(entry) => {
                let err = GameError::WrongPhase {
                    expected: Phase::Active,
                    found: entry.phase(),
                };
                error!(channel_id, error = %err, "archive requested for a game that is not active");
                return Err(err.into());
            }
            None => return Err(RegistryError::NoSuchGame),
        };

        let ended = game.end(self.clock.now());
        self.store.save_archive(&ended).await.inspect_err(|e| {
            error!(channel_id, error = %e, "failed to write archive record");
        })?;
        self.store.remove_active(channel_id).await.inspect_err(|e| {
            error!(channel_id, error = %e, "archived game could not be removed from active storage");
        })?;

        hook.release();
        *guard = None;
        info!(channel_id, "game archived");
        Ok(ended)
    }

    /// Applies one daily tick to an active game.
    pub async fn grant_daily_actions(&self, channel_id: &str) -> Result<usize, RegistryError> {
        let slot = self.existing_slot(channel_id).await.ok_or(RegistryError::NoSuchGame)?;
        let mut guard = slot.lock().await;
        let (mut game, hook) = match guard.as_ref() {
            Some(GameEntry::Active { game, hook }) => (game.clone(), hook.clone()),
            Some(entry) => {
                return Err(GameError::WrongPhase {
                    expected: Phase::Active,
                    found: entry.phase(),
                }
                .into());
            }
            None => return Err(RegistryError::NoSuchGame),
        };

        let granted = game.grant_daily_actions(self.settings.actions_per_day);
        let previous = guard.replace(GameEntry::Active {
            game: game.clone(),
            hook,
        });
        if let Err(e) = self.persist(&GameState::Active(game)).await {
            *guard = previous;
            return Err(e);
        }
        Ok(granted)
    }

    /// Releases every daily hook held by cached games. Cached state stays readable.
    pub async fn shutdown(&self) {
        let slots = self.slots.read().await;
        let mut released = 0;
        for slot in slots.values() {
            if let Some(entry) = slot.lock().await.as_ref() {
                if matches!(entry, GameEntry::Active { .. }) {
                    entry.release_hook();
                    released += 1;
                }
            }
        }
        info!(hooks = released, "registry shut down");
    }

    fn provision_hook(&self, channel_id: &str) -> DailyHandle {
        let hook = self.scheduler.schedule(self.settings.daily_time);
        let tick_tx = self.tick_tx.clone();
        let channel_id = channel_id.to_string();
        hook.on(move || {
            let _ = tick_tx.send(channel_id.clone());
        });
        hook
    }

    async fn existing_slot(&self, channel_id: &str) -> Option<Slot> {
        self.slots.read().await.get(channel_id).cloned()
    }

    async fn slot(&self, channel_id: &str) -> Slot {
        if let Some(slot) = self.existing_slot(channel_id).await {
            return slot;
        }
        let mut slots = self.slots.write().await;
        slots.entry(channel_id.to_string()).or_default().clone()
    }
}

// Borrows the joining game in a slot, or explains why there isn't one.
fn joining_in<'a>(
    entry: &'a Option<GameEntry>,
    channel_id: &str,
) -> Result<&'a JoiningGame, RegistryError> {
    match entry {
        Some(GameEntry::Joining(game)) => Ok(game),
        Some(other) => {
            let err = GameError::WrongPhase {
                expected: Phase::Joining,
                found: other.phase(),
            };
            error!(channel_id, error = %err, "joining-phase operation on a started game");
            Err(err.into())
        }
        None => Err(RegistryError::NoSuchGame),
    }
}

/// Drains daily ticks and applies them to their games until every sender is gone.
pub async fn daily_tick_worker<S, C>(
    registry: Arc<GameRegistry<S, C>>,
    mut tick_rx: mpsc::UnboundedReceiver<ChannelId>,
) where
    S: GameStore,
    C: Clock,
{
    while let Some(channel_id) = tick_rx.recv().await {
        match registry.grant_daily_actions(&channel_id).await {
            Ok(granted) => info!(%channel_id, granted, "daily actions granted"),
            Err(e) => warn!(%channel_id, error = %e, "daily tick skipped"),
        }
    }
}
