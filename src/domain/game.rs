// Phase-typed game aggregates and the rules that move a game between phases.

use crate::domain::errors::{GameError, Phase};
use crate::domain::pattern::{self, Color, PatternKind, TankPattern};
use crate::domain::roster::{PlayerId, Roster};
use crate::domain::vector::{self, Vector};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub type ChannelId = String;

/// A player waiting for the game to start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerData {
    pub pattern: TankPattern,
}

/// A player's tank on the board of a started game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivePlayerData {
    pub pattern: TankPattern,
    pub position: Vector<f64>,
    pub actions: u32,
    pub health: i32,
}

/// Pattern fields as requested by a joining player. Everything is optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct IdentityRequest {
    #[serde(default)]
    pub primary: Option<Color>,
    #[serde(default)]
    pub secondary: Option<Color>,
    #[serde(default)]
    pub kind: Option<PatternKind>,
}

impl IdentityRequest {
    pub fn random() -> Self {
        Self::default()
    }

    pub fn solid(primary: Color) -> Self {
        Self {
            primary: Some(primary),
            ..Self::default()
        }
    }

    pub fn patterned(primary: Color, secondary: Color, kind: PatternKind) -> Self {
        Self {
            primary: Some(primary),
            secondary: Some(secondary),
            kind: Some(kind),
        }
    }
}

/// Options that shape the board when a game starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartOptions {
    /// Side length of the square each tank spawns in.
    pub spawn_box_size: u32,
    pub starting_action_count: u32,
    pub starting_health: i32,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            spawn_box_size: 5,
            starting_action_count: 0,
            starting_health: 3,
        }
    }
}

impl StartOptions {
    pub fn validate(&self) -> Result<(), GameError> {
        if self.spawn_box_size == 0 || self.starting_health <= 0 {
            return Err(GameError::InvalidStartOptions);
        }
        Ok(())
    }
}

/// Role lookups shared by every phase.
pub trait GameRoles {
    fn game_master(&self) -> &str;
    fn jury(&self) -> &[PlayerId];
    fn is_player(&self, id: &str) -> bool;

    fn is_game_master(&self, id: &str) -> bool {
        self.game_master() == id
    }

    fn is_juror(&self, id: &str) -> bool {
        self.jury().iter().any(|juror| juror == id)
    }
}

/// A game that is still accepting players.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoiningGame {
    pub channel_id: ChannelId,
    pub game_master: PlayerId,
    #[serde(default)]
    pub jury: Vec<PlayerId>,
    #[serde(default)]
    pub players: Roster<PlayerData>,
}

impl JoiningGame {
    pub fn new(channel_id: impl Into<ChannelId>, game_master: impl Into<PlayerId>) -> Self {
        Self {
            channel_id: channel_id.into(),
            game_master: game_master.into(),
            jury: Vec::new(),
            players: Roster::new(),
        }
    }

    pub fn patterns(&self) -> Vec<TankPattern> {
        self.players.values().map(|player| player.pattern).collect()
    }

    /// Resolves the requested identity and adds the player. Nothing changes on error.
    pub fn add_player<R: Rng + ?Sized>(
        &mut self,
        player_id: impl Into<PlayerId>,
        request: IdentityRequest,
        rng: &mut R,
        max_attempts: u32,
    ) -> Result<TankPattern, GameError> {
        let player_id = player_id.into();
        if self.players.contains(&player_id) {
            return Err(GameError::AlreadyAPlayer);
        }

        let taken = self.patterns();
        let pattern = match request.primary {
            None => {
                if request.secondary.is_some() || request.kind.is_some() {
                    return Err(GameError::InvalidIdentityRequest);
                }
                pattern::random_identity(rng, &taken, max_attempts)?
            }
            Some(primary) => {
                let pattern = match request.kind {
                    // Solid: any secondary color is dropped.
                    None => TankPattern::solid(primary),
                    Some(kind) => {
                        let secondary =
                            request.secondary.ok_or(GameError::InvalidIdentityRequest)?;
                        TankPattern::patterned(primary, secondary, kind)
                    }
                };
                if !pattern::is_unique(&taken, &pattern) {
                    return Err(GameError::DuplicateIdentity);
                }
                if !pattern.is_well_formed() {
                    return Err(GameError::InvalidIdentityRequest);
                }
                pattern
            }
        };

        self.players.insert(player_id, PlayerData { pattern });
        Ok(pattern)
    }

    pub fn remove_player(&mut self, player_id: &str) -> Result<PlayerData, GameError> {
        self.players.remove(player_id).ok_or(GameError::NotAPlayer)
    }

    /// Checks everything `start` would reject, without giving up the game.
    pub fn check_start(&self, options: &StartOptions) -> Result<(), GameError> {
        options.validate()?;
        if self.players.is_empty() {
            return Err(GameError::NotEnoughPlayers);
        }
        Ok(())
    }

    /// Turns this game into a started one. On rejection the untouched game is handed back.
    ///
    /// Player `i` (in join order) spawns in box `{x: i / grid.x, y: i % grid.x}`, so the
    /// boxes fill `grid.y` columns of `grid.x` rows; the board is sized to that layout.
    pub fn start<R: Rng + ?Sized>(
        self,
        options: StartOptions,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<ActiveGame, (JoiningGame, GameError)> {
        if let Err(error) = self.check_start(&options) {
            return Err((self, error));
        }

        // Roster length is bounded well below u32::MAX by the identity catalog.
        let grid = vector::boxiest_box(self.players.len() as u32);
        let board_size = Vector::new(grid.y, grid.x).scale(options.spawn_box_size);
        let box_len = f64::from(options.spawn_box_size);

        let players = self
            .players
            .into_iter()
            .enumerate()
            .map(|(i, (id, player))| {
                let i = i as u32;
                let spawn_box = Vector::new(i / grid.x, i % grid.x);
                let offset = Vector::new(rng.gen_range(0.0..box_len), rng.gen_range(0.0..box_len));
                let origin: Vector<f64> = spawn_box.scale(options.spawn_box_size).into();
                let active = ActivePlayerData {
                    pattern: player.pattern,
                    position: origin + offset,
                    actions: options.starting_action_count,
                    health: options.starting_health,
                };
                (id, active)
            })
            .collect();

        Ok(ActiveGame {
            channel_id: self.channel_id,
            game_master: self.game_master,
            jury: self.jury,
            start_date: now,
            board_size,
            players,
        })
    }
}

/// A game in play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveGame {
    pub channel_id: ChannelId,
    pub game_master: PlayerId,
    #[serde(default)]
    pub jury: Vec<PlayerId>,
    pub start_date: DateTime<Utc>,
    /// Spawn grid with its axes swapped, scaled by the spawn box size. Same as the grid when square.
    pub board_size: Vector<u32>,
    pub players: Roster<ActivePlayerData>,
}

impl ActiveGame {
    /// Id of the tank sitting exactly at `position`, if any.
    pub fn tank_at(&self, position: Vector<f64>) -> Option<&PlayerId> {
        self.players
            .iter()
            .find(|(_, player)| player.position == position)
            .map(|(id, _)| id)
    }

    /// Adds action points to every tank still standing. Returns how many tanks received them.
    pub fn grant_daily_actions(&mut self, amount: u32) -> usize {
        let mut granted = 0;
        for (_, player) in self.players.iter_mut() {
            if player.health > 0 {
                player.actions = player.actions.saturating_add(amount);
                granted += 1;
            }
        }
        granted
    }

    /// True when every tank is on the board and no two share a position.
    pub fn placement_is_valid(&self) -> bool {
        let positions: Vec<_> = self.players.values().map(|p| p.position).collect();
        positions.iter().enumerate().all(|(i, pos)| {
            self.board_size.contains(*pos) && !positions[i + 1..].contains(pos)
        })
    }

    pub fn end(self, now: DateTime<Utc>) -> EndedGame {
        EndedGame {
            channel_id: self.channel_id,
            game_master: self.game_master,
            jury: self.jury,
            start_date: self.start_date,
            end_date: now,
            board_size: self.board_size,
            players: self.players,
        }
    }
}

/// Final snapshot of a finished game, written once to the archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndedGame {
    pub channel_id: ChannelId,
    pub game_master: PlayerId,
    #[serde(default)]
    pub jury: Vec<PlayerId>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub board_size: Vector<u32>,
    pub players: Roster<ActivePlayerData>,
}

/// Any game, tagged with its phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum GameState {
    Joining(JoiningGame),
    Active(ActiveGame),
    Ended(EndedGame),
}

impl GameState {
    pub fn phase(&self) -> Phase {
        match self {
            GameState::Joining(_) => Phase::Joining,
            GameState::Active(_) => Phase::Active,
            GameState::Ended(_) => Phase::Ended,
        }
    }

    pub fn channel_id(&self) -> &str {
        match self {
            GameState::Joining(game) => &game.channel_id,
            GameState::Active(game) => &game.channel_id,
            GameState::Ended(game) => &game.channel_id,
        }
    }

    /// Player ids in join order.
    pub fn player_ids(&self) -> Vec<PlayerId> {
        match self {
            GameState::Joining(game) => game.players.ids().cloned().collect(),
            GameState::Active(game) => game.players.ids().cloned().collect(),
            GameState::Ended(game) => game.players.ids().cloned().collect(),
        }
    }

    pub fn wrong_phase(&self, expected: Phase) -> GameError {
        GameError::WrongPhase {
            expected,
            found: self.phase(),
        }
    }
}

impl GameRoles for JoiningGame {
    fn game_master(&self) -> &str {
        &self.game_master
    }
    fn jury(&self) -> &[PlayerId] {
        &self.jury
    }
    fn is_player(&self, id: &str) -> bool {
        self.players.contains(id)
    }
}

impl GameRoles for ActiveGame {
    fn game_master(&self) -> &str {
        &self.game_master
    }
    fn jury(&self) -> &[PlayerId] {
        &self.jury
    }
    fn is_player(&self, id: &str) -> bool {
        self.players.contains(id)
    }
}

impl GameRoles for EndedGame {
    fn game_master(&self) -> &str {
        &self.game_master
    }
    fn jury(&self) -> &[PlayerId] {
        &self.jury
    }
    fn is_player(&self, id: &str) -> bool {
        self.players.contains(id)
    }
}

impl GameRoles for GameState {
    fn game_master(&self) -> &str {
        match self {
            GameState::Joining(game) => game.game_master(),
            GameState::Active(game) => game.game_master(),
            GameState::Ended(game) => game.game_master(),
        }
    }

    fn jury(&self) -> &[PlayerId] {
        match self {
            GameState::Joining(game) => game.jury(),
            GameState::Active(game) => game.jury(),
            GameState::Ended(game) => game.jury(),
        }
    }

    fn is_player(&self, id: &str) -> bool {
        match self {
            GameState::Joining(game) => game.is_player(id),
            GameState::Active(game) => game.is_player(id),
            GameState::Ended(game) => game.is_player(id),
        }
    }
}
