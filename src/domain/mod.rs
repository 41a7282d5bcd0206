// Domain layer: game aggregates, identity catalog and board geometry.

pub mod errors;
pub mod game;
pub mod pattern;
pub mod ports;
pub mod roster;
pub mod vector;

pub use errors::{GameError, Phase, StoreError};
pub use game::{
    ActiveGame, ActivePlayerData, ChannelId, EndedGame, GameRoles, GameState, IdentityRequest,
    JoiningGame, PlayerData, StartOptions,
};
pub use pattern::{Color, PatternKind, TankPattern};
pub use roster::{PlayerId, Roster};
pub use vector::Vector;
