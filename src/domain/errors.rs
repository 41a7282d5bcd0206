use std::fmt;
use std::io;
use std::path::PathBuf;

/// Lifecycle phases a game moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Joining,
    Active,
    Ended,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Joining => "joining",
            Phase::Active => "active",
            Phase::Ended => "ended",
        };
        f.write_str(name)
    }
}

// Domain-level errors for game rules. All of them are raised before any mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    // Pattern request with a missing or conflicting field.
    InvalidIdentityRequest,
    DuplicateIdentity,
    // Random search ran out of attempts.
    IdentityExhausted,
    NotAPlayer,
    AlreadyAPlayer,
    NotEnoughPlayers,
    InvalidStartOptions,
    WrongPhase { expected: Phase, found: Phase },
}

impl fmt::Display for GameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameError::InvalidIdentityRequest => f.write_str("invalid identity request"),
            GameError::DuplicateIdentity => f.write_str("identity already taken"),
            GameError::IdentityExhausted => f.write_str("no unique identity available"),
            GameError::NotAPlayer => f.write_str("not a player"),
            GameError::AlreadyAPlayer => f.write_str("already a player"),
            GameError::NotEnoughPlayers => f.write_str("not enough players to start"),
            GameError::InvalidStartOptions => f.write_str("invalid start options"),
            GameError::WrongPhase { expected, found } => {
                write!(f, "expected a {expected} game, found a {found} game")
            }
        }
    }
}

impl std::error::Error for GameError {}

// Storage failures surfaced by game store adapters.
#[derive(Debug)]
pub enum StoreError {
    Io {
        path: PathBuf,
        source: io::Error,
    },
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },
    Encode(serde_json::Error),
    // Channel ids become file names, so only a safe charset is accepted.
    InvalidChannelId(String),
    // Adapter-specific failure without an underlying io or json error.
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io { path, source } => write!(f, "io error on {}: {source}", path.display()),
            StoreError::Decode { path, source } => {
                write!(f, "failed to decode {}: {source}", path.display())
            }
            StoreError::Encode(source) => write!(f, "failed to encode game record: {source}"),
            StoreError::InvalidChannelId(id) => write!(f, "invalid channel id {id:?}"),
            StoreError::Unavailable(reason) => write!(f, "store unavailable: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io { source, .. } => Some(source),
            StoreError::Decode { source, .. } => Some(source),
            StoreError::Encode(source) => Some(source),
            StoreError::InvalidChannelId(_) | StoreError::Unavailable(_) => None,
        }
    }
}
