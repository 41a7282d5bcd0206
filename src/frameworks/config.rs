use chrono::NaiveTime;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::{env, fmt, fs, io};

use crate::domain::game::StartOptions;
use crate::use_cases::RegistrySettings;

// Runtime constants and environment lookups.

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_ACTIONS_PER_DAY: u32 = 1;
pub const DEFAULT_IDENTITY_ATTEMPTS: u32 = 1000;

pub fn data_dir() -> PathBuf {
    env::var("TANK_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR))
}

/// Local time of the daily tick, `HH:MM` or `HH:MM:SS`. Midnight when unset or unparsable.
pub fn daily_time() -> NaiveTime {
    env::var("TANK_DAILY_TIME")
        .ok()
        .and_then(|value| parse_time_of_day(&value))
        .unwrap_or_default()
}

pub fn game_config_path() -> Option<PathBuf> {
    env::var("TANK_GAME_CONFIG").ok().map(PathBuf::from)
}

fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

/// Everything the process needs at startup.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub data_dir: PathBuf,
    pub daily_time: NaiveTime,
    pub game: GameConfig,
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            data_dir: data_dir(),
            daily_time: daily_time(),
            game: GameConfig::from_env()?,
        })
    }

    pub fn registry_settings(&self) -> RegistrySettings {
        self.game.registry_settings(self.daily_time)
    }
}

/// Gameplay tuning read from the optional TOML file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub start: StartOptions,
    pub daily: DailyConfig,
    pub identity: IdentityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DailyConfig {
    pub actions_per_day: u32,
}

impl Default for DailyConfig {
    fn default() -> Self {
        Self {
            actions_per_day: DEFAULT_ACTIONS_PER_DAY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub max_attempts: u32,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_IDENTITY_ATTEMPTS,
        }
    }
}

impl GameConfig {
    /// Reads `TANK_GAME_CONFIG` if set, otherwise returns the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        match game_config_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: GameConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config
            .start
            .validate()
            .map_err(|_| ConfigError::InvalidStartOptions(path.to_path_buf()))?;
        Ok(config)
    }

    pub fn registry_settings(&self, daily_time: NaiveTime) -> RegistrySettings {
        RegistrySettings {
            daily_time,
            actions_per_day: self.daily.actions_per_day,
            identity_attempts: self.identity.max_attempts,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
    InvalidStartOptions(PathBuf),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read config {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "invalid config {}: {source}", path.display())
            }
            ConfigError::InvalidStartOptions(path) => {
                write!(f, "invalid [start] options in {}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::InvalidStartOptions(_) => None,
        }
    }
}
