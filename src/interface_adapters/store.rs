// JSON file store: one pretty-printed record per channel under `active/` and `archive/`.

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::IgnoredAny;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::errors::StoreError;
use crate::domain::game::{ActiveGame, EndedGame, GameState, JoiningGame};
use crate::domain::ports::GameStore;

const RECORD_EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    active_root: PathBuf,
    archive_root: PathBuf,
}

impl JsonFileStore {
    /// Store rooted at `<data_dir>/active` and `<data_dir>/archive`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            active_root: data_dir.join("active"),
            archive_root: data_dir.join("archive"),
        }
    }

    pub fn active_path(&self, channel_id: &str) -> Result<PathBuf, StoreError> {
        record_path(&self.active_root, channel_id)
    }

    pub fn archive_path(&self, channel_id: &str) -> Result<PathBuf, StoreError> {
        record_path(&self.archive_root, channel_id)
    }

    /// Reads an archived game back, if one exists for the channel.
    pub async fn load_archived(&self, channel_id: &str) -> Result<Option<EndedGame>, StoreError> {
        let path = self.archive_path(channel_id)?;
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        match decode_record(&path, &text)? {
            GameState::Ended(game) => Ok(Some(game)),
            other => {
                warn!(path = %path.display(), phase = %other.phase(), "archive record is not an ended game");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl GameStore for JsonFileStore {
    async fn list_active(&self) -> Result<Vec<GameState>, StoreError> {
        let root = &self.active_root;
        // A missing data directory is a fresh install, not an error.
        fs::create_dir_all(root).await.map_err(|source| StoreError::Io {
            path: root.clone(),
            source,
        })?;

        let mut dir = fs::read_dir(root).await.map_err(|source| StoreError::Io {
            path: root.clone(),
            source,
        })?;

        let mut games = Vec::new();
        loop {
            let entry = match dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => {
                    return Err(StoreError::Io {
                        path: root.clone(),
                        source,
                    });
                }
            };
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }

            let text = fs::read_to_string(&path)
                .await
                .map_err(|source| StoreError::Io {
                    path: path.clone(),
                    source,
                })?;
            let game = decode_record(&path, &text)?;

            let stem = path.file_stem().and_then(|stem| stem.to_str());
            if stem != Some(game.channel_id()) {
                warn!(
                    path = %path.display(),
                    channel_id = %game.channel_id(),
                    "record file name does not match its channel id"
                );
            }
            games.push(game);
        }

        games.sort_by(|a, b| a.channel_id().cmp(b.channel_id()));
        debug!(count = games.len(), root = %root.display(), "active records read");
        Ok(games)
    }

    async fn save_active(&self, game: &GameState) -> Result<(), StoreError> {
        let path = self.active_path(game.channel_id())?;
        write_record(&path, game).await
    }

    async fn save_archive(&self, game: &EndedGame) -> Result<(), StoreError> {
        let path = self.archive_path(&game.channel_id)?;
        write_record(&path, &GameState::Ended(game.clone())).await
    }

    async fn remove_active(&self, channel_id: &str) -> Result<(), StoreError> {
        let path = self.active_path(channel_id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}

fn record_path(root: &Path, channel_id: &str) -> Result<PathBuf, StoreError> {
    let valid = !channel_id.is_empty()
        && channel_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'));
    if !valid {
        return Err(StoreError::InvalidChannelId(channel_id.to_string()));
    }
    Ok(root.join(format!("{channel_id}.{RECORD_EXTENSION}")))
}

// Writes to a sibling temp file and renames it over the target, so readers only ever see a
// complete record.
async fn write_record(path: &Path, game: &GameState) -> Result<(), StoreError> {
    let mut bytes = serde_json::to_vec_pretty(game).map_err(StoreError::Encode)?;
    bytes.push(b'\n');

    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).await.map_err(io_err)?;

    let tmp_path = dir.join(format!(".{}.tmp", Uuid::new_v4()));
    let written = async {
        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        fs::rename(&tmp_path, path).await
    }
    .await;

    if let Err(source) = written {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(io_err(source));
    }
    Ok(())
}

// Keys that decide how a record is decoded. Everything else is skipped here.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordShape {
    phase: Option<IgnoredAny>,
    start_date: Option<IgnoredAny>,
    end_date: Option<IgnoredAny>,
}

/// Decodes a stored record. Records without a `phase` tag are classified by which dates
/// they carry.
///
/// The text is decoded straight into the target type so the player map keeps its file order.
pub fn decode_record(path: &Path, text: &str) -> Result<GameState, StoreError> {
    let decode_err = |source| StoreError::Decode {
        path: path.to_path_buf(),
        source,
    };
    let shape: RecordShape = serde_json::from_str(text).map_err(decode_err)?;
    let state = if shape.phase.is_some() {
        serde_json::from_str::<GameState>(text).map_err(decode_err)?
    } else if shape.end_date.is_some() {
        GameState::Ended(serde_json::from_str::<EndedGame>(text).map_err(decode_err)?)
    } else if shape.start_date.is_some() {
        GameState::Active(serde_json::from_str::<ActiveGame>(text).map_err(decode_err)?)
    } else {
        GameState::Joining(serde_json::from_str::<JoiningGame>(text).map_err(decode_err)?)
    };
    Ok(state)
}
