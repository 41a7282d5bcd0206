// Wire DTOs for the command contract between the chat gateway and the game core.
// Replies carry machine-readable codes only; the gateway owns user-facing text.

use crate::domain::game::{ActiveGame, ChannelId, EndedGame, IdentityRequest};
use crate::domain::pattern::TankPattern;
use crate::domain::roster::PlayerId;
use serde::{Deserialize, Serialize};

/// One inbound command, already resolved to a channel and an acting user.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    pub channel_id: ChannelId,
    pub actor_id: PlayerId,
    pub command: Command,
}

/// Commands the gateway can issue.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    NewGame,
    // Identity fields sit next to the tag; none at all asks for a random identity.
    Join(IdentityRequest),
    Leave,
    Start,
    Archive,
    List { target: ListTarget },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListTarget {
    Players,
    Jury,
    Gm,
}

/// Successful command results.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandOutcome {
    Created { channel_id: ChannelId },
    Joined { pattern: TankPattern },
    Left,
    Started(ActiveGame),
    Archived(EndedGame),
    Listed { ids: Vec<PlayerId> },
}

/// One outbound line answering a `CommandRequest`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommandReply {
    Ok { outcome: CommandOutcome },
    Error { code: &'static str },
}
