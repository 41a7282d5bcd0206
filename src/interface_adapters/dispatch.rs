// Command dispatch: phase and role gates in front of the registry.

use crate::domain::errors::{GameError, Phase, StoreError};
use crate::domain::game::{GameRoles, GameState, StartOptions};
use crate::domain::ports::{Clock, GameStore};
use crate::interface_adapters::protocol::{Command, CommandOutcome, CommandReply, ListTarget};
use crate::use_cases::{GameRegistry, RegistryError};
use std::fmt;
use std::sync::Arc;
use tracing::{Instrument, debug, info_span};

/// Who may issue a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Audience {
    Anyone,
    // Users that are not playing yet.
    Spectator,
    Player,
    GameMaster,
}

#[derive(Debug, Clone, Copy)]
struct Gate {
    phase: Option<Phase>,
    audience: Audience,
}

impl Command {
    // `None` for commands that don't need an existing game.
    fn gate(&self) -> Option<Gate> {
        let gate = |phase, audience| Some(Gate { phase, audience });
        match self {
            Command::NewGame => None,
            Command::Join(_) => gate(Some(Phase::Joining), Audience::Spectator),
            Command::Leave => gate(Some(Phase::Joining), Audience::Player),
            Command::Start => gate(Some(Phase::Joining), Audience::GameMaster),
            Command::Archive => gate(Some(Phase::Active), Audience::GameMaster),
            Command::List { .. } => gate(None, Audience::Anyone),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Command::NewGame => "new_game",
            Command::Join(_) => "join",
            Command::Leave => "leave",
            Command::Start => "start",
            Command::Archive => "archive",
            Command::List { .. } => "list",
        }
    }
}

/// Why a command was refused.
#[derive(Debug)]
pub enum DispatchError {
    // The game is in a phase the command doesn't apply to.
    PhaseMismatch { expected: Phase, found: Phase },
    NotGameMaster,
    NotAPlayer,
    AlreadyAPlayer,
    Registry(RegistryError),
}

impl DispatchError {
    /// Stable machine-readable code for the gateway to translate.
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::PhaseMismatch { expected: Phase::Joining, .. } => "game_already_started",
            DispatchError::PhaseMismatch { .. } => "game_not_started",
            DispatchError::NotGameMaster => "not_game_master",
            DispatchError::NotAPlayer => "not_a_player",
            DispatchError::AlreadyAPlayer => "already_a_player",
            DispatchError::Registry(err) => match err {
                RegistryError::NoSuchGame => "no_such_game",
                RegistryError::GameAlreadyExists(_) => "game_already_exists",
                RegistryError::Storage(StoreError::InvalidChannelId(_)) => "invalid_channel",
                RegistryError::Storage(_) => "storage_failure",
                RegistryError::Game(game_err) => match game_err {
                    GameError::InvalidIdentityRequest => "invalid_identity_request",
                    GameError::DuplicateIdentity => "duplicate_identity",
                    GameError::IdentityExhausted => "identity_exhausted",
                    GameError::NotAPlayer => "not_a_player",
                    GameError::AlreadyAPlayer => "already_a_player",
                    GameError::NotEnoughPlayers => "not_enough_players",
                    GameError::InvalidStartOptions => "invalid_start_options",
                    GameError::WrongPhase { .. } => "wrong_phase",
                },
            },
        }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::PhaseMismatch { expected, found } => {
                write!(f, "command needs a {expected} game, this one is {found}")
            }
            DispatchError::NotGameMaster => f.write_str("only the game master may do that"),
            DispatchError::NotAPlayer => f.write_str("not a player"),
            DispatchError::AlreadyAPlayer => f.write_str("already a player"),
            DispatchError::Registry(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<RegistryError> for DispatchError {
    fn from(err: RegistryError) -> Self {
        DispatchError::Registry(err)
    }
}

/// Entry point the chat gateway calls for every resolved command.
pub struct Dispatcher<S, C> {
    registry: Arc<GameRegistry<S, C>>,
    start_options: StartOptions,
}

impl<S, C> Dispatcher<S, C>
where
    S: GameStore,
    C: Clock,
{
    pub fn new(registry: Arc<GameRegistry<S, C>>, start_options: StartOptions) -> Self {
        Self {
            registry,
            start_options,
        }
    }

    pub fn registry(&self) -> &Arc<GameRegistry<S, C>> {
        &self.registry
    }

    pub async fn dispatch(
        &self,
        channel_id: &str,
        actor_id: &str,
        command: Command,
    ) -> Result<CommandOutcome, DispatchError> {
        let span = info_span!("command", kind = command.name(), channel_id, actor_id);
        self.dispatch_inner(channel_id, actor_id, command)
            .instrument(span)
            .await
            .inspect_err(|e| debug!(code = e.code(), error = %e, "command refused"))
    }

    /// Same as `dispatch`, folded into the reply sent back over the wire.
    pub async fn reply(&self, channel_id: &str, actor_id: &str, command: Command) -> CommandReply {
        match self.dispatch(channel_id, actor_id, command).await {
            Ok(outcome) => CommandReply::Ok { outcome },
            Err(err) => CommandReply::Error { code: err.code() },
        }
    }

    async fn dispatch_inner(
        &self,
        channel_id: &str,
        actor_id: &str,
        command: Command,
    ) -> Result<CommandOutcome, DispatchError> {
        let game = match command.gate() {
            Some(gate) => {
                let game = self
                    .registry
                    .get(channel_id)
                    .await
                    .ok_or(RegistryError::NoSuchGame)?;
                check_gate(&game, gate, actor_id)?;
                Some(game)
            }
            None => None,
        };

        let outcome = match command {
            Command::NewGame => {
                self.registry.create(channel_id, actor_id).await?;
                CommandOutcome::Created {
                    channel_id: channel_id.to_string(),
                }
            }
            Command::Join(request) => {
                let pattern = self.registry.join(channel_id, actor_id, request).await?;
                CommandOutcome::Joined { pattern }
            }
            Command::Leave => {
                self.registry.leave(channel_id, actor_id).await?;
                CommandOutcome::Left
            }
            Command::Start => {
                let game = self
                    .registry
                    .start_transition(channel_id, self.start_options)
                    .await?;
                CommandOutcome::Started(game)
            }
            Command::Archive => CommandOutcome::Archived(self.registry.archive(channel_id).await?),
            Command::List { target } => {
                let game = game.ok_or(RegistryError::NoSuchGame)?;
                let ids = match target {
                    ListTarget::Players => game.player_ids(),
                    ListTarget::Jury => game.jury().to_vec(),
                    ListTarget::Gm => vec![game.game_master().to_string()],
                };
                CommandOutcome::Listed { ids }
            }
        };
        Ok(outcome)
    }
}

fn check_gate(game: &GameState, gate: Gate, actor_id: &str) -> Result<(), DispatchError> {
    if let Some(expected) = gate.phase {
        let found = game.phase();
        if found != expected {
            return Err(DispatchError::PhaseMismatch { expected, found });
        }
    }

    match gate.audience {
        Audience::Anyone => Ok(()),
        Audience::Spectator if game.is_player(actor_id) => Err(DispatchError::AlreadyAPlayer),
        Audience::Spectator => Ok(()),
        Audience::Player if game.is_player(actor_id) => Ok(()),
        Audience::Player => Err(DispatchError::NotAPlayer),
        Audience::GameMaster if game.is_game_master(actor_id) => Ok(()),
        Audience::GameMaster => Err(DispatchError::NotGameMaster),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::game::IdentityRequest;
    use crate::domain::pattern::Color;
    use crate::use_cases::test_support::{FixedClock, RecordingStore};
    use crate::use_cases::{DailyScheduler, RegistrySettings};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn dispatcher() -> Dispatcher<RecordingStore, FixedClock> {
        let (registry, _rx) = GameRegistry::with_rng(
            RegistrySettings::default(),
            RecordingStore::new(),
            FixedClock::at(1_700_000_000),
            DailyScheduler::new(),
            StdRng::seed_from_u64(4),
        );
        Dispatcher::new(Arc::new(registry), StartOptions::default())
    }

    fn join(color: Color) -> Command {
        Command::Join(IdentityRequest::solid(color))
    }

    #[tokio::test]
    async fn when_no_game_then_gated_commands_report_no_such_game() {
        let d = dispatcher();
        let err = d.dispatch("c", "a", join(Color::Red)).await.unwrap_err();
        assert_eq!(err.code(), "no_such_game");
    }

    #[tokio::test]
    async fn when_non_gm_starts_then_refused() {
        let d = dispatcher();
        d.dispatch("c", "gm", Command::NewGame).await.expect("new game");
        d.dispatch("c", "a", join(Color::Red)).await.expect("join");

        let err = d.dispatch("c", "a", Command::Start).await.unwrap_err();
        assert!(matches!(err, DispatchError::NotGameMaster));
        let game = d.registry().get("c").await.expect("game");
        assert_eq!(game.phase(), Phase::Joining);
    }

    #[tokio::test]
    async fn when_player_joins_twice_then_already_a_player() {
        let d = dispatcher();
        d.dispatch("c", "gm", Command::NewGame).await.expect("new game");
        d.dispatch("c", "a", join(Color::Red)).await.expect("join");
        let err = d.dispatch("c", "a", join(Color::Blue)).await.unwrap_err();
        assert_eq!(err.code(), "already_a_player");
    }

    #[tokio::test]
    async fn when_spectator_leaves_then_not_a_player() {
        let d = dispatcher();
        d.dispatch("c", "gm", Command::NewGame).await.expect("new game");
        let err = d.dispatch("c", "x", Command::Leave).await.unwrap_err();
        assert_eq!(err.code(), "not_a_player");
    }

    #[tokio::test]
    async fn when_game_started_then_join_and_start_are_refused() {
        let d = dispatcher();
        d.dispatch("c", "gm", Command::NewGame).await.expect("new game");
        d.dispatch("c", "a", join(Color::Red)).await.expect("join");
        let outcome = d.dispatch("c", "gm", Command::Start).await.expect("start");
        assert!(matches!(outcome, CommandOutcome::Started(_)));

        let err = d.dispatch("c", "b", join(Color::Blue)).await.unwrap_err();
        assert_eq!(err.code(), "game_already_started");
        let err = d.dispatch("c", "gm", Command::Start).await.unwrap_err();
        assert_eq!(err.code(), "game_already_started");
    }

    #[tokio::test]
    async fn when_new_game_on_busy_channel_then_game_already_exists() {
        let d = dispatcher();
        d.dispatch("c", "gm", Command::NewGame).await.expect("new game");
        let reply = d.reply("c", "other", Command::NewGame).await;
        let json = serde_json::to_value(&reply).expect("encode reply");
        assert_eq!(json["status"], "error");
        assert_eq!(json["code"], "game_already_exists");
    }

    #[tokio::test]
    async fn list_reports_players_in_join_order() {
        let d = dispatcher();
        d.dispatch("c", "gm", Command::NewGame).await.expect("new game");
        for (id, color) in [("b", Color::Red), ("a", Color::Blue), ("c", Color::Green)] {
            d.dispatch("c", id, join(color)).await.expect("join");
        }
        let outcome = d
            .dispatch("c", "anyone", Command::List { target: ListTarget::Players })
            .await
            .expect("list");
        match outcome {
            CommandOutcome::Listed { ids } => assert_eq!(ids, ["b", "a", "c"]),
            other => panic!("unexpected outcome {other:?}"),
        }
        let outcome = d
            .dispatch("c", "anyone", Command::List { target: ListTarget::Gm })
            .await
            .expect("list gm");
        assert!(matches!(outcome, CommandOutcome::Listed { ids } if ids == ["gm"]));
    }

    #[tokio::test]
    async fn archive_needs_an_active_game_and_the_gm() {
        let d = dispatcher();
        d.dispatch("c", "gm", Command::NewGame).await.expect("new game");
        let err = d.dispatch("c", "gm", Command::Archive).await.unwrap_err();
        assert_eq!(err.code(), "game_not_started");

        d.dispatch("c", "a", join(Color::Red)).await.expect("join");
        d.dispatch("c", "gm", Command::Start).await.expect("start");
        let err = d.dispatch("c", "a", Command::Archive).await.unwrap_err();
        assert_eq!(err.code(), "not_game_master");

        let outcome = d.dispatch("c", "gm", Command::Archive).await.expect("archive");
        assert!(matches!(outcome, CommandOutcome::Archived(_)));
        assert!(d.registry().get("c").await.is_none());
    }

    #[test]
    fn commands_parse_from_json() {
        let cmd: Command = serde_json::from_str(r#"{"type":"join"}"#).expect("random join");
        assert!(matches!(cmd, Command::Join(req) if req == IdentityRequest::random()));

        let cmd: Command = serde_json::from_str(
            r#"{"type":"join","primary":"red","secondary":"blue","kind":"dots"}"#,
        )
        .expect("patterned join");
        assert!(matches!(cmd, Command::Join(req) if req.kind.is_some()));

        let cmd: Command =
            serde_json::from_str(r#"{"type":"list","target":"jury"}"#).expect("list");
        assert!(matches!(cmd, Command::List { target: ListTarget::Jury }));
    }
}
