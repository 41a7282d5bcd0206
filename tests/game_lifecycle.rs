mod support;

use serde_json::Value;
use tank_tactics::domain::{Color, GameRoles, GameState, IdentityRequest, Phase};
use tank_tactics::interface_adapters::protocol::{Command, CommandOutcome};
use tank_tactics::interface_adapters::store::JsonFileStore;
use tank_tactics::use_cases::RegistryError;
use tank_tactics::{GameConfig, RuntimeConfig};

fn read_json(path: &std::path::Path) -> Value {
    let text = std::fs::read_to_string(path).expect("read record");
    serde_json::from_str(&text).expect("record json")
}

#[tokio::test]
async fn game_moves_from_active_to_archive_on_disk() {
    let dir = support::DataDir::new();
    let (registry, dispatcher) = support::open(&dir);

    dispatcher
        .dispatch("chan", "gm", Command::NewGame)
        .await
        .expect("new game");
    assert_eq!(read_json(&dir.active("chan"))["phase"], "joining");

    for (id, color) in [("a", Color::Red), ("b", Color::Blue), ("c", Color::Green)] {
        dispatcher
            .dispatch("chan", id, Command::Join(IdentityRequest::solid(color)))
            .await
            .expect("join");
    }
    let outcome = dispatcher
        .dispatch("chan", "gm", Command::Start)
        .await
        .expect("start");
    let CommandOutcome::Started(active) = outcome else {
        panic!("expected a started game");
    };
    assert_eq!((active.board_size.x, active.board_size.y), (10, 10));

    let record = read_json(&dir.active("chan"));
    assert_eq!(record["phase"], "active");
    assert_eq!(record["boardSize"]["x"], 10);
    assert_eq!(record["players"]["a"]["health"], 3);
    assert_eq!(registry.live_hooks(), 1);

    dispatcher
        .dispatch("chan", "gm", Command::Archive)
        .await
        .expect("archive");
    assert!(!dir.active("chan").exists());
    let archived = read_json(&dir.archived("chan"));
    assert_eq!(archived["phase"], "ended");
    assert!(archived["endDate"].is_string());
    assert_eq!(registry.live_hooks(), 0);

    let store = JsonFileStore::new(dir.path());
    let ended = store.load_archived("chan").await.expect("load archive");
    assert_eq!(ended.map(|game| game.players.len()), Some(3));
}

#[tokio::test]
async fn restart_reloads_games_with_their_phase() {
    let dir = support::DataDir::new();
    {
        let (registry, dispatcher) = support::open(&dir);
        dispatcher
            .dispatch("waiting", "gm", Command::NewGame)
            .await
            .expect("new game");
        dispatcher
            .dispatch("waiting", "a", Command::Join(IdentityRequest::random()))
            .await
            .expect("join");

        dispatcher
            .dispatch("running", "gm", Command::NewGame)
            .await
            .expect("new game");
        dispatcher
            .dispatch("running", "a", Command::Join(IdentityRequest::solid(Color::Red)))
            .await
            .expect("join");
        dispatcher
            .dispatch("running", "gm", Command::Start)
            .await
            .expect("start");
        registry.shutdown().await;
    }

    let (registry, _dispatcher) = support::open(&dir);
    assert_eq!(registry.reload().await.expect("reload"), 2);
    assert_eq!(registry.channels().await, ["running", "waiting"]);

    let waiting = registry.get("waiting").await.expect("waiting game");
    assert_eq!(waiting.phase(), Phase::Joining);
    assert!(waiting.is_player("a"));

    let running = registry.get("running").await.expect("running game");
    let GameState::Active(game) = running else {
        panic!("expected an active game");
    };
    assert!(game.placement_is_valid());
    assert_eq!(registry.live_hooks(), 1);
    registry.shutdown().await;
}

#[tokio::test]
async fn reloaded_games_equal_what_was_persisted() {
    let dir = support::DataDir::new();
    let joiners = [
        ("zed", Color::Red),
        ("amy", Color::Blue),
        ("mo", Color::Green),
        ("bo", Color::Yellow),
    ];
    let (waiting, running) = {
        let (registry, dispatcher) = support::open(&dir);
        for channel in ["waiting", "running"] {
            dispatcher
                .dispatch(channel, "gm", Command::NewGame)
                .await
                .expect("new game");
            for (id, color) in joiners {
                dispatcher
                    .dispatch(channel, id, Command::Join(IdentityRequest::solid(color)))
                    .await
                    .expect("join");
            }
        }
        dispatcher
            .dispatch("running", "gm", Command::Start)
            .await
            .expect("start");

        let waiting = registry.get("waiting").await.expect("waiting game");
        let running = registry.get("running").await.expect("running game");
        registry.shutdown().await;
        (waiting, running)
    };
    assert_eq!(waiting.player_ids(), ["zed", "amy", "mo", "bo"]);

    let (registry, _dispatcher) = support::open(&dir);
    registry.reload().await.expect("reload");

    let reloaded_waiting = registry.get("waiting").await.expect("waiting game");
    assert_eq!(reloaded_waiting.player_ids(), ["zed", "amy", "mo", "bo"]);
    assert_eq!(reloaded_waiting, waiting);

    let reloaded_running = registry.get("running").await.expect("running game");
    assert_eq!(reloaded_running.player_ids(), ["zed", "amy", "mo", "bo"]);
    assert_eq!(reloaded_running, running);
    registry.shutdown().await;
}

#[tokio::test]
async fn corrupt_record_aborts_reload_and_names_the_file() {
    let dir = support::DataDir::new();
    {
        let (_registry, dispatcher) = support::open(&dir);
        dispatcher
            .dispatch("good", "gm", Command::NewGame)
            .await
            .expect("new game");
    }
    std::fs::write(dir.active("broken"), "{ \"channelId\": ").expect("write corrupt record");

    let (registry, _dispatcher) = support::open(&dir);
    let err = registry.reload().await.unwrap_err();
    assert!(matches!(err, RegistryError::Storage(_)));
    assert!(err.to_string().contains("broken.json"));
    assert!(registry.get("good").await.is_none());
}

#[tokio::test]
async fn reload_creates_a_missing_data_directory() {
    let dir = support::DataDir::new();
    let (registry, _dispatcher) = support::open(&dir);

    assert_eq!(registry.reload().await.expect("reload"), 0);
    assert!(dir.path().join("active").is_dir());
}

#[tokio::test]
async fn process_loop_answers_each_input_line() {
    let dir = support::DataDir::new();
    let config = RuntimeConfig {
        data_dir: dir.path().to_path_buf(),
        daily_time: Default::default(),
        game: GameConfig::default(),
    };
    let input = [
        r#"{"channel_id":"chan","actor_id":"gm","command":{"type":"new_game"}}"#,
        r#"{"channel_id":"chan","actor_id":"a","command":{"type":"join"}}"#,
        r#"{"channel_id":"chan","actor_id":"a","command":{"type":"list","target":"players"}}"#,
    ]
    .join("\n");
    let mut output = Vec::new();

    tank_tactics::run(config, input.as_bytes(), &mut output)
        .await
        .expect("run");

    let replies: Vec<Value> = String::from_utf8(output)
        .expect("utf8 output")
        .lines()
        .map(|line| serde_json::from_str(line).expect("reply json"))
        .collect();
    assert_eq!(replies.len(), 3);
    assert!(replies.iter().all(|reply| reply["status"] == "ok"));
    assert_eq!(replies[2]["outcome"]["ids"][0], "a");
    assert_eq!(read_json(&dir.active("chan"))["phase"], "joining");
}
