// Framework bootstrap for the game core process.

use crate::frameworks::config::RuntimeConfig;
use crate::interface_adapters::console;
use crate::interface_adapters::dispatch::Dispatcher;
use crate::interface_adapters::state::{AppState, SystemClock};
use crate::interface_adapters::store::JsonFileStore;
use crate::use_cases::{DailyScheduler, GameRegistry, daily_tick_worker};

use std::{io::Result, sync::Arc};
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio::sync::mpsc;

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    // Logs go to stderr; stdout carries command replies.
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

/// Reloads stored games, then answers commands from `input` until it closes or the process
/// is interrupted. Daily hooks are released on the way out.
pub async fn run<R, W>(config: RuntimeConfig, input: R, output: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (state, tick_rx) = build_state(&config).await?;
    let worker = tokio::spawn(daily_tick_worker(state.registry.clone(), tick_rx));

    tracing::info!(data_dir = %config.data_dir.display(), "serving commands");
    let served = tokio::select! {
        served = console::serve(&*state.dispatcher, input, output) => served.map(|_| ()),
        signal = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received");
            signal
        }
    };

    state.registry.shutdown().await;
    worker.abort();
    served.inspect_err(|e| {
        tracing::error!(error = %e, "command loop failed");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let config = RuntimeConfig::from_env()
        .map_err(std::io::Error::other)
        .inspect_err(|e| {
            tracing::error!(error = %e, "failed to load configuration");
        })?;

    run(
        config,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
}

async fn build_state(
    config: &RuntimeConfig,
) -> Result<(AppState, mpsc::UnboundedReceiver<String>)> {
    let store = JsonFileStore::new(&config.data_dir);
    let settings = config.registry_settings();
    tracing::debug!(
        daily_time = %settings.daily_time,
        actions_per_day = settings.actions_per_day,
        identity_attempts = settings.identity_attempts,
        "registry configured"
    );

    let (registry, tick_rx) =
        GameRegistry::new(settings, store, SystemClock, DailyScheduler::new());
    let registry = Arc::new(registry);

    // Startup aborts if any stored game can't be read back.
    registry.reload().await.map_err(std::io::Error::other)?;

    let dispatcher = Arc::new(Dispatcher::new(registry.clone(), config.game.start));
    Ok((
        AppState {
            registry,
            dispatcher,
        },
        tick_rx,
    ))
}
