//! Runs the forest ecosystem in real time.
//!
//! Configuration comes from the JSON file named by `FOREST_CONFIG` (defaults
//! otherwise). `FOREST_SEED` overrides the seed. While running, Enter or `p`
//! toggles pause and `q` quits.

mod clock;
mod render;
mod telemetry;

use anyhow::{Context, Result};
use clock::{ClockCommand, ClockHandle, SimulationClock};
use forest_core::RunnerConfig;
use forest_world::Ecosystem;
use std::io::BufRead;
use std::time::Duration;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration, validated once logging is up
    let mut config = match std::env::var("FOREST_CONFIG") {
        Ok(path) => RunnerConfig::read(&path)
            .with_context(|| format!("failed to load runner config from {path}"))?,
        Err(_) => RunnerConfig::default(),
    };
    if let Ok(seed) = std::env::var("FOREST_SEED") {
        let seed = seed
            .trim()
            .parse::<u64>()
            .context("FOREST_SEED must be an unsigned integer")?;
        config.forest.seed = Some(seed);
    }

    // Initialize telemetry
    telemetry::init_telemetry(config.log_format)?;
    config
        .forest
        .validate()
        .context("invalid forest configuration")?;

    info!(
        rows = config.forest.grid_rows,
        cols = config.forest.grid_cols,
        tick_period_ms = config.forest.tick_period_ms,
        seed = ?config.forest.seed,
        "Starting forest ecosystem"
    );

    let mut ecosystem = Ecosystem::from_config(config.forest.clone())?;
    ecosystem.populate_forest()?;

    let clock = SimulationClock::new(Duration::from_millis(config.forest.tick_period_ms));
    let handle = clock.handle();
    if config.start_paused {
        handle.pause();
    }

    let quit = spawn_keyboard(handle);
    let shutdown = async move {
        tokio::select! {
            _ = shutdown_signal() => {},
            _ = quit_requested(quit) => {},
        }
    };

    let mut renderer = render::renderer_for(config.render);
    let ticks = clock
        .run(&mut ecosystem, renderer.as_mut(), config.max_ticks, shutdown)
        .await?;

    let stats = ecosystem.stats();
    info!(
        ticks,
        year = ecosystem.time() / forest_world::TICKS_PER_YEAR,
        lumber_total = stats.lumber.total,
        mauls_total = stats.maul.total,
        "Shutting down forest ecosystem"
    );

    Ok(())
}

/// Read commands from stdin on a dedicated thread so a blocked read never
/// holds up runtime shutdown. The receiver fires when `q` is entered.
fn spawn_keyboard(clock: ClockHandle) -> oneshot::Receiver<()> {
    let (quit_tx, quit_rx) = oneshot::channel();

    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    error!("Failed to read keyboard input: {}", e);
                    return;
                }
            };
            match ClockCommand::parse(&line) {
                Some(ClockCommand::TogglePause) => clock.toggle(),
                Some(ClockCommand::Quit) => {
                    let _ = quit_tx.send(());
                    return;
                }
                None => warn!(input = %line.trim(), "Unknown command, use p to pause or q to quit"),
            }
        }
    });

    quit_rx
}

/// Resolves only on an explicit quit. A closed stdin leaves the clock running.
async fn quit_requested(quit: oneshot::Receiver<()>) {
    if quit.await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
