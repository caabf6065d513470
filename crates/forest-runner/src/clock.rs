//! Wall-clock driver for the ecosystem.
//!
//! The clock ticks the ecosystem on a fixed period and renders a frame after
//! each tick. Pausing is shared through a watch channel so the keyboard
//! thread and the run loop see the same state.

use crate::render::Renderer;
use anyhow::Result;
use forest_world::{Ecosystem, RandomSource};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Keyboard commands understood by the runner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockCommand {
    TogglePause,
    Quit,
}

impl ClockCommand {
    /// Parse one line of input. A blank line (space then Enter) toggles pause.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "" | "p" | "pause" => Some(Self::TogglePause),
            "q" | "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Cloneable control for a running clock
#[derive(Clone)]
pub struct ClockHandle {
    running: Arc<watch::Sender<bool>>,
}

impl ClockHandle {
    pub fn pause(&self) {
        if self.running.send_replace(false) {
            info!("Paused");
        }
    }

    pub fn resume(&self) {
        if !self.running.send_replace(true) {
            info!("Resuming");
        }
    }

    pub fn toggle(&self) {
        if self.is_running() {
            self.pause();
        } else {
            self.resume();
        }
    }

    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }
}

pub struct SimulationClock {
    period: Duration,
    running: Arc<watch::Sender<bool>>,
}

impl SimulationClock {
    pub fn new(period: Duration) -> Self {
        let (running, _) = watch::channel(true);
        Self {
            period,
            running: Arc::new(running),
        }
    }

    pub fn handle(&self) -> ClockHandle {
        ClockHandle {
            running: self.running.clone(),
        }
    }

    /// Tick `ecosystem` once per period until `max_ticks` ticks have run or
    /// `shutdown` resolves. Renders the starting state before the first
    /// tick. Returns the number of ticks executed.
    pub async fn run<R, F>(
        &self,
        ecosystem: &mut Ecosystem<R>,
        renderer: &mut dyn Renderer,
        max_ticks: Option<u64>,
        shutdown: F,
    ) -> Result<u64>
    where
        R: RandomSource,
        F: Future<Output = ()>,
    {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut running = self.running.subscribe();
        tokio::pin!(shutdown);

        info!(period_ms = self.period.as_millis() as u64, ?max_ticks, "Clock started");
        renderer.render(&ecosystem.snapshot())?;

        let mut executed = 0u64;
        loop {
            if max_ticks.is_some_and(|max| executed >= max) {
                break;
            }

            if !*running.borrow_and_update() {
                tokio::select! {
                    _ = &mut shutdown => break,
                    changed = running.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        // A fresh period after resuming
                        ticker.reset();
                        continue;
                    }
                }
            }

            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    if !*running.borrow() {
                        continue;
                    }
                    let summary = ecosystem.tick();
                    executed += 1;
                    if let Some(report) = &summary.year_end {
                        debug!(
                            year = report.year,
                            lumber = report.lumber,
                            mauls = report.mauls,
                            "Year rendered"
                        );
                    }
                    renderer.render(&ecosystem.snapshot())?;
                }
            }
        }

        info!(ticks = executed, time = ecosystem.time(), "Clock stopped");
        Ok(executed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::NullRenderer;
    use forest_core::ForestConfig;

    fn ecosystem() -> Ecosystem {
        let config = ForestConfig {
            grid_rows: 5,
            grid_cols: 5,
            seed: Some(3),
            ..Default::default()
        };
        let mut eco = Ecosystem::from_config(config).unwrap();
        eco.populate_forest().unwrap();
        eco
    }

    struct CountingRenderer(u64);

    impl Renderer for CountingRenderer {
        fn render(&mut self, _snapshot: &forest_world::EcosystemSnapshot) -> Result<()> {
            self.0 += 1;
            Ok(())
        }
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!(ClockCommand::parse(" "), Some(ClockCommand::TogglePause));
        assert_eq!(ClockCommand::parse("P\n"), Some(ClockCommand::TogglePause));
        assert_eq!(ClockCommand::parse("q"), Some(ClockCommand::Quit));
        assert_eq!(ClockCommand::parse("jump"), None);
    }

    #[test]
    fn test_handle_toggles() {
        let clock = SimulationClock::new(Duration::from_millis(1));
        let handle = clock.handle();
        assert!(handle.is_running());

        handle.toggle();
        assert!(!handle.is_running());
        assert!(!clock.handle().is_running());

        handle.resume();
        assert!(handle.is_running());
    }

    #[tokio::test]
    async fn test_runs_until_max_ticks() {
        let mut eco = ecosystem();
        let mut renderer = CountingRenderer(0);
        let clock = SimulationClock::new(Duration::from_millis(1));

        let ticks = clock
            .run(&mut eco, &mut renderer, Some(3), std::future::pending())
            .await
            .unwrap();

        assert_eq!(ticks, 3);
        assert_eq!(eco.time(), 3);
        // Initial frame plus one per tick
        assert_eq!(renderer.0, 4);
    }

    #[tokio::test]
    async fn test_paused_clock_does_not_tick() {
        let mut eco = ecosystem();
        let clock = SimulationClock::new(Duration::from_millis(1));
        clock.handle().pause();

        let ticks = clock
            .run(
                &mut eco,
                &mut NullRenderer,
                Some(10),
                tokio::time::sleep(Duration::from_millis(20)),
            )
            .await
            .unwrap();

        assert_eq!(ticks, 0);
        assert_eq!(eco.time(), 0);
    }

    #[tokio::test]
    async fn test_resume_continues_ticking() {
        let mut eco = ecosystem();
        let clock = SimulationClock::new(Duration::from_millis(1));
        let handle = clock.handle();
        handle.pause();

        let resumer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.resume();
        });

        let ticks = clock
            .run(&mut eco, &mut NullRenderer, Some(2), std::future::pending())
            .await
            .unwrap();
        resumer.await.unwrap();

        assert_eq!(ticks, 2);
    }

    #[tokio::test]
    async fn test_shutdown_stops_running_clock() {
        let mut eco = ecosystem();
        let clock = SimulationClock::new(Duration::from_millis(1));

        let ticks = clock
            .run(
                &mut eco,
                &mut NullRenderer,
                None,
                tokio::time::sleep(Duration::from_millis(30)),
            )
            .await
            .unwrap();

        assert!(ticks > 0);
        assert_eq!(eco.time(), ticks);
    }
}
