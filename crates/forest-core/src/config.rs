//! Configuration types for the simulation.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Largest grid the engine accepts, in cells
pub const MAX_GRID_CELLS: usize = 1_000_000;

/// Forest configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Number of grid rows
    pub grid_rows: i32,
    /// Number of grid columns
    pub grid_cols: i32,
    /// Delay between ticks (milliseconds)
    pub tick_period_ms: u64,
    /// Share of cells seeded with trees (0.0 to 1.0)
    pub tree_ratio: f64,
    /// Share of cells seeded with lumberjacks (0.0 to 1.0)
    pub lumberjack_ratio: f64,
    /// Share of cells seeded with bears (0.0 to 1.0)
    pub bear_ratio: f64,
    /// Random seed for reproducibility, entropy when absent
    pub seed: Option<u64>,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            grid_rows: 25,
            grid_cols: 25,
            tick_period_ms: 125,
            tree_ratio: 0.5,
            lumberjack_ratio: 0.10,
            bear_ratio: 0.05,
            seed: None,
        }
    }
}

impl ForestConfig {
    pub fn grid_size(&self) -> usize {
        self.grid_rows.max(0) as usize * self.grid_cols.max(0) as usize
    }

    /// Reject dimensions and ratios the engine cannot work with. Ratios
    /// summing above 1 are tolerated: seeding clamps the empty share to zero.
    pub fn validate(&self) -> Result<()> {
        if self.grid_rows <= 0 || self.grid_cols <= 0 {
            return Err(Error::Validation(format!(
                "grid dimensions must be positive, got {}x{}",
                self.grid_rows, self.grid_cols
            )));
        }

        let cells = (self.grid_rows as usize).checked_mul(self.grid_cols as usize);
        if !cells.is_some_and(|cells| cells <= MAX_GRID_CELLS) {
            return Err(Error::Validation(format!(
                "grid of {}x{} exceeds {} cells",
                self.grid_rows, self.grid_cols, MAX_GRID_CELLS
            )));
        }

        if self.tick_period_ms == 0 {
            return Err(Error::Validation(
                "tick period must be greater than zero".to_string(),
            ));
        }

        for (name, ratio) in [
            ("tree_ratio", self.tree_ratio),
            ("lumberjack_ratio", self.lumberjack_ratio),
            ("bear_ratio", self.bear_ratio),
        ] {
            if !ratio.is_finite() || !(0.0..=1.0).contains(&ratio) {
                return Err(Error::Validation(format!(
                    "{name} must lie in [0, 1], got {ratio}"
                )));
            }
        }

        let total = self.tree_ratio + self.lumberjack_ratio + self.bear_ratio;
        if total > 1.0 {
            warn!(
                total_ratio = total,
                "Population ratios exceed 1.0, no cells will be left empty"
            );
        }

        Ok(())
    }
}

/// How the runner presents each tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    Text,
    Json,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub forest: ForestConfig,
    /// Stop after this many ticks, run until interrupted when absent
    pub max_ticks: Option<u64>,
    pub render: RenderMode,
    pub log_format: LogFormat,
    /// Start with the clock paused
    pub start_paused: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            forest: ForestConfig::default(),
            max_ticks: None,
            render: RenderMode::Text,
            log_format: LogFormat::Pretty,
            start_paused: false,
        }
    }
}

impl RunnerConfig {
    /// Parse a JSON file without validating it. Missing fields take their
    /// defaults.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Parse and validate a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config = Self::read(path)?;
        config.forest.validate()?;
        Ok(config)
    }
}
