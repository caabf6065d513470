//! Forest simulation engine.
//!
//! This crate implements the 2D grid where trees, lumberjacks and bears age,
//! wander, reproduce and run into each other.

pub mod ecosystem;
pub mod grid;
pub mod organism;
pub mod rng;

pub use ecosystem::{
    Ecosystem, EcosystemSnapshot, EcosystemStats, PopulationCounts, PopulationIndex, Tally,
    TickSummary, YearReport, TICKS_PER_YEAR,
};
pub use grid::{Grid, GridSnapshot};
pub use organism::{Organism, OrganismView};
pub use rng::{RandomSource, SeededRandom};
