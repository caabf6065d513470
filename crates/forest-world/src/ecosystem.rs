//! Forest ecosystem engine.
//!
//! One [`Ecosystem::tick`] runs these phases in order, each observing the
//! effects of the ones before it:
//!
//! 1. trees age and may drop a sapling into an open neighboring cell
//! 2. lumberjacks age, wander and fell the trees they land on
//! 3. bears age, wander and maul the lumberjacks they land on
//! 4. the population index is rebuilt from a full grid scan
//! 5. an empty lumberjack or bear population gets one random recruit
//! 6. every 12th tick, lumberjacks are hired or fired against the lumber
//!    quota and bears are culled or introduced depending on maul incidents
//!
//! Phases iterate a copy of the population list taken at phase start, so
//! organisms born or removed mid-phase never disturb the iteration.

use crate::grid::{Grid, GridSnapshot};
use crate::organism::Organism;
use crate::rng::{RandomSource, SeededRandom};
use forest_core::{
    Error, ForestConfig, OrganismId, Position, Result, SpeciesCatalog, SpeciesGroup, Stage,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, instrument, trace, warn};

/// Ticks per simulated year
pub const TICKS_PER_YEAR: u64 = 12;

/// Lumber quota per employed lumberjack per year
pub const LUMBER_QUOTA_PER_JACK: u64 = 2;

/// Yearly and lifetime counter pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub year: u64,
    pub total: u64,
}

impl Tally {
    fn record(&mut self, amount: u64) {
        self.year += amount;
        self.total += amount;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcosystemStats {
    pub lumber: Tally,
    pub maul: Tally,
}

impl EcosystemStats {
    fn reset_year(&mut self) {
        self.lumber.year = 0;
        self.maul.year = 0;
    }
}

/// Live organisms per species group
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulationIndex {
    tree: Vec<OrganismId>,
    lumberjack: Vec<OrganismId>,
    bear: Vec<OrganismId>,
}

impl PopulationIndex {
    pub fn get(&self, group: SpeciesGroup) -> &[OrganismId] {
        match group {
            SpeciesGroup::Tree => &self.tree,
            SpeciesGroup::Lumberjack => &self.lumberjack,
            SpeciesGroup::Bear => &self.bear,
        }
    }

    fn get_mut(&mut self, group: SpeciesGroup) -> &mut Vec<OrganismId> {
        match group {
            SpeciesGroup::Tree => &mut self.tree,
            SpeciesGroup::Lumberjack => &mut self.lumberjack,
            SpeciesGroup::Bear => &mut self.bear,
        }
    }

    fn push(&mut self, group: SpeciesGroup, id: OrganismId) {
        self.get_mut(group).push(id);
    }

    fn remove(&mut self, group: SpeciesGroup, id: OrganismId) -> bool {
        let list = self.get_mut(group);
        match list.iter().position(|member| *member == id) {
            Some(slot) => {
                list.remove(slot);
                true
            }
            None => false,
        }
    }

    fn clear(&mut self) {
        self.tree.clear();
        self.lumberjack.clear();
        self.bear.clear();
    }

    pub fn len(&self, group: SpeciesGroup) -> usize {
        self.get(group).len()
    }

    pub fn total(&self) -> usize {
        self.tree.len() + self.lumberjack.len() + self.bear.len()
    }

    pub fn counts(&self) -> PopulationCounts {
        PopulationCounts {
            tree: self.tree.len(),
            lumberjack: self.lumberjack.len(),
            bear: self.bear.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationCounts {
    pub tree: usize,
    pub lumberjack: usize,
    pub bear: usize,
}

/// Population-control outcome at a year boundary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearReport {
    pub year: u64,
    pub lumber: u64,
    pub quota: u64,
    pub mauls: u64,
    pub hired: u64,
    pub fired: u64,
    pub bears_added: u64,
    pub bears_removed: u64,
}

/// What happened during one tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickSummary {
    pub time: u64,
    pub births: u64,
    pub felled: u64,
    pub lumber: u64,
    pub mauled: u64,
    pub populations: PopulationCounts,
    pub year_end: Option<YearReport>,
}

/// Everything a renderer needs for one frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcosystemSnapshot {
    pub time: u64,
    pub year: u64,
    pub stats: EcosystemStats,
    pub populations: PopulationCounts,
    pub grid: GridSnapshot,
}

#[derive(Debug, Default, Clone, Copy)]
struct Harvest {
    felled: u64,
    lumber: u64,
    bear_present: bool,
}

impl Harvest {
    fn triggered(&self) -> bool {
        self.felled > 0 || self.bear_present
    }
}

pub struct Ecosystem<R: RandomSource = SeededRandom> {
    config: ForestConfig,
    grid: Grid,
    population: PopulationIndex,
    stats: EcosystemStats,
    rng: R,
    time: u64,
}

impl Ecosystem<SeededRandom> {
    /// Build with a ChaCha source seeded from the config, or entropy
    pub fn from_config(config: ForestConfig) -> Result<Self> {
        let rng = SeededRandom::from_seed_option(config.seed);
        Self::new(config, rng)
    }
}

impl<R: RandomSource> Ecosystem<R> {
    pub fn new(config: ForestConfig, rng: R) -> Result<Self> {
        config.validate()?;
        SpeciesCatalog::validate()?;

        let grid = Grid::new(config.grid_rows, config.grid_cols);
        Ok(Self {
            config,
            grid,
            population: PopulationIndex::default(),
            stats: EcosystemStats::default(),
            rng,
            time: 0,
        })
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn population(&self, group: SpeciesGroup) -> &[OrganismId] {
        self.population.get(group)
    }

    pub fn population_index(&self) -> &PopulationIndex {
        &self.population
    }

    pub fn population_counts(&self) -> PopulationCounts {
        self.population.counts()
    }

    pub fn stats(&self) -> &EcosystemStats {
        &self.stats
    }

    /// Ticks elapsed
    pub fn time(&self) -> u64 {
        self.time
    }

    /// Seed the empty grid. Counts are `round(cells * ratio)` per species,
    /// the rest stays empty, and the combined list is shuffled before being
    /// laid out row-major.
    #[instrument(skip(self), fields(rows = self.grid.rows(), cols = self.grid.cols()))]
    pub fn populate_forest(&mut self) -> Result<()> {
        if !self.grid.is_empty() {
            return Err(Error::InvalidState(format!(
                "cannot populate a grid that already holds {} organisms",
                self.grid.len()
            )));
        }

        let size = self.grid.size();
        let count = |ratio: f64| (size as f64 * ratio).round() as usize;
        let jacks = count(self.config.lumberjack_ratio);
        let trees = count(self.config.tree_ratio);
        let bears = count(self.config.bear_ratio);
        let empty = size.saturating_sub(jacks + trees + bears);

        let mut layout: Vec<Option<Stage>> = Vec::with_capacity(jacks + trees + bears + empty);
        layout.extend(std::iter::repeat(Some(Stage::Lumberjack)).take(jacks));
        layout.extend(std::iter::repeat(Some(Stage::Tree)).take(trees));
        layout.extend(std::iter::repeat(Some(Stage::Bear)).take(bears));
        layout.extend(std::iter::repeat(None).take(empty));
        self.shuffle(&mut layout);

        if layout.len() > size {
            warn!(
                requested = layout.len(),
                cells = size,
                "Seed population exceeds grid, dropping the overflow"
            );
            layout.truncate(size);
        }

        for (index, slot) in layout.into_iter().enumerate() {
            if let Some(stage) = slot {
                let pos = self.grid.index_to_pos(index);
                self.spawn_life(stage, pos);
            }
        }

        let counts = self.population.counts();
        info!(
            trees = counts.tree,
            lumberjacks = counts.lumberjack,
            bears = counts.bear,
            empty = size - self.grid.len(),
            "Forest populated"
        );
        Ok(())
    }

    /// Fisher-Yates shuffle
    fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.rng.random_int(0, i + 1);
            items.swap(i, j);
        }
    }

    /// Create an organism of `stage` at `pos` and index it. `None` when the
    /// position is off the grid.
    pub fn spawn_life(&mut self, stage: Stage, pos: Position) -> Option<OrganismId> {
        let organism = Organism::new(stage, pos);
        let id = organism.id;
        let species = organism.species();

        if self.grid.spawn(organism, pos) {
            self.population.push(species, id);
            Some(id)
        } else {
            None
        }
    }

    /// Spawn at a uniformly random cell, occupied or not
    pub fn spawn_random(&mut self, stage: Stage) -> Option<OrganismId> {
        let pos = self.grid.random_position(&mut self.rng);
        self.spawn_life(stage, pos)
    }

    /// Remove an organism from both the grid and the population index
    pub fn remove_life(&mut self, id: OrganismId) -> Option<Organism> {
        let pos = self.grid.position_of(id)?;
        let organism = self.grid.remove(pos, id)?;

        if !self.population.remove(organism.species(), id) {
            warn!(
                organism_id = %id,
                species = %organism.species(),
                "Removed organism was missing from the population index"
            );
        }
        Some(organism)
    }

    /// Remove a uniformly chosen member of a species group
    pub fn remove_random(&mut self, group: SpeciesGroup) -> Option<Organism> {
        let members = self.population.get(group);
        if members.is_empty() {
            return None;
        }
        let id = members[self.rng.random_int(0, members.len())];
        self.remove_life(id)
    }

    /// Advance the ecosystem by one tick
    #[instrument(level = "debug", skip(self), fields(time = self.time + 1))]
    pub fn tick(&mut self) -> TickSummary {
        self.time += 1;

        let births = self.grow_trees();
        let harvest = self.move_lumberjacks();
        let mauled = self.move_bears();

        self.calibrate_population();
        self.ensure_survivors();

        let year_end = if self.time % TICKS_PER_YEAR == 0 {
            Some(self.track_year())
        } else {
            None
        };

        if cfg!(debug_assertions) {
            let consistency = self.check_consistency();
            assert!(
                consistency.is_ok(),
                "population index diverged from grid: {:?}",
                consistency.err()
            );
        }

        TickSummary {
            time: self.time,
            births,
            felled: harvest.felled,
            lumber: harvest.lumber,
            mauled,
            populations: self.population.counts(),
            year_end,
        }
    }

    /// Run several ticks back to back
    pub fn run(&mut self, ticks: u64) -> Vec<TickSummary> {
        let mut summaries = Vec::new();
        for _ in 0..ticks {
            let summary = self.tick();
            if summary.time % (TICKS_PER_YEAR * 10) == 0 {
                info!(
                    time = summary.time,
                    trees = summary.populations.tree,
                    lumberjacks = summary.populations.lumberjack,
                    bears = summary.populations.bear,
                    "Decade complete"
                );
            }
            summaries.push(summary);
        }
        summaries
    }

    fn skip_missing(&self, id: OrganismId, group: SpeciesGroup) {
        warn!(
            organism_id = %id,
            species = %group,
            time = self.time,
            "Scheduled organism no longer on the grid, skipping"
        );
    }

    /// Phase 1: age trees and let them seed open neighbors
    fn grow_trees(&mut self) -> u64 {
        let mut births = 0;
        let scheduled = self.population.get(SpeciesGroup::Tree).to_vec();

        for id in scheduled {
            let Some(organism) = self.grid.get_mut(id) else {
                self.skip_missing(id, SpeciesGroup::Tree);
                continue;
            };

            if let Some(stage) = organism.advance_one_tick() {
                trace!(organism_id = %id, %stage, "Matured");
            }
            let params = organism.params();
            let pos = organism.position();

            let Some(child) = params.spawn.child else {
                continue;
            };
            if params.spawn.chance <= 0.0 {
                continue;
            }

            for open in self.grid.open_neighbors8(pos) {
                if self.rng.uniform() <= params.spawn.chance {
                    if self.spawn_life(child, open).is_some() {
                        births += 1;
                        debug!(parent_id = %id, stage = %child, position = %open, "Seeded");
                    }
                    break;
                }
            }
        }

        births
    }

    /// Move one step to a uniformly random Moore neighbor. `None` when the
    /// organism has nowhere to go or the move did not happen.
    fn wander(&mut self, id: OrganismId) -> Option<Position> {
        let from = self.grid.position_of(id)?;
        let neighbors = self.grid.neighbors8(from);
        if neighbors.is_empty() {
            return None;
        }

        let to = neighbors[self.rng.random_int(0, neighbors.len())];
        let moved = self.grid.try_move(from, id, to);
        trace!(organism_id = %id, %from, %to, moved, "Wander");
        moved.then_some(to)
    }

    /// Phase 2: lumberjacks wander until they fell something or meet a bear
    fn move_lumberjacks(&mut self) -> Harvest {
        let mut total = Harvest::default();
        let scheduled = self.population.get(SpeciesGroup::Lumberjack).to_vec();

        for id in scheduled {
            let Some(organism) = self.grid.get_mut(id) else {
                self.skip_missing(id, SpeciesGroup::Lumberjack);
                continue;
            };
            organism.advance_one_tick();
            let movement = organism.params().movement;

            for _ in 0..movement {
                let Some(landing) = self.wander(id) else {
                    break;
                };

                let harvest = self.lumberjack_event(id, landing);
                total.felled += harvest.felled;
                total.lumber += harvest.lumber;
                if harvest.triggered() {
                    break;
                }
            }
        }

        total
    }

    /// Fell every grown tree in the landing cell and note any bear there
    fn lumberjack_event(&mut self, id: OrganismId, pos: Position) -> Harvest {
        let cell = self.grid.cell(pos);
        let bear_present = cell
            .iter()
            .any(|other| other.id != id && other.species() == SpeciesGroup::Bear);
        let timber: Vec<OrganismId> = cell
            .iter()
            .filter(|other| other.id != id && other.stage().is_harvestable())
            .map(|other| other.id)
            .collect();

        let mut harvest = Harvest {
            bear_present,
            ..Default::default()
        };

        for tree_id in timber {
            if let Some(tree) = self.remove_life(tree_id) {
                let lumber = tree.params().score.lumber as u64;
                self.stats.lumber.record(lumber);
                harvest.felled += 1;
                harvest.lumber += lumber;
                debug!(
                    lumberjack_id = %id,
                    stage = %tree.stage(),
                    lumber,
                    position = %pos,
                    "Felled"
                );
            }
        }

        if bear_present {
            debug!(lumberjack_id = %id, position = %pos, "Lumberjack ran into a bear");
        }

        harvest
    }

    /// Phase 3: bears wander until they maul someone
    fn move_bears(&mut self) -> u64 {
        let mut mauled = 0;
        let scheduled = self.population.get(SpeciesGroup::Bear).to_vec();

        for id in scheduled {
            let Some(organism) = self.grid.get_mut(id) else {
                self.skip_missing(id, SpeciesGroup::Bear);
                continue;
            };
            organism.advance_one_tick();
            let movement = organism.params().movement;

            for _ in 0..movement {
                let Some(landing) = self.wander(id) else {
                    break;
                };

                let victims = self.bear_event(id, landing);
                mauled += victims;
                if victims > 0 {
                    break;
                }
            }
        }

        mauled
    }

    /// Maul every lumberjack in the landing cell
    fn bear_event(&mut self, id: OrganismId, pos: Position) -> u64 {
        let victims: Vec<OrganismId> = self
            .grid
            .cell(pos)
            .iter()
            .filter(|other| other.id != id && other.species() == SpeciesGroup::Lumberjack)
            .map(|other| other.id)
            .collect();

        let mut mauled = 0;
        for victim in victims {
            if self.remove_life(victim).is_some() {
                self.stats.maul.record(1);
                mauled += 1;
                debug!(bear_id = %id, lumberjack_id = %victim, position = %pos, "Mauled");
            }
        }
        mauled
    }

    /// Phase 4: rebuild the population index from a row-major grid scan
    pub fn calibrate_population(&mut self) {
        self.population.clear();
        for organism in self.grid.iter() {
            self.population.push(organism.species(), organism.id);
        }
    }

    fn ensure_species(&mut self, group: SpeciesGroup, stage: Stage) -> bool {
        if !self.population.get(group).is_empty() {
            return false;
        }

        match self.spawn_random(stage) {
            Some(id) => {
                info!(
                    organism_id = %id,
                    species = %group,
                    time = self.time,
                    "Population extinct, recruited a replacement"
                );
                true
            }
            None => false,
        }
    }

    /// Phase 5: never let lumberjacks or bears die out
    pub fn ensure_survivors(&mut self) {
        self.ensure_species(SpeciesGroup::Lumberjack, Stage::Lumberjack);
        self.ensure_species(SpeciesGroup::Bear, Stage::Bear);
    }

    /// Phase 6: yearly population control, then reset the yearly counters
    pub fn track_year(&mut self) -> YearReport {
        let lumberjacks = self.population.len(SpeciesGroup::Lumberjack) as u64;
        let quota = lumberjacks * LUMBER_QUOTA_PER_JACK;
        let mut report = YearReport {
            year: self.time / TICKS_PER_YEAR,
            lumber: self.stats.lumber.year,
            quota,
            mauls: self.stats.maul.year,
            ..Default::default()
        };

        if report.lumber >= quota {
            let hires = if lumberjacks > 0 { report.lumber / quota } else { 1 };
            for _ in 0..hires {
                if self.spawn_random(Stage::Lumberjack).is_some() {
                    report.hired += 1;
                }
            }
        } else {
            if self.remove_random(SpeciesGroup::Lumberjack).is_some() {
                report.fired += 1;
            }
            if self.ensure_species(SpeciesGroup::Lumberjack, Stage::Lumberjack) {
                report.hired += 1;
            }
        }

        if report.mauls > 0 {
            if self.remove_random(SpeciesGroup::Bear).is_some() {
                report.bears_removed += 1;
            }
        } else if self.spawn_random(Stage::Bear).is_some() {
            report.bears_added += 1;
        }

        self.stats.reset_year();

        let counts = self.population.counts();
        info!(
            year = report.year,
            lumber = report.lumber,
            quota = report.quota,
            mauls = report.mauls,
            hired = report.hired,
            fired = report.fired,
            bears_added = report.bears_added,
            bears_removed = report.bears_removed,
            trees = counts.tree,
            lumberjacks = counts.lumberjack,
            bears = counts.bear,
            "Year complete"
        );

        report
    }

    /// Verify every indexed organism sits on the grid under the right
    /// species, and every organism on the grid is indexed exactly once.
    pub fn check_consistency(&self) -> Result<()> {
        self.grid.check_consistency()?;

        let mut indexed = HashSet::with_capacity(self.population.total());
        for group in SpeciesGroup::all() {
            for id in self.population.get(group) {
                let Some(organism) = self.grid.get(*id) else {
                    return Err(Error::InconsistentIndex(format!(
                        "{group} {id} is indexed but not on the grid"
                    )));
                };
                if organism.species() != group {
                    return Err(Error::InconsistentIndex(format!(
                        "{} {id} is indexed as {group}",
                        organism.species()
                    )));
                }
                if !indexed.insert(*id) {
                    return Err(Error::InconsistentIndex(format!(
                        "{id} is indexed more than once"
                    )));
                }
            }
        }

        if indexed.len() != self.grid.len() {
            return Err(Error::InconsistentIndex(format!(
                "{} organisms indexed but {} on the grid",
                indexed.len(),
                self.grid.len()
            )));
        }

        Ok(())
    }

    pub fn snapshot(&self) -> EcosystemSnapshot {
        EcosystemSnapshot {
            time: self.time,
            year: self.time / TICKS_PER_YEAR,
            stats: self.stats,
            populations: self.population.counts(),
            grid: self.grid.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy)]
    enum Pick {
        First,
        Last,
    }

    /// Returns the same uniform draw every time and always picks one end
    /// of an integer range.
    struct ScriptedRandom {
        uniform: f64,
        pick: Pick,
    }

    impl RandomSource for ScriptedRandom {
        fn uniform(&mut self) -> f64 {
            self.uniform
        }

        fn random_int(&mut self, min: usize, max: usize) -> usize {
            match self.pick {
                Pick::First => min,
                Pick::Last => max.saturating_sub(1).max(min),
            }
        }
    }

    fn scripted(rows: i32, cols: i32, uniform: f64, pick: Pick) -> Ecosystem<ScriptedRandom> {
        let config = ForestConfig {
            grid_rows: rows,
            grid_cols: cols,
            ..Default::default()
        };
        Ecosystem::new(config, ScriptedRandom { uniform, pick }).unwrap()
    }

    fn stages_at<R: RandomSource>(eco: &Ecosystem<R>, row: i32, col: i32) -> Vec<Stage> {
        eco.grid()
            .cell(Position::new(row, col))
            .iter()
            .map(|org| org.stage())
            .collect()
    }

    #[test]
    fn test_ecosystem_creation_validates_config() {
        let config = ForestConfig {
            grid_rows: 0,
            ..Default::default()
        };
        assert!(Ecosystem::new(config, SeededRandom::new(1)).is_err());

        let eco = Ecosystem::from_config(ForestConfig {
            seed: Some(9),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(eco.time(), 0);
        assert!(eco.grid().is_empty());
    }

    #[test]
    fn test_oversized_grid_is_rejected_before_allocation() {
        let config = ForestConfig {
            grid_rows: 50_000,
            grid_cols: 50_000,
            ..Default::default()
        };
        let err = Ecosystem::new(config, SeededRandom::new(1)).err().unwrap();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_run_returns_one_summary_per_tick() {
        let mut eco = Ecosystem::new(
            ForestConfig {
                grid_rows: 4,
                grid_cols: 4,
                ..Default::default()
            },
            SeededRandom::new(11),
        )
        .unwrap();
        eco.populate_forest().unwrap();

        assert!(eco.run(0).is_empty());
        let summaries = eco.run(TICKS_PER_YEAR + 1);
        let times: Vec<u64> = summaries.iter().map(|s| s.time).collect();
        assert_eq!(times, (1..=TICKS_PER_YEAR + 1).collect::<Vec<_>>());
        assert!(summaries[TICKS_PER_YEAR as usize - 1].year_end.is_some());
        eco.check_consistency().unwrap();
    }

    #[test]
    fn test_populate_forest_exact_counts() {
        let config = ForestConfig {
            grid_rows: 10,
            grid_cols: 10,
            lumberjack_ratio: 0.1,
            tree_ratio: 0.5,
            bear_ratio: 0.05,
            ..Default::default()
        };
        let mut eco = Ecosystem::new(config, SeededRandom::new(11)).unwrap();
        eco.populate_forest().unwrap();

        let counts = eco.population_counts();
        assert_eq!(counts.lumberjack, 10);
        assert_eq!(counts.tree, 50);
        assert_eq!(counts.bear, 5);
        assert_eq!(eco.grid().size() - eco.grid().len(), 35);

        // One organism per occupied cell after seeding
        assert!(eco.grid().cells().all(|(_, cell)| cell.len() <= 1));
        eco.check_consistency().unwrap();
    }

    #[test]
    fn test_populate_twice_is_rejected() {
        let mut eco = Ecosystem::new(ForestConfig::default(), SeededRandom::new(2)).unwrap();
        eco.populate_forest().unwrap();
        assert!(matches!(eco.populate_forest(), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_populate_oversubscribed_fills_grid() {
        let config = ForestConfig {
            grid_rows: 2,
            grid_cols: 2,
            tree_ratio: 0.75,
            lumberjack_ratio: 0.5,
            bear_ratio: 0.25,
            ..Default::default()
        };
        let mut eco = Ecosystem::new(config, SeededRandom::new(5)).unwrap();
        eco.populate_forest().unwrap();

        assert_eq!(eco.grid().len(), 4);
        assert!(eco.grid().cells().all(|(_, cell)| cell.len() == 1));
        eco.check_consistency().unwrap();
    }

    #[test]
    fn test_tree_seeds_single_open_neighbor_at_threshold() {
        let mut eco = scripted(2, 2, 0.1, Pick::First);
        eco.spawn_life(Stage::Tree, Position::new(0, 0)).unwrap();
        eco.spawn_life(Stage::Sapling, Position::new(0, 1)).unwrap();
        eco.spawn_life(Stage::Sapling, Position::new(1, 0)).unwrap();

        let summary = eco.tick();

        assert_eq!(summary.births, 1);
        assert_eq!(stages_at(&eco, 1, 1), vec![Stage::Sapling]);
        assert_eq!(eco.population(SpeciesGroup::Tree).len(), 4);
    }

    #[test]
    fn test_tree_does_not_seed_above_threshold() {
        let mut eco = scripted(2, 2, 0.1 + 1e-9, Pick::First);
        eco.spawn_life(Stage::Tree, Position::new(0, 0)).unwrap();
        eco.spawn_life(Stage::Sapling, Position::new(0, 1)).unwrap();
        eco.spawn_life(Stage::Sapling, Position::new(1, 0)).unwrap();

        let summary = eco.tick();

        assert_eq!(summary.births, 0);
        assert!(stages_at(&eco, 1, 1).is_empty());
        assert_eq!(eco.population(SpeciesGroup::Tree).len(), 3);
    }

    #[test]
    fn test_at_most_one_offspring_per_parent() {
        let mut eco = scripted(3, 3, 0.0, Pick::First);
        eco.spawn_life(Stage::Elder, Position::new(1, 1)).unwrap();

        let summary = eco.tick();

        assert_eq!(summary.births, 1);
        // First open neighbor in row-major order
        assert_eq!(stages_at(&eco, 0, 0)[0], Stage::Sapling);
    }

    #[test]
    fn test_lumberjack_fells_grown_trees_and_stops() {
        let mut eco = scripted(1, 4, 0.99, Pick::First);
        let jack = eco.spawn_life(Stage::Lumberjack, Position::new(0, 1)).unwrap();
        eco.spawn_life(Stage::Tree, Position::new(0, 0)).unwrap();
        eco.spawn_life(Stage::Elder, Position::new(0, 0)).unwrap();
        eco.spawn_life(Stage::Sapling, Position::new(0, 0)).unwrap();

        let summary = eco.tick();

        assert_eq!(summary.felled, 2);
        assert_eq!(summary.lumber, 3);
        assert_eq!(eco.stats().lumber, Tally { year: 3, total: 3 });
        // Stopped where it felled instead of walking back east
        assert_eq!(eco.grid().position_of(jack), Some(Position::new(0, 0)));
        assert!(stages_at(&eco, 0, 0).contains(&Stage::Sapling));
        assert_eq!(eco.population(SpeciesGroup::Tree).len(), 1);
    }

    #[test]
    fn test_lumberjack_stops_at_bear_and_gets_mauled() {
        let mut eco = scripted(1, 3, 0.99, Pick::First);
        let bear = eco.spawn_life(Stage::Bear, Position::new(0, 0)).unwrap();
        eco.spawn_life(Stage::Lumberjack, Position::new(0, 1)).unwrap();
        eco.spawn_life(Stage::Lumberjack, Position::new(0, 1)).unwrap();

        let summary = eco.tick();

        // Both lumberjacks stopped in the bear's cell; the bear stepped out
        // and back in, mauling them together.
        assert_eq!(summary.mauled, 2);
        assert_eq!(eco.stats().maul, Tally { year: 2, total: 2 });
        assert_eq!(eco.grid().position_of(bear), Some(Position::new(0, 0)));
        // Extinction guard recruited one replacement
        assert_eq!(eco.population(SpeciesGroup::Lumberjack).len(), 1);
    }

    #[test]
    fn test_extinction_guard_recruits() {
        let mut eco = scripted(3, 3, 0.99, Pick::Last);
        eco.ensure_survivors();

        assert_eq!(eco.population(SpeciesGroup::Lumberjack).len(), 1);
        assert_eq!(eco.population(SpeciesGroup::Bear).len(), 1);
        assert_eq!(
            eco.grid().position_of(eco.population(SpeciesGroup::Bear)[0]),
            Some(Position::new(2, 2))
        );

        eco.ensure_survivors();
        assert_eq!(eco.grid().len(), 2);
    }

    #[test]
    fn test_quiet_year_fires_lumberjack_and_adds_bear() {
        let mut eco = scripted(1, 40, 0.99, Pick::First);
        eco.spawn_life(Stage::Lumberjack, Position::new(0, 38)).unwrap();
        eco.spawn_life(Stage::Lumberjack, Position::new(0, 39)).unwrap();
        eco.spawn_life(Stage::Bear, Position::new(0, 0)).unwrap();

        let summaries = eco.run(TICKS_PER_YEAR);

        assert!(summaries[..11].iter().all(|s| s.year_end.is_none()));
        let report = summaries[11].year_end.clone().unwrap();
        assert_eq!(report.lumber, 0);
        assert_eq!(report.mauls, 0);
        assert_eq!(report.quota, 4);
        assert_eq!(report.fired, 1);
        assert_eq!(report.bears_added, 1);
        assert_eq!(report.hired, 0);

        assert_eq!(eco.population(SpeciesGroup::Lumberjack).len(), 1);
        assert_eq!(eco.population(SpeciesGroup::Bear).len(), 2);
        assert_eq!(eco.stats().lumber.year, 0);
    }

    #[test]
    fn test_productive_year_hires() {
        let mut eco = scripted(5, 5, 0.99, Pick::First);
        eco.spawn_life(Stage::Lumberjack, Position::new(2, 2)).unwrap();
        eco.spawn_life(Stage::Bear, Position::new(4, 4)).unwrap();
        eco.stats.lumber.record(5);
        eco.stats.maul.record(1);

        let report = eco.track_year();

        assert_eq!(report.quota, 2);
        assert_eq!(report.hired, 2);
        assert_eq!(report.bears_removed, 1);
        assert_eq!(eco.population(SpeciesGroup::Lumberjack).len(), 3);
        assert!(eco.population(SpeciesGroup::Bear).is_empty());
        assert_eq!(eco.stats().lumber, Tally { year: 0, total: 5 });
        assert_eq!(eco.stats().maul, Tally { year: 0, total: 1 });
    }

    #[test]
    fn test_year_without_lumberjacks_hires_one() {
        let mut eco = scripted(5, 5, 0.99, Pick::First);
        let report = eco.track_year();

        assert_eq!(report.quota, 0);
        assert_eq!(report.hired, 1);
        assert_eq!(eco.population(SpeciesGroup::Lumberjack).len(), 1);
    }

    #[test]
    fn test_firing_last_lumberjack_rehires() {
        let mut eco = scripted(5, 5, 0.99, Pick::First);
        let only = eco.spawn_life(Stage::Lumberjack, Position::new(3, 3)).unwrap();

        let report = eco.track_year();

        assert_eq!(report.fired, 1);
        assert_eq!(report.hired, 1);
        assert!(!eco.grid().contains(only));
        assert_eq!(eco.population(SpeciesGroup::Lumberjack).len(), 1);
    }

    #[test]
    fn test_remove_random_on_empty_group() {
        let mut eco = scripted(2, 2, 0.5, Pick::First);
        assert!(eco.remove_random(SpeciesGroup::Bear).is_none());
    }

    #[test]
    fn test_remove_life_updates_grid_and_index() {
        let mut eco = scripted(3, 3, 0.5, Pick::First);
        let tree = eco.spawn_life(Stage::Tree, Position::new(1, 2)).unwrap();

        let removed = eco.remove_life(tree).unwrap();
        assert_eq!(removed.position(), Position::new(1, 2));
        assert!(eco.population(SpeciesGroup::Tree).is_empty());
        assert!(eco.grid().is_empty());
        assert!(eco.remove_life(tree).is_none());
    }

    #[test]
    fn test_spawn_off_grid_is_ignored() {
        let mut eco = scripted(3, 3, 0.5, Pick::First);
        assert!(eco.spawn_life(Stage::Bear, Position::new(-1, 0)).is_none());
        assert_eq!(eco.population_index().total(), 0);
    }

    #[test]
    fn test_calibration_is_idempotent() {
        let mut eco = Ecosystem::new(ForestConfig::default(), SeededRandom::new(77)).unwrap();
        eco.populate_forest().unwrap();
        eco.run(30);

        eco.calibrate_population();
        let first = eco.population_index().clone();
        eco.calibrate_population();
        assert_eq!(&first, eco.population_index());
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let mut eco = Ecosystem::new(ForestConfig::default(), SeededRandom::new(3)).unwrap();
        eco.populate_forest().unwrap();
        eco.run(13);

        let snapshot = eco.snapshot();
        assert_eq!(snapshot.time, 13);
        assert_eq!(snapshot.year, 1);
        assert_eq!(snapshot.grid.occupants.len(), eco.grid().len());
        assert_eq!(snapshot.populations, eco.population_counts());
    }
}
