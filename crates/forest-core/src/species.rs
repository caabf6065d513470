//! Species and lifecycle-stage definitions.
//!
//! Every stage of every species group is described by one immutable
//! [`StageParameters`] record in a static table. Organisms carry only their
//! current [`Stage`] and read everything else from the table, so maturing
//! into the next stage is a lookup plus a field update.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Broad category used for population indexing and interaction rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeciesGroup {
    Tree,
    Lumberjack,
    Bear,
}

impl SpeciesGroup {
    pub fn all() -> [SpeciesGroup; 3] {
        [SpeciesGroup::Tree, SpeciesGroup::Lumberjack, SpeciesGroup::Bear]
    }

    pub fn name(&self) -> &'static str {
        match self {
            SpeciesGroup::Tree => "tree",
            SpeciesGroup::Lumberjack => "lumberjack",
            SpeciesGroup::Bear => "bear",
        }
    }
}

impl fmt::Display for SpeciesGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One lifecycle phase of a species group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Sapling,
    Tree,
    Elder,
    Lumberjack,
    Bear,
}

impl Stage {
    pub fn all() -> [Stage; 5] {
        [
            Stage::Sapling,
            Stage::Tree,
            Stage::Elder,
            Stage::Lumberjack,
            Stage::Bear,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Sapling => "sapling",
            Stage::Tree => "tree",
            Stage::Elder => "elder",
            Stage::Lumberjack => "lumberjack",
            Stage::Bear => "bear",
        }
    }

    pub fn params(&self) -> &'static StageParameters {
        SpeciesCatalog::get(*self)
    }

    pub fn species(&self) -> SpeciesGroup {
        self.params().species
    }

    /// Whether a lumberjack landing on this stage fells it
    pub fn is_harvestable(&self) -> bool {
        matches!(self, Stage::Tree | Stage::Elder)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        Stage::all()
            .into_iter()
            .find(|stage| stage.name() == name)
            .ok_or_else(|| Error::UnknownStage(name.to_string()))
    }
}

/// Age at which a stage hands over to the next one. An age of 0 marks a
/// terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Maturity {
    pub age: u64,
    pub previous: Option<Stage>,
    pub next: Option<Stage>,
}

impl Maturity {
    pub fn is_terminal(&self) -> bool {
        self.age == 0 || self.next.is_none()
    }
}

/// Visual radius at stage start, its cap, and growth per tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadiusRange {
    pub start: f32,
    pub end: f32,
    pub growth: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spawn {
    /// Per-tick Bernoulli probability of producing one offspring
    pub chance: f64,
    pub child: Option<Stage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    /// Lumber credited when this stage is felled
    pub lumber: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

/// Immutable parameters of one stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageParameters {
    pub stage: Stage,
    pub maturity: Maturity,
    pub radius: RadiusRange,
    pub spawn: Spawn,
    pub species: SpeciesGroup,
    pub score: Score,
    pub color: Color,
    /// Moore steps attempted per tick
    pub movement: u32,
    pub start_age: u64,
}

// Indexed by `Stage as usize`.
static CATALOG: [StageParameters; 5] = [
    StageParameters {
        stage: Stage::Sapling,
        maturity: Maturity {
            age: 12,
            previous: None,
            next: Some(Stage::Tree),
        },
        radius: RadiusRange {
            start: 2.0,
            end: 11.0,
            growth: 0.75,
        },
        spawn: Spawn {
            chance: 0.0,
            child: None,
        },
        species: SpeciesGroup::Tree,
        score: Score { lumber: 0 },
        color: Color {
            r: 200,
            g: 250,
            b: 28,
            a: 0.6,
        },
        movement: 0,
        start_age: 0,
    },
    StageParameters {
        stage: Stage::Tree,
        maturity: Maturity {
            age: 120,
            previous: Some(Stage::Sapling),
            next: Some(Stage::Elder),
        },
        radius: RadiusRange {
            start: 11.0,
            end: 11.0,
            growth: 0.0,
        },
        spawn: Spawn {
            chance: 0.1,
            child: Some(Stage::Sapling),
        },
        species: SpeciesGroup::Tree,
        score: Score { lumber: 1 },
        color: Color {
            r: 140,
            g: 230,
            b: 40,
            a: 0.6,
        },
        movement: 0,
        start_age: 12,
    },
    StageParameters {
        stage: Stage::Elder,
        maturity: Maturity {
            age: 0,
            previous: Some(Stage::Tree),
            next: None,
        },
        radius: RadiusRange {
            start: 11.0,
            end: 11.0,
            growth: 0.0,
        },
        spawn: Spawn {
            chance: 0.2,
            child: Some(Stage::Sapling),
        },
        species: SpeciesGroup::Tree,
        score: Score { lumber: 2 },
        color: Color {
            r: 60,
            g: 180,
            b: 30,
            a: 0.6,
        },
        movement: 0,
        start_age: 120,
    },
    StageParameters {
        stage: Stage::Lumberjack,
        maturity: Maturity {
            age: 0,
            previous: None,
            next: None,
        },
        radius: RadiusRange {
            start: 6.0,
            end: 6.0,
            growth: 0.0,
        },
        spawn: Spawn {
            chance: 0.0,
            child: None,
        },
        species: SpeciesGroup::Lumberjack,
        score: Score { lumber: 0 },
        color: Color {
            r: 210,
            g: 45,
            b: 45,
            a: 0.5,
        },
        movement: 3,
        start_age: 20,
    },
    StageParameters {
        stage: Stage::Bear,
        maturity: Maturity {
            age: 0,
            previous: None,
            next: None,
        },
        radius: RadiusRange {
            start: 8.5,
            end: 8.5,
            growth: 0.0,
        },
        spawn: Spawn {
            chance: 0.0,
            child: None,
        },
        species: SpeciesGroup::Bear,
        score: Score { lumber: 0 },
        color: Color {
            r: 220,
            g: 180,
            b: 150,
            a: 0.8,
        },
        movement: 5,
        start_age: 5,
    },
];

/// Static lookup table of stage parameters
pub struct SpeciesCatalog;

impl SpeciesCatalog {
    pub fn get(stage: Stage) -> &'static StageParameters {
        &CATALOG[stage as usize]
    }

    /// Look up a stage by name
    pub fn lookup(name: &str) -> Result<&'static StageParameters> {
        name.parse::<Stage>().map(Self::get)
    }

    pub fn stages() -> &'static [StageParameters] {
        &CATALOG
    }

    /// Check that the table is internally consistent: every entry sits at
    /// its own index, and previous/next links point at each other.
    pub fn validate() -> Result<()> {
        for (index, params) in CATALOG.iter().enumerate() {
            if params.stage as usize != index {
                return Err(Error::Validation(format!(
                    "stage {} stored at slot {}",
                    params.stage, index
                )));
            }

            if let Some(next) = params.maturity.next {
                let next_params = Self::get(next);
                if next_params.maturity.previous != Some(params.stage) {
                    return Err(Error::Validation(format!(
                        "{} matures into {} but {} does not list it as previous",
                        params.stage, next, next
                    )));
                }
                if next_params.species != params.species {
                    return Err(Error::Validation(format!(
                        "{} matures into {} of a different species group",
                        params.stage, next
                    )));
                }
                if params.maturity.age == 0 {
                    return Err(Error::Validation(format!(
                        "{} names a next stage but has maturity age 0",
                        params.stage
                    )));
                }
            }

            if let Some(previous) = params.maturity.previous {
                if Self::get(previous).maturity.next != Some(params.stage) {
                    return Err(Error::Validation(format!(
                        "{} lists {} as previous but {} does not mature into it",
                        params.stage, previous, previous
                    )));
                }
            }

            if params.spawn.chance > 0.0 && params.spawn.child.is_none() {
                return Err(Error::Validation(format!(
                    "{} can spawn but has no child stage",
                    params.stage
                )));
            }

            if !(0.0..=1.0).contains(&params.spawn.chance) {
                return Err(Error::Validation(format!(
                    "{} spawn chance {} outside [0, 1]",
                    params.stage, params.spawn.chance
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_is_consistent() {
        SpeciesCatalog::validate().unwrap();
    }

    #[test]
    fn test_references_resolve() {
        for params in SpeciesCatalog::stages() {
            for linked in [params.maturity.next, params.maturity.previous, params.spawn.child]
                .into_iter()
                .flatten()
            {
                assert_eq!(SpeciesCatalog::lookup(linked.name()).unwrap().stage, linked);
            }
        }
    }

    #[test]
    fn test_lookup_unknown_stage() {
        let err = SpeciesCatalog::lookup("wolf").unwrap_err();
        assert!(matches!(err, Error::UnknownStage(name) if name == "wolf"));
    }

    #[test]
    fn test_sapling_parameters() {
        let sapling = SpeciesCatalog::lookup("sapling").unwrap();
        assert_eq!(sapling.maturity.age, 12);
        assert_eq!(sapling.maturity.next, Some(Stage::Tree));
        assert_eq!(sapling.spawn.child, None);
        assert_eq!(sapling.spawn.chance, 0.0);
        assert_eq!(sapling.movement, 0);
        assert_eq!(sapling.species, SpeciesGroup::Tree);
    }

    #[test]
    fn test_tree_parameters() {
        let tree = Stage::Tree.params();
        assert_eq!(tree.maturity.age, 120);
        assert_eq!(tree.spawn.child, Some(Stage::Sapling));
        assert_eq!(tree.spawn.chance, 0.1);
        assert_eq!(tree.score.lumber, 1);
        assert_eq!(tree.start_age, 12);
    }

    #[test]
    fn test_terminal_stages() {
        for stage in [Stage::Elder, Stage::Lumberjack, Stage::Bear] {
            assert!(stage.params().maturity.is_terminal(), "{stage} should be terminal");
        }
        assert!(!Stage::Sapling.params().maturity.is_terminal());
    }

    #[test]
    fn test_movement_allowances() {
        assert_eq!(Stage::Lumberjack.params().movement, 3);
        assert_eq!(Stage::Bear.params().movement, 5);
        assert_eq!(Stage::Elder.params().movement, 0);
    }

    #[test]
    fn test_only_grown_trees_are_harvestable() {
        assert!(Stage::Tree.is_harvestable());
        assert!(Stage::Elder.is_harvestable());
        assert!(!Stage::Sapling.is_harvestable());
        assert!(!Stage::Bear.is_harvestable());
    }

    #[test]
    fn test_color_display() {
        assert_eq!(Stage::Lumberjack.params().color.to_string(), "rgba(210, 45, 45, 0.5)");
    }
}
