//! Organism state and lifecycle.

use forest_core::{OrganismId, Position, Result, SpeciesCatalog, SpeciesGroup, Stage, StageParameters};
use serde::{Deserialize, Serialize};

/// A living tree, lumberjack or bear
#[derive(Debug, Clone, PartialEq)]
pub struct Organism {
    pub id: OrganismId,
    stage: Stage,
    age: u64,
    radius: f32,
    position: Position,
}

impl Organism {
    /// Create an organism at the start age and radius of its stage
    pub fn new(stage: Stage, position: Position) -> Self {
        let params = stage.params();
        Self {
            id: OrganismId::new(),
            stage,
            age: params.start_age,
            radius: params.radius.start,
            position,
        }
    }

    /// Create an organism from a stage name
    pub fn from_stage_name(name: &str, position: Position) -> Result<Self> {
        let params = SpeciesCatalog::lookup(name)?;
        Ok(Self::new(params.stage, position))
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn params(&self) -> &'static StageParameters {
        self.stage.params()
    }

    pub fn species(&self) -> SpeciesGroup {
        self.params().species
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Only the grid moves organisms between cells.
    pub(crate) fn relocate(&mut self, position: Position) {
        self.position = position;
    }

    /// Age by one tick, grow, and mature into the next stage when the
    /// current stage's maturity age is reached. Age keeps accumulating
    /// across stages. Returns the new stage on a transition.
    pub fn advance_one_tick(&mut self) -> Option<Stage> {
        let params = self.params();
        self.age += 1;

        if params.radius.growth > 0.0 {
            self.radius = (self.radius + params.radius.growth).min(params.radius.end);
        }

        if params.maturity.age > 0 && self.age == params.maturity.age {
            if let Some(next) = params.maturity.next {
                self.stage = next;
                return Some(next);
            }
        }

        None
    }
}

/// Read-only view handed to renderers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganismView {
    pub id: OrganismId,
    pub stage: Stage,
    pub species: SpeciesGroup,
    pub age: u64,
    pub position: Position,
    pub radius: f32,
    pub color: String,
}

impl From<&Organism> for OrganismView {
    fn from(org: &Organism) -> Self {
        Self {
            id: org.id,
            stage: org.stage,
            species: org.species(),
            age: org.age,
            position: org.position,
            radius: org.radius,
            color: org.params().color.to_string(),
        }
    }
}
