//! 2D grid of cells, each holding an unordered bag of organisms.
//!
//! Co-occupancy is allowed: a bear and a lumberjack meeting in the same
//! cell is how encounters happen. The grid owns every organism and keeps an
//! id -> position locator in step with the bags, so an organism is in
//! exactly one bag and its stored position always names that bag.
//!
//! Out-of-bounds coordinates are never an error. Queries return empty or
//! `false`, mutations are no-ops reporting `false`/`None`. Callers that
//! need success check [`Grid::in_bounds`] first.

use crate::organism::{Organism, OrganismView};
use crate::rng::RandomSource;
use forest_core::{Direction, Error, OrganismId, Position, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::trace;

/// A fixed-size, non-wrapping grid
#[derive(Debug, Clone)]
pub struct Grid {
    rows: i32,
    cols: i32,
    cells: Vec<Vec<Organism>>,
    locations: HashMap<OrganismId, Position>,
}

impl Grid {
    /// Non-positive dimensions yield a grid with no cells.
    pub fn new(rows: i32, cols: i32) -> Self {
        let rows = rows.max(0);
        let cols = cols.max(0);
        let size = rows as usize * cols as usize;
        Self {
            rows,
            cols,
            cells: vec![Vec::new(); size],
            locations: HashMap::new(),
        }
    }

    pub fn rows(&self) -> i32 {
        self.rows
    }

    pub fn cols(&self) -> i32 {
        self.cols
    }

    /// Number of cells
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    /// Number of organisms on the grid
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.row >= 0 && pos.row < self.rows && pos.col >= 0 && pos.col < self.cols
    }

    fn pos_to_index(&self, pos: Position) -> Option<usize> {
        if self.in_bounds(pos) {
            Some((pos.row * self.cols + pos.col) as usize)
        } else {
            None
        }
    }

    /// Get position from index
    pub fn index_to_pos(&self, index: usize) -> Position {
        let row = (index as i32) / self.cols;
        let col = (index as i32) % self.cols;
        Position::new(row, col)
    }

    /// Occupants of a cell, empty when out of bounds
    pub fn cell(&self, pos: Position) -> &[Organism] {
        match self.pos_to_index(pos) {
            Some(index) => &self.cells[index],
            None => &[],
        }
    }

    /// True for an in-bounds cell with no occupants
    pub fn is_open(&self, pos: Position) -> bool {
        self.pos_to_index(pos)
            .map(|index| self.cells[index].is_empty())
            .unwrap_or(false)
    }

    pub fn contains(&self, id: OrganismId) -> bool {
        self.locations.contains_key(&id)
    }

    pub fn position_of(&self, id: OrganismId) -> Option<Position> {
        self.locations.get(&id).copied()
    }

    pub fn get(&self, id: OrganismId) -> Option<&Organism> {
        let pos = self.position_of(id)?;
        self.cell(pos).iter().find(|org| org.id == id)
    }

    pub fn get_mut(&mut self, id: OrganismId) -> Option<&mut Organism> {
        let pos = self.position_of(id)?;
        let index = self.pos_to_index(pos)?;
        self.cells[index].iter_mut().find(|org| org.id == id)
    }

    /// Place an organism in a cell. No uniqueness check: the cell may
    /// already hold other organisms. Returns `false` and drops the organism
    /// when the position is out of bounds.
    pub fn spawn(&mut self, mut organism: Organism, pos: Position) -> bool {
        let Some(index) = self.pos_to_index(pos) else {
            trace!(stage = %organism.stage(), %pos, "Spawn outside grid ignored");
            return false;
        };

        organism.relocate(pos);
        self.locations.insert(organism.id, pos);
        self.cells[index].push(organism);
        true
    }

    /// Remove an organism from the given cell by identity. No-op when the
    /// organism is not in that cell.
    pub fn remove(&mut self, pos: Position, id: OrganismId) -> Option<Organism> {
        let index = self.pos_to_index(pos)?;
        let slot = self.cells[index].iter().position(|org| org.id == id)?;
        let organism = self.cells[index].remove(slot);
        self.locations.remove(&id);
        Some(organism)
    }

    /// Move an organism from one cell to another. No-op when the target is
    /// out of bounds, equals the source, or the organism is not in the
    /// source cell. This is the only path that changes a stored position.
    pub fn try_move(&mut self, from: Position, id: OrganismId, to: Position) -> bool {
        if from == to {
            return false;
        }
        let Some(target) = self.pos_to_index(to) else {
            return false;
        };
        let Some(mut organism) = self.remove(from, id) else {
            return false;
        };

        organism.relocate(to);
        self.locations.insert(id, to);
        self.cells[target].push(organism);
        trace!(organism_id = %id, %from, %to, "Moved");
        true
    }

    /// In-bounds Moore neighbors in row-major order, excluding the center
    pub fn neighbors8(&self, pos: Position) -> Vec<Position> {
        if !self.in_bounds(pos) {
            return Vec::new();
        }

        Direction::all()
            .iter()
            .map(|dir| {
                let (drow, dcol) = dir.to_delta();
                pos.add(drow, dcol)
            })
            .filter(|neighbor| self.in_bounds(*neighbor))
            .collect()
    }

    /// Moore neighbors whose cell is currently empty
    pub fn open_neighbors8(&self, pos: Position) -> Vec<Position> {
        self.neighbors8(pos)
            .into_iter()
            .filter(|neighbor| self.is_open(*neighbor))
            .collect()
    }

    /// Uniform cell coordinate, not guaranteed unoccupied
    pub fn random_position<R: RandomSource + ?Sized>(&self, rng: &mut R) -> Position {
        let row = rng.random_int(0, self.rows as usize) as i32;
        let col = rng.random_int(0, self.cols as usize) as i32;
        Position::new(row, col)
    }

    /// Iterator over all organisms, row-major by cell
    pub fn iter(&self) -> impl Iterator<Item = &Organism> + '_ {
        self.cells.iter().flatten()
    }

    /// Iterator over all cells with positions
    pub fn cells(&self) -> impl Iterator<Item = (Position, &[Organism])> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, cell)| (self.index_to_pos(i), cell.as_slice()))
    }

    /// Verify that bags and locator agree
    pub fn check_consistency(&self) -> Result<()> {
        let mut seen = 0;
        for (pos, cell) in self.cells() {
            for organism in cell {
                seen += 1;
                if organism.position() != pos {
                    return Err(Error::InconsistentIndex(format!(
                        "organism {} in cell {} believes it is at {}",
                        organism.id,
                        pos,
                        organism.position()
                    )));
                }
                if self.locations.get(&organism.id) != Some(&pos) {
                    return Err(Error::InconsistentIndex(format!(
                        "organism {} in cell {} is located at {:?}",
                        organism.id,
                        pos,
                        self.locations.get(&organism.id)
                    )));
                }
            }
        }

        if seen != self.locations.len() {
            return Err(Error::InconsistentIndex(format!(
                "{} organisms in cells but {} located",
                seen,
                self.locations.len()
            )));
        }

        Ok(())
    }

    pub fn snapshot(&self) -> GridSnapshot {
        GridSnapshot {
            rows: self.rows,
            cols: self.cols,
            occupants: self.iter().map(OrganismView::from).collect(),
        }
    }
}

/// Serializable grid contents for renderers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub rows: i32,
    pub cols: i32,
    pub occupants: Vec<OrganismView>,
}
