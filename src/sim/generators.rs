//! Grid and start/goal placement used on reset.
//!
//! Generators only propose layouts; the environment checks the placement
//! constraints and asks again when they are not met.

use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::infra::Position;
use crate::state::{Cell, Grid};

/// Produces a fresh obstacle layout. The charging station is placed by the
/// environment afterwards.
pub trait GridGenerator: Send {
    fn generate(&mut self, rows: i32, cols: i32, rng: &mut StdRng) -> Grid;
}

/// Produces one (start, goal) pair per agent.
pub trait StartGoalGenerator: Send {
    /// `None` when the grid cannot host `n` agents at all.
    fn generate(
        &mut self,
        grid: &Grid,
        n: usize,
        radius: i32,
        rng: &mut StdRng,
    ) -> Option<(Vec<Position>, Vec<Position>)>;
}

/// Obstacle-free grid
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyGrid;

impl GridGenerator for EmptyGrid {
    fn generate(&mut self, rows: i32, cols: i32, _rng: &mut StdRng) -> Grid {
        Grid::new(rows, cols)
    }
}

/// Each cell independently becomes an obstacle with probability `density`.
#[derive(Debug, Clone, Copy)]
pub struct RandomObstacles {
    pub density: f64,
}

impl RandomObstacles {
    pub fn new(density: f64) -> Self {
        Self {
            density: density.clamp(0.0, 1.0),
        }
    }
}

impl GridGenerator for RandomObstacles {
    fn generate(&mut self, rows: i32, cols: i32, rng: &mut StdRng) -> Grid {
        let mut grid = Grid::new(rows, cols);
        for row in 0..rows {
            for col in 0..cols {
                if rng.random_bool(self.density.clamp(0.0, 1.0)) {
                    grid.set(&Position::new(row, col), Cell::Obstacle);
                }
            }
        }
        grid
    }
}

/// Starts and goals drawn without replacement from the free cells within
/// `radius` (per axis) of the charging station, or from the whole grid when
/// there is no station. No two agents share a start, no two share a goal,
/// and no goal is any agent's start.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformStartsGoals;

impl StartGoalGenerator for UniformStartsGoals {
    fn generate(
        &mut self,
        grid: &Grid,
        n: usize,
        radius: i32,
        rng: &mut StdRng,
    ) -> Option<(Vec<Position>, Vec<Position>)> {
        let center = grid.charging_stations().first().copied();
        let mut candidates: Vec<Position> = grid
            .iter()
            .filter(|(_, cell)| *cell == Cell::Free)
            .map(|(pos, _)| pos)
            .filter(|pos| match center {
                Some(c) => (pos.row - c.row).abs() <= radius && (pos.col - c.col).abs() <= radius,
                None => true,
            })
            .collect();

        if candidates.len() < 2 * n {
            return None;
        }

        candidates.shuffle(rng);
        let starts = candidates[..n].to_vec();
        let goals = candidates[n..2 * n].to_vec();
        Some((starts, goals))
    }
}
