//! Observation encoder - converts grid and agent state into occupancy planes

use crate::state::{AgentState, Cell, Grid};

/// Plane order in an encoded observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    Obstacle = 0,
    ChargingStation = 1,
    Agent = 2,
    Goal = 3,
}

/// Number of planes per observation
pub const NUM_PLANES: usize = 4;

/// One agent's view of the world: `NUM_PLANES` row-major planes of
/// `rows * cols` values each.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f32>,
}

impl Observation {
    fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; NUM_PLANES * rows * cols],
        }
    }

    pub fn plane(&self, plane: Plane) -> &[f32] {
        let size = self.rows * self.cols;
        let start = plane as usize * size;
        &self.data[start..start + size]
    }

    pub fn get(&self, plane: Plane, row: usize, col: usize) -> f32 {
        self.plane(plane)[row * self.cols + col]
    }

    fn set(&mut self, plane: Plane, row: usize, col: usize, value: f32) {
        let idx = plane as usize * self.rows * self.cols + row * self.cols + col;
        self.data[idx] = value;
    }

    /// Shape as (planes, rows, cols)
    pub fn shape(&self) -> (usize, usize, usize) {
        (NUM_PLANES, self.rows, self.cols)
    }
}

/// Encodes grid contents plus one agent's battery and goal.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObservationEncoder;

impl ObservationEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Size of a flattened observation for a grid
    pub fn obs_size(&self, grid: &Grid) -> usize {
        NUM_PLANES * grid.len()
    }

    /// The agent plane carries the agent's battery level at its own cell;
    /// the goal plane marks only this agent's goal.
    pub fn encode(&self, grid: &Grid, agent: &AgentState) -> Observation {
        let mut obs = Observation::zeros(grid.rows as usize, grid.cols as usize);

        for (pos, cell) in grid.iter() {
            let (row, col) = (pos.row as usize, pos.col as usize);
            match cell {
                Cell::Obstacle => obs.set(Plane::Obstacle, row, col, 1.0),
                Cell::ChargingStation => obs.set(Plane::ChargingStation, row, col, 1.0),
                Cell::Free => {}
            }
        }

        if let Some(pos) = agent.position.filter(|p| grid.in_bounds(p)) {
            obs.set(Plane::Agent, pos.row as usize, pos.col as usize, agent.battery as f32);
        }
        if let Some(goal) = agent.goal.filter(|g| grid.in_bounds(g)) {
            obs.set(Plane::Goal, goal.row as usize, goal.col as usize, 1.0);
        }

        obs
    }

    pub fn encode_all(&self, grid: &Grid, agents: &[AgentState]) -> Vec<Observation> {
        agents.iter().map(|agent| self.encode(grid, agent)).collect()
    }
}
