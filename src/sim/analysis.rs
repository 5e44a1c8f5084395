//! Value maps and greedy policies for inspecting a trained model.
//!
//! The model is any function from an observation to a scalar value. The
//! agent is placed on every free cell in turn, the model scores each
//! placement, and the resulting map is shaped so the goal is the sink and
//! obstacles are the floor before being scaled to `[0, 1]`.

use crate::infra::{Action, Position};
use crate::state::{AgentState, Cell, Grid};

use super::encoder::{Observation, ObservationEncoder};

/// Per-cell values for one agent, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct ValueMap {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f32>,
}

impl ValueMap {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// `None` if `data` does not hold `rows * cols` values
    pub fn from_values(rows: usize, cols: usize, data: Vec<f32>) -> Option<Self> {
        (data.len() == rows * cols).then_some(Self { rows, cols, data })
    }

    fn index(&self, pos: &Position) -> Option<usize> {
        let row = usize::try_from(pos.row).ok()?;
        let col = usize::try_from(pos.col).ok()?;
        (row < self.rows && col < self.cols).then_some(row * self.cols + col)
    }

    pub fn get(&self, pos: &Position) -> Option<f32> {
        self.index(pos).map(|i| self.data[i])
    }

    fn set(&mut self, pos: &Position, value: f32) {
        if let Some(i) = self.index(pos) {
            self.data[i] = value;
        }
    }

    pub fn min(&self) -> f32 {
        self.data.iter().copied().fold(f32::INFINITY, f32::min)
    }

    pub fn max(&self) -> f32 {
        self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// Min-max scale into `[0, 1]`. A flat map becomes all zeros.
    fn normalize(&mut self) {
        let (min, max) = (self.min(), self.max());
        let span = max - min;
        if span.abs() < f32::EPSILON {
            self.data.iter_mut().for_each(|v| *v = 0.0);
        } else {
            self.data.iter_mut().for_each(|v| *v = (*v - min) / span);
        }
    }
}

/// Value just above the current maximum, kept for the goal cell
fn sink_value(max: f32) -> f32 {
    (max + 0.5).min(max * 2.0)
}

/// Score every free cell for `agent` with `model`.
///
/// The agent is encoded at each free cell with its current battery and
/// goal. Charging stations keep a raw value of zero, the goal becomes the
/// maximum and obstacles the minimum. Negative maps are shifted up before
/// the final min-max scaling.
pub fn value_map<F>(grid: &Grid, agent: &AgentState, mut model: F) -> ValueMap
where
    F: FnMut(&Observation) -> f32,
{
    let encoder = ObservationEncoder::new();
    let mut values = ValueMap::zeros(grid.rows as usize, grid.cols as usize);

    let mut placed = agent.clone();
    for (pos, cell) in grid.iter() {
        if cell != Cell::Free || agent.goal == Some(pos) {
            continue;
        }
        placed.position = Some(pos);
        values.set(&pos, model(&encoder.encode(grid, &placed)));
    }

    if let Some(goal) = agent.goal {
        values.set(&goal, sink_value(values.max()));
    }

    let floor = values.min() - 0.5;
    for (pos, cell) in grid.iter() {
        if cell == Cell::Obstacle {
            values.set(&pos, floor);
        }
    }

    let min = values.min();
    if min < 0.0 {
        values.data.iter_mut().for_each(|v| *v -= min);
        if let Some(goal) = agent.goal {
            values.set(&goal, 0.0);
            values.set(&goal, sink_value(values.max()));
        }
    }

    values.normalize();
    values
}

/// Greedy action per cell; `None` on obstacles and the goal.
#[derive(Debug, Clone, PartialEq)]
pub struct GreedyPolicy {
    pub rows: usize,
    pub cols: usize,
    pub actions: Vec<Option<Action>>,
}

impl GreedyPolicy {
    pub fn action_at(&self, pos: &Position) -> Option<Action> {
        let row = usize::try_from(pos.row).ok()?;
        let col = usize::try_from(pos.col).ok()?;
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.actions[row * self.cols + col]
    }
}

/// Move towards the highest-valued neighbour. Leaving the grid is scored
/// as the lowest value in the map; ties go to up, down, left, right in
/// that order.
pub fn greedy_policy(values: &ValueMap, grid: &Grid, goal: Option<Position>) -> GreedyPolicy {
    const ORDER: [(Action, i32, i32); 4] = [
        (Action::Up, -1, 0),
        (Action::Down, 1, 0),
        (Action::Left, 0, -1),
        (Action::Right, 0, 1),
    ];
    let floor = values.min();

    let actions = grid
        .iter()
        .map(|(pos, cell)| {
            if cell == Cell::Obstacle || goal == Some(pos) {
                return None;
            }
            let mut best: Option<(Action, f32)> = None;
            for (action, d_row, d_col) in ORDER {
                let value = values.get(&pos.offset(d_row, d_col)).unwrap_or(floor);
                if best.is_none_or(|(_, v)| value > v) {
                    best = Some((action, value));
                }
            }
            best.map(|(action, _)| action)
        })
        .collect();

    GreedyPolicy {
        rows: grid.rows as usize,
        cols: grid.cols as usize,
        actions,
    }
}
