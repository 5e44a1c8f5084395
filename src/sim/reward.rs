//! Reward table and per-agent outcome evaluation.

use std::env;

use tracing::warn;

use crate::state::{AgentState, Cell, Grid};

/// Kind of outcome an agent can get for a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Free,
    Obstacle,
    Goal,
    OutOfBounds,
    BatteryDepleted,
}

impl Outcome {
    /// Configuration key used to override the reward of this outcome
    pub fn config_key(self) -> &'static str {
        match self {
            Outcome::Free => "FREE",
            Outcome::Obstacle => "OBSTACLE",
            Outcome::Goal => "GOAL",
            Outcome::OutOfBounds => "OUT_OF_BOUNDS",
            Outcome::BatteryDepleted => "BATTERY_DEPLETED",
        }
    }

    pub const ALL: [Outcome; 5] = [
        Outcome::Free,
        Outcome::Obstacle,
        Outcome::Goal,
        Outcome::OutOfBounds,
        Outcome::BatteryDepleted,
    ];
}

/// Reward for each outcome kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardTable {
    /// Per-step cost of a legal move
    pub free: f32,
    /// Hitting an obstacle or another agent
    pub obstacle: f32,
    pub goal: f32,
    pub out_of_bounds: f32,
    pub battery_depleted: f32,
}

impl Default for RewardTable {
    fn default() -> Self {
        Self {
            free: -0.04,
            obstacle: -0.75,
            goal: 10.0,
            out_of_bounds: -0.8,
            battery_depleted: -10.0,
        }
    }
}

impl RewardTable {
    pub fn value(&self, outcome: Outcome) -> f32 {
        match outcome {
            Outcome::Free => self.free,
            Outcome::Obstacle => self.obstacle,
            Outcome::Goal => self.goal,
            Outcome::OutOfBounds => self.out_of_bounds,
            Outcome::BatteryDepleted => self.battery_depleted,
        }
    }

    fn slot(&mut self, outcome: Outcome) -> &mut f32 {
        match outcome {
            Outcome::Free => &mut self.free,
            Outcome::Obstacle => &mut self.obstacle,
            Outcome::Goal => &mut self.goal,
            Outcome::OutOfBounds => &mut self.out_of_bounds,
            Outcome::BatteryDepleted => &mut self.battery_depleted,
        }
    }

    /// Defaults overridden by whatever `lookup` returns for each key.
    /// Values that fail to parse keep their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut table = Self::default();
        for outcome in Outcome::ALL {
            let key = outcome.config_key();
            let Some(raw) = lookup(key) else {
                continue;
            };
            match raw.trim().parse::<f32>() {
                Ok(value) => *table.slot(outcome) = value,
                Err(_) => warn!("Ignoring reward override {}={:?}: not a number", key, raw),
            }
        }
        table
    }

    /// Overrides from `GRIDWORLD_<KEY>` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(format!("GRIDWORLD_{key}")).ok())
    }
}

/// Result of evaluating one agent's resolved position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub outcome: Outcome,
    pub reward: f32,
    /// The move must be reverted
    pub illegal: bool,
    pub done: bool,
}

impl Evaluation {
    fn of(outcome: Outcome, rewards: &RewardTable) -> Self {
        Self {
            outcome,
            reward: rewards.value(outcome),
            illegal: matches!(outcome, Outcome::OutOfBounds | Outcome::Obstacle),
            done: outcome == Outcome::Goal,
        }
    }

    /// Collision with another agent
    pub fn collision(rewards: &RewardTable) -> Self {
        Self::of(Outcome::Obstacle, rewards)
    }

    /// Battery exhaustion replaces whatever else happened this step.
    pub fn depleted(self, rewards: &RewardTable) -> Self {
        Self {
            outcome: Outcome::BatteryDepleted,
            reward: rewards.battery_depleted,
            illegal: self.illegal,
            done: true,
        }
    }
}

/// Evaluate `agent` at its current position against the grid and the
/// current positions of the other active agents in `others`.
///
/// Pure: the same inputs always give the same evaluation.
pub fn evaluate(
    agent: &AgentState,
    grid: &Grid,
    others: &[AgentState],
    rewards: &RewardTable,
) -> Evaluation {
    let pos = agent.pos();

    let Some(cell) = grid.cell(&pos) else {
        return Evaluation::of(Outcome::OutOfBounds, rewards);
    };

    let collides = others
        .iter()
        .any(|other| other.id != agent.id && other.is_active() && other.position == Some(pos));

    if cell == Cell::Obstacle || collides {
        Evaluation::of(Outcome::Obstacle, rewards)
    } else if agent.goal == Some(pos) {
        Evaluation::of(Outcome::Goal, rewards)
    } else {
        Evaluation::of(Outcome::Free, rewards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn agent(id: usize, pos: (i32, i32), goal: (i32, i32)) -> AgentState {
        let mut a = AgentState::new(id);
        a.position = Some(pos.into());
        a.goal = Some(goal.into());
        a
    }

    #[test]
    fn test_precedence() {
        let grid = Grid::from_rows(&["..#", "...", "..."]).unwrap();
        let rewards = RewardTable::default();

        // Out of bounds wins over everything
        let a = agent(0, (-1, 0), (-1, 0));
        let e = evaluate(&a, &grid, &[], &rewards);
        assert_eq!(e.outcome, Outcome::OutOfBounds);
        assert!(e.illegal);
        assert!(!e.done);

        // Obstacle on the goal cell is still an obstacle
        let a = agent(0, (0, 2), (0, 2));
        let e = evaluate(&a, &grid, &[], &rewards);
        assert_eq!(e.outcome, Outcome::Obstacle);
        assert!((e.reward - -0.75).abs() < 1e-6);

        let a = agent(0, (1, 1), (1, 1));
        let e = evaluate(&a, &grid, &[], &rewards);
        assert_eq!(e.outcome, Outcome::Goal);
        assert!(e.done);
        assert!(!e.illegal);

        let a = agent(0, (1, 1), (2, 2));
        let e = evaluate(&a, &grid, &[], &rewards);
        assert_eq!(e.outcome, Outcome::Free);
        assert!((e.reward - -0.04).abs() < 1e-6);
    }

    #[test]
    fn test_collision_ignores_self_and_done_agents() {
        let grid = Grid::new(3, 3);
        let rewards = RewardTable::default();
        let me = agent(0, (1, 1), (2, 2));
        let mut finished = agent(1, (1, 1), (1, 1));
        finished.done = true;

        let roster = vec![me.clone(), finished.clone()];
        assert_eq!(evaluate(&me, &grid, &roster, &rewards).outcome, Outcome::Free);

        finished.done = false;
        let roster = vec![me.clone(), finished];
        let e = evaluate(&me, &grid, &roster, &rewards);
        assert_eq!(e.outcome, Outcome::Obstacle);
        assert!(e.illegal);
    }

    #[test]
    fn test_evaluate_is_pure() {
        let grid = Grid::from_rows(&[".#", ".."]).unwrap();
        let rewards = RewardTable::default();
        let roster = vec![agent(0, (1, 0), (0, 0)), agent(1, (1, 1), (0, 0))];
        let first = evaluate(&roster[0], &grid, &roster, &rewards);
        let second = evaluate(&roster[0], &grid, &roster, &rewards);
        assert_eq!(first, second);
    }

    #[test]
    fn test_depletion_overrides_goal() {
        let rewards = RewardTable::default();
        let grid = Grid::new(2, 2);
        let a = agent(0, (0, 1), (0, 1));
        let e = evaluate(&a, &grid, &[], &rewards).depleted(&rewards);
        assert_eq!(e.outcome, Outcome::BatteryDepleted);
        assert!((e.reward - -10.0).abs() < 1e-6);
        assert!(e.done);
    }

    #[test]
    fn test_reward_overrides_from_lookup() {
        let mut values = HashMap::new();
        values.insert("GOAL", "25.5".to_string());
        values.insert("FREE", " -0.1 ".to_string());
        values.insert("OBSTACLE", "not-a-number".to_string());

        let table = RewardTable::from_lookup(|key| values.get(key).cloned());
        assert!((table.goal - 25.5).abs() < 1e-6);
        assert!((table.free - -0.1).abs() < 1e-6);
        assert!((table.obstacle - -0.75).abs() < 1e-6);
        assert!((table.out_of_bounds - -0.8).abs() < 1e-6);
        assert!((table.battery_depleted - -10.0).abs() < 1e-6);
    }

    #[test]
    fn test_outcome_keys_cover_table() {
        let table = RewardTable::default();
        let total: f32 = Outcome::ALL.iter().map(|o| table.value(*o)).sum();
        assert!((total - (-0.04 - 0.75 + 10.0 - 0.8 - 10.0)).abs() < 1e-5);
    }
}
