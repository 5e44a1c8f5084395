//! Multi-agent windy grid world - gym-like reset/step interface

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::infra::{Action, GridWorldError, Position, Result};
use crate::state::{AgentState, Cell, Grid};

use super::battery;
use super::conflict;
use super::encoder::{Observation, ObservationEncoder};
use super::generators::{EmptyGrid, GridGenerator, StartGoalGenerator, UniformStartsGoals};
use super::reward::{Outcome, RewardTable};
use super::transition;
use super::wind::{WindConfig, WindModel};

/// Environment configuration
#[derive(Debug, Clone)]
pub struct GridWorldConfig {
    pub rows: i32,
    pub cols: i32,
    pub num_agents: usize,
    pub wind: WindConfig,
    pub rewards: RewardTable,
    /// Steps after which an episode reports truncation
    pub max_steps: usize,
    /// Attempts allowed to the grid and start/goal generators per reset
    pub max_generation_retries: usize,
    /// Manhattan distance every start and goal must keep to the charging station
    pub max_station_distance: i32,
    /// Seed for the shared random stream; entropy when `None`
    pub seed: Option<u64>,
}

impl Default for GridWorldConfig {
    fn default() -> Self {
        Self {
            rows: 5,
            cols: 5,
            num_agents: 1,
            wind: WindConfig::calm(5),
            rewards: RewardTable::default(),
            max_steps: 100,
            max_generation_retries: 1000,
            max_station_distance: 10,
            seed: None,
        }
    }
}

/// Additional information from a step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepInfo {
    /// Steps taken this episode, this one included
    pub step: usize,
    /// Step budget reached
    pub truncated: bool,
    /// Outcome per agent; `None` for agents that were already done
    pub outcomes: Vec<Option<Outcome>>,
    /// Agents whose move was cancelled during conflict resolution
    pub reverted: Vec<bool>,
    /// Agents whose battery was refilled this step
    pub recharged: Vec<bool>,
    /// Agents that ran out of battery this step
    pub depleted: Vec<bool>,
    /// Conflict-resolution passes needed this step
    pub conflict_passes: usize,
}

/// Step result from the environment
#[derive(Debug, Clone)]
pub struct StepResult {
    pub observations: Vec<Observation>,
    pub rewards: Vec<f32>,
    /// Per-agent done flags
    pub dones: Vec<bool>,
    pub info: StepInfo,
}

impl StepResult {
    pub fn all_done(&self) -> bool {
        self.dones.iter().all(|d| *d)
    }

    pub fn truncated(&self) -> bool {
        self.info.truncated
    }
}

/// The simulation. `step` and `reset` take `&mut self`, so one environment
/// instance is never stepped re-entrantly; share it behind a `Mutex` if
/// several threads need it.
pub struct GridWorld {
    config: GridWorldConfig,
    grid: Grid,
    agents: Vec<AgentState>,
    wind: WindModel,
    rng: StdRng,
    encoder: ObservationEncoder,
    grid_generator: Box<dyn GridGenerator>,
    start_goal_generator: Box<dyn StartGoalGenerator>,
    steps: usize,
}

impl GridWorld {
    /// Create an environment with an empty grid and unplaced agents.
    /// Call [`GridWorld::reset`] before stepping.
    pub fn new(mut config: GridWorldConfig) -> Result<Self> {
        let bias_rows = config.wind.static_bias.len();
        let calm = config.wind.is_calm();
        if config.wind.fit_rows(config.rows.max(0) as usize) {
            if calm {
                debug!("Calm wind resized from {} to {} rows", bias_rows, config.rows);
            } else {
                warn!(
                    "Wind bias covers {} rows but the grid has {}; missing rows are calm, extra rows are dropped",
                    bias_rows, config.rows
                );
            }
        }

        let wind = WindModel::new(config.wind.clone())?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok(Self {
            grid: Grid::new(config.rows, config.cols),
            agents: (0..config.num_agents).map(AgentState::new).collect(),
            wind,
            rng,
            encoder: ObservationEncoder::new(),
            grid_generator: Box::new(EmptyGrid),
            start_goal_generator: Box::new(UniformStartsGoals),
            steps: 0,
            config,
        })
    }

    /// Create an environment on a fixed layout with agents already placed.
    /// Grid dimensions and agent count are taken from the arguments.
    pub fn with_layout(
        mut config: GridWorldConfig,
        grid: Grid,
        starts: &[Position],
        goals: &[Position],
    ) -> Result<Self> {
        assert_eq!(starts.len(), goals.len(), "one goal per start");
        config.rows = grid.rows;
        config.cols = grid.cols;
        config.num_agents = starts.len();

        let mut env = Self::new(config)?;
        env.grid = grid;
        for (agent, (start, goal)) in env.agents.iter_mut().zip(starts.iter().zip(goals)) {
            agent.assign(*start, *goal);
            agent.restart();
        }
        Ok(env)
    }

    pub fn with_grid_generator(mut self, generator: impl GridGenerator + 'static) -> Self {
        self.grid_generator = Box::new(generator);
        self
    }

    pub fn with_start_goal_generator(
        mut self,
        generator: impl StartGoalGenerator + 'static,
    ) -> Self {
        self.start_goal_generator = Box::new(generator);
        self
    }

    /// Reseed the shared random stream
    pub fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Start a new episode.
    ///
    /// With `reset_grid` a new obstacle layout and charging station are
    /// generated; with `reset_starts_goals` every agent gets a new start and
    /// goal near the station. Agents then return to their starts with full
    /// batteries.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn reset(
        &mut self,
        reset_starts_goals: bool,
        radius: i32,
        reset_grid: bool,
    ) -> Result<Vec<Observation>> {
        if !reset_starts_goals && self.agents.iter().any(|a| a.start.is_none()) {
            return Err(GridWorldError::MissingStartsGoals);
        }

        if reset_grid {
            self.regenerate_grid(reset_starts_goals)?;
        }
        if reset_starts_goals {
            self.regenerate_starts_goals(radius)?;
        }

        for agent in &mut self.agents {
            agent.restart();
        }
        self.steps = 0;

        Ok(self.observations())
    }

    fn regenerate_grid(&mut self, reset_starts_goals: bool) -> Result<()> {
        let (rows, cols) = (self.config.rows, self.config.cols);

        for attempt in 1..=self.config.max_generation_retries {
            let mut grid = self.grid_generator.generate(rows, cols, &mut self.rng);
            let station = Position::new(self.rng.random_range(0..rows), self.rng.random_range(0..cols));
            if grid.get(&station) == Cell::Obstacle {
                continue;
            }

            let kept_fit = reset_starts_goals
                || self.agents.iter().all(|agent| {
                    [agent.start, agent.initial_goal]
                        .into_iter()
                        .flatten()
                        .all(|pos| self.placement_ok(&grid, Some(station), &pos))
                });
            if !kept_fit {
                continue;
            }

            grid.set(&station, Cell::ChargingStation);
            self.grid = grid;
            info!("New grid generated after {} attempt(s), charging station at {}", attempt, station);
            return Ok(());
        }

        Err(GridWorldError::GenerationExhausted {
            what: "grid",
            attempts: self.config.max_generation_retries,
        })
    }

    fn regenerate_starts_goals(&mut self, radius: i32) -> Result<()> {
        let n = self.agents.len();
        let station = self.grid.charging_stations().first().copied();

        for attempt in 1..=self.config.max_generation_retries {
            let Some((starts, goals)) =
                self.start_goal_generator.generate(&self.grid, n, radius, &mut self.rng)
            else {
                continue;
            };
            if starts.len() != n || goals.len() != n {
                warn!("Start/goal generator returned {} starts and {} goals for {} agents", starts.len(), goals.len(), n);
                continue;
            }

            let distinct_starts = starts
                .iter()
                .enumerate()
                .all(|(i, s)| !starts[..i].contains(s));
            let all_ok = starts
                .iter()
                .chain(goals.iter())
                .all(|pos| self.placement_ok(&self.grid, station, pos));
            if !distinct_starts || !all_ok {
                continue;
            }

            info!("New starts {:?} and goals {:?} after {} attempt(s)", starts, goals, attempt);
            for (agent, (start, goal)) in self.agents.iter_mut().zip(starts.into_iter().zip(goals)) {
                agent.assign(start, goal);
            }
            return Ok(());
        }

        Err(GridWorldError::GenerationExhausted {
            what: "starts and goals",
            attempts: self.config.max_generation_retries,
        })
    }

    /// Free cell in range of the charging station (if there is one)
    fn placement_ok(&self, grid: &Grid, station: Option<Position>, pos: &Position) -> bool {
        grid.in_bounds(pos)
            && grid.get(pos) != Cell::Obstacle
            && station.is_none_or(|s| s.distance(pos) <= self.config.max_station_distance)
    }

    /// Step with raw action indices, one per agent.
    ///
    /// # Panics
    /// If `actions.len()` differs from the number of agents.
    pub fn step(&mut self, actions: &[i64]) -> Result<StepResult> {
        assert_eq!(
            actions.len(),
            self.agents.len(),
            "number of actions must be equal to number of agents"
        );
        let actions = actions
            .iter()
            .enumerate()
            .map(|(agent, &raw)| {
                Action::try_from(raw).map_err(|source| GridWorldError::InvalidAction { agent, source })
            })
            .collect::<Result<Vec<Action>>>()?;
        self.step_actions(&actions)
    }

    /// Advance the simulation by one tick.
    ///
    /// Done agents are skipped. Every active agent draws wind in index
    /// order, moves, pays for the move, and then conflicting moves are
    /// reverted before rewards, recharging and exhaustion are settled.
    ///
    /// # Panics
    /// If `actions.len()` differs from the number of agents, or if the
    /// environment was never reset.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn step_actions(&mut self, actions: &[Action]) -> Result<StepResult> {
        assert_eq!(
            actions.len(),
            self.agents.len(),
            "number of actions must be equal to number of agents"
        );
        assert!(
            self.agents.iter().all(|a| a.position.is_some()),
            "reset must be called before step"
        );

        self.steps += 1;
        let n = self.agents.len();

        let mut proposals: Vec<Position> = self.agents.iter().map(|a| a.pos()).collect();
        for (i, agent) in self.agents.iter().enumerate() {
            if agent.done {
                continue;
            }
            let pos = agent.pos();
            let wind = self.wind.sample(pos.row, &mut self.rng);
            proposals[i] = transition::propose(pos, actions[i], wind);
            debug!("Agent {} {} from {} with wind {} -> {}", i, actions[i].as_str_name(), pos, wind, proposals[i]);
        }

        for agent in self.agents.iter_mut().filter(|a| a.is_active()) {
            battery::tick(agent);
        }

        let resolution = conflict::resolve(&self.grid, &mut self.agents, &proposals, &self.config.rewards)?;

        let mut info = StepInfo {
            step: self.steps,
            outcomes: vec![None; n],
            reverted: resolution.reverted.clone(),
            recharged: vec![false; n],
            depleted: vec![false; n],
            conflict_passes: resolution.passes,
            ..Default::default()
        };
        let mut rewards = vec![0.0; n];

        for (i, agent) in self.agents.iter_mut().enumerate() {
            let Some(mut evaluation) = resolution.evaluations[i] else {
                continue;
            };

            // Exhaustion is judged on the charge left after the move, before
            // any station refill.
            let exhausted = battery::is_exhausted(agent);
            info.recharged[i] = battery::try_recharge(agent, &self.grid);
            if exhausted {
                info!("Agent {} ran out of battery at {}", agent.id, agent.pos());
                evaluation = evaluation.depleted(&self.config.rewards);
                info.depleted[i] = true;
            }

            if evaluation.outcome == Outcome::Goal {
                info!("Agent {} reached its goal at {}", agent.id, agent.pos());
            }

            rewards[i] = evaluation.reward;
            info.outcomes[i] = Some(evaluation.outcome);
            agent.done = evaluation.done;
        }

        info.truncated = self.steps >= self.config.max_steps;
        if self.steps == self.config.max_steps {
            info!("Episode truncated after {} steps", self.steps);
        }

        Ok(StepResult {
            observations: self.observations(),
            rewards,
            dones: self.dones(),
            info,
        })
    }

    pub fn observations(&self) -> Vec<Observation> {
        self.encoder.encode_all(&self.grid, &self.agents)
    }

    pub fn dones(&self) -> Vec<bool> {
        self.agents.iter().map(|a| a.done).collect()
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn agents(&self) -> &[AgentState] {
        &self.agents
    }

    /// Mutable access to one agent, for scenario setup
    pub fn agent_mut(&mut self, index: usize) -> &mut AgentState {
        &mut self.agents[index]
    }

    pub fn num_agents(&self) -> usize {
        self.agents.len()
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn config(&self) -> &GridWorldConfig {
        &self.config
    }

    pub fn obs_size(&self) -> usize {
        self.encoder.obs_size(&self.grid)
    }
}
