//! Episode loop: reset, query a policy, step until every agent is done or
//! the step budget runs out.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::infra::{Action, EnvObserver, Result};
use crate::metrics::{EpisodeSummary, EvaluationMetrics};
use crate::sim::reward::Outcome;
use crate::sim::{GridWorld, Observation};

/// Chooses one action per agent from the current observations.
pub trait Policy {
    fn act(&mut self, env: &GridWorld, observations: &[Observation]) -> Vec<Action>;
}

impl<F> Policy for F
where
    F: FnMut(&GridWorld, &[Observation]) -> Vec<Action>,
{
    fn act(&mut self, env: &GridWorld, observations: &[Observation]) -> Vec<Action> {
        self(env, observations)
    }
}

/// Uniformly random actions
pub struct RandomPolicy {
    rng: StdRng,
}

impl RandomPolicy {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng }
    }
}

impl Policy for RandomPolicy {
    fn act(&mut self, env: &GridWorld, _observations: &[Observation]) -> Vec<Action> {
        (0..env.num_agents())
            .map(|_| Action::ALL[self.rng.random_range(0..Action::ALL.len())])
            .collect()
    }
}

/// Arguments passed to `GridWorld::reset` at the start of each episode
#[derive(Debug, Clone, Copy)]
pub struct ResetOptions {
    pub reset_starts_goals: bool,
    pub radius: i32,
    pub reset_grid: bool,
}

impl Default for ResetOptions {
    fn default() -> Self {
        Self {
            reset_starts_goals: true,
            radius: 10,
            reset_grid: true,
        }
    }
}

pub struct EpisodeRunner {
    env: GridWorld,
    observer: Box<dyn EnvObserver>,
    reset: ResetOptions,
    metrics: EvaluationMetrics,
    episode: usize,
}

impl EpisodeRunner {
    pub fn new(env: GridWorld, observer: impl EnvObserver + 'static) -> Self {
        Self {
            env,
            observer: Box::new(observer),
            reset: ResetOptions::default(),
            metrics: EvaluationMetrics::default(),
            episode: 0,
        }
    }

    pub fn with_reset_options(mut self, reset: ResetOptions) -> Self {
        self.reset = reset;
        self
    }

    /// Run a single episode to completion.
    pub fn run_episode(&mut self, policy: &mut impl Policy) -> Result<EpisodeSummary> {
        self.episode += 1;
        let episode = self.episode;

        let mut observations = self.env.reset(
            self.reset.reset_starts_goals,
            self.reset.radius,
            self.reset.reset_grid,
        )?;
        self.observer.on_reset(episode, &self.env);

        let mut summary = EpisodeSummary::new(self.env.num_agents());
        loop {
            let actions = policy.act(&self.env, &observations);
            let result = self.env.step_actions(&actions)?;
            self.observer.on_step(episode, &actions, &result, &self.env);

            for (total, reward) in summary.returns.iter_mut().zip(&result.rewards) {
                *total += reward;
            }
            for outcome in result.info.outcomes.iter().flatten() {
                match outcome {
                    Outcome::Goal => summary.goals_reached += 1,
                    Outcome::BatteryDepleted => summary.depleted += 1,
                    _ => {}
                }
            }
            summary.steps = result.info.step;

            if result.all_done() {
                debug!("All agents done after {} steps", summary.steps);
                break;
            }
            if result.truncated() {
                summary.truncated = true;
                break;
            }
            observations = result.observations;
        }

        self.metrics.record_episode(&summary);
        self.observer.on_episode_finished(episode, &summary);
        Ok(summary)
    }

    /// Run `episodes` episodes and return the aggregated metrics.
    pub fn run(&mut self, episodes: usize, policy: &mut impl Policy) -> Result<&EvaluationMetrics> {
        for _ in 0..episodes {
            self.run_episode(policy)?;
        }
        info!("Finished {} episode(s)", episodes);
        Ok(&self.metrics)
    }

    pub fn metrics(&self) -> &EvaluationMetrics {
        &self.metrics
    }

    pub fn env(&self) -> &GridWorld {
        &self.env
    }

    pub fn into_env(self) -> GridWorld {
        self.env
    }
}
