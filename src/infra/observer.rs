use crate::infra::Action;
use crate::metrics::EpisodeSummary;
use crate::sim::render::draw_ascii;
use crate::sim::{GridWorld, StepResult};
use std::io::{self, Write};
use tracing::{debug, info};

/// Trait for observing environment events during an episode run
pub trait EnvObserver {
    /// Called after the environment has been reset for a new episode
    fn on_reset(&mut self, episode: usize, env: &GridWorld);

    /// Called after every step with the actions that produced it
    fn on_step(&mut self, episode: usize, actions: &[Action], result: &StepResult, env: &GridWorld);

    /// Called when the episode ends (all agents done or truncated)
    fn on_episode_finished(&mut self, episode: usize, summary: &EpisodeSummary);
}

/// Logs episode progress, optionally drawing the grid after each step.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultObserver {
    pub render: bool,
}

impl DefaultObserver {
    pub fn new(render: bool) -> Self {
        Self { render }
    }
}

impl EnvObserver for DefaultObserver {
    fn on_reset(&mut self, episode: usize, env: &GridWorld) {
        info!("Episode {} started", episode);
        info!("- grid size: {}x{}", env.grid().rows, env.grid().cols);
        info!("- agents: {}", env.num_agents());
        for agent in env.agents() {
            if let (Some(start), Some(goal)) = (agent.start, agent.goal) {
                debug!("- agent {}: {} -> {}", agent.id, start, goal);
            }
        }
        if self.render {
            let _ = writeln!(io::stdout(), "{}", draw_ascii(env.grid(), env.agents(), true));
        }
    }

    fn on_step(&mut self, _episode: usize, actions: &[Action], result: &StepResult, env: &GridWorld) {
        let names: Vec<&str> = actions.iter().map(|a| a.as_str_name()).collect();
        debug!(
            "step: {}, actions: {:?}, rewards: {:?}, dones: {:?}",
            result.info.step, names, result.rewards, result.dones
        );

        if self.render {
            let _ = writeln!(io::stdout(), "{}", draw_ascii(env.grid(), env.agents(), true));
            let batteries: Vec<u32> = env.agents().iter().map(|a| a.battery).collect();
            let _ = writeln!(io::stdout(), "Battery: {:?}", batteries);
        }
    }

    fn on_episode_finished(&mut self, episode: usize, summary: &EpisodeSummary) {
        info!(
            "Episode {} finished after {} steps: return {:.2}, goals {}/{}, depleted {}{}",
            episode,
            summary.steps,
            summary.total_return(),
            summary.goals_reached,
            summary.returns.len(),
            summary.depleted,
            if summary.truncated { " (truncated)" } else { "" }
        );
    }
}

/// Fans every event out to a list of observers.
pub struct CompositeObserver {
    observers: Vec<Box<dyn EnvObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Box<dyn EnvObserver>>) -> Self {
        Self { observers }
    }
}

impl EnvObserver for CompositeObserver {
    fn on_reset(&mut self, episode: usize, env: &GridWorld) {
        for observer in &mut self.observers {
            observer.on_reset(episode, env);
        }
    }

    fn on_step(&mut self, episode: usize, actions: &[Action], result: &StepResult, env: &GridWorld) {
        for observer in &mut self.observers {
            observer.on_step(episode, actions, result, env);
        }
    }

    fn on_episode_finished(&mut self, episode: usize, summary: &EpisodeSummary) {
        for observer in &mut self.observers {
            observer.on_episode_finished(episode, summary);
        }
    }
}
