//! Episode statistics and CSV logging for evaluation runs

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Moving average calculator
#[derive(Debug, Clone)]
pub struct MovingAverage {
    values: VecDeque<f32>,
    window_size: usize,
    sum: f32,
}

impl MovingAverage {
    pub fn new(window_size: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(window_size),
            window_size: window_size.max(1),
            sum: 0.0,
        }
    }

    pub fn push(&mut self, value: f32) {
        if self.values.len() >= self.window_size
            && let Some(old) = self.values.pop_front()
        {
            self.sum -= old;
        }
        self.values.push_back(value);
        self.sum += value;
    }

    pub fn average(&self) -> f32 {
        if self.values.is_empty() {
            0.0
        } else {
            self.sum / self.values.len() as f32
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// What happened in one episode
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpisodeSummary {
    /// Steps taken
    pub steps: usize,
    /// Undiscounted return per agent
    pub returns: Vec<f32>,
    /// Agents that finished on their goal
    pub goals_reached: usize,
    /// Agents that ran out of battery
    pub depleted: usize,
    /// Ended on the step budget rather than with every agent done
    pub truncated: bool,
}

impl EpisodeSummary {
    pub fn new(num_agents: usize) -> Self {
        Self {
            returns: vec![0.0; num_agents],
            ..Default::default()
        }
    }

    /// Sum of all agents' returns
    pub fn total_return(&self) -> f32 {
        self.returns.iter().sum()
    }

    /// Mean return per agent
    pub fn mean_return(&self) -> f32 {
        if self.returns.is_empty() {
            0.0
        } else {
            self.total_return() / self.returns.len() as f32
        }
    }
}

/// Aggregate statistics over many episodes
#[derive(Debug, Clone)]
pub struct EvaluationMetrics {
    /// Number of recorded episodes
    pub num_episodes: usize,
    /// Agent-episodes recorded (episodes times agents)
    pub num_agent_episodes: usize,
    /// Sum of per-agent mean returns
    pub total_reward: f32,
    pub total_steps: usize,
    pub num_goals: usize,
    pub num_depleted: usize,
    pub num_truncated: usize,
    /// Recent per-agent mean returns
    pub recent_returns: MovingAverage,
}

impl EvaluationMetrics {
    pub fn new(window_size: usize) -> Self {
        Self {
            num_episodes: 0,
            num_agent_episodes: 0,
            total_reward: 0.0,
            total_steps: 0,
            num_goals: 0,
            num_depleted: 0,
            num_truncated: 0,
            recent_returns: MovingAverage::new(window_size),
        }
    }

    pub fn record_episode(&mut self, summary: &EpisodeSummary) {
        self.num_episodes += 1;
        self.num_agent_episodes += summary.returns.len();
        self.total_reward += summary.mean_return();
        self.total_steps += summary.steps;
        self.num_goals += summary.goals_reached;
        self.num_depleted += summary.depleted;
        if summary.truncated {
            self.num_truncated += 1;
        }
        self.recent_returns.push(summary.mean_return());
    }

    /// Average per-agent return per episode
    pub fn avg_reward(&self) -> f32 {
        if self.num_episodes == 0 {
            0.0
        } else {
            self.total_reward / self.num_episodes as f32
        }
    }

    /// Fraction of agent-episodes that ended on the goal
    pub fn goal_rate(&self) -> f32 {
        if self.num_agent_episodes == 0 {
            0.0
        } else {
            self.num_goals as f32 / self.num_agent_episodes as f32
        }
    }

    /// Fraction of agent-episodes that ended with an empty battery
    pub fn depletion_rate(&self) -> f32 {
        if self.num_agent_episodes == 0 {
            0.0
        } else {
            self.num_depleted as f32 / self.num_agent_episodes as f32
        }
    }

    pub fn avg_length(&self) -> f32 {
        if self.num_episodes == 0 {
            0.0
        } else {
            self.total_steps as f32 / self.num_episodes as f32
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("=== Evaluation Results ===");
        tracing::info!("Episodes: {}", self.num_episodes);
        tracing::info!("Avg Reward: {:.2}", self.avg_reward());
        tracing::info!("Recent Reward: {:.2}", self.recent_returns.average());
        tracing::info!("Goal Rate: {:.1}%", self.goal_rate() * 100.0);
        tracing::info!("Depletion Rate: {:.1}%", self.depletion_rate() * 100.0);
        tracing::info!("Avg Length: {:.1}", self.avg_length());
        tracing::info!("Truncated: {}", self.num_truncated);
    }
}

impl Default for EvaluationMetrics {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Appends `step,value` rows to one CSV file per tag under a directory.
pub struct CsvLogger {
    log_dir: PathBuf,
}

impl CsvLogger {
    pub fn new(log_dir: impl AsRef<Path>) -> io::Result<Self> {
        std::fs::create_dir_all(log_dir.as_ref())?;
        Ok(Self {
            log_dir: log_dir.as_ref().to_path_buf(),
        })
    }

    /// Path of the file a tag is written to
    pub fn path_for(&self, tag: &str) -> PathBuf {
        self.log_dir.join(format!("{}.csv", tag.replace('/', "_")))
    }

    pub fn log_scalar(&mut self, tag: &str, value: f32, step: usize) -> io::Result<()> {
        let path = self.path_for(tag);
        let file_exists = path.exists();
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if !file_exists {
            writeln!(file, "step,value")?;
        }
        writeln!(file, "{},{}", step, value)
    }

    pub fn log_metrics(&mut self, metrics: &EvaluationMetrics) -> io::Result<()> {
        let step = metrics.num_episodes;
        self.log_scalar("episode/reward", metrics.recent_returns.average(), step)?;
        self.log_scalar("episode/length", metrics.avg_length(), step)?;
        self.log_scalar("episode/goal_rate", metrics.goal_rate(), step)?;
        self.log_scalar("episode/depletion_rate", metrics.depletion_rate(), step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moving_average_window() {
        let mut avg = MovingAverage::new(2);
        assert!(avg.is_empty());
        assert!(avg.average().abs() < 1e-6);

        avg.push(1.0);
        avg.push(3.0);
        assert!((avg.average() - 2.0).abs() < 1e-6);

        avg.push(5.0);
        assert_eq!(avg.len(), 2);
        assert!((avg.average() - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_evaluation_rates() {
        let mut metrics = EvaluationMetrics::new(10);
        metrics.record_episode(&EpisodeSummary {
            steps: 4,
            returns: vec![10.0, -10.0],
            goals_reached: 1,
            depleted: 1,
            truncated: false,
        });
        metrics.record_episode(&EpisodeSummary {
            steps: 6,
            returns: vec![2.0, 4.0],
            goals_reached: 1,
            depleted: 0,
            truncated: true,
        });

        assert_eq!(metrics.num_episodes, 2);
        assert!((metrics.avg_reward() - 1.5).abs() < 1e-6);
        assert!((metrics.goal_rate() - 0.5).abs() < 1e-6);
        assert!((metrics.depletion_rate() - 0.25).abs() < 1e-6);
        assert!((metrics.avg_length() - 5.0).abs() < 1e-6);
        assert_eq!(metrics.num_truncated, 1);
    }

    #[test]
    fn test_csv_logger_writes_header_once() {
        let dir = std::env::temp_dir().join(format!("gridworld-csv-{}", std::process::id()));
        let mut logger = CsvLogger::new(&dir).unwrap();
        logger.log_scalar("episode/reward", 1.5, 1).unwrap();
        logger.log_scalar("episode/reward", 2.5, 2).unwrap();

        let content = std::fs::read_to_string(logger.path_for("episode/reward")).unwrap();
        assert_eq!(content, "step,value\n1,1.5\n2,2.5\n");
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
