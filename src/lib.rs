pub mod infra;
pub mod metrics;
pub mod runner;
pub mod sim;
pub mod state;

// Re-export commonly used types for convenience
pub use infra::{Action, GridWorldError, Position, Result};
pub use sim::{GridWorld, GridWorldConfig, Observation, RewardTable, StepResult, WindConfig};
pub use state::{AgentState, Cell, Grid};
