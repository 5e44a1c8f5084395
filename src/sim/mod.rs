//! Per-step simulation engine
//!
//! ```text
//! actions ──► WindModel::sample ──► transition::propose
//!                                        │
//!                                        ▼
//!              battery::tick ◄── apply all proposals
//!                                        │
//!                                        ▼
//!                 conflict::resolve (fixed point over reward::evaluate)
//!                                        │
//!                                        ▼
//!        exhaustion override / battery::try_recharge / done flags
//!                                        │
//!                                        ▼
//!                  ObservationEncoder ──► StepResult
//! ```

pub mod analysis;
pub mod battery;
pub mod conflict;
pub mod encoder;
pub mod env;
pub mod generators;
pub mod render;
pub mod reward;
pub mod transition;
pub mod wind;

pub use analysis::{GreedyPolicy, ValueMap, greedy_policy, value_map};
pub use conflict::Resolution;
pub use encoder::{NUM_PLANES, Observation, ObservationEncoder, Plane};
pub use env::{GridWorld, GridWorldConfig, StepInfo, StepResult};
pub use generators::{EmptyGrid, GridGenerator, RandomObstacles, StartGoalGenerator, UniformStartsGoals};
pub use reward::{Evaluation, Outcome, RewardTable};
pub use wind::{WindConfig, WindModel};
