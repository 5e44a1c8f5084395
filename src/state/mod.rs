mod agent;
mod grid;

pub use agent::{AgentState, BATTERY_MAX};
pub use grid::{Cell, Grid};
