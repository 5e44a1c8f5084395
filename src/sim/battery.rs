use tracing::debug;

use crate::state::{AgentState, BATTERY_MAX, Grid};

/// Charge consumed by every applied move
pub const MOVE_COST: u32 = 10;

/// Drain one move's worth of charge, never dropping below zero.
pub fn tick(agent: &mut AgentState) {
    agent.battery = agent.battery.saturating_sub(MOVE_COST);
}

/// Refill the battery when the agent stands on a charging station.
/// Returns whether a recharge happened.
pub fn try_recharge(agent: &mut AgentState, grid: &Grid) -> bool {
    match agent.position {
        Some(pos) if grid.is_charging_station(&pos) => {
            debug!("Agent {} recharged at {}", agent.id, pos);
            agent.battery = BATTERY_MAX;
            true
        }
        _ => false,
    }
}

pub fn is_exhausted(agent: &AgentState) -> bool {
    agent.battery == 0
}
