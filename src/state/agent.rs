use crate::infra::Position;

/// Full battery charge
pub const BATTERY_MAX: u32 = 150;

/// Per-agent simulation state, owned by the environment.
///
/// Position and goal stay `None` until the first reset places the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentState {
    pub id: usize,
    pub position: Option<Position>,
    pub goal: Option<Position>,
    /// Start cell restored on every reset
    pub start: Option<Position>,
    /// Goal restored on every reset
    pub initial_goal: Option<Position>,
    pub battery: u32,
    pub done: bool,
}

impl AgentState {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            position: None,
            goal: None,
            start: None,
            initial_goal: None,
            battery: BATTERY_MAX,
            done: false,
        }
    }

    /// Assign a new start and goal without placing the agent.
    pub fn assign(&mut self, start: Position, goal: Position) {
        self.start = Some(start);
        self.initial_goal = Some(goal);
    }

    /// Put the agent back on its start with a full battery.
    pub fn restart(&mut self) {
        self.position = self.start;
        self.goal = self.initial_goal;
        self.battery = BATTERY_MAX;
        self.done = false;
    }

    pub fn is_active(&self) -> bool {
        !self.done
    }

    /// Current position.
    ///
    /// # Panics
    /// If the agent has not been placed by a reset yet.
    pub fn pos(&self) -> Position {
        self.position.expect("agent not placed")
    }
}
