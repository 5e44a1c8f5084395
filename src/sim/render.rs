use crate::infra::Position;
use crate::state::{AgentState, Cell, Grid};

const RESET: &str = "\x1b[0m";
const WALL: &str = "\x1b[90m"; // Dark gray
const STATION: &str = "\x1b[1;33m"; // Bright yellow
const AGENT: &str = "\x1b[1;36m"; // Bright cyan
const DONE: &str = "\x1b[32m"; // Green
const GOAL: &str = "\x1b[35m"; // Magenta

/// Text picture of the world, one line per row.
///
/// Agents are drawn as their index digit (`*` past 9), goals as the matching
/// lowercase letter, obstacles as `█` and the charging station as `C`.
pub fn draw_ascii(grid: &Grid, agents: &[AgentState], color: bool) -> String {
    let paint = |code: &str, glyph: String| {
        if color {
            format!("{}{}{}", code, glyph, RESET)
        } else {
            glyph
        }
    };

    let mut output = String::new();
    for row in 0..grid.rows {
        for col in 0..grid.cols {
            let pos = Position::new(row, col);

            if let Some(agent) = agents.iter().find(|a| a.position == Some(pos)) {
                let glyph = char::from_digit(agent.id as u32, 10).unwrap_or('*').to_string();
                output.push_str(&paint(if agent.done { DONE } else { AGENT }, glyph));
            } else if let Some(agent) = agents.iter().find(|a| a.goal == Some(pos)) {
                let glyph = char::from_u32('a' as u32 + (agent.id % 26) as u32).unwrap_or('?');
                output.push_str(&paint(GOAL, glyph.to_string()));
            } else {
                match grid.get(&pos) {
                    Cell::Free => output.push('.'),
                    Cell::Obstacle => output.push_str(&paint(WALL, "█".to_string())),
                    Cell::ChargingStation => output.push_str(&paint(STATION, "C".to_string())),
                }
            }
        }
        output.push('\n');
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_plain() {
        let grid = Grid::from_rows(&["#..", ".C.", "..."]).unwrap();
        let mut agent = AgentState::new(0);
        agent.position = Some(Position::new(2, 0));
        agent.goal = Some(Position::new(0, 2));

        let picture = draw_ascii(&grid, &[agent], false);
        assert_eq!(picture, "█.a\n.C.\n0..\n");
    }
}
