use crate::infra::{Action, Position};

/// Proposed next cell for `action` taken at `position` under `wind`.
///
/// Wind always shifts the column, vertical moves included. Row changes come
/// from the action alone.
pub fn propose(position: Position, action: Action, wind: i32) -> Position {
    match action {
        Action::Up => position.offset(-1, wind),
        Action::Down => position.offset(1, wind),
        Action::Left => position.offset(0, -1 + wind),
        Action::Right => position.offset(0, 1 + wind),
    }
}
