use std::fmt;

/// Cell coordinate on the grid.
///
/// Signed so that a proposed move can leave the grid and still be
/// represented until conflict resolution reverts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub row: i32,
    pub col: i32,
}

impl Position {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// Manhattan distance
    pub fn distance(&self, other: &Position) -> i32 {
        (self.row - other.row).abs() + (self.col - other.col).abs()
    }

    pub fn offset(&self, d_row: i32, d_col: i32) -> Position {
        Position::new(self.row + d_row, self.col + d_col)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

impl From<(i32, i32)> for Position {
    fn from((row, col): (i32, i32)) -> Self {
        Self::new(row, col)
    }
}

/// Raised when a raw action index does not name one of the four moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown action: {0}")]
pub struct InvalidActionError(pub i64);

/// The four cardinal moves an agent can choose each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Left,
    Right,
    Up,
    Down,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Left, Action::Right, Action::Up, Action::Down];

    pub fn index(self) -> i64 {
        match self {
            Action::Left => 0,
            Action::Right => 1,
            Action::Up => 2,
            Action::Down => 3,
        }
    }

    pub fn as_str_name(self) -> &'static str {
        match self {
            Action::Left => "left",
            Action::Right => "right",
            Action::Up => "up",
            Action::Down => "down",
        }
    }
}

impl TryFrom<i64> for Action {
    type Error = InvalidActionError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Action::Left),
            1 => Ok(Action::Right),
            2 => Ok(Action::Up),
            3 => Ok(Action::Down),
            other => Err(InvalidActionError(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_index_roundtrip() {
        for action in Action::ALL {
            assert_eq!(Action::try_from(action.index()), Ok(action));
        }
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        assert_eq!(Action::try_from(4), Err(InvalidActionError(4)));
        assert_eq!(Action::try_from(-1), Err(InvalidActionError(-1)));
    }

    #[test]
    fn test_distance() {
        let a = Position::new(0, 0);
        let b = Position::new(3, -4);
        assert_eq!(a.distance(&b), 7);
        assert_eq!(b.distance(&a), 7);
    }
}
