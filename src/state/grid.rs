use crate::infra::Position;

/// Category of a single grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Cell {
    #[default]
    Free,
    Obstacle,
    ChargingStation,
}

impl Cell {
    pub fn from_char(c: char) -> Option<Cell> {
        match c {
            '.' | ' ' => Some(Cell::Free),
            '#' => Some(Cell::Obstacle),
            'C' => Some(Cell::ChargingStation),
            _ => None,
        }
    }

    pub fn to_char(self) -> char {
        match self {
            Cell::Free => '.',
            Cell::Obstacle => '#',
            Cell::ChargingStation => 'C',
        }
    }
}

/// Static layout of the world. Only ever replaced wholesale between
/// episodes; never mutated while a step is running.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    pub rows: i32,
    pub cols: i32,
    cells: Vec<Cell>,
}

impl Grid {
    /// All-free grid
    pub fn new(rows: i32, cols: i32) -> Self {
        assert!(rows > 0 && cols > 0, "grid dimensions must be positive");
        Self {
            rows,
            cols,
            cells: vec![Cell::Free; (rows * cols) as usize],
        }
    }

    /// Parse a grid from text rows using `.` (free), `#` (obstacle) and
    /// `C` (charging station). Returns `None` on ragged rows or unknown
    /// characters.
    pub fn from_rows(rows: &[&str]) -> Option<Self> {
        let cols = rows.first()?.chars().count();
        let mut cells = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            if row.chars().count() != cols {
                return None;
            }
            for c in row.chars() {
                cells.push(Cell::from_char(c)?);
            }
        }
        if cols == 0 {
            return None;
        }
        Some(Self {
            rows: rows.len() as i32,
            cols: cols as i32,
            cells,
        })
    }

    /// Inverse of [`Grid::from_rows`]
    pub fn to_rows(&self) -> Vec<String> {
        self.cells
            .chunks(self.cols as usize)
            .map(|row| row.iter().map(|c| c.to_char()).collect())
            .collect()
    }

    pub fn in_bounds(&self, pos: &Position) -> bool {
        pos.row >= 0 && pos.row < self.rows && pos.col >= 0 && pos.col < self.cols
    }

    /// Checked lookup; `None` when `pos` is outside the grid.
    pub fn cell(&self, pos: &Position) -> Option<Cell> {
        if self.in_bounds(pos) {
            Some(self.cells[self.index(pos)])
        } else {
            None
        }
    }

    /// Direct lookup. Indexing outside the grid is a caller bug.
    pub fn get(&self, pos: &Position) -> Cell {
        assert!(pos.row >= 0 && pos.row < self.rows, "row index out of bounds");
        assert!(pos.col >= 0 && pos.col < self.cols, "column index out of bounds");
        self.cells[self.index(pos)]
    }

    pub fn set(&mut self, pos: &Position, cell: Cell) {
        assert!(pos.row >= 0 && pos.row < self.rows, "row index out of bounds");
        assert!(pos.col >= 0 && pos.col < self.cols, "column index out of bounds");
        let idx = self.index(pos);
        self.cells[idx] = cell;
    }

    pub fn is_obstacle(&self, pos: &Position) -> bool {
        self.cell(pos) == Some(Cell::Obstacle)
    }

    pub fn is_charging_station(&self, pos: &Position) -> bool {
        self.cell(pos) == Some(Cell::ChargingStation)
    }

    pub fn charging_stations(&self) -> Vec<Position> {
        self.iter()
            .filter(|(_, cell)| *cell == Cell::ChargingStation)
            .map(|(pos, _)| pos)
            .collect()
    }

    /// Cells in row-major order
    pub fn iter(&self) -> impl Iterator<Item = (Position, Cell)> + '_ {
        self.cells.iter().enumerate().map(|(i, cell)| {
            let i = i as i32;
            (Position::new(i / self.cols, i % self.cols), *cell)
        })
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn index(&self, pos: &Position) -> usize {
        (pos.row * self.cols + pos.col) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows() {
        let grid = Grid::from_rows(&["..#", ".C.", "..."]).unwrap();
        assert_eq!(grid.rows, 3);
        assert_eq!(grid.cols, 3);
        assert_eq!(grid.get(&Position::new(0, 2)), Cell::Obstacle);
        assert_eq!(grid.charging_stations(), vec![Position::new(1, 1)]);
        assert_eq!(grid.to_rows(), vec!["..#", ".C.", "..."]);
    }

    #[test]
    fn test_from_rows_rejects_ragged_and_unknown() {
        assert!(Grid::from_rows(&["...", ".."]).is_none());
        assert!(Grid::from_rows(&["..x"]).is_none());
        assert!(Grid::from_rows(&[]).is_none());
    }

    #[test]
    fn test_cell_out_of_bounds_is_none() {
        let grid = Grid::new(2, 3);
        assert_eq!(grid.cell(&Position::new(-1, 0)), None);
        assert_eq!(grid.cell(&Position::new(0, 3)), None);
        assert_eq!(grid.cell(&Position::new(1, 2)), Some(Cell::Free));
    }

    #[test]
    #[should_panic(expected = "column index out of bounds")]
    fn test_get_out_of_bounds_panics() {
        let grid = Grid::new(2, 2);
        grid.get(&Position::new(0, 2));
    }

    #[test]
    fn test_iter_is_row_major() {
        let grid = Grid::new(2, 3);
        let positions: Vec<Position> = grid.iter().map(|(p, _)| p).collect();
        assert_eq!(positions[0], Position::new(0, 0));
        assert_eq!(positions[2], Position::new(0, 2));
        assert_eq!(positions[3], Position::new(1, 0));
        assert_eq!(grid.len(), 6);
    }
}
