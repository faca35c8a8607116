pub mod transition;

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};

const UP: &'static str = "↑";
const DOWN: &'static str = "↓";
const LEFT: &'static str = "←";
const RIGHT: &'static str = "→";

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    North,
    East,
    West,
    South,
}

impl Direction {
    // Enumeration order used by the value-iteration max search and by random moves.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::West,
        Direction::South,
    ];

    pub fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::East => 1,
            Direction::West => 2,
            Direction::South => 3,
        }
    }

    // Row and column offset of a single step, with row 0 at the top.
    pub fn offset(self) -> (i64, i64) {
        match self {
            Direction::North => (-1, 0),
            Direction::South => (1, 0),
            Direction::East => (0, 1),
            Direction::West => (0, -1),
        }
    }

    // The perpendicular direction to the "right" of this one.
    pub fn clockwise(self) -> Direction {
        match self {
            Direction::North => Direction::East,
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
        }
    }

    // The perpendicular direction to the "left" of this one.
    pub fn counter_clockwise(self) -> Direction {
        match self {
            Direction::North => Direction::West,
            Direction::West => Direction::South,
            Direction::South => Direction::East,
            Direction::East => Direction::North,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Direction::North => UP,
            Direction::South => DOWN,
            Direction::East => RIGHT,
            Direction::West => LEFT,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::North => "NORTH",
            Direction::East => "EAST",
            Direction::West => "WEST",
            Direction::South => "SOUTH",
        };
        f.write_str(name)
    }
}

// Internal grid position: row 0 is the top row.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub fn new(row: usize, col: usize) -> Cell {
        Cell { row: row, col: col }
    }
}

// Static geometry shared read-only by both solvers.
#[derive(Clone, Debug)]
pub struct GridModel {
    width: usize,
    height: usize,
    // Terminal cells and their fixed rewards.
    terminals: HashMap<Cell, f64>,
    obstacles: HashSet<Cell>,
    step_cost: f64,
    start: Cell,
}

impl GridModel {
    pub fn new(
        width: usize,
        height: usize,
        terminals: Vec<(Cell, f64)>,
        obstacles: Vec<Cell>,
        start: Cell,
        step_cost: f64,
    ) -> Result<GridModel> {
        if width == 0 || height == 0 {
            return Err(Error::EmptyGrid { width, height });
        }

        let check_bounds = |what: &str, cell: &Cell| {
            if cell.row >= height || cell.col >= width {
                Err(Error::CellOutsideGrid {
                    what: what.to_string(),
                    row: cell.row,
                    col: cell.col,
                    width,
                    height,
                })
            } else {
                Ok(())
            }
        };

        for (cell, _) in terminals.iter() {
            check_bounds("terminal", cell)?;
        }
        for cell in obstacles.iter() {
            check_bounds("obstacle", cell)?;
        }
        check_bounds("start", &start)?;

        let terminals: HashMap<Cell, f64> = terminals.into_iter().collect();
        let obstacles: HashSet<Cell> = obstacles.into_iter().collect();

        if let Some(cell) = obstacles.iter().find(|c| terminals.contains_key(*c)) {
            return Err(Error::TerminalObstacleOverlap {
                row: cell.row,
                col: cell.col,
            });
        }
        if obstacles.contains(&start) {
            return Err(Error::StartOnObstacle {
                row: start.row,
                col: start.col,
            });
        }

        Ok(GridModel {
            width,
            height,
            terminals,
            obstacles,
            step_cost,
            start,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn step_cost(&self) -> f64 {
        self.step_cost
    }

    pub fn start(&self) -> Cell {
        self.start
    }

    pub fn terminal_reward(&self, cell: Cell) -> Option<f64> {
        self.terminals.get(&cell).copied()
    }

    pub fn is_terminal(&self, cell: Cell) -> bool {
        self.terminals.contains_key(&cell)
    }

    pub fn is_obstacle(&self, cell: Cell) -> bool {
        self.obstacles.contains(&cell)
    }

    pub fn terminal_count(&self) -> usize {
        self.terminals.len()
    }

    pub fn obstacle_count(&self) -> usize {
        self.obstacles.len()
    }

    // Cell reached by one step in `direction`, or `cell` itself when the step
    // would leave the grid or enter an obstacle.
    pub fn neighbour(&self, cell: Cell, direction: Direction) -> Cell {
        let (d_row, d_col) = direction.offset();
        let row = cell.row as i64 + d_row;
        let col = cell.col as i64 + d_col;
        if row < 0 || col < 0 || row >= self.height as i64 || col >= self.width as i64 {
            return cell;
        }

        let target = Cell::new(row as usize, col as usize);
        if self.is_obstacle(target) {
            cell
        } else {
            target
        }
    }

    // All cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..self.height).flat_map(move |row| (0..self.width).map(move |col| Cell::new(row, col)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn corridor() -> GridModel {
        GridModel::new(
            3,
            2,
            vec![(Cell::new(0, 2), 1.0)],
            vec![Cell::new(1, 1)],
            Cell::new(1, 0),
            -0.04,
        )
        .unwrap()
    }

    #[rstest]
    #[case(Direction::North, Direction::East, Direction::West)]
    #[case(Direction::East, Direction::South, Direction::North)]
    #[case(Direction::South, Direction::West, Direction::East)]
    #[case(Direction::West, Direction::North, Direction::South)]
    fn perpendicular_directions_test(
        #[case] direction: Direction,
        #[case] right: Direction,
        #[case] left: Direction,
    ) {
        assert_eq!(direction.clockwise(), right);
        assert_eq!(direction.counter_clockwise(), left);
    }

    #[test]
    fn neighbour_clamps_to_bounds_test() {
        let grid = corridor();
        assert_eq!(grid.neighbour(Cell::new(0, 0), Direction::North), Cell::new(0, 0));
        assert_eq!(grid.neighbour(Cell::new(0, 0), Direction::West), Cell::new(0, 0));
        assert_eq!(grid.neighbour(Cell::new(0, 0), Direction::East), Cell::new(0, 1));
        assert_eq!(grid.neighbour(Cell::new(0, 2), Direction::East), Cell::new(0, 2));
    }

    #[test]
    fn neighbour_redirects_obstacles_test() {
        let grid = corridor();
        assert_eq!(grid.neighbour(Cell::new(1, 0), Direction::East), Cell::new(1, 0));
        assert_eq!(grid.neighbour(Cell::new(0, 1), Direction::South), Cell::new(0, 1));
    }

    #[test]
    fn rejects_overlapping_terminal_and_obstacle_test() {
        let result = GridModel::new(
            2,
            2,
            vec![(Cell::new(0, 0), 1.0)],
            vec![Cell::new(0, 0)],
            Cell::new(1, 1),
            0.0,
        );
        assert!(matches!(
            result,
            Err(Error::TerminalObstacleOverlap { row: 0, col: 0 })
        ));
    }

    #[test]
    fn rejects_out_of_bounds_cells_test() {
        let result = GridModel::new(2, 2, vec![(Cell::new(2, 0), 1.0)], vec![], Cell::new(0, 0), 0.0);
        match result {
            Err(error @ Error::CellOutsideGrid { row: 2, col: 0, .. }) => assert_eq!(
                error.to_string(),
                "terminal cell (row 2, col 0) lies outside the 2x2 grid"
            ),
            other => panic!("unexpected result {:?}", other),
        }

        let result = GridModel::new(2, 2, vec![], vec![Cell::new(1, 1)], Cell::new(1, 1), 0.0);
        assert!(matches!(result, Err(Error::StartOnObstacle { .. })));

        let result = GridModel::new(0, 2, vec![], vec![], Cell::new(0, 0), 0.0);
        assert!(matches!(result, Err(Error::EmptyGrid { .. })));
    }

    #[test]
    fn cells_are_row_major_test() {
        let grid = corridor();
        let cells: Vec<Cell> = grid.cells().collect();
        assert_eq!(cells.len(), 6);
        assert_eq!(cells[0], Cell::new(0, 0));
        assert_eq!(cells[3], Cell::new(1, 0));
        assert_eq!(grid.terminal_reward(Cell::new(0, 2)), Some(1.0));
        assert_eq!(grid.terminal_reward(Cell::new(0, 1)), None);
    }
}
