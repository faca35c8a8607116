use std::rc::Rc;

use nalgebra::DMatrix;
use tracing::{debug, info};

use crate::gridworld::transition::TransitionModel;
use crate::gridworld::{Cell, Direction, GridModel};
use crate::solver::get_action_value;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ValueCell {
    // `action` is the direction that achieved `value`; None before the first sweep.
    Open {
        value: f64,
        action: Option<Direction>,
    },
    Terminal(f64),
    Obstacle,
}

impl ValueCell {
    pub fn value(&self) -> f64 {
        match self {
            ValueCell::Open { value, .. } => *value,
            ValueCell::Terminal(reward) => *reward,
            ValueCell::Obstacle => 0.0,
        }
    }
}

// State values after one sweep. Published snapshots are never modified.
#[derive(Clone, Debug, PartialEq)]
pub struct ValueSnapshot {
    cells: DMatrix<ValueCell>,
    // Largest absolute change of any cell relative to the previous snapshot.
    max_delta: f64,
}

impl ValueSnapshot {
    // All-zero values with terminals pre-seeded to their reward.
    pub fn initial(grid: &GridModel) -> Self {
        let cells = DMatrix::from_fn(grid.height(), grid.width(), |row, col| {
            let cell = Cell::new(row, col);
            match grid.terminal_reward(cell) {
                Some(reward) => ValueCell::Terminal(reward),
                None if grid.is_obstacle(cell) => ValueCell::Obstacle,
                None => ValueCell::Open {
                    value: 0.0,
                    action: None,
                },
            }
        });
        ValueSnapshot {
            cells: cells,
            max_delta: 0.0,
        }
    }

    // (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        self.cells.shape()
    }

    pub fn cell(&self, cell: Cell) -> &ValueCell {
        &self.cells[(cell.row, cell.col)]
    }

    pub fn value(&self, cell: Cell) -> f64 {
        self.cell(cell).value()
    }

    // Direction chosen by the sweep that produced this snapshot.
    pub fn action(&self, cell: Cell) -> Option<Direction> {
        match self.cell(cell) {
            ValueCell::Open { action, .. } => *action,
            _ => None,
        }
    }

    pub fn max_delta(&self) -> f64 {
        self.max_delta
    }
}

pub struct ValueIterationSolver<'a> {
    grid: &'a GridModel,
    transitions: TransitionModel<'a>,
    discount: f64,
}

impl<'a> ValueIterationSolver<'a> {
    pub fn new(grid: &'a GridModel, noise: f64, discount: f64) -> Self {
        ValueIterationSolver {
            grid: grid,
            transitions: TransitionModel::new(grid, noise),
            discount: discount,
        }
    }

    // Maximum expected return over all directions. Ties keep the first
    // direction in `Direction::ALL` order.
    pub fn best_action(&self, prev: &ValueSnapshot, cell: Cell) -> (Direction, f64) {
        let mut best = (Direction::North, f64::NEG_INFINITY);
        for direction in Direction::ALL.iter() {
            let action_value =
                get_action_value(&self.transitions, cell, *direction, self.discount, |c| {
                    prev.value(c)
                });
            if action_value > best.1 {
                best = (*direction, action_value);
            }
        }
        best
    }

    // Performs a single synchronous Bellman backup over every open cell.
    pub fn sweep(&self, prev: &ValueSnapshot) -> ValueSnapshot {
        let mut next = ValueSnapshot::initial(self.grid);
        let mut max_delta: f64 = 0.0;

        for cell in self.grid.cells() {
            if self.grid.is_terminal(cell) || self.grid.is_obstacle(cell) {
                continue;
            }

            let (action, value) = self.best_action(prev, cell);
            max_delta = max_delta.max((value - prev.value(cell)).abs());
            next.cells[(cell.row, cell.col)] = ValueCell::Open {
                value: value,
                action: Some(action),
            };
        }

        next.max_delta = max_delta;
        next
    }

    // Runs `sweeps` sweeps and hands every snapshot, with its 0-based sweep
    // number, to `publish`. Returns the last snapshot.
    pub fn solve<F>(&self, sweeps: usize, mut publish: F) -> Rc<ValueSnapshot>
    where
        F: FnMut(usize, &Rc<ValueSnapshot>),
    {
        let mut snapshot = Rc::new(ValueSnapshot::initial(self.grid));
        for sweep in 0..sweeps {
            snapshot = Rc::new(self.sweep(&snapshot));
            debug!(sweep, max_delta = snapshot.max_delta(), "value iteration sweep");
            publish(sweep, &snapshot);
        }

        info!(sweeps, "value iteration finished");
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::*;

    fn corridor() -> GridModel {
        GridModel::new(
            3,
            1,
            vec![(Cell::new(0, 2), 1.0)],
            vec![],
            Cell::new(0, 0),
            -0.04,
        )
        .unwrap()
    }

    // Classic 4x3 world: +1 top right, -1 below it, obstacle in the middle.
    fn classic() -> GridModel {
        GridModel::new(
            4,
            3,
            vec![(Cell::new(0, 3), 1.0), (Cell::new(1, 3), -1.0)],
            vec![Cell::new(1, 1)],
            Cell::new(2, 0),
            0.0,
        )
        .unwrap()
    }

    fn run(grid: &GridModel, noise: f64, discount: f64, sweeps: usize) -> Vec<Rc<ValueSnapshot>> {
        let solver = ValueIterationSolver::new(grid, noise, discount);
        let mut snapshots = Vec::new();
        solver.solve(sweeps, |_, s| snapshots.push(Rc::clone(s)));
        snapshots
    }

    #[test]
    fn retained_action_reflects_previous_values_test() {
        let grid = corridor();
        let snapshots = run(&grid, 0.0, 1.0, 2);
        let start = Cell::new(0, 0);

        // Sweep 0 reads an all-zero neighbourhood around the start, so every
        // direction ties and North is kept even though East now leads to 0.96.
        assert_eq!(snapshots[0].action(start), Some(Direction::North));
        assert_float_eq!(snapshots[0].value(Cell::new(0, 1)), 0.96, abs <= 1e-12);
        assert_eq!(snapshots[1].action(start), Some(Direction::East));
    }

    #[test]
    fn corridor_without_noise_test() {
        let grid = corridor();
        let snapshots = run(&grid, 0.0, 1.0, 2);
        assert_eq!(snapshots.len(), 2);

        // The terminal is seeded before the first sweep, so its reward is
        // visible to its neighbour straight away.
        assert_float_eq!(snapshots[0].value(Cell::new(0, 1)), 0.96, abs <= 1e-12);
        assert_float_eq!(snapshots[0].value(Cell::new(0, 0)), -0.04, abs <= 1e-12);
        assert_float_eq!(snapshots[1].value(Cell::new(0, 1)), 0.96, abs <= 1e-12);
        assert_float_eq!(snapshots[1].value(Cell::new(0, 0)), 0.92, abs <= 1e-12);

        assert_eq!(snapshots[1].action(Cell::new(0, 0)), Some(Direction::East));
        assert_eq!(snapshots[1].action(Cell::new(0, 1)), Some(Direction::East));
        assert_eq!(snapshots[1].action(Cell::new(0, 2)), None);
    }

    #[test]
    fn terminals_never_change_test() {
        let grid = classic();
        for snapshot in run(&grid, 0.2, 0.9, 25) {
            assert_eq!(snapshot.value(Cell::new(0, 3)), 1.0);
            assert_eq!(snapshot.value(Cell::new(1, 3)), -1.0);
            assert_eq!(*snapshot.cell(Cell::new(1, 1)), ValueCell::Obstacle);
            assert_eq!(snapshot.action(Cell::new(1, 1)), None);
        }
    }

    #[test]
    fn runs_are_bit_identical_test() {
        let grid = classic();
        let first = run(&grid, 0.2, 0.9, 10);
        let second = run(&grid, 0.2, 0.9, 10);
        assert_eq!(first, second);
    }

    #[test]
    fn classic_world_converges_test() {
        let grid = classic();
        let snapshots = run(&grid, 0.2, 0.9, 100);
        let last = snapshots.last().unwrap();

        assert!(last.max_delta() < 1e-6);
        // Well-known fixed point of the 4x3 world with γ = 0.9, noise = 0.2.
        assert_float_eq!(last.value(Cell::new(0, 2)), 0.8478, abs <= 1e-3);
        assert_float_eq!(last.value(Cell::new(2, 0)), 0.4907, abs <= 1e-3);
        assert_eq!(last.action(Cell::new(0, 2)), Some(Direction::East));
        assert_eq!(last.action(Cell::new(2, 0)), Some(Direction::North));
        // The cell next to the -1 terminal prefers to go around it.
        assert_eq!(last.action(Cell::new(1, 2)), Some(Direction::North));
    }

    #[test]
    fn ties_keep_enumeration_order_test() {
        // No rewards anywhere: every direction is worth the same.
        let grid = GridModel::new(2, 2, vec![], vec![], Cell::new(0, 0), 0.0).unwrap();
        let snapshots = run(&grid, 0.1, 0.9, 3);
        for cell in grid.cells() {
            assert_eq!(snapshots[2].action(cell), Some(Direction::North));
        }
    }

    #[test]
    fn zero_sweeps_publish_nothing_test() {
        let grid = corridor();
        let solver = ValueIterationSolver::new(&grid, 0.0, 1.0);
        let mut published = 0;
        let last = solver.solve(0, |_, _| published += 1);
        assert_eq!(published, 0);
        assert_eq!(last.value(Cell::new(0, 2)), 1.0);
    }
}
