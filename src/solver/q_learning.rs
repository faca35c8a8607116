use std::rc::Rc;

use nalgebra::DMatrix;
use rand::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::gridworld::transition::TransitionModel;
use crate::gridworld::{Cell, Direction, GridModel};
use crate::solver::policy::best_action;
use crate::solver::DirectionValues;

// Probability of taking a uniformly random action instead of the greedy one.
pub const EXPLORATION_FRACTION: f64 = 0.2;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum QCell {
    Open(DirectionValues),
    // A terminal has no directional values, only its reward.
    Terminal(f64),
    Obstacle,
}

impl QCell {
    pub fn q_value(&self, direction: Direction) -> f64 {
        match self {
            QCell::Open(values) => values[direction],
            QCell::Terminal(reward) => *reward,
            QCell::Obstacle => 0.0,
        }
    }

    // max_a Q(s, a), or the reward of a terminal.
    pub fn value(&self) -> f64 {
        match self {
            QCell::Open(values) => values.max(),
            QCell::Terminal(reward) => *reward,
            QCell::Obstacle => 0.0,
        }
    }
}

// Q-table at the end of an episode. Published snapshots are never modified.
#[derive(Clone, Debug, PartialEq)]
pub struct QSnapshot {
    cells: DMatrix<QCell>,
}

impl QSnapshot {
    pub fn initial(grid: &GridModel) -> Self {
        let cells = DMatrix::from_fn(grid.height(), grid.width(), |row, col| {
            let cell = Cell::new(row, col);
            match grid.terminal_reward(cell) {
                Some(reward) => QCell::Terminal(reward),
                None if grid.is_obstacle(cell) => QCell::Obstacle,
                None => QCell::Open(DirectionValues::default()),
            }
        });
        QSnapshot { cells: cells }
    }

    // (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        self.cells.shape()
    }

    pub fn cell(&self, cell: Cell) -> &QCell {
        &self.cells[(cell.row, cell.col)]
    }

    #[cfg(test)]
    pub fn q_value(&self, cell: Cell, direction: Direction) -> f64 {
        self.cell(cell).q_value(direction)
    }

    pub fn best_q_value(&self, cell: Cell) -> f64 {
        self.cell(cell).value()
    }

    // Greedy action with random tie-breaking. None for terminals and obstacles.
    pub fn best_action<R: Rng + ?Sized>(&self, cell: Cell, rng: &mut R) -> Option<Direction> {
        match self.cell(cell) {
            QCell::Open(values) => Some(best_action(values, rng)),
            _ => None,
        }
    }
}

pub struct QLearningSolver<'a> {
    grid: &'a GridModel,
    transitions: TransitionModel<'a>,
    discount: f64,
    alpha: f64,
    exploration_fraction: f64,
    // Episodes run until a terminal is reached unless a cap is set.
    max_steps: Option<usize>,
}

impl<'a> QLearningSolver<'a> {
    pub fn new(grid: &'a GridModel, noise: f64, discount: f64, alpha: f64) -> Self {
        QLearningSolver {
            grid: grid,
            transitions: TransitionModel::new(grid, noise),
            discount: discount,
            alpha: alpha,
            exploration_fraction: EXPLORATION_FRACTION,
            max_steps: None,
        }
    }

    pub fn with_max_steps(mut self, max_steps: Option<usize>) -> Self {
        self.max_steps = max_steps;
        self
    }

    #[cfg(test)]
    pub fn with_exploration(mut self, exploration_fraction: f64) -> Self {
        self.exploration_fraction = exploration_fraction;
        self
    }

    // ε-greedy: a random direction with probability ε, otherwise the greedy one.
    pub fn choose_action<R: Rng + ?Sized>(&self, values: &DirectionValues, rng: &mut R) -> Direction {
        if rng.gen::<f64>() < self.exploration_fraction {
            Direction::ALL[rng.gen_range(0..Direction::ALL.len())]
        } else {
            best_action(values, rng)
        }
    }

    // Simulates one episode from the start cell on a private copy of `prev`.
    // Returns the updated table and the number of steps taken.
    pub fn run_episode<R: Rng + ?Sized>(&self, prev: &QSnapshot, rng: &mut R) -> (QSnapshot, usize) {
        let mut table = prev.clone();
        let mut state = self.grid.start();
        let mut steps = 0;

        loop {
            let values = match table.cell(state) {
                QCell::Open(values) => *values,
                _ => break,
            };
            if let Some(max_steps) = self.max_steps {
                if steps >= max_steps {
                    warn!(max_steps, "episode truncated before reaching a terminal");
                    break;
                }
            }

            let action = self.choose_action(&values, rng);
            let new_state = self.transitions.sample(state, action, rng);

            // Update Q(S, A):
            //   Q(S, A) ← (1 - α)∙Q(S, A) + α∙[R + γ∙max_a Q(S₊₁, a)],
            // where a terminal S₊₁ contributes its reward instead of the max.
            let sample = self.grid.step_cost() + self.discount * table.cell(new_state).value();
            let updated = (1.0 - self.alpha) * values[action] + self.alpha * sample;
            if let QCell::Open(current) = &mut table.cells[(state.row, state.col)] {
                current[action] = updated;
            }

            state = new_state;
            steps += 1;
        }

        (table, steps)
    }

    // Runs `episodes` episodes in sequence, each starting from the table the
    // previous one produced, and hands every snapshot with its 0-based episode
    // number to `publish`. Returns the last snapshot.
    pub fn solve<R, F>(&self, episodes: usize, rng: &mut R, mut publish: F) -> Rc<QSnapshot>
    where
        R: Rng + ?Sized,
        F: FnMut(usize, &Rc<QSnapshot>),
    {
        let mut snapshot = Rc::new(QSnapshot::initial(self.grid));
        for episode in 0..episodes {
            let (table, steps) = self.run_episode(&snapshot, rng);
            snapshot = Rc::new(table);
            debug!(episode, steps, "q-learning episode");
            publish(episode, &snapshot);
        }

        info!(episodes, "q-learning finished");
        snapshot
    }
}
