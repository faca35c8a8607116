use rand::Rng;

use crate::gridworld::{Cell, Direction, GridModel};

// One possible destination of a move and the probability of reaching it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Outcome {
    pub cell: Cell,
    pub probability: f64,
}

// Stochastic "intended direction" movement: the agent goes where it intended
// with probability 1 - noise and slips to either perpendicular side with
// probability noise / 2 each.
#[derive(Clone, Copy, Debug)]
pub struct TransitionModel<'a> {
    grid: &'a GridModel,
    noise: f64,
}

impl<'a> TransitionModel<'a> {
    pub fn new(grid: &'a GridModel, noise: f64) -> Self {
        TransitionModel {
            grid: grid,
            noise: noise,
        }
    }

    pub fn grid(&self) -> &'a GridModel {
        self.grid
    }

    // Returns forward, right and left outcomes, in that order.
    pub fn outcomes(&self, cell: Cell, direction: Direction) -> [Outcome; 3] {
        let slip = self.noise / 2.0;
        [
            Outcome {
                cell: self.grid.neighbour(cell, direction),
                probability: 1.0 - self.noise,
            },
            Outcome {
                cell: self.grid.neighbour(cell, direction.clockwise()),
                probability: slip,
            },
            Outcome {
                cell: self.grid.neighbour(cell, direction.counter_clockwise()),
                probability: slip,
            },
        ]
    }

    // Draws a single outcome: the first one whose cumulative probability
    // exceeds a uniform draw from [0, 1).
    pub fn sample<R: Rng + ?Sized>(&self, cell: Cell, direction: Direction, rng: &mut R) -> Cell {
        let outcomes = self.outcomes(cell, direction);
        let draw = rng.gen::<f64>();

        let mut cumulative = 0.0;
        for outcome in outcomes.iter() {
            cumulative += outcome.probability;
            if draw < cumulative {
                return outcome.cell;
            }
        }

        // Rounding can leave the cumulative sum a hair under 1.
        outcomes[2].cell
    }
}
