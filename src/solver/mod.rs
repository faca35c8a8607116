pub mod policy;
pub mod q_learning;
pub mod value_iteration;

use std::ops::{Index, IndexMut};

use serde::Serialize;

use crate::gridworld::transition::TransitionModel;
use crate::gridworld::{Cell, Direction};

// One value per direction, indexed by `Direction`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct DirectionValues {
    values: [f64; 4],
}

impl DirectionValues {
    #[cfg(test)]
    pub fn new(north: f64, east: f64, west: f64, south: f64) -> Self {
        DirectionValues {
            values: [north, east, west, south],
        }
    }

    pub fn max(&self) -> f64 {
        self.values
            .iter()
            .fold(f64::NEG_INFINITY, |a, b| a.max(*b))
    }

    // Pairs in `Direction::ALL` order.
    pub fn iter(&self) -> impl Iterator<Item = (Direction, f64)> + '_ {
        Direction::ALL
            .iter()
            .map(move |direction| (*direction, self.values[direction.index()]))
    }
}

impl Index<Direction> for DirectionValues {
    type Output = f64;

    fn index(&self, direction: Direction) -> &f64 {
        &self.values[direction.index()]
    }
}

impl IndexMut<Direction> for DirectionValues {
    fn index_mut(&mut self, direction: Direction) -> &mut f64 {
        &mut self.values[direction.index()]
    }
}

// Returns the expected return of moving in `direction` from `cell`:
//   ∑ p(s')∙(r + γ∙V(s'))
// Every transition pays the step cost; terminal rewards enter through V.
pub fn get_action_value<V>(
    transitions: &TransitionModel,
    cell: Cell,
    direction: Direction,
    discount: f64,
    state_value: V,
) -> f64
where
    V: Fn(Cell) -> f64,
{
    let reward = transitions.grid().step_cost();
    transitions
        .outcomes(cell, direction)
        .iter()
        .map(|outcome| outcome.probability * (reward + discount * state_value(outcome.cell)))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gridworld::GridModel;
    use float_eq::*;

    #[test]
    fn direction_values_indexing_test() {
        let mut values = DirectionValues::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(values[Direction::West], 3.0);
        values[Direction::North] = 9.0;
        assert_eq!(values.max(), 9.0);

        let order: Vec<Direction> = values.iter().map(|(d, _)| d).collect();
        assert_eq!(order, Direction::ALL.to_vec());
    }

    #[test]
    fn action_value_weights_outcomes_test() {
        let grid = GridModel::new(3, 1, vec![(Cell::new(0, 2), 1.0)], vec![], Cell::new(0, 0), -0.1)
            .unwrap();
        let transitions = TransitionModel::new(&grid, 0.2);

        // East from the middle: 0.8 forward into the terminal, 0.1 + 0.1 bounce off the walls.
        let value = get_action_value(&transitions, Cell::new(0, 1), Direction::East, 0.5, |c| {
            grid.terminal_reward(c).unwrap_or(0.0)
        });
        assert_float_eq!(value, 0.8 * (-0.1 + 0.5) + 0.2 * -0.1, abs <= 1e-12);
    }
}
