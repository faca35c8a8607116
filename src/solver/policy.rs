use rand::prelude::*;

use crate::gridworld::Direction;
use crate::solver::DirectionValues;

// Greedy action over per-direction values. Directions that share the maximum
// (exact floating-point equality) are equally likely to be picked.
pub fn best_action<R: Rng + ?Sized>(values: &DirectionValues, rng: &mut R) -> Direction {
    let max_value = values.max();

    // Find the actions with max action value (can be multiple!).
    let greedy_actions: Vec<Direction> = values
        .iter()
        .filter(|(_, v)| *v == max_value)
        .map(|(d, _)| d)
        .collect();

    // Only empty when every value is NaN.
    greedy_actions
        .choose(rng)
        .copied()
        .unwrap_or(Direction::North)
}
