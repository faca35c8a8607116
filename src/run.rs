use std::rc::Rc;

use rand::Rng;
use tracing::info;

use crate::config::Problem;
use crate::query::{Query, QueryAnswer, QuerySnapshotCache};
use crate::solver::q_learning::{QLearningSolver, QSnapshot};
use crate::solver::value_iteration::{ValueIterationSolver, ValueSnapshot};

pub struct Solution {
    pub values: Rc<ValueSnapshot>,
    pub q_values: Rc<QSnapshot>,
    // Largest value change of each value-iteration sweep.
    pub deltas: Vec<f64>,
    pub answers: Vec<QueryAnswer>,
}

// Runs value iteration, then Q-learning, then answers the queries whose
// snapshots were cached along the way. All randomness comes from `rng`.
pub fn solve<R: Rng + ?Sized>(
    problem: &Problem,
    queries: Vec<Query>,
    max_steps: Option<usize>,
    rng: &mut R,
) -> Solution {
    let mut cache = QuerySnapshotCache::new(queries);
    let mut deltas = Vec::with_capacity(problem.sweeps);

    let value_solver = ValueIterationSolver::new(&problem.grid, problem.noise, problem.discount);
    let values = value_solver.solve(problem.sweeps, |sweep, snapshot| {
        deltas.push(snapshot.max_delta());
        cache.record_values(sweep, snapshot);
    });

    let q_solver = QLearningSolver::new(&problem.grid, problem.noise, problem.discount, problem.alpha)
        .with_max_steps(max_steps);
    let q_values = q_solver.solve(problem.episodes, rng, |episode, snapshot| {
        cache.record_q_values(episode, snapshot);
    });

    let answers = cache.answer(rng);
    info!(
        queries = cache.queries().len(),
        cached = cache.cached_count(),
        answered = answers.len(),
        "queries answered"
    );

    Solution {
        values: values,
        q_values: q_values,
        deltas: deltas,
        answers: answers,
    }
}
