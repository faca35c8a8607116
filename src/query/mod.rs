use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use rand::Rng;
use serde::Serialize;
use tracing::warn;

use crate::gridworld::{Cell, Direction};
use crate::solver::q_learning::{QCell, QSnapshot};
use crate::solver::value_iteration::{ValueCell, ValueSnapshot};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub enum Method {
    #[serde(rename = "MDP")]
    Mdp,
    #[serde(rename = "RL")]
    Rl,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryKind {
    StateValue,
    BestPolicy,
    BestQValue,
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MDP" => Ok(Method::Mdp),
            "RL" => Ok(Method::Rl),
            _ => Err(format!("unknown method '{}' (expected MDP or RL)", s)),
        }
    }
}

impl FromStr for QueryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stateValue" => Ok(QueryKind::StateValue),
            "bestPolicy" => Ok(QueryKind::BestPolicy),
            "bestQValue" => Ok(QueryKind::BestQValue),
            _ => Err(format!(
                "unknown query kind '{}' (expected stateValue, bestPolicy or bestQValue)",
                s
            )),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Mdp => "MDP",
            Method::Rl => "RL",
        })
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueryKind::StateValue => "stateValue",
            QueryKind::BestPolicy => "bestPolicy",
            QueryKind::BestQValue => "bestQValue",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Query {
    // Coordinates as written in the query file (bottom-left origin).
    pub column: usize,
    pub row: usize,
    #[serde(skip)]
    pub cell: Cell,
    // 0-based sweep or episode number.
    pub index: usize,
    pub method: Method,
    pub kind: QueryKind,
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}, {}",
            self.column, self.row, self.index, self.method, self.kind
        )
    }
}

#[derive(Clone, Debug)]
pub enum Snapshot {
    Values(Rc<ValueSnapshot>),
    QValues(Rc<QSnapshot>),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Answer {
    Value(f64),
    Action(Direction),
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Value(v) => write!(f, "{}", v),
            Answer::Action(d) => write!(f, "{}", d),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct QueryAnswer {
    pub query: Query,
    pub answer: Answer,
    #[serde(skip)]
    pub snapshot: Snapshot,
}

// Keeps only the snapshots that some query asks for. A query whose index is
// never reached simply has no entry.
pub struct QuerySnapshotCache {
    queries: Vec<Query>,
    // (query position, snapshot), in caching order.
    values: Vec<(usize, Rc<ValueSnapshot>)>,
    q_values: Vec<(usize, Rc<QSnapshot>)>,
}

impl QuerySnapshotCache {
    pub fn new(queries: Vec<Query>) -> Self {
        QuerySnapshotCache {
            queries: queries,
            values: Vec::new(),
            q_values: Vec::new(),
        }
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    fn matching(&self, method: Method, index: usize) -> Vec<usize> {
        self.queries
            .iter()
            .enumerate()
            .filter(|(_, q)| q.method == method && q.index == index)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn record_values(&mut self, index: usize, snapshot: &Rc<ValueSnapshot>) {
        for i in self.matching(Method::Mdp, index) {
            self.values.push((i, Rc::clone(snapshot)));
        }
    }

    pub fn record_q_values(&mut self, index: usize, snapshot: &Rc<QSnapshot>) {
        for i in self.matching(Method::Rl, index) {
            self.q_values.push((i, Rc::clone(snapshot)));
        }
    }

    pub fn cached_count(&self) -> usize {
        self.values.len() + self.q_values.len()
    }

    // Answers every cached query: value-iteration queries first, then
    // Q-learning queries, each in the order they were cached.
    pub fn answer<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<QueryAnswer> {
        let mut answers = Vec::new();

        for (i, snapshot) in self.values.iter() {
            let query = &self.queries[*i];
            if let Some(answer) = answer_values(query, snapshot) {
                answers.push(QueryAnswer {
                    query: query.clone(),
                    answer: answer,
                    snapshot: Snapshot::Values(Rc::clone(snapshot)),
                });
            }
        }

        for (i, snapshot) in self.q_values.iter() {
            let query = &self.queries[*i];
            if let Some(answer) = answer_q_values(query, snapshot, rng) {
                answers.push(QueryAnswer {
                    query: query.clone(),
                    answer: answer,
                    snapshot: Snapshot::QValues(Rc::clone(snapshot)),
                });
            }
        }

        answers
    }
}

fn answer_values(query: &Query, snapshot: &ValueSnapshot) -> Option<Answer> {
    let answer = match (query.kind, snapshot.cell(query.cell)) {
        (_, ValueCell::Obstacle) => None,
        (QueryKind::StateValue, cell) => Some(Answer::Value(cell.value())),
        (QueryKind::BestPolicy, _) => snapshot.action(query.cell).map(Answer::Action),
        (QueryKind::BestQValue, _) => None,
    };
    if answer.is_none() {
        warn!(query = %query, "query has no answer");
    }
    answer
}

fn answer_q_values<R: Rng + ?Sized>(query: &Query, snapshot: &QSnapshot, rng: &mut R) -> Option<Answer> {
    let answer = match (query.kind, snapshot.cell(query.cell)) {
        (_, QCell::Obstacle) => None,
        (QueryKind::BestQValue, _) => Some(Answer::Value(snapshot.best_q_value(query.cell))),
        (QueryKind::BestPolicy, _) => snapshot.best_action(query.cell, rng).map(Answer::Action),
        (QueryKind::StateValue, _) => None,
    };
    if answer.is_none() {
        warn!(query = %query, "query has no answer");
    }
    answer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gridworld::GridModel;
    use crate::solver::q_learning::QLearningSolver;
    use crate::solver::value_iteration::ValueIterationSolver;
    use float_eq::*;
    use rand::prelude::*;

    fn corridor() -> GridModel {
        GridModel::new(
            4,
            1,
            vec![(Cell::new(0, 3), 1.0)],
            vec![Cell::new(0, 1)],
            Cell::new(0, 0),
            -0.04,
        )
        .unwrap()
    }

    fn query(col: usize, index: usize, method: Method, kind: QueryKind) -> Query {
        Query {
            column: col,
            row: 0,
            cell: Cell::new(0, col),
            index: index,
            method: method,
            kind: kind,
        }
    }

    fn solve_values(grid: &GridModel, cache: &mut QuerySnapshotCache, sweeps: usize) {
        let solver = ValueIterationSolver::new(grid, 0.0, 1.0);
        solver.solve(sweeps, |i, s| cache.record_values(i, s));
    }

    #[test]
    fn only_matching_snapshots_are_kept_test() {
        let grid = corridor();
        let mut cache = QuerySnapshotCache::new(vec![
            query(2, 0, Method::Mdp, QueryKind::StateValue),
            query(2, 1, Method::Mdp, QueryKind::StateValue),
            query(2, 1, Method::Rl, QueryKind::BestQValue),
        ]);
        solve_values(&grid, &mut cache, 2);

        // The RL query is not touched by value iteration.
        assert_eq!(cache.cached_count(), 2);
        let answers = cache.answer(&mut StdRng::seed_from_u64(0));
        assert_eq!(answers.len(), 2);
        assert_float_eq!(
            match answers[0].answer {
                Answer::Value(v) => v,
                _ => f64::NAN,
            },
            0.96,
            abs <= 1e-12
        );
    }

    #[test]
    fn index_past_last_sweep_is_never_answered_test() {
        let grid = corridor();
        let sweeps = 3;
        let mut cache = QuerySnapshotCache::new(vec![
            query(2, sweeps, Method::Mdp, QueryKind::StateValue),
            query(2, sweeps - 1, Method::Mdp, QueryKind::BestPolicy),
        ]);
        solve_values(&grid, &mut cache, sweeps);

        let answers = cache.answer(&mut StdRng::seed_from_u64(0));
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].query.index, sweeps - 1);
        assert_eq!(answers[0].answer, Answer::Action(Direction::East));
    }

    #[test]
    fn unsupported_pairings_and_obstacles_are_unanswered_test() {
        let grid = corridor();
        let mut cache = QuerySnapshotCache::new(vec![
            query(2, 0, Method::Mdp, QueryKind::BestQValue),
            query(1, 0, Method::Mdp, QueryKind::StateValue),
            query(3, 0, Method::Mdp, QueryKind::BestPolicy),
            query(3, 0, Method::Mdp, QueryKind::StateValue),
        ]);
        solve_values(&grid, &mut cache, 1);

        let answers = cache.answer(&mut StdRng::seed_from_u64(0));
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].answer, Answer::Value(1.0));
    }

    #[test]
    fn mdp_answers_come_before_rl_answers_test() {
        let grid = corridor();
        let mut cache = QuerySnapshotCache::new(vec![
            query(0, 4, Method::Rl, QueryKind::BestQValue),
            query(0, 0, Method::Rl, QueryKind::BestPolicy),
            query(0, 0, Method::Mdp, QueryKind::StateValue),
        ]);
        solve_values(&grid, &mut cache, 1);

        let rng = &mut StdRng::seed_from_u64(9);
        let solver = QLearningSolver::new(&grid, 0.0, 0.9, 0.5).with_max_steps(Some(20));
        solver.solve(5, rng, |i, s| cache.record_q_values(i, s));

        let answers = cache.answer(rng);
        let methods: Vec<(Method, usize)> = answers
            .iter()
            .map(|a| (a.query.method, a.query.index))
            .collect();
        assert_eq!(
            methods,
            vec![(Method::Mdp, 0), (Method::Rl, 0), (Method::Rl, 4)]
        );
        assert!(matches!(answers[1].snapshot, Snapshot::QValues(_)));
    }

    #[test]
    fn parses_method_and_kind_test() {
        assert_eq!("MDP".parse::<Method>(), Ok(Method::Mdp));
        assert_eq!("RL".parse::<Method>(), Ok(Method::Rl));
        assert!("rl".parse::<Method>().is_err());
        assert_eq!("bestQValue".parse::<QueryKind>(), Ok(QueryKind::BestQValue));
        assert!("value".parse::<QueryKind>().is_err());
    }
}
