use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::gridworld::{Cell, GridModel};
use crate::query::{Method, Query, QueryKind};

// Everything the solvers need, read from a grid description file.
#[derive(Clone, Debug)]
pub struct Problem {
    pub grid: GridModel,
    // Number of value-iteration sweeps (`K`).
    pub sweeps: usize,
    pub episodes: usize,
    pub discount: f64,
    pub alpha: f64,
    pub noise: f64,
}

#[derive(Default)]
struct RawProblem {
    width: Option<usize>,
    height: Option<usize>,
    // (x, y, reward) in file coordinates.
    terminals: Vec<(usize, usize, f64)>,
    obstacles: Vec<(usize, usize)>,
    start: Option<(usize, usize)>,
    sweeps: Option<usize>,
    episodes: Option<usize>,
    discount: Option<f64>,
    alpha: Option<f64>,
    noise: Option<f64>,
    step_cost: Option<f64>,
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.display().to_string(),
        source,
    })
}

pub fn load_problem(path: &Path) -> Result<Problem> {
    parse_problem(&read(path)?)
}

pub fn load_queries(path: &Path, height: usize, width: usize) -> Result<Vec<Query>> {
    parse_queries(&read(path)?, height, width)
}

fn parse_scalar<T: std::str::FromStr>(field: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| Error::InvalidNumber {
        field: field.to_string(),
        value: value.trim().to_string(),
    })
}

// Pulls every number out of a braced list such as `{0={3,2,1},1={3,1,-1}}`.
fn extract_numbers(field: &str, value: &str) -> Result<Vec<f64>> {
    value
        .split(|c: char| !(c.is_ascii_digit() || c == '-' || c == '.'))
        .filter(|token| !token.is_empty())
        .map(|token| parse_scalar(field, token))
        .collect()
}

fn as_coordinate(field: &str, value: f64) -> Result<usize> {
    if value < 0.0 || value.fract() != 0.0 {
        return Err(Error::MalformedEntry {
            field: field.to_string(),
            message: format!("{} is not a valid coordinate", value),
        });
    }
    Ok(value as usize)
}

// Splits a list into fixed-size entries, each led by an index that is ignored.
fn entries(field: &str, numbers: &[f64], size: usize) -> Result<Vec<Vec<f64>>> {
    if numbers.len() % size != 0 {
        return Err(Error::MalformedEntry {
            field: field.to_string(),
            message: format!(
                "expected groups of {} numbers (index and values), got {} numbers",
                size,
                numbers.len()
            ),
        });
    }
    Ok(numbers.chunks(size).map(|chunk| chunk[1..].to_vec()).collect())
}

fn check_unit_interval(name: &'static str, value: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(Error::ParameterOutOfRange { name, value })
    }
}

// Converts file coordinates (x right, y up from the bottom row) to an
// internal cell (row 0 at the top).
pub fn flip(what: &str, x: usize, y: usize, width: usize, height: usize) -> Result<Cell> {
    if x >= width || y >= height {
        return Err(Error::CellOutOfBounds {
            what: what.to_string(),
            x: x as i64,
            y: y as i64,
            width,
            height,
        });
    }
    Ok(Cell::new(height - 1 - y, x))
}

pub fn parse_problem(text: &str) -> Result<Problem> {
    let mut raw = RawProblem::default();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = match line.split_once('=') {
            Some(pair) => pair,
            None => {
                warn!(line, "ignoring line without '='");
                continue;
            }
        };

        match key.trim().to_lowercase().as_str() {
            "horizontal" => raw.width = Some(parse_scalar("Horizontal", value)?),
            "vertical" => raw.height = Some(parse_scalar("Vertical", value)?),
            "terminal" => {
                let numbers = extract_numbers("Terminal", value)?;
                for entry in entries("Terminal", &numbers, 4)? {
                    raw.terminals.push((
                        as_coordinate("Terminal", entry[0])?,
                        as_coordinate("Terminal", entry[1])?,
                        entry[2],
                    ));
                }
            }
            "boulder" => {
                let numbers = extract_numbers("Boulder", value)?;
                for entry in entries("Boulder", &numbers, 3)? {
                    raw.obstacles.push((
                        as_coordinate("Boulder", entry[0])?,
                        as_coordinate("Boulder", entry[1])?,
                    ));
                }
            }
            "robotstartstate" => {
                let numbers = extract_numbers("RobotStartState", value)?;
                if numbers.len() != 2 {
                    return Err(Error::MalformedEntry {
                        field: "RobotStartState".to_string(),
                        message: format!("expected {{x,y}}, got {} numbers", numbers.len()),
                    });
                }
                raw.start = Some((
                    as_coordinate("RobotStartState", numbers[0])?,
                    as_coordinate("RobotStartState", numbers[1])?,
                ));
            }
            "k" => raw.sweeps = Some(parse_scalar("K", value)?),
            "episodes" => raw.episodes = Some(parse_scalar("Episodes", value)?),
            "discount" => raw.discount = Some(parse_scalar("Discount", value)?),
            "alpha" => raw.alpha = Some(parse_scalar("Alpha", value)?),
            "noise" => raw.noise = Some(parse_scalar("Noise", value)?),
            "transitioncost" => raw.step_cost = Some(parse_scalar("TransitionCost", value)?),
            other => warn!(key = other, "ignoring unknown configuration key"),
        }
    }

    raw.into_problem()
}

impl RawProblem {
    fn into_problem(self) -> Result<Problem> {
        let width = self.width.ok_or(Error::MissingField { field: "Horizontal" })?;
        let height = self.height.ok_or(Error::MissingField { field: "Vertical" })?;
        let start = self.start.ok_or(Error::MissingField { field: "RobotStartState" })?;
        let sweeps = self.sweeps.ok_or(Error::MissingField { field: "K" })?;
        let episodes = self.episodes.ok_or(Error::MissingField { field: "Episodes" })?;
        let discount = self.discount.ok_or(Error::MissingField { field: "Discount" })?;
        let alpha = self.alpha.ok_or(Error::MissingField { field: "Alpha" })?;
        let noise = self.noise.ok_or(Error::MissingField { field: "Noise" })?;
        let step_cost = self.step_cost.ok_or(Error::MissingField { field: "TransitionCost" })?;

        if width == 0 || height == 0 {
            return Err(Error::EmptyGrid { width, height });
        }

        let terminals = self
            .terminals
            .iter()
            .map(|(x, y, reward)| -> Result<(Cell, f64)> {
                Ok((flip("terminal", *x, *y, width, height)?, *reward))
            })
            .collect::<Result<Vec<_>>>()?;
        let obstacles = self
            .obstacles
            .iter()
            .map(|(x, y)| flip("boulder", *x, *y, width, height))
            .collect::<Result<Vec<_>>>()?;
        let start = flip("start", start.0, start.1, width, height)?;

        let grid = GridModel::new(width, height, terminals, obstacles, start, step_cost)?;
        info!(
            width,
            height,
            terminals = grid.terminal_count(),
            obstacles = grid.obstacle_count(),
            "loaded grid problem"
        );

        Ok(Problem {
            grid: grid,
            sweeps: sweeps,
            episodes: episodes,
            discount: check_unit_interval("Discount", discount)?,
            alpha: check_unit_interval("Alpha", alpha)?,
            noise: check_unit_interval("Noise", noise)?,
        })
    }
}

// One query per line: `column,row,index,method,kind`.
pub fn parse_queries(text: &str, height: usize, width: usize) -> Result<Vec<Query>> {
    let mut queries = Vec::new();

    for (n, line) in text.lines().enumerate() {
        let line_number = n + 1;
        let fields: Vec<&str> = line.split(',').map(|f| f.trim()).collect();
        if fields.len() != 5 {
            if !line.trim().is_empty() {
                warn!(line = line_number, "skipping query line without five fields");
            }
            continue;
        }

        let invalid = |message: String| Error::InvalidQuery {
            line: line_number,
            message,
        };
        let number = |field: &str| -> Result<usize> {
            field
                .parse()
                .map_err(|_| invalid(format!("'{}' is not a non-negative integer", field)))
        };

        let column = number(fields[0])?;
        let row = number(fields[1])?;
        let index = number(fields[2])?;
        let method: Method = fields[3].parse().map_err(invalid)?;
        let kind: QueryKind = fields[4].parse().map_err(invalid)?;
        let cell = flip("query", column, row, width, height)?;

        queries.push(Query {
            column,
            row,
            cell,
            index,
            method,
            kind,
        });
    }

    Ok(queries)
}
