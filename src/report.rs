use std::io::{self, Write};

use plotlib::{
    page::Page,
    repr::Plot,
    style::{PointMarker, PointStyle},
    view::ContinuousView,
};
use prettytable::{Cell, Row, Table};

use crate::error::{Error, Result};
use crate::gridworld::{self, Direction};
use crate::query::{QueryAnswer, Snapshot};
use crate::solver::q_learning::{QCell, QSnapshot};
use crate::solver::value_iteration::{ValueCell, ValueSnapshot};

pub fn format_value_cell(cell: &ValueCell) -> String {
    match cell {
        ValueCell::Open { value, .. } => format!("{:.2}", value),
        ValueCell::Terminal(reward) => format!("T: {:.2}", reward),
        ValueCell::Obstacle => "B".to_string(),
    }
}

pub fn format_q_cell(cell: &QCell) -> String {
    match cell {
        QCell::Open(_) => format!(
            "N: {:.2} E: {:.2} S: {:.2} W: {:.2}",
            cell.q_value(Direction::North),
            cell.q_value(Direction::East),
            cell.q_value(Direction::South),
            cell.q_value(Direction::West)
        ),
        QCell::Terminal(reward) => format!("T: {:.2}", reward),
        QCell::Obstacle => "B".to_string(),
    }
}

fn grid_table<F>(rows: usize, cols: usize, format_cell: F) -> Table
where
    F: Fn(gridworld::Cell) -> String,
{
    let mut table = Table::new();
    for r in 0..rows {
        let mut cells = Vec::new();
        for c in 0..cols {
            cells.push(Cell::new(&format_cell(gridworld::Cell::new(r, c))));
        }
        table.add_row(Row::new(cells));
    }
    table
}

pub fn value_table(snapshot: &ValueSnapshot) -> Table {
    let (rows, cols) = snapshot.shape();
    grid_table(rows, cols, |cell| format_value_cell(snapshot.cell(cell)))
}

pub fn q_table(snapshot: &QSnapshot) -> Table {
    let (rows, cols) = snapshot.shape();
    grid_table(rows, cols, |cell| format_q_cell(snapshot.cell(cell)))
}

// Arrows for the direction each sweep settled on; blank for cells without one.
pub fn policy_table(snapshot: &ValueSnapshot) -> Table {
    let (rows, cols) = snapshot.shape();
    grid_table(rows, cols, |cell| match snapshot.cell(cell) {
        ValueCell::Terminal(_) => "T".to_string(),
        ValueCell::Obstacle => "B".to_string(),
        ValueCell::Open { .. } => snapshot
            .action(cell)
            .map_or(" ", |direction| direction.symbol())
            .to_string(),
    })
}

pub fn write_value_solution<W: Write + ?Sized>(out: &mut W, snapshot: &ValueSnapshot) -> io::Result<()> {
    writeln!(out, "\n-----  MDP SOLUTION  -----\n")?;
    value_table(snapshot).print(out)?;
    policy_table(snapshot).print(out)?;
    Ok(())
}

pub fn write_q_solution<W: Write + ?Sized>(out: &mut W, snapshot: &QSnapshot) -> io::Result<()> {
    writeln!(out, "\n-----  Q-LEARNING SOLUTION  -----\n")?;
    q_table(snapshot).print(out)?;
    Ok(())
}

// Every answered query: the board it was answered from, then `query : answer`.
pub fn write_answers<W: Write + ?Sized>(out: &mut W, answers: &[QueryAnswer]) -> io::Result<()> {
    writeln!(out, "\n\n\nPRINTING QUERY RESULTS\n---------------------------------------")?;
    for answer in answers {
        writeln!(
            out,
            "\nBOARD AT STEP {}\n------------------------------\n",
            answer.query.index
        )?;
        match &answer.snapshot {
            Snapshot::Values(values) => {
                value_table(values).print(out)?;
            }
            Snapshot::QValues(q_values) => {
                q_table(q_values).print(out)?;
            }
        }
        writeln!(out, "{} : {}", answer.query, answer.answer)?;
    }
    Ok(())
}

pub fn print_answers_json(answers: &[QueryAnswer]) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(answers)?);
    Ok(())
}

// Text plot of the largest value change per sweep.
pub fn convergence_plot(deltas: &[f64]) -> Result<String> {
    if deltas.is_empty() {
        return Ok("no sweeps to plot".to_string());
    }

    let values: Vec<(f64, f64)> = deltas
        .iter()
        .enumerate()
        .map(|(i, delta)| (i as f64, *delta))
        .collect();
    let max_delta = deltas.iter().fold(0.0, |a: f64, b| a.max(*b));

    let s1 = Plot::new(values).point_style(PointStyle::new().marker(PointMarker::Circle));
    let v = ContinuousView::new()
        .add(s1)
        .x_range(0.0, deltas.len() as f64)
        .y_range(0.0, max_delta.max(1e-9) * 1.05)
        .x_label("Sweep")
        .y_label("Max delta");
    Page::single(&v)
        .dimensions(100, 50)
        .to_text()
        .map_err(|e| Error::Plot {
            message: e.to_string(),
        })
}
