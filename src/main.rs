mod config;
mod error;
mod gridworld;
mod query;
mod report;
mod run;
mod solver;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gridworld_solver")]
#[command(version, about = "Value iteration and Q-learning on a grid world", long_about = None)]
struct Cli {
    /// Grid description (dimensions, terminals, boulders, parameters)
    grid_file: PathBuf,

    /// Queries, one `column,row,index,method,kind` per line
    query_file: PathBuf,

    /// Seed for the random number generator
    #[arg(long)]
    seed: Option<u64>,

    /// End a Q-learning episode after this many steps even if no terminal was reached
    #[arg(long)]
    max_steps: Option<usize>,

    /// Print query answers as JSON instead of tables
    #[arg(long)]
    json: bool,

    /// Plot the largest value change of each value-iteration sweep
    #[arg(long)]
    convergence: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let problem = config::load_problem(&cli.grid_file)
        .with_context(|| format!("loading grid from {}", cli.grid_file.display()))?;
    let queries =
        config::load_queries(&cli.query_file, problem.grid.height(), problem.grid.width())
            .with_context(|| format!("loading queries from {}", cli.query_file.display()))?;

    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let solution = run::solve(&problem, queries, cli.max_steps, &mut rng);

    if cli.json {
        report::print_answers_json(&solution.answers)?;
        return Ok(());
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    report::write_value_solution(&mut out, &solution.values)?;
    if cli.convergence {
        writeln!(out, "{}", report::convergence_plot(&solution.deltas)?)?;
    }
    report::write_q_solution(&mut out, &solution.q_values)?;
    report::write_answers(&mut out, &solution.answers)?;

    Ok(())
}
