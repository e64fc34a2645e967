use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod datatypes;
mod error;
mod geometry;
mod parser;
mod post_processor;
mod script;
mod solver;
mod sweep;
#[cfg(test)]
mod test_support;
mod worker;

use crate::{
    error::FoilgenError,
    geometry::GeometryCache,
    post_processor::OutputTable,
    script::FlowDefaults,
    solver::ExternalSolver,
    sweep::SweepOptions,
    worker::{CaseSettings, CaseWorker},
};

/// Sweeps NACA 4-digit airfoils through an external solver into one CSV dataset
#[derive(Parser, Debug)]
#[command(name = "foilgen", version)]
struct Args {
    /// Path to the JSON input file; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output table path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of cases solved in parallel
    #[arg(short, long)]
    workers: Option<usize>,

    /// Rows buffered before each write to the table
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Report the sweep size without running the solver
    #[arg(long)]
    dry_run: bool,
}

fn create_dir(dir: &std::path::Path) -> Result<(), FoilgenError> {
    std::fs::create_dir_all(dir).map_err(|err| {
        FoilgenError::Input(format!("Unable to create directory {}: {err}", dir.display()))
    })
}

fn run(args: Args) -> Result<(), FoilgenError> {
    let mut config = config::load_config(args.config.as_deref())?;
    if let Some(output) = args.output {
        config.table_path = output;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    config.validate()?;

    let total_cases = config.ranges.case_count();
    info!("generated {total_cases} parameter combinations");

    if args.dry_run {
        info!(
            "dry run: {} columns per row, {} workers, batch size {}",
            post_processor::header(config.point_count).len(),
            config.workers,
            config.batch_size
        );
        return Ok(());
    }

    create_dir(&config.script_dir)?;
    create_dir(&config.results_dir)?;
    if let Some(parent) = config.table_path.parent() {
        create_dir(parent)?;
    }
    info!("case scripts: {}", config.script_dir.display());
    info!("solver output: {}", config.results_dir.display());

    let mut table = OutputTable::create(&config.table_path, config.point_count)?;

    let solver = ExternalSolver::new(config.solver_command.clone(), config.solver_timeout)?;
    let settings = CaseSettings {
        flow: FlowDefaults {
            polar: config.polar,
            point_count: config.point_count,
        },
        script_dir: config.script_dir.clone(),
        results_dir: config.results_dir.clone(),
        settle_delay: config.settle_delay,
    };
    let geometry = Arc::new(GeometryCache::new());
    let worker = CaseWorker::new(settings, Arc::new(solver), geometry.clone());

    let summary = sweep::run_sweep(
        &config.ranges,
        &worker,
        &mut table,
        &SweepOptions {
            workers: config.workers,
            batch_size: config.batch_size,
            show_progress: true,
        },
    )?;

    info!(
        "cases attempted: {}, succeeded: {}, failed: {}",
        summary.cases_attempted, summary.cases_succeeded, summary.cases_failed
    );
    info!(
        "wrote {} rows ({} columns) in {} batches to {}",
        summary.rows_written,
        table.columns(),
        table.batches_written(),
        table.path().display()
    );
    info!("computed {} distinct airfoil geometries", geometry.computations());

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(err) = run(args) {
        error!("{err}");
        std::process::exit(1)
    }
}
