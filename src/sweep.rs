use std::{
    collections::HashMap,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Mutex,
    },
    thread,
};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::{
    datatypes::{OutputRow, ParameterTuple, SweepRanges},
    error::FoilgenError,
    post_processor::OutputTable,
    worker::{CaseOutcome, CaseWorker},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepOptions {
    /// Size of the worker pool
    pub workers: usize,
    /// Buffered rows that trigger a write to the table
    pub batch_size: usize,
    pub show_progress: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub cases_attempted: usize,
    pub cases_succeeded: usize,
    pub cases_failed: usize,
    pub rows_written: usize,
}

/// Expands the declared ranges into every parameter combination
///
/// The order matches nested loops over camber, camber location, thickness,
/// Reynolds number and Mach number, innermost last.
pub fn enumerate_cases(ranges: &SweepRanges) -> Vec<ParameterTuple> {
    let mut cases = Vec::with_capacity(ranges.case_count());
    for &max_camber in &ranges.max_camber {
        for &camber_location in &ranges.camber_location {
            for &thickness in &ranges.thickness {
                for &reynolds in &ranges.reynolds {
                    for &mach in &ranges.mach {
                        cases.push(ParameterTuple {
                            max_camber,
                            camber_location,
                            thickness,
                            reynolds,
                            mach,
                        });
                    }
                }
            }
        }
    }
    cases
}

/// Fails if two cases would share a script and polar file name
///
/// Case names truncate camber location to tens and Reynolds number to an
/// integer, so distinct tuples can collide.
pub fn check_unique_case_ids(cases: &[ParameterTuple]) -> Result<(), FoilgenError> {
    let mut seen: HashMap<String, &ParameterTuple> = HashMap::with_capacity(cases.len());
    for case in cases {
        let prefix = case.case_id().file_prefix;
        if let Some(first) = seen.get(&prefix) {
            return Err(FoilgenError::Input(format!(
                "Cases {first:?} and {case:?} would both write {prefix}"
            )));
        }
        seen.insert(prefix, case);
    }
    Ok(())
}

fn progress_bar(total: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total as u64);
    if let Ok(style) =
        ProgressStyle::with_template("{msg} [{elapsed_precise}] {wide_bar} {pos}/{len} ({eta})")
    {
        bar.set_style(style);
    }
    bar.set_message("Generating airfoils");
    bar
}

fn flush(
    table: &mut OutputTable,
    batch: &mut Vec<OutputRow>,
    summary: &mut SweepSummary,
) -> Result<(), FoilgenError> {
    table.append(batch)?;
    summary.rows_written += batch.len();
    debug!(
        rows = batch.len(),
        total = table.rows_written(),
        batch = table.batches_written(),
        "flushed batch"
    );
    batch.clear();
    Ok(())
}

/// Runs every case of the sweep on a worker pool and appends the rows to `table`
///
/// Results arrive in completion order. A failed case only loses its own rows;
/// an error writing the table stops the sweep.
///
/// # Arguments
/// * `ranges` - Declared values of every swept parameter
/// * `worker` - Processes a single case
/// * `table` - Output sink, header already written
/// * `options` - Pool size, batch size and progress display
pub fn run_sweep(
    ranges: &SweepRanges,
    worker: &CaseWorker,
    table: &mut OutputTable,
    options: &SweepOptions,
) -> Result<SweepSummary, FoilgenError> {
    let cases = enumerate_cases(ranges);
    check_unique_case_ids(&cases)?;
    let total = cases.len();
    let workers = options.workers.clamp(1, total.max(1));
    let batch_size = options.batch_size.max(1);

    info!("dispatching {total} cases to {workers} workers");

    let queue = Mutex::new(cases.into_iter());
    let abort = AtomicBool::new(false);
    let bar = progress_bar(total, options.show_progress);

    let result = thread::scope(|scope| -> Result<SweepSummary, FoilgenError> {
        let (tx, rx) = mpsc::channel::<CaseOutcome>();

        for _ in 0..workers {
            let tx = tx.clone();
            let queue = &queue;
            let abort = &abort;
            scope.spawn(move || loop {
                if abort.load(Ordering::Relaxed) {
                    break;
                }
                let next = match queue.lock() {
                    Ok(mut q) => q.next(),
                    Err(poisoned) => poisoned.into_inner().next(),
                };
                let Some(tuple) = next else {
                    break;
                };

                let outcome = panic::catch_unwind(AssertUnwindSafe(|| worker.process_case(&tuple)))
                    .unwrap_or_else(|_| {
                        CaseOutcome::failed(
                            tuple.case_id(),
                            FoilgenError::Solver("case worker panicked".to_owned()),
                        )
                    });
                if tx.send(outcome).is_err() {
                    break;
                }
            });
        }
        drop(tx);

        let mut summary = SweepSummary::default();
        let mut batch: Vec<OutputRow> = Vec::with_capacity(batch_size);

        for outcome in rx {
            summary.cases_attempted += 1;
            bar.inc(1);

            match outcome.failure {
                Some(err) => {
                    summary.cases_failed += 1;
                    let case = &outcome.case_id.file_prefix;
                    bar.suspend(|| warn!(case = %case, "case failed: {err}"));
                }
                None => {
                    summary.cases_succeeded += 1;
                    debug!(
                        case = %outcome.case_id.file_prefix,
                        rows = outcome.rows.len(),
                        "case done"
                    );
                    batch.extend(outcome.rows);
                }
            }

            if batch.len() >= batch_size {
                if let Err(err) = flush(table, &mut batch, &mut summary) {
                    abort.store(true, Ordering::Relaxed);
                    return Err(err);
                }
            }
        }

        flush(table, &mut batch, &mut summary)?;
        Ok(summary)
    });

    bar.finish();
    result
}
