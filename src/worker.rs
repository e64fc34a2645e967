use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use tracing::debug;

use crate::{
    datatypes::{CaseId, OutputRow, ParameterTuple},
    error::FoilgenError,
    geometry::GeometryCache,
    parser::parse_polar,
    script::{build_case_script, write_case_script, FlowDefaults},
    solver::CaseSolver,
};

/// Settings shared by every case of a sweep
#[derive(Debug, Clone)]
pub struct CaseSettings {
    pub flow: FlowDefaults,
    pub script_dir: PathBuf,
    pub results_dir: PathBuf,
    /// Pause after each solver run so the solver's file writes land on disk
    pub settle_delay: Duration,
}

/// What a single case produced
#[derive(Debug)]
pub struct CaseOutcome {
    pub case_id: CaseId,
    pub rows: Vec<OutputRow>,
    pub failure: Option<FoilgenError>,
}

impl CaseOutcome {
    pub fn failed(case_id: CaseId, failure: FoilgenError) -> CaseOutcome {
        CaseOutcome {
            case_id,
            rows: Vec::new(),
            failure: Some(failure),
        }
    }
}

/// Runs one parameter tuple from script to output rows
pub struct CaseWorker {
    settings: CaseSettings,
    solver: Arc<dyn CaseSolver>,
    geometry: Arc<GeometryCache>,
}

impl CaseWorker {
    pub fn new(
        settings: CaseSettings,
        solver: Arc<dyn CaseSolver>,
        geometry: Arc<GeometryCache>,
    ) -> CaseWorker {
        CaseWorker {
            settings,
            solver,
            geometry,
        }
    }

    pub fn output_path(&self, case_id: &CaseId) -> PathBuf {
        self.settings
            .results_dir
            .join(format!("{}_polar.xml", case_id.file_prefix))
    }

    pub fn script_path(&self, case_id: &CaseId) -> PathBuf {
        self.settings
            .script_dir
            .join(format!("macro_{}.js", case_id.file_prefix))
    }

    /// Processes a case, converting every per-case error into a failed outcome
    pub fn process_case(&self, tuple: &ParameterTuple) -> CaseOutcome {
        let case_id = tuple.case_id();
        match self.run(tuple, &case_id) {
            Ok(rows) => CaseOutcome {
                case_id,
                rows,
                failure: None,
            },
            Err(err) => CaseOutcome::failed(case_id, err),
        }
    }

    fn run(
        &self,
        tuple: &ParameterTuple,
        case_id: &CaseId,
    ) -> Result<Vec<OutputRow>, FoilgenError> {
        let output_path = self.output_path(case_id);
        let script_path = self.script_path(case_id);

        let script = build_case_script(tuple, &self.settings.flow, &output_path)?;
        write_case_script(&script, &script_path)?;

        // the solver does not overwrite, so an old polar would pass for a fresh one
        remove_stale_output(&output_path)?;

        debug!(case = %case_id.file_prefix, "running solver");
        let run = self.solver.run_case(&script_path)?;
        if !self.settings.settle_delay.is_zero() {
            std::thread::sleep(self.settings.settle_delay);
        }

        if !run.success() {
            debug!(case = %case_id.file_prefix, stdout = %run.stdout.trim(), "solver output");
            let reason = if run.timed_out {
                "timed out".to_owned()
            } else {
                match run.status {
                    Some(code) => format!("exited with status {code}"),
                    None => "was terminated by a signal".to_owned(),
                }
            };
            return Err(FoilgenError::Solver(format!(
                "solver {reason}: {}",
                run.stderr.trim()
            )));
        }
        if !output_path.exists() {
            return Err(FoilgenError::Solver(format!(
                "solver wrote no polar to {}: {}",
                output_path.display(),
                run.stderr.trim()
            )));
        }

        let samples = parse_polar(&output_path);
        if samples.is_empty() {
            return Err(FoilgenError::Parser(format!(
                "no usable polar samples in {}",
                output_path.display()
            )));
        }

        let point_count = self.settings.flow.point_count;
        let surface = self.geometry.get(tuple.geometry_key(point_count));

        let rows = samples
            .iter()
            .map(|sample| {
                let mut geometry = Vec::with_capacity(surface.upper.len() + surface.lower.len());
                geometry.extend_from_slice(&surface.upper);
                geometry.extend_from_slice(&surface.lower);

                OutputRow {
                    foil_id: case_id.airfoil_name.clone(),
                    max_camber: tuple.max_camber,
                    camber_location: tuple.camber_location,
                    thickness: tuple.thickness,
                    alpha: sample.alpha,
                    mach: tuple.mach,
                    reynolds: tuple.reynolds as u64,
                    cl: sample.cl,
                    cd: sample.cd,
                    cm: sample.cm,
                    geometry,
                }
            })
            .collect();

        Ok(rows)
    }
}

/// Deletes a polar left behind by an earlier run of the same case
fn remove_stale_output(output_path: &Path) -> Result<(), FoilgenError> {
    if !output_path.exists() {
        return Ok(());
    }
    std::fs::remove_file(output_path).map_err(|err| {
        FoilgenError::Solver(format!(
            "Unable to remove stale output {}: {err}",
            output_path.display()
        ))
    })
}
