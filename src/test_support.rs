//! Shared helpers for unit tests: scratch directories and an in-process solver.

use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::{
    datatypes::PolarSample,
    error::FoilgenError,
    parser::render_polar,
    solver::{CaseSolver, SolverRun},
};

static SCRATCH_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Creates an empty, uniquely named directory under the system temp dir
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "foilgen-{name}-{}-{}",
        std::process::id(),
        SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Solver stand-in that reads the case script and writes a synthetic polar
///
/// Cases are selected for misbehaviour by their maximum camber.
#[derive(Debug, Default)]
pub struct FakeSolver {
    /// Exit non-zero with a diagnostic
    pub crash_camber: Vec<u32>,
    /// Exit zero without writing a polar
    pub silent_camber: Vec<u32>,
    /// Exit zero and write an unparsable polar
    pub garbled_camber: Vec<u32>,
    pub calls: AtomicUsize,
}

impl FakeSolver {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn directive_args<'a>(script: &'a str, directive: &str) -> Vec<&'a str> {
    let line = script
        .lines()
        .find(|l| l.starts_with(directive))
        .unwrap_or_else(|| panic!("script has no {directive} directive"));
    let open = line.find('(').unwrap();
    let close = line.rfind(')').unwrap();
    line[open + 1..close].split(',').map(str::trim).collect()
}

fn ok_run() -> SolverRun {
    SolverRun {
        status: Some(0),
        stdout: String::new(),
        stderr: String::new(),
        timed_out: false,
    }
}

impl CaseSolver for FakeSolver {
    fn run_case(&self, script_path: &Path) -> Result<SolverRun, FoilgenError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = std::fs::read_to_string(script_path)
            .map_err(|err| FoilgenError::Solver(format!("cannot read script: {err}")))?;

        let shape = directive_args(&script, "Geometry.CreateAirfoil");
        let camber_frac: f64 = shape[4].parse().unwrap();
        let camber = (camber_frac * 100.0).round() as u32;

        let analyze = directive_args(&script, "Polar.Analyze");
        let start: f64 = analyze[3].parse().unwrap();
        let end: f64 = analyze[4].parse().unwrap();
        let step: f64 = analyze[5].parse().unwrap();

        let save = directive_args(&script, "Polar.Save");
        let output = PathBuf::from(save[0].trim_matches('"'));

        if self.crash_camber.contains(&camber) {
            return Ok(SolverRun {
                status: Some(1),
                stdout: String::new(),
                stderr: "java.lang.ArithmeticException: solver diverged".to_owned(),
                timed_out: false,
            });
        }
        if self.silent_camber.contains(&camber) {
            return Ok(ok_run());
        }
        if self.garbled_camber.contains(&camber) {
            std::fs::write(&output, "<polars><broken>").unwrap();
            return Ok(ok_run());
        }

        let mut samples = Vec::new();
        let mut alpha = start;
        while alpha <= end + 1e-9 {
            samples.push(PolarSample {
                alpha,
                cl: 0.11 * alpha + camber_frac * 10.0,
                cd: 0.006 + 0.0002 * alpha * alpha,
                cm: -0.25 * camber_frac,
            });
            alpha += step;
        }
        std::fs::write(&output, render_polar(&samples)).unwrap();

        Ok(ok_run())
    }
}
