use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use json::JsonValue;

use crate::{
    datatypes::{PolarSweep, SweepRanges},
    error::FoilgenError,
    sweep::{check_unique_case_ids, enumerate_cases},
};

/// Everything a sweep needs, after defaults and overrides
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub ranges: SweepRanges,
    pub polar: PolarSweep,
    pub point_count: usize,
    pub solver_command: Vec<String>,
    pub solver_timeout: Option<Duration>,
    pub settle_delay: Duration,
    pub script_dir: PathBuf,
    pub results_dir: PathBuf,
    pub table_path: PathBuf,
    pub batch_size: usize,
    pub workers: usize,
}

fn available_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for Config {
    fn default() -> Self {
        let base = PathBuf::from("airfoil_dataset");
        Config {
            ranges: SweepRanges {
                max_camber: (0..10).collect(),
                camber_location: (10..=70).step_by(10).collect(),
                thickness: (5..=35).step_by(5).collect(),
                reynolds: vec![1e5, 2e5, 3e5, 4e5, 5e5],
                mach: vec![0.1, 0.2, 0.3],
            },
            polar: PolarSweep {
                aoa_start: -10.0,
                aoa_end: 10.0,
                aoa_step: 1.0,
            },
            point_count: 101,
            solver_command: [
                "java",
                "-cp",
                "mhclasses.jar",
                "-jar",
                "javafoil.jar",
                "Script={script}",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            solver_timeout: Some(Duration::from_secs(600)),
            settle_delay: Duration::from_millis(100),
            script_dir: base.join("macros_temp"),
            results_dir: base.join("results"),
            table_path: base.join("results").join("master_airfoil_dataset.csv"),
            batch_size: 500,
            workers: available_workers(),
        }
    }
}

fn expect_f64(value: &JsonValue, field: &str) -> Result<f64, FoilgenError> {
    match value.as_f64() {
        Some(v) => Ok(v),
        None => Err(FoilgenError::Input(format!(
            "Input json field {field} must be a number"
        ))),
    }
}

fn expect_usize(value: &JsonValue, field: &str) -> Result<usize, FoilgenError> {
    match value.as_usize() {
        Some(v) => Ok(v),
        None => Err(FoilgenError::Input(format!(
            "Input json field {field} must be a non-negative integer"
        ))),
    }
}

fn expect_u32(value: &JsonValue, field: &str) -> Result<u32, FoilgenError> {
    match value.as_u32() {
        Some(v) => Ok(v),
        None => Err(FoilgenError::Input(format!(
            "Input json field {field} must contain non-negative integers"
        ))),
    }
}

fn expect_str<'a>(value: &'a JsonValue, field: &str) -> Result<&'a str, FoilgenError> {
    match value.as_str() {
        Some(v) => Ok(v),
        None => Err(FoilgenError::Input(format!(
            "Input json field {field} must be a string"
        ))),
    }
}

/// Reads an integer range given either as an array or as `{start, stop, step}`
/// with `stop` inclusive
fn parse_int_range(value: &JsonValue, field: &str) -> Result<Vec<u32>, FoilgenError> {
    if value.is_array() {
        return value.members().map(|v| expect_u32(v, field)).collect();
    }

    if value.is_object() {
        let start = expect_u32(&value["start"], &format!("{field}.start"))?;
        let stop = expect_u32(&value["stop"], &format!("{field}.stop"))?;
        let step = if value.has_key("step") {
            expect_u32(&value["step"], &format!("{field}.step"))?
        } else {
            1
        };
        if step == 0 {
            return Err(FoilgenError::Input(format!(
                "Input json field {field}.step must be positive"
            )));
        }
        return Ok((start..=stop).step_by(step as usize).collect());
    }

    Err(FoilgenError::Input(format!(
        "Input json field {field} must be an array or a {{start, stop, step}} object"
    )))
}

fn parse_float_list(value: &JsonValue, field: &str) -> Result<Vec<f64>, FoilgenError> {
    if !value.is_array() {
        return Err(FoilgenError::Input(format!(
            "Input json field {field} must be an array of numbers"
        )));
    }
    value.members().map(|v| expect_f64(v, field)).collect()
}

/// Parses the input json, falling back to defaults for every missing field
pub fn parse_config(contents: &str) -> Result<Config, FoilgenError> {
    let input = match json::parse(contents) {
        Ok(v) => v,
        Err(err) => {
            return Err(FoilgenError::Input(format!(
                "Error in input file json: {err}"
            )))
        }
    };
    if !input.is_object() {
        return Err(FoilgenError::Input(
            "Input json must be an object".to_owned(),
        ));
    }

    let mut config = Config::default();

    let sweep = &input["sweep"];
    if sweep.has_key("max_camber") {
        config.ranges.max_camber = parse_int_range(&sweep["max_camber"], "sweep.max_camber")?;
    }
    if sweep.has_key("camber_location") {
        config.ranges.camber_location =
            parse_int_range(&sweep["camber_location"], "sweep.camber_location")?;
    }
    if sweep.has_key("thickness") {
        config.ranges.thickness = parse_int_range(&sweep["thickness"], "sweep.thickness")?;
    }
    if sweep.has_key("reynolds") {
        config.ranges.reynolds = parse_float_list(&sweep["reynolds"], "sweep.reynolds")?;
    }
    if sweep.has_key("mach") {
        config.ranges.mach = parse_float_list(&sweep["mach"], "sweep.mach")?;
    }

    let polar = &input["polar"];
    if polar.has_key("aoa_start") {
        config.polar.aoa_start = expect_f64(&polar["aoa_start"], "polar.aoa_start")?;
    }
    if polar.has_key("aoa_end") {
        config.polar.aoa_end = expect_f64(&polar["aoa_end"], "polar.aoa_end")?;
    }
    if polar.has_key("aoa_step") {
        config.polar.aoa_step = expect_f64(&polar["aoa_step"], "polar.aoa_step")?;
    }

    let solver = &input["solver"];
    if solver.has_key("command") {
        if !solver["command"].is_array() {
            return Err(FoilgenError::Input(
                "Input json field solver.command must be an array of strings".to_owned(),
            ));
        }
        config.solver_command = solver["command"]
            .members()
            .map(|v| expect_str(v, "solver.command").map(str::to_owned))
            .collect::<Result<_, _>>()?;
    }
    if solver.has_key("timeout_s") {
        let timeout = expect_f64(&solver["timeout_s"], "solver.timeout_s")?;
        if !timeout.is_finite() || timeout < 0.0 {
            return Err(FoilgenError::Input(
                "Input json field solver.timeout_s must be a non-negative number".to_owned(),
            ));
        }
        config.solver_timeout = if timeout == 0.0 {
            None
        } else {
            match Duration::try_from_secs_f64(timeout) {
                Ok(limit) => Some(limit),
                Err(_) => {
                    return Err(FoilgenError::Input(format!(
                        "Input json field solver.timeout_s is too large: {timeout}"
                    )));
                }
            }
        };
    }
    if solver.has_key("settle_delay_ms") {
        let delay = expect_usize(&solver["settle_delay_ms"], "solver.settle_delay_ms")?;
        config.settle_delay = Duration::from_millis(delay as u64);
    }

    let output = &input["output"];
    if output.has_key("script_dir") {
        config.script_dir = PathBuf::from(expect_str(&output["script_dir"], "output.script_dir")?);
    }
    if output.has_key("results_dir") {
        config.results_dir =
            PathBuf::from(expect_str(&output["results_dir"], "output.results_dir")?);
    }
    if output.has_key("table") {
        config.table_path = PathBuf::from(expect_str(&output["table"], "output.table")?);
    }
    if output.has_key("point_count") {
        config.point_count = expect_usize(&output["point_count"], "output.point_count")?;
    }
    if output.has_key("batch_size") {
        config.batch_size = expect_usize(&output["batch_size"], "output.batch_size")?;
    }
    if output.has_key("workers") {
        config.workers = expect_usize(&output["workers"], "output.workers")?;
    }

    Ok(config)
}

/// Loads the input file, or the defaults when no file is given
pub fn load_config(input_file: Option<&Path>) -> Result<Config, FoilgenError> {
    let Some(path) = input_file else {
        return Ok(Config::default());
    };

    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(err) => {
            return Err(FoilgenError::Input(format!(
                "Unable to open input file {}: {err}",
                path.display()
            )))
        }
    };
    parse_config(&contents)
}

impl Config {
    /// Rejects settings that would make every case fail or produce a wrong script
    pub fn validate(&self) -> Result<(), FoilgenError> {
        let ranges = &self.ranges;
        for (name, len) in [
            ("max_camber", ranges.max_camber.len()),
            ("camber_location", ranges.camber_location.len()),
            ("thickness", ranges.thickness.len()),
            ("reynolds", ranges.reynolds.len()),
            ("mach", ranges.mach.len()),
        ] {
            if len == 0 {
                return Err(FoilgenError::Input(format!("Sweep range {name} is empty")));
            }
        }
        if let Some(re) = ranges.reynolds.iter().find(|re| !re.is_finite() || **re <= 0.0) {
            return Err(FoilgenError::Input(format!(
                "Reynolds number {re} must be positive"
            )));
        }
        if let Some(mach) = ranges.mach.iter().find(|m| !m.is_finite() || **m <= 0.0) {
            return Err(FoilgenError::Input(format!(
                "Mach number {mach} must be positive"
            )));
        }

        let polar = &self.polar;
        if !polar.aoa_step.is_finite() || polar.aoa_step <= 0.0 {
            return Err(FoilgenError::Input(
                "Angle of attack step must be positive".to_owned(),
            ));
        }
        if !polar.aoa_start.is_finite()
            || !polar.aoa_end.is_finite()
            || polar.aoa_start > polar.aoa_end
        {
            return Err(FoilgenError::Input(format!(
                "Angle of attack range {}..{} is invalid",
                polar.aoa_start, polar.aoa_end
            )));
        }

        if self.point_count < 3 {
            return Err(FoilgenError::Input(format!(
                "Point count must be at least 3, got {}",
                self.point_count
            )));
        }
        if self.batch_size == 0 {
            return Err(FoilgenError::Input("Batch size must be positive".to_owned()));
        }
        if self.workers == 0 {
            return Err(FoilgenError::Input("Worker count must be positive".to_owned()));
        }
        if self.solver_command.is_empty() {
            return Err(FoilgenError::Input("Solver command is empty".to_owned()));
        }
        for dir in [&self.script_dir, &self.results_dir] {
            if dir.to_string_lossy().contains('"') {
                return Err(FoilgenError::Input(format!(
                    "Directory {} cannot contain a double quote",
                    dir.display()
                )));
            }
        }

        check_unique_case_ids(&enumerate_cases(ranges))
    }
}
