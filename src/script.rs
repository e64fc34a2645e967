use std::{io::Write, path::Path};

use crate::{
    datatypes::{ParameterTuple, PolarSweep},
    error::FoilgenError,
};

/// Flow settings shared by every case script
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowDefaults {
    pub polar: PolarSweep,
    pub point_count: usize,
}

fn check_finite(name: &str, value: f64) -> Result<f64, FoilgenError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FoilgenError::Script(format!(
            "Non-finite {name} ({value}) in case script"
        )))
    }
}

/// Builds the solver macro for a single case
///
/// # Arguments
/// * `tuple` - The case parameters
/// * `flow` - Polar sweep and point count shared by all cases
/// * `output_path` - Where the solver should save the polar document
///
/// # Returns
/// The script text, one directive per line
pub fn build_case_script(
    tuple: &ParameterTuple,
    flow: &FlowDefaults,
    output_path: &Path,
) -> Result<String, FoilgenError> {
    let output = match output_path.to_str() {
        Some(p) => p,
        None => {
            return Err(FoilgenError::Script(format!(
                "Output path {} is not valid UTF-8",
                output_path.display()
            )))
        }
    };
    if output.contains('"') || output.contains('\n') {
        return Err(FoilgenError::Script(format!(
            "Output path {output} cannot be embedded in a quoted script string"
        )));
    }

    let reynolds = check_finite("Reynolds number", tuple.reynolds)?;
    if reynolds <= 0.0 {
        return Err(FoilgenError::Script(format!(
            "Reynolds number must be positive, got {reynolds}"
        )));
    }
    let mach = check_finite("Mach number", tuple.mach)?;
    let aoa_start = check_finite("start angle", flow.polar.aoa_start)?;
    let aoa_end = check_finite("end angle", flow.polar.aoa_end)?;
    let aoa_step = check_finite("angle step", flow.polar.aoa_step)?;

    Ok(format!(
        "// JavaFoil auto-generated macro\n\
        Options.Country(1);\n\
        Geometry.CreateAirfoil(0, {n_points}, {thickness:?}, 0.0, \
        {camber:?}, {camber_loc:?}, 0.0, 0.0, 0.0, 0.0, 1);\n\
        Options.MachNumber({mach:?});\n\
        Polar.Analyze({re}, {re}, {re}, \
        {aoa_start:?}, {aoa_end:?}, {aoa_step:?}, 1.0, 1.0, 0, false);\n\
        Polar.Save(\"{output}\");\n\
        JavaFoil.Exit();\n",
        n_points = flow.point_count,
        thickness = tuple.thickness as f64 / 100.0,
        camber = tuple.max_camber as f64 / 100.0,
        camber_loc = tuple.camber_location as f64 / 10.0,
        re = reynolds as u64,
    ))
}

/// Writes a case script to disk, replacing any previous script of the same name
pub fn write_case_script(script: &str, script_path: &Path) -> Result<(), FoilgenError> {
    let mut script_file = match std::fs::File::create(script_path) {
        Ok(f) => f,
        Err(err) => {
            return Err(FoilgenError::Script(format!(
                "Failed to create {}: {err}",
                script_path.display()
            )))
        }
    };

    script_file
        .write_all(script.as_bytes())
        .map_err(|err| {
            FoilgenError::Script(format!("Failed to write {}: {err}", script_path.display()))
        })
}
