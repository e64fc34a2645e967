/// One fully specified analysis case: shape parameters plus flow conditions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterTuple {
    pub max_camber: u32,
    pub camber_location: u32,
    pub thickness: u32,
    pub reynolds: f64,
    pub mach: f64,
}

impl ParameterTuple {
    pub fn case_id(&self) -> CaseId {
        CaseId::from_tuple(self)
    }

    pub fn geometry_key(&self, point_count: usize) -> GeometryKey {
        GeometryKey {
            max_camber: self.max_camber,
            camber_location: self.camber_location,
            thickness: self.thickness,
            point_count,
        }
    }
}

/// Deterministic naming for a case, used for file names and for the FoilID column
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CaseId {
    pub airfoil_name: String,
    pub file_prefix: String,
}

impl CaseId {
    pub fn from_tuple(tuple: &ParameterTuple) -> CaseId {
        let airfoil_name = format!(
            "NACA{}{}{:02}",
            tuple.max_camber,
            tuple.camber_location / 10,
            tuple.thickness
        );
        let file_prefix = format!(
            "{airfoil_name}_Re{re}_M{mach}",
            re = tuple.reynolds as u64,
            mach = format!("{}", tuple.mach).replace('.', "p"),
        );

        CaseId {
            airfoil_name,
            file_prefix,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryKey {
    pub max_camber: u32,
    pub camber_location: u32,
    pub thickness: u32,
    pub point_count: usize,
}

/// Interior surface heights at cosine-spaced stations, endpoints excluded
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceGeometry {
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarSample {
    pub alpha: f64,
    pub cl: f64,
    pub cd: f64,
    pub cm: f64,
}

/// One record of the output table. Geometry columns are flattened upper then lower.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRow {
    pub foil_id: String,
    pub max_camber: u32,
    pub camber_location: u32,
    pub thickness: u32,
    pub alpha: f64,
    pub mach: f64,
    pub reynolds: u64,
    pub cl: f64,
    pub cd: f64,
    pub cm: f64,
    pub geometry: Vec<f64>,
}

impl OutputRow {
    pub fn field_count(&self) -> usize {
        10 + self.geometry.len()
    }
}

/// Declared values for each swept parameter
#[derive(Debug, Clone, PartialEq)]
pub struct SweepRanges {
    pub max_camber: Vec<u32>,
    pub camber_location: Vec<u32>,
    pub thickness: Vec<u32>,
    pub reynolds: Vec<f64>,
    pub mach: Vec<f64>,
}

impl SweepRanges {
    pub fn case_count(&self) -> usize {
        self.max_camber.len()
            * self.camber_location.len()
            * self.thickness.len()
            * self.reynolds.len()
            * self.mach.len()
    }
}

/// Angle of attack sweep handed to the solver, in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarSweep {
    pub aoa_start: f64,
    pub aoa_end: f64,
    pub aoa_step: f64,
}
