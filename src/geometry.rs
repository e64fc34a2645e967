use std::{
    collections::HashMap,
    f64::consts::PI,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use crate::datatypes::{GeometryKey, SurfaceGeometry};

/// Generates `point_count` stations over [0, 1] with cosine spacing
///
/// # Arguments
/// * `point_count` - Number of stations, endpoints included
///
/// # Returns
/// An ordered vector of x-coordinates, clustered at both ends
pub fn cosine_spacing(point_count: usize) -> Vec<f64> {
    if point_count < 2 {
        return vec![0.0; point_count];
    }
    let last = (point_count - 1) as f64;
    (0..point_count)
        .map(|i| 0.5 * (1.0 - f64::cos(PI * i as f64 / last)))
        .collect()
}

/// Half-thickness of the symmetric 4-digit section at chord station `x`
fn thickness_half_height(x: f64, t: f64) -> f64 {
    5.0 * t
        * (0.2969 * x.sqrt() - 0.1260 * x - 0.3516 * x.powi(2) + 0.2843 * x.powi(3)
            - 0.1015 * x.powi(4))
}

/// Camber line height and slope at chord station `x`
///
/// `m` is the maximum camber as a fraction of chord and `p` its location.
/// A zero `m` or `p` means an uncambered section.
fn camber_line(x: f64, m: f64, p: f64) -> (f64, f64) {
    if m == 0.0 || p == 0.0 {
        return (0.0, 0.0);
    }

    if x < p {
        let yc = (m / p.powi(2)) * (2.0 * p * x - x.powi(2));
        let slope = (2.0 * m / p.powi(2)) * (p - x);
        (yc, slope)
    } else {
        let yc = (m / (1.0 - p).powi(2)) * ((1.0 - 2.0 * p) + 2.0 * p * x - x.powi(2));
        let slope = (2.0 * m / (1.0 - p).powi(2)) * (p - x);
        (yc, slope)
    }
}

/// Computes upper and lower surface heights of a 4-digit airfoil
///
/// The leading and trailing edge stations are evaluated but dropped from
/// the result, so each surface has `point_count - 2` entries.
///
/// # Arguments
/// * `max_camber` - Maximum camber in percent chord
/// * `camber_location` - Location of maximum camber, divided by 10 before use
/// * `thickness` - Maximum thickness in percent chord
/// * `point_count` - Number of cosine-spaced stations including endpoints
pub fn compute_surface(
    max_camber: u32,
    camber_location: u32,
    thickness: u32,
    point_count: usize,
) -> SurfaceGeometry {
    if point_count < 3 {
        return SurfaceGeometry {
            upper: Vec::new(),
            lower: Vec::new(),
        };
    }

    let m = max_camber as f64 / 100.0;
    let p = camber_location as f64 / 10.0;
    let t = thickness as f64 / 100.0;

    let stations = cosine_spacing(point_count);
    let interior = &stations[1..point_count - 1];

    let mut upper = Vec::with_capacity(interior.len());
    let mut lower = Vec::with_capacity(interior.len());

    for &x in interior {
        let yt = thickness_half_height(x, t);
        let (yc, slope) = camber_line(x, m, p);
        let theta = slope.atan();

        upper.push(yc + yt * theta.cos());
        lower.push(yc - yt * theta.cos());
    }

    SurfaceGeometry { upper, lower }
}

/// Memoized geometry shared between workers
///
/// Entries are never evicted; the sweep only ever produces a bounded set of keys.
#[derive(Debug, Default)]
pub struct GeometryCache {
    entries: Mutex<HashMap<GeometryKey, Arc<SurfaceGeometry>>>,
    computations: AtomicUsize,
}

impl GeometryCache {
    pub fn new() -> GeometryCache {
        GeometryCache::default()
    }

    /// Returns the geometry for `key`, computing it on first use
    pub fn get(&self, key: GeometryKey) -> Arc<SurfaceGeometry> {
        // a poisoned lock only means another worker panicked; entries stay valid
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        entries
            .entry(key)
            .or_insert_with(|| {
                self.computations.fetch_add(1, Ordering::Relaxed);
                Arc::new(compute_surface(
                    key.max_camber,
                    key.camber_location,
                    key.thickness,
                    key.point_count,
                ))
            })
            .clone()
    }

    /// Number of geometries computed so far (cache misses)
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::Relaxed)
    }
}
