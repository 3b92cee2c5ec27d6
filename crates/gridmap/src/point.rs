use std::fmt;

use log::{debug, warn};
use rayon::prelude::*;

use crate::error::SourceError;

/// One sample of a scan. `aux` carries intensity/reflectance and is not
/// used by rasterization.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub aux: f32,
}

impl Point3D {
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32, aux: f32) -> Self {
        Self { x, y, z, aux }
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Name of one logical scan, e.g. `"1"` for `1.pcd`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScanId(String);

impl ScanId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for ScanId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl From<&str> for ScanId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ScanId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Yields the points of a named scan.
pub trait PointSource {
    fn load(&self, scan: &ScanId) -> Result<Vec<Point3D>, SourceError>;
}

impl<F> PointSource for F
where
    F: Fn(&ScanId) -> Result<Vec<Point3D>, SourceError>,
{
    fn load(&self, scan: &ScanId) -> Result<Vec<Point3D>, SourceError> {
        self(scan)
    }
}

/// A scan whose points were loaded successfully.
#[derive(Debug, Clone)]
pub struct Scan {
    pub id: ScanId,
    pub points: Vec<Point3D>,
}

/// Load every scan in parallel, skipping (and logging) the ones that fail.
///
/// The result keeps the order of `ids`, which matters for the height
/// raster where the last point written to a pixel wins.
pub fn load_scans<S>(source: &S, ids: &[ScanId]) -> Vec<Scan>
where
    S: PointSource + Sync,
{
    ids.par_iter()
        .filter_map(|id| match source.load(id) {
            Ok(points) => {
                debug!("scan {id}: {} points", points.len());
                Some(Scan {
                    id: id.clone(),
                    points,
                })
            }
            Err(err) => {
                warn!("skipping scan {id}: {err}");
                None
            }
        })
        .collect()
}
