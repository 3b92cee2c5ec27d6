use std::ops::AddAssign;

use crate::grid::{GridModel, HeightRaster, Projection};
use crate::point::Point3D;

/// What happened to the points of one rasterization pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RasterStats {
    /// Written to a cell / pixel.
    pub accepted: usize,
    /// Rejected by the height band.
    pub out_of_band: usize,
    /// Inside the band but projected outside the grid (edge rounding).
    pub out_of_extent: usize,
}

impl RasterStats {
    pub fn total(&self) -> usize {
        self.accepted + self.out_of_band + self.out_of_extent
    }
}

impl AddAssign for RasterStats {
    fn add_assign(&mut self, rhs: Self) {
        self.accepted += rhs.accepted;
        self.out_of_band += rhs.out_of_band;
        self.out_of_extent += rhs.out_of_extent;
    }
}

/// Mark every cell hit by an in-band point as occupied.
///
/// Marking is monotone and idempotent, so the result does not depend on
/// point order or repetition.
pub fn rasterize_occupancy<'a, I>(
    grid: &mut GridModel,
    projection: &Projection,
    points: I,
) -> RasterStats
where
    I: IntoIterator<Item = &'a Point3D>,
{
    debug_assert_eq!(grid.dims(), projection.dims());

    let mut stats = RasterStats::default();
    for point in points {
        if !projection.in_band(point) {
            stats.out_of_band += 1;
            continue;
        }
        match projection.grid_cell(point) {
            Some((col, row)) => {
                grid.mark_occupied(col, row);
                stats.accepted += 1;
            }
            None => stats.out_of_extent += 1,
        }
    }
    stats
}

/// Write the normalized height of every in-band point into the raster.
///
/// The last point landing on a pixel wins, so callers must feed points in
/// a defined order to get reproducible images.
pub fn rasterize_height<'a, I>(
    raster: &mut HeightRaster,
    projection: &Projection,
    points: I,
) -> RasterStats
where
    I: IntoIterator<Item = &'a Point3D>,
{
    debug_assert_eq!(raster.dims(), projection.dims());

    let mut stats = RasterStats::default();
    for point in points {
        if !projection.in_band(point) {
            stats.out_of_band += 1;
            continue;
        }
        match projection.raster_pixel(point) {
            Some((col, row)) => {
                raster.put(col, row, projection.intensity(point.z));
                stats.accepted += 1;
            }
            None => stats.out_of_extent += 1,
        }
    }
    stats
}
