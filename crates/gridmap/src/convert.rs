use log::{debug, info, warn};

use crate::error::ConvertError;
use crate::extent::PlanarExtent;
use crate::grid::{GridModel, GridParameters, HeightRaster, Projection};
use crate::output::AlignmentDescriptor;
use crate::point::Scan;
use crate::rasterize::{rasterize_height, rasterize_occupancy, RasterStats};

/// Everything produced from one set of scans.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub projection: Projection,
    pub grid: GridModel,
    pub raster: HeightRaster,
    pub alignment: AlignmentDescriptor,
    pub occupancy_stats: RasterStats,
    pub height_stats: RasterStats,
}

impl Conversion {
    pub fn extent(&self) -> &PlanarExtent {
        self.projection.extent()
    }
}

/// Run the extent pass and both rasterization passes over `scans`.
///
/// Scans are visited in slice order in every pass, which fixes the outcome
/// of last-write-wins pixels in the height raster.
pub fn convert(scans: &[Scan], params: &GridParameters) -> Result<Conversion, ConvertError> {
    params.validate()?;
    if params.max_z <= 0.0 {
        warn!(
            "max_z = {} is not positive; height intensities will be inverted or zero",
            params.max_z
        );
    }

    let extent = scans
        .iter()
        .map(|scan| PlanarExtent::par_from_points(&scan.points))
        .fold(PlanarExtent::EMPTY, PlanarExtent::merge);
    let total: usize = scans.iter().map(|scan| scan.points.len()).sum();

    info!(
        "Extent over {} scans / {} points: x=[{}, {}], y=[{}, {}]",
        scans.len(),
        total,
        extent.min_x,
        extent.max_x,
        extent.min_y,
        extent.max_y
    );

    let projection = Projection::new(extent, *params)?;
    let dims = projection.dims();
    info!(
        "Grid {}x{} cells at {} per cell",
        dims.width, dims.height, params.resolution
    );

    let all_points = || scans.iter().flat_map(|scan| scan.points.iter());

    let mut grid = GridModel::new(dims);
    let occupancy_stats = rasterize_occupancy(&mut grid, &projection, all_points());
    debug!("Occupancy pass: {occupancy_stats:?}");

    let mut raster = HeightRaster::new(dims);
    let height_stats = rasterize_height(&mut raster, &projection, all_points());
    debug!("Height pass: {height_stats:?}");

    Ok(Conversion {
        alignment: AlignmentDescriptor::new(&extent, params),
        projection,
        grid,
        raster,
        occupancy_stats,
        height_stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::{Point3D, ScanId};

    fn scan(id: u64, points: &[(f32, f32, f32)]) -> Scan {
        Scan {
            id: ScanId::from(id),
            points: points
                .iter()
                .map(|&(x, y, z)| Point3D::new(x, y, z, 0.0))
                .collect(),
        }
    }

    #[test]
    fn no_scans_is_degenerate() {
        let err = convert(&[], &GridParameters::default()).unwrap_err();

        assert!(matches!(err, ConvertError::DegenerateExtent { .. }));
    }

    #[test]
    fn empty_scans_are_degenerate() {
        let scans = [scan(1, &[]), scan(2, &[])];
        let err = convert(&scans, &GridParameters::default()).unwrap_err();

        assert!(matches!(
            err,
            ConvertError::DegenerateExtent {
                width: 0,
                height: 0
            }
        ));
    }

    #[test]
    fn invalid_parameters_are_fatal() {
        let scans = [scan(1, &[(0.0, 0.0, 0.0), (1.0, 1.0, 0.0)])];
        let params = GridParameters {
            resolution: 0.0,
            min_z: -1.0,
            max_z: 1.0,
        };

        let err = convert(&scans, &params).unwrap_err();
        assert!(matches!(err, ConvertError::InvalidParameters(_)));
    }

    #[test]
    fn distant_outlier_is_a_clean_error() {
        let scans = [scan(1, &[(-1e18, -1e18, 0.0), (1e18, 1e18, 0.0)])];

        let err = convert(&scans, &GridParameters::default()).unwrap_err();
        assert!(matches!(err, ConvertError::GridTooLarge { .. }));
    }

    #[test]
    fn extent_spans_all_scans() {
        let scans = [
            scan(1, &[(0.0, 0.0, 0.0), (1.0, 0.5, 0.0)]),
            scan(2, &[(4.0, -2.0, 9.0)]),
        ];
        let params = GridParameters::new(1.0, -1.0, 1.0).unwrap();

        let conversion = convert(&scans, &params).unwrap();

        assert_eq!(
            *conversion.extent(),
            PlanarExtent {
                min_x: 0.0,
                max_x: 4.0,
                min_y: -2.0,
                max_y: 0.5,
            }
        );
        assert_eq!(conversion.grid.width(), 4);
        assert_eq!(conversion.grid.height(), 3);
        assert_eq!(conversion.raster.dims(), conversion.grid.dims());
        assert_eq!(conversion.alignment.origin_x, 0.0);
        assert_eq!(conversion.alignment.origin_y, -2.0);
        // the z = 9 point only contributes to the extent
        assert_eq!(conversion.occupancy_stats.out_of_band, 1);
        assert_eq!(conversion.height_stats.out_of_band, 1);
    }

    #[test]
    fn later_scans_win_height_pixels() {
        let scans = [
            scan(1, &[(0.0, 0.0, 0.0), (0.5, 1.5, 1.0), (2.0, 2.0, 0.0)]),
            scan(2, &[(0.5, 1.5, 0.5)]),
        ];
        let params = GridParameters::new(1.0, -1.0, 1.0).unwrap();

        let conversion = convert(&scans, &params).unwrap();

        assert_eq!(conversion.raster.get(0, 0), Some(128));
        assert_eq!(conversion.grid.get(0, 1), Some(GridModel::OCCUPIED));
    }
}
