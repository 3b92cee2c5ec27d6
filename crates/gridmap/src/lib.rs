//! GRIDMAP: flattens a 3D point cloud into a 2D occupancy map.
//!
//! - Computes the planar (x, y) extent of every loaded scan.
//! - Discretizes the extent into `ceil(span / resolution)` cells per axis.
//! - Keeps only points inside the height band `[min_z, max_z]`.
//! - Produces three aligned artifacts from the same points and parameters:
//!   a probability-grid text file, a grayscale height raster and a map
//!   descriptor binding raster pixels to world coordinates.
//!
//! Grid text layout (whitespace separated, one header + `height` rows):
//!   15 <resolution> <height> <width> <resolution> <origin_x> <origin_y>
//!   <width cell values> ...            row 0 = the row touching `min_y`
//!
//!   cell values: 254 = unknown, 0 = occupied
//!
//! Height raster:
//!   8-bit single channel, `width x height`, background 255.
//!   Row 0 is the row touching `max_y` (image convention, north up).
//!   pixel = round(clamp(z / max_z, 0, 1) * 255), last point wins.
//!
//! Map descriptor (YAML):
//!   image, resolution, origin: [min_x, min_y, 0.0],
//!   occupied_thresh: 0.5, free_thresh: 0.5, negate: 0
//!
//! PCD input: v0.7 headers with `DATA ascii` or `DATA binary` payloads,
//! fields `x y z` (required) and `intensity` (optional aux scalar).

pub mod convert;
pub mod error;
pub mod extent;
pub mod grid;
pub mod output;
pub mod pcd;
pub mod point;
pub mod rasterize;

pub use convert::{convert, Conversion};
pub use error::{ConvertError, OutputError, SourceError};
pub use extent::PlanarExtent;
pub use grid::{GridDims, GridModel, GridParameters, HeightRaster, Projection, MAX_GRID_CELLS};
pub use output::{
    write_descriptor_file, write_grid_file, write_raster_file, AlignmentDescriptor, MapDescriptor,
};
pub use pcd::{read_pcd, PcdDirectory};
pub use point::{load_scans, Point3D, PointSource, Scan, ScanId};
pub use rasterize::{rasterize_height, rasterize_occupancy, RasterStats};
