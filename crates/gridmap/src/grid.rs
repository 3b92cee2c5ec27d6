use crate::error::ConvertError;
use crate::extent::PlanarExtent;
use crate::point::Point3D;

/// Fixed conversion parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridParameters {
    /// Edge length of one cell, in world units.
    pub resolution: f32,
    /// Lower bound of the height band (inclusive).
    pub min_z: f32,
    /// Upper bound of the height band (inclusive), also the intensity scale.
    pub max_z: f32,
}

impl Default for GridParameters {
    fn default() -> Self {
        Self {
            resolution: 0.05,
            min_z: -0.5,
            max_z: 0.5,
        }
    }
}

impl GridParameters {
    pub fn new(resolution: f32, min_z: f32, max_z: f32) -> Result<Self, ConvertError> {
        let params = Self {
            resolution,
            min_z,
            max_z,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ConvertError> {
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err(ConvertError::InvalidParameters(format!(
                "resolution must be a positive number, got {}",
                self.resolution
            )));
        }
        if !(self.min_z.is_finite() && self.max_z.is_finite()) {
            return Err(ConvertError::InvalidParameters(
                "height band bounds must be finite".into(),
            ));
        }
        if self.min_z > self.max_z {
            return Err(ConvertError::InvalidParameters(format!(
                "min_z ({}) is above max_z ({})",
                self.min_z, self.max_z
            )));
        }
        Ok(())
    }

    /// Whether `z` lies inside `[min_z, max_z]`.
    #[inline]
    pub fn in_band(&self, z: f32) -> bool {
        z >= self.min_z && z <= self.max_z
    }
}

/// Upper bound on `width * height` for one conversion (about 1.25 GiB for the
/// grid and raster together).
pub const MAX_GRID_CELLS: usize = 1 << 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridDims {
    pub width: usize,
    pub height: usize,
}

impl GridDims {
    /// `ceil(span / resolution)` cells along each axis; an empty extent gives 0x0.
    pub fn from_extent(extent: &PlanarExtent, resolution: f32) -> Self {
        if extent.is_empty() {
            return Self {
                width: 0,
                height: 0,
            };
        }
        Self {
            width: cells_along(extent.span_x(), resolution),
            height: cells_along(extent.span_y(), resolution),
        }
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    /// `width * height`, or `None` if it does not fit in `usize`.
    pub fn checked_len(&self) -> Option<usize> {
        self.width.checked_mul(self.height)
    }
}

fn cells_along(span: f32, resolution: f32) -> usize {
    let cells = (span / resolution).ceil();
    if cells.is_finite() && cells > 0.0 {
        cells as usize
    } else {
        0
    }
}

/// `floor(offset / resolution)` if it lands in `[0, limit)`.
#[inline]
fn cell_index(offset: f32, resolution: f32, limit: usize) -> Option<usize> {
    let index = (offset / resolution).floor();
    if index.is_nan() || index < 0.0 {
        return None;
    }
    let index = index as usize;
    (index < limit).then_some(index)
}

/// World-to-grid mapping shared by the occupancy grid and the height raster.
///
/// Both artifacts use the same origin, resolution and dimensions. They only
/// differ in row direction: grid rows count up from `min_y`, raster rows
/// count down from `max_y`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    extent: PlanarExtent,
    params: GridParameters,
    dims: GridDims,
}

impl Projection {
    /// Fails with [`ConvertError::DegenerateExtent`] when the extent is empty
    /// or would produce a grid without cells, and with
    /// [`ConvertError::GridTooLarge`] past [`MAX_GRID_CELLS`].
    pub fn new(extent: PlanarExtent, params: GridParameters) -> Result<Self, ConvertError> {
        params.validate()?;

        let dims = GridDims::from_extent(&extent, params.resolution);
        if dims.is_degenerate() {
            return Err(ConvertError::DegenerateExtent {
                width: dims.width,
                height: dims.height,
            });
        }
        match dims.checked_len() {
            Some(cells) if cells <= MAX_GRID_CELLS => {}
            _ => {
                return Err(ConvertError::GridTooLarge {
                    width: dims.width,
                    height: dims.height,
                })
            }
        }

        Ok(Self {
            extent,
            params,
            dims,
        })
    }

    pub fn extent(&self) -> &PlanarExtent {
        &self.extent
    }

    pub fn params(&self) -> &GridParameters {
        &self.params
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }

    #[inline]
    pub fn in_band(&self, point: &Point3D) -> bool {
        self.params.in_band(point.z)
    }

    /// `(column, row)` of `point` in the occupancy grid, row 0 at `min_y`.
    #[inline]
    pub fn grid_cell(&self, point: &Point3D) -> Option<(usize, usize)> {
        let res = self.params.resolution;
        let col = cell_index(point.x - self.extent.min_x, res, self.dims.width)?;
        let row = cell_index(point.y - self.extent.min_y, res, self.dims.height)?;
        Some((col, row))
    }

    /// `(column, row)` of `point` in the height raster, row 0 at `max_y`.
    #[inline]
    pub fn raster_pixel(&self, point: &Point3D) -> Option<(usize, usize)> {
        let res = self.params.resolution;
        let col = cell_index(point.x - self.extent.min_x, res, self.dims.width)?;
        let row = cell_index(self.extent.max_y - point.y, res, self.dims.height)?;
        Some((col, row))
    }

    /// `round(clamp(z / max_z, 0, 1) * 255)`.
    ///
    /// Scaled by `max_z` alone, not by the band width. With `max_z <= 0` the
    /// ratio is inverted or non-finite; a NaN ratio saturates to 0.
    #[inline]
    pub fn intensity(&self, z: f32) -> u8 {
        let ratio = (z / self.params.max_z).clamp(0.0, 1.0);
        (ratio * 255.0).round() as u8
    }
}

/// Occupancy cells, row-major with row 0 touching `min_y`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridModel {
    dims: GridDims,
    cells: Vec<i32>,
}

impl GridModel {
    pub const UNKNOWN: i32 = 254;
    pub const OCCUPIED: i32 = 0;

    pub fn new(dims: GridDims) -> Self {
        Self {
            dims,
            cells: vec![Self::UNKNOWN; dims.len()],
        }
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }

    pub fn width(&self) -> usize {
        self.dims.width
    }

    pub fn height(&self) -> usize {
        self.dims.height
    }

    pub fn get(&self, col: usize, row: usize) -> Option<i32> {
        if col < self.dims.width && row < self.dims.height {
            Some(self.cells[row * self.dims.width + col])
        } else {
            None
        }
    }

    /// Panics if the cell is out of bounds.
    #[inline]
    pub fn mark_occupied(&mut self, col: usize, row: usize) {
        assert!(col < self.dims.width && row < self.dims.height);
        self.cells[row * self.dims.width + col] = Self::OCCUPIED;
    }

    pub fn rows(&self) -> impl Iterator<Item = &[i32]> {
        self.cells.chunks(self.dims.width.max(1))
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c == Self::OCCUPIED).count()
    }
}

/// 8-bit height image, row-major with row 0 touching `max_y`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeightRaster {
    dims: GridDims,
    pixels: Vec<u8>,
}

impl HeightRaster {
    /// Free / no data.
    pub const BACKGROUND: u8 = 255;

    pub fn new(dims: GridDims) -> Self {
        Self {
            dims,
            pixels: vec![Self::BACKGROUND; dims.len()],
        }
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }

    pub fn width(&self) -> usize {
        self.dims.width
    }

    pub fn height(&self) -> usize {
        self.dims.height
    }

    pub fn get(&self, col: usize, row: usize) -> Option<u8> {
        if col < self.dims.width && row < self.dims.height {
            Some(self.pixels[row * self.dims.width + col])
        } else {
            None
        }
    }

    /// Overwrites whatever was there. Panics if the pixel is out of bounds.
    #[inline]
    pub fn put(&mut self, col: usize, row: usize, value: u8) {
        assert!(col < self.dims.width && row < self.dims.height);
        self.pixels[row * self.dims.width + col] = value;
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.pixels
    }
}
