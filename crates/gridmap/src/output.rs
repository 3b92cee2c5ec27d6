//! Writers for the three conversion artifacts.
//!
//! Each artifact has a `Write`-based encoder and a `*_file` wrapper that
//! attaches the destination path to any error. Files are written
//! independently: a failure in one leaves the others on disk.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use image::codecs::pnm::{PnmEncoder, PnmSubtype, SampleEncoding};
use image::{ColorType, ImageEncoder, ImageResult};
use serde::{Deserialize, Serialize};

use crate::error::OutputError;
use crate::extent::PlanarExtent;
use crate::grid::{GridModel, GridParameters, HeightRaster};

/// First field of the grid text header, expected verbatim by consumers.
pub const GRID_FORMAT_VERSION: u32 = 15;

pub const OCCUPIED_THRESH: f32 = 0.5;
pub const FREE_THRESH: f32 = 0.5;
pub const NEGATE: u8 = 0;

/// Binds grid cell / pixel (0, 0) to world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentDescriptor {
    pub resolution: f32,
    pub origin_x: f32,
    pub origin_y: f32,
}

impl AlignmentDescriptor {
    pub fn new(extent: &PlanarExtent, params: &GridParameters) -> Self {
        Self {
            resolution: params.resolution,
            origin_x: extent.min_x,
            origin_y: extent.min_y,
        }
    }
}

/// Map-server style metadata for the height raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapDescriptor {
    pub image: String,
    pub resolution: f32,
    pub origin: [f32; 3],
    pub occupied_thresh: f32,
    pub free_thresh: f32,
    pub negate: u8,
}

impl MapDescriptor {
    pub fn new(image: impl Into<String>, alignment: &AlignmentDescriptor) -> Self {
        Self {
            image: image.into(),
            resolution: alignment.resolution,
            origin: [alignment.origin_x, alignment.origin_y, 0.0],
            occupied_thresh: OCCUPIED_THRESH,
            free_thresh: FREE_THRESH,
            negate: NEGATE,
        }
    }
}

/// Header line, then one line per grid row starting at `min_y`. Every value
/// is followed by a single space.
pub fn write_grid<W: Write>(
    mut w: W,
    grid: &GridModel,
    alignment: &AlignmentDescriptor,
) -> io::Result<()> {
    writeln!(
        w,
        "{} {} {} {} {} {} {}",
        GRID_FORMAT_VERSION,
        alignment.resolution,
        grid.height(),
        grid.width(),
        alignment.resolution,
        alignment.origin_x,
        alignment.origin_y
    )?;

    for row in grid.rows() {
        for value in row {
            write!(w, "{value} ")?;
        }
        writeln!(w)?;
    }

    w.flush()
}

pub fn write_grid_file(
    path: &Path,
    grid: &GridModel,
    alignment: &AlignmentDescriptor,
) -> Result<(), OutputError> {
    let io_err = |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(io_err)?;
    write_grid(BufWriter::new(file), grid, alignment).map_err(io_err)
}

/// Binary PGM (`P5`, maxval 255).
pub fn encode_pgm<W: Write>(w: W, raster: &HeightRaster) -> ImageResult<()> {
    PnmEncoder::new(w)
        .with_subtype(PnmSubtype::Graymap(SampleEncoding::Binary))
        .write_image(
            raster.as_raw(),
            raster.width() as u32,
            raster.height() as u32,
            ColorType::L8,
        )
}

/// `.pgm`/`.pnm` paths get a binary PGM; anything else is encoded by the
/// format the extension names (PNG, ...).
pub fn write_raster_file(path: &Path, raster: &HeightRaster) -> Result<(), OutputError> {
    let image_err = |source| OutputError::Image {
        path: path.to_path_buf(),
        source,
    };

    let is_pnm = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pgm") || e.eq_ignore_ascii_case("pnm"))
        .unwrap_or(false);

    if is_pnm {
        let file = File::create(path).map_err(|source| OutputError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        encode_pgm(&mut writer, raster).map_err(image_err)?;
        writer.flush().map_err(|source| OutputError::Io {
            path: path.to_path_buf(),
            source,
        })
    } else {
        image::save_buffer(
            path,
            raster.as_raw(),
            raster.width() as u32,
            raster.height() as u32,
            ColorType::L8,
        )
        .map_err(image_err)
    }
}

pub fn write_descriptor<W: Write>(w: W, descriptor: &MapDescriptor) -> serde_yaml::Result<()> {
    serde_yaml::to_writer(w, descriptor)
}

pub fn write_descriptor_file(path: &Path, descriptor: &MapDescriptor) -> Result<(), OutputError> {
    let file = File::create(path).map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);

    write_descriptor(&mut writer, descriptor).map_err(|source| OutputError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })
}
