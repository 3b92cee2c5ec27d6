use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A scan's point data could not be obtained. Recoverable: the scan is skipped.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("read failed: {0}")]
    Read(#[from] io::Error),

    #[error("malformed PCD header: {0}")]
    Header(String),

    #[error("PCD has no `{0}` field")]
    MissingField(&'static str),

    #[error("unsupported PCD data encoding `{0}`")]
    UnsupportedEncoding(String),

    #[error("PCD payload truncated: header declares {expected} points, found {found}")]
    Truncated { expected: usize, found: usize },

    #[error("bad value {value:?} on data line {line}")]
    Parse { line: usize, value: String },
}

/// Fatal for the whole run.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("invalid grid parameters: {0}")]
    InvalidParameters(String),

    #[error("degenerate extent: grid would be {width}x{height} cells (no usable points?)")]
    DegenerateExtent { width: usize, height: usize },

    #[error("grid of {width}x{height} cells is too large (far outlier or tiny resolution?)")]
    GridTooLarge { width: usize, height: usize },
}

/// An output artifact could not be written.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode image {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to serialize descriptor {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
