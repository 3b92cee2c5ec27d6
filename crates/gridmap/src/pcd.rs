//! Reader for PCD (Point Cloud Data) v0.7 files.
//!
//! Supports `DATA ascii` and `DATA binary`. `binary_compressed` payloads are
//! rejected with [`SourceError::UnsupportedEncoding`]. Points whose x/y/z is
//! not finite (the NaN padding of organized clouds) are dropped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::SourceError;
use crate::point::{Point3D, PointSource, ScanId};

pub const PCD_EXTENSION: &str = "pcd";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Float,
    Signed,
    Unsigned,
}

impl FieldKind {
    fn parse(s: &str) -> Result<Self, SourceError> {
        match s {
            "F" | "f" => Ok(Self::Float),
            "I" | "i" => Ok(Self::Signed),
            "U" | "u" => Ok(Self::Unsigned),
            other => Err(SourceError::Header(format!("unknown TYPE `{other}`"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataEncoding {
    Ascii,
    Binary,
    BinaryCompressed,
}

#[derive(Debug, Clone)]
struct Field {
    name: String,
    size: usize,
    kind: FieldKind,
    count: usize,
}

/// Parsed PCD header, up to and including the `DATA` line.
#[derive(Debug, Clone)]
pub struct PcdHeader {
    fields: Vec<Field>,
    pub width: usize,
    pub height: usize,
    pub points: usize,
    pub data: DataEncoding,
}

fn parse_one(key: &str, values: &[&str]) -> Result<usize, SourceError> {
    values
        .first()
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| SourceError::Header(format!("{key} needs one integer")))
}

fn parse_list(key: &str, values: &[&str]) -> Result<Vec<usize>, SourceError> {
    values
        .iter()
        .map(|v| {
            v.parse()
                .map_err(|_| SourceError::Header(format!("{key}: bad entry `{v}`")))
        })
        .collect()
}

impl PcdHeader {
    /// Consume header lines from `reader`, leaving it positioned at the payload.
    pub fn parse<R: BufRead>(reader: &mut R) -> Result<Self, SourceError> {
        let mut names: Vec<String> = Vec::new();
        let mut sizes: Vec<usize> = Vec::new();
        let mut kinds: Vec<FieldKind> = Vec::new();
        let mut counts: Option<Vec<usize>> = None;
        let mut width: Option<usize> = None;
        let mut height: Option<usize> = None;
        let mut points: Option<usize> = None;

        let mut line = Vec::new();
        let data = loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                return Err(SourceError::Header("missing DATA line".into()));
            }

            let text = std::str::from_utf8(&line)
                .map_err(|_| SourceError::Header("header is not UTF-8".into()))?
                .trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }

            let mut parts = text.split_whitespace();
            let Some(key) = parts.next() else { continue };
            let values: Vec<&str> = parts.collect();

            match key.to_ascii_uppercase().as_str() {
                "VERSION" | "VIEWPOINT" => {}
                "FIELDS" => names = values.iter().map(|v| v.to_string()).collect(),
                "SIZE" => sizes = parse_list(key, &values)?,
                "TYPE" => {
                    kinds = values
                        .iter()
                        .map(|v| FieldKind::parse(v))
                        .collect::<Result<_, _>>()?
                }
                "COUNT" => counts = Some(parse_list(key, &values)?),
                "WIDTH" => width = Some(parse_one(key, &values)?),
                "HEIGHT" => height = Some(parse_one(key, &values)?),
                "POINTS" => points = Some(parse_one(key, &values)?),
                "DATA" => {
                    break match values.first().map(|v| v.to_ascii_lowercase()).as_deref() {
                        Some("ascii") => DataEncoding::Ascii,
                        Some("binary") => DataEncoding::Binary,
                        Some("binary_compressed") => DataEncoding::BinaryCompressed,
                        other => {
                            return Err(SourceError::UnsupportedEncoding(
                                other.unwrap_or("").to_owned(),
                            ))
                        }
                    };
                }
                other => return Err(SourceError::Header(format!("unknown key `{other}`"))),
            }
        };

        if names.is_empty() {
            return Err(SourceError::Header("no FIELDS".into()));
        }
        let counts = counts.unwrap_or_else(|| vec![1; names.len()]);
        if sizes.len() != names.len() || kinds.len() != names.len() || counts.len() != names.len()
        {
            return Err(SourceError::Header(
                "FIELDS, SIZE, TYPE and COUNT disagree in length".into(),
            ));
        }

        let width = width.ok_or_else(|| SourceError::Header("no WIDTH".into()))?;
        let height = height.unwrap_or(1);
        let points = match points {
            Some(points) => points,
            None => width.checked_mul(height).ok_or_else(|| {
                SourceError::Header(format!("WIDTH {width} x HEIGHT {height} overflows"))
            })?,
        };

        let fields = names
            .into_iter()
            .zip(sizes)
            .zip(kinds)
            .zip(counts)
            .map(|(((name, size), kind), count)| Field {
                name,
                size,
                kind,
                count,
            })
            .collect();

        Ok(Self {
            fields,
            width,
            height,
            points,
            data,
        })
    }
}

/// Where one scalar lives inside a record.
#[derive(Debug, Clone, Copy)]
struct Slot {
    byte_offset: usize,
    token_index: usize,
    size: usize,
    kind: FieldKind,
}

impl Slot {
    fn decode(&self, record: &[u8]) -> f64 {
        let b = &record[self.byte_offset..self.byte_offset + self.size];
        match (self.kind, self.size) {
            (FieldKind::Float, 4) => f32::from_le_bytes(le(b)) as f64,
            (FieldKind::Float, _) => f64::from_le_bytes(le(b)),
            (FieldKind::Signed, 1) => b[0] as i8 as f64,
            (FieldKind::Signed, 2) => i16::from_le_bytes(le(b)) as f64,
            (FieldKind::Signed, 4) => i32::from_le_bytes(le(b)) as f64,
            (FieldKind::Signed, _) => i64::from_le_bytes(le(b)) as f64,
            (FieldKind::Unsigned, 1) => b[0] as f64,
            (FieldKind::Unsigned, 2) => u16::from_le_bytes(le(b)) as f64,
            (FieldKind::Unsigned, 4) => u32::from_le_bytes(le(b)) as f64,
            (FieldKind::Unsigned, _) => u64::from_le_bytes(le(b)) as f64,
        }
    }
}

#[inline(always)]
fn le<const N: usize>(b: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&b[..N]);
    out
}

/// Byte and token positions of x, y, z and the optional intensity.
#[derive(Debug, Clone, Copy)]
struct Layout {
    x: Slot,
    y: Slot,
    z: Slot,
    aux: Option<Slot>,
    stride: usize,
    tokens: usize,
}

impl Layout {
    fn resolve(header: &PcdHeader) -> Result<Self, SourceError> {
        let mut slots = Vec::with_capacity(header.fields.len());
        let mut byte_offset = 0;
        let mut token_index = 0;

        for field in &header.fields {
            let valid = match field.kind {
                FieldKind::Float => matches!(field.size, 4 | 8),
                FieldKind::Signed | FieldKind::Unsigned => matches!(field.size, 1 | 2 | 4 | 8),
            };
            if !valid || field.count == 0 {
                return Err(SourceError::Header(format!(
                    "field `{}` has unsupported SIZE {} / COUNT {}",
                    field.name, field.size, field.count
                )));
            }

            slots.push((
                field.name.as_str(),
                Slot {
                    byte_offset,
                    token_index,
                    size: field.size,
                    kind: field.kind,
                },
            ));
            byte_offset += field.size * field.count;
            token_index += field.count;
        }

        let find = |name: &str| slots.iter().find(|(n, _)| *n == name).map(|(_, s)| *s);

        Ok(Self {
            x: find("x").ok_or(SourceError::MissingField("x"))?,
            y: find("y").ok_or(SourceError::MissingField("y"))?,
            z: find("z").ok_or(SourceError::MissingField("z"))?,
            aux: find("intensity"),
            stride: byte_offset,
            tokens: token_index,
        })
    }

    fn point_from_record(&self, record: &[u8]) -> Point3D {
        Point3D::new(
            self.x.decode(record) as f32,
            self.y.decode(record) as f32,
            self.z.decode(record) as f32,
            self.aux.map_or(0.0, |s| s.decode(record) as f32),
        )
    }
}

/// Parse a whole PCD stream into points.
pub fn read_pcd<R: BufRead>(mut reader: R) -> Result<Vec<Point3D>, SourceError> {
    let header = PcdHeader::parse(&mut reader)?;
    let layout = Layout::resolve(&header)?;

    match header.data {
        DataEncoding::Ascii => read_ascii(reader, header.points, &layout),
        DataEncoding::Binary => read_binary(reader, header.points, &layout),
        DataEncoding::BinaryCompressed => Err(SourceError::UnsupportedEncoding(
            "binary_compressed".into(),
        )),
    }
}

/// The header's `POINTS` is untrusted; never reserve more than this up front.
const ASCII_PREALLOC_POINTS: usize = 1 << 16;

fn read_ascii<R: BufRead>(
    reader: R,
    expected: usize,
    layout: &Layout,
) -> Result<Vec<Point3D>, SourceError> {
    let mut points = Vec::with_capacity(expected.min(ASCII_PREALLOC_POINTS));
    let mut seen = 0usize;

    for (line_no, line) in reader.lines().enumerate() {
        if seen == expected {
            break;
        }

        let line = line?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        if tokens.len() < layout.tokens {
            return Err(SourceError::Parse {
                line: line_no + 1,
                value: line.clone(),
            });
        }

        let value = |slot: Slot| -> Result<f32, SourceError> {
            let token = tokens[slot.token_index];
            token.parse::<f32>().map_err(|_| SourceError::Parse {
                line: line_no + 1,
                value: token.to_owned(),
            })
        };

        let point = Point3D::new(
            value(layout.x)?,
            value(layout.y)?,
            value(layout.z)?,
            layout.aux.map(value).transpose()?.unwrap_or(0.0),
        );

        seen += 1;
        if point.is_finite() {
            points.push(point);
        }
    }

    if seen < expected {
        return Err(SourceError::Truncated {
            expected,
            found: seen,
        });
    }

    Ok(points)
}

fn read_binary<R: BufRead>(
    mut reader: R,
    expected: usize,
    layout: &Layout,
) -> Result<Vec<Point3D>, SourceError> {
    let mut payload = Vec::new();
    reader.read_to_end(&mut payload)?;

    let available = payload.len() / layout.stride;
    if available < expected {
        return Err(SourceError::Truncated {
            expected,
            found: available,
        });
    }

    Ok(payload
        .chunks_exact(layout.stride)
        .take(expected)
        .map(|record| layout.point_from_record(record))
        .filter(Point3D::is_finite)
        .collect())
}

/// Resolves scan ids to `<base_dir>/<id>.pcd`.
#[derive(Debug, Clone)]
pub struct PcdDirectory {
    base_dir: PathBuf,
}

impl PcdDirectory {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn path_for(&self, scan: &ScanId) -> PathBuf {
        self.base_dir.join(format!("{scan}.{PCD_EXTENSION}"))
    }
}

impl PointSource for PcdDirectory {
    fn load(&self, scan: &ScanId) -> Result<Vec<Point3D>, SourceError> {
        let path = self.path_for(scan);
        let file = File::open(&path).map_err(|source| SourceError::Open { path, source })?;
        read_pcd(BufReader::new(file))
    }
}
