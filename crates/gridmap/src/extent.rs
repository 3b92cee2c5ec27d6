use rayon::prelude::*;

use crate::point::Point3D;

/// Axis-aligned bounding rectangle of the (x, y) coordinates of a point set.
///
/// Starts out [`EMPTY`](Self::EMPTY) (`+inf` minima, `-inf` maxima) and is
/// grown one point at a time. An extent that never saw a point stays empty
/// and must not be used to size a grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanarExtent {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
}

impl Default for PlanarExtent {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl PlanarExtent {
    pub const EMPTY: Self = Self {
        min_x: f32::INFINITY,
        max_x: f32::NEG_INFINITY,
        min_y: f32::INFINITY,
        max_y: f32::NEG_INFINITY,
    };

    /// Grow the extent to cover `point`. z is ignored.
    #[inline]
    pub fn include(self, point: &Point3D) -> Self {
        Self {
            min_x: self.min_x.min(point.x),
            max_x: self.max_x.max(point.x),
            min_y: self.min_y.min(point.y),
            max_y: self.max_y.max(point.y),
        }
    }

    /// Union of two extents; `EMPTY` is the identity.
    #[inline]
    pub fn merge(self, other: Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            max_x: self.max_x.max(other.max_x),
            min_y: self.min_y.min(other.min_y),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn from_points<'a, I>(points: I) -> Self
    where
        I: IntoIterator<Item = &'a Point3D>,
    {
        points.into_iter().fold(Self::EMPTY, Self::include)
    }

    /// Same result as [`from_points`](Self::from_points), reduced in parallel.
    pub fn par_from_points(points: &[Point3D]) -> Self {
        points
            .par_iter()
            .fold(|| Self::EMPTY, Self::include)
            .reduce(|| Self::EMPTY, Self::merge)
    }

    /// True until at least one point has been included.
    #[inline]
    pub fn is_empty(&self) -> bool {
        !(self.min_x <= self.max_x && self.min_y <= self.max_y)
    }

    #[inline]
    pub fn span_x(&self) -> f32 {
        self.max_x - self.min_x
    }

    #[inline]
    pub fn span_y(&self) -> f32 {
        self.max_y - self.min_y
    }
}
