//! Shared types for the worm shape geometry core.

use std::ops::{Add, AddAssign, Index, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can hand images to the
/// detector without depending on `image` directly.
pub use image::GrayImage;

/// A 2D point in image coordinates.
///
/// Also used as a free vector (segment directions, normals, offsets).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// The origin / zero vector.
    pub const ZERO: Self = Self::new(0.0, 0.0);

    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Unit vector at angle `angle` (radians) from the positive x axis.
    #[must_use]
    pub fn from_angle(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(cos, sin)
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Dot product, treating both points as vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x.mul_add(other.x, self.y * other.y)
    }

    /// z component of the 3D cross product.
    #[must_use]
    pub fn cross(self, other: Self) -> f64 {
        self.x.mul_add(other.y, -(self.y * other.x))
    }

    /// Vector length.
    #[must_use]
    pub fn norm(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction. The zero vector stays zero.
    #[must_use]
    pub fn unit(self) -> Self {
        let n = self.norm();
        if n > 0.0 { self * (1.0 / n) } else { self }
    }

    /// The vector rotated by +90 degrees.
    #[must_use]
    pub const fn perp(self) -> Self {
        Self::new(-self.y, self.x)
    }

    /// Angle of the vector from the positive x axis, in (-pi, pi].
    #[must_use]
    pub fn angle(self) -> f64 {
        self.y.atan2(self.x)
    }

    /// The vector rotated counterclockwise by `angle` radians.
    #[must_use]
    pub fn rotated(self, angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(
            cos.mul_add(self.x, -(sin * self.y)),
            sin.mul_add(self.x, cos * self.y),
        )
    }

    /// This point rotated by `angle` radians about `center`.
    #[must_use]
    pub fn rotated_about(self, center: Self, angle: f64) -> Self {
        (self - center).rotated(angle) + center
    }

    /// Linear interpolation: `self` at `t = 0`, `other` at `t = 1`.
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        self + (other - self) * t
    }

    /// Midpoint between two points.
    #[must_use]
    pub fn midpoint(self, other: Self) -> Self {
        self.lerp(other, 0.5)
    }

    /// Returns `true` if both coordinates are finite.
    #[must_use]
    pub const fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Point {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Point {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl From<Point> for geo::Coord<f64> {
    fn from(p: Point) -> Self {
        geo::coord! { x: p.x, y: p.y }
    }
}

impl From<geo::Coord<f64>> for Point {
    fn from(c: geo::Coord<f64>) -> Self {
        Self::new(c.x, c.y)
    }
}

impl From<Point> for geo::Point<f64> {
    fn from(p: Point) -> Self {
        Self::new(p.x, p.y)
    }
}

impl From<geo::Point<f64>> for Point {
    fn from(p: geo::Point<f64>) -> Self {
        Self::new(p.x(), p.y())
    }
}

/// An ordered sequence of points: a center line, a boundary side, or a
/// contour.
///
/// Closed contours are stored either with the first point repeated at
/// the end or cyclically without repetition; functions that care say
/// which form they expect.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Curve(Vec<Point>);

impl Curve {
    /// Create a new curve from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// A curve of `n` points all at the origin (failure placeholder).
    #[must_use]
    pub fn zeros(n: usize) -> Self {
        Self(vec![Point::ZERO; n])
    }

    /// Returns `true` if the curve has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the curve.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first point, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Point> {
        self.0.first()
    }

    /// Returns the last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Point> {
        self.0.last()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Mutable access to the points (length is fixed).
    pub fn points_mut(&mut self) -> &mut [Point] {
        &mut self.0
    }

    /// Consumes the curve and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }

    /// Iterate over the points.
    pub fn iter(&self) -> std::slice::Iter<'_, Point> {
        self.0.iter()
    }

    /// Lengths of the `len() - 1` segments.
    #[must_use]
    pub fn segment_lengths(&self) -> Vec<f64> {
        self.0.windows(2).map(|w| w[0].distance(w[1])).collect()
    }

    /// Total polyline length.
    #[must_use]
    pub fn arc_length(&self) -> f64 {
        self.0.windows(2).map(|w| w[0].distance(w[1])).sum()
    }

    /// Returns `true` if the first and last points coincide.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        match (self.0.first(), self.0.last()) {
            (Some(a), Some(b)) => self.0.len() > 2 && a.distance_squared(*b) < 1e-18,
            _ => false,
        }
    }

    /// The same points in reverse order.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self(self.0.iter().rev().copied().collect())
    }

    /// Mean of all points.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> Point {
        if self.0.is_empty() {
            return Point::ZERO;
        }
        let sum = self.0.iter().fold(Point::ZERO, |acc, &p| acc + p);
        sum * (1.0 / self.0.len() as f64)
    }

    /// Convert to a `geo` line string.
    #[must_use]
    pub fn to_line_string(&self) -> geo::LineString<f64> {
        geo::LineString::new(self.0.iter().map(|&p| p.into()).collect())
    }

    /// Flattened `[x0, y0, x1, y1, ...]`.
    #[must_use]
    pub fn to_flat(&self) -> Vec<f64> {
        self.0.iter().flat_map(|p| [p.x, p.y]).collect()
    }
}

impl Index<usize> for Curve {
    type Output = Point;

    fn index(&self, index: usize) -> &Point {
        &self.0[index]
    }
}

impl From<Vec<Point>> for Curve {
    fn from(points: Vec<Point>) -> Self {
        Self(points)
    }
}

impl FromIterator<Point> for Curve {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Curve {
    type Item = &'a Point;
    type IntoIter = std::slice::Iter<'a, Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// The pixel-space center `(width / 2, height / 2)`.
    #[must_use]
    pub fn center(self) -> Point {
        Point::new(f64::from(self.width) / 2.0, f64::from(self.height) / 2.0)
    }
}

/// A violated geometric contract: mismatched lengths, too few points,
/// a degenerate input, or an impossible configuration.
///
/// These are programmer errors from the caller's point of view and are
/// always propagated, never recovered from inside the crate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShapeError {
    /// Two sequences that must be index-aligned have different lengths.
    #[error("{what}: expected length {expected}, found {found}")]
    LengthMismatch {
        /// What was being compared.
        what: &'static str,
        /// The required length.
        expected: usize,
        /// The length actually supplied.
        found: usize,
    },

    /// A sequence is too short for the requested operation.
    #[error("{what}: need at least {needed} points, found {found}")]
    TooFewPoints {
        /// What was too short.
        what: &'static str,
        /// Minimum number of points.
        needed: usize,
        /// The number actually supplied.
        found: usize,
    },

    /// A closed contour was required but the curve is open.
    #[error("contour must be closed (first point equal to last)")]
    OpenContour,

    /// The input has no usable extent (zero length, coincident points,
    /// non-finite values).
    #[error("degenerate geometry: {0}")]
    Degenerate(String),

    /// Delaunay triangulation of a boundary polygon failed.
    #[error("triangulation failed: {0}")]
    Triangulation(String),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors from decoding raw image bytes.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,
}

/// Check that a sequence has at least `needed` entries.
pub(crate) const fn require_points(
    what: &'static str,
    found: usize,
    needed: usize,
) -> Result<(), ShapeError> {
    if found < needed {
        Err(ShapeError::TooFewPoints {
            what,
            needed,
            found,
        })
    } else {
        Ok(())
    }
}

/// Check that two sequences are index-aligned.
pub(crate) const fn require_len(
    what: &'static str,
    found: usize,
    expected: usize,
) -> Result<(), ShapeError> {
    if found == expected {
        Ok(())
    } else {
        Err(ShapeError::LengthMismatch {
            what,
            expected,
            found,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use super::*;

    #[test]
    fn rotation_by_quarter_turn_matches_perp() {
        let v = Point::new(3.0, -1.5);
        let r = v.rotated(FRAC_PI_2);
        let p = v.perp();
        assert!((r.x - p.x).abs() < 1e-12 && (r.y - p.y).abs() < 1e-12);
    }

    #[test]
    fn rotated_about_keeps_distance_to_center() {
        let c = Point::new(10.0, 10.0);
        let p = Point::new(13.0, 14.0);
        let q = p.rotated_about(c, 1.234);
        assert!((q.distance(c) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn unit_of_zero_vector_is_zero() {
        assert_eq!(Point::ZERO.unit(), Point::ZERO);
    }

    #[test]
    fn arc_length_of_l_shape() {
        let c = Curve::new(vec![
            Point::new(0.0, 0.0),
            Point::new(3.0, 0.0),
            Point::new(3.0, 4.0),
        ]);
        assert!((c.arc_length() - 7.0).abs() < 1e-12);
        assert!(!c.is_closed());
    }

    #[test]
    fn closed_detection() {
        let c = Curve::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(0.0, 1.0),
            Point::new(0.0, 0.0),
        ]);
        assert!(c.is_closed());
    }

    #[test]
    fn flat_layout_interleaves_coordinates() {
        let c = Curve::new(vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)]);
        assert_eq!(c.to_flat(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn require_len_reports_both_lengths() {
        let err = require_len("width", 3, 5).unwrap_err();
        assert_eq!(
            err,
            ShapeError::LengthMismatch {
                what: "width",
                expected: 5,
                found: 3
            }
        );
    }
}
