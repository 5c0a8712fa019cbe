//! Turning-angle ("theta") parameterization of a center line.
//!
//! A center line of `n` points is encoded as `n - 2` turning angles plus
//! the absolute orientation of the middle segment, the position of the
//! middle vertex (the anchor) and the total length. Anchoring at index
//! `(n - 1) / 2` instead of an endpoint keeps reconstructions from
//! drifting when the shape is re-derived repeatedly from head or tail.
//!
//! Turning angles are scaled by `n - 1` so they approximate the
//! derivative of the tangent angle with respect to normalized arc length.
//! That makes [`ThetaMethod::Discrete`] and [`ThetaMethod::Spline`]
//! results interchangeable at the same resolution.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::curve::{cumulative_arc, resample, resample_values};
use crate::spline::CubicSpline;
use crate::types::{Curve, Point, ShapeError, require_points};

/// Turning angles plus the absolute placement of a center line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThetaState {
    /// `n - 2` turning angles, scaled by `n - 1`.
    pub theta: Vec<f64>,
    /// Heading of the middle segment, in (-pi, pi].
    pub orientation: f64,
    /// Position of the middle vertex.
    pub anchor: Point,
    /// Total center line length.
    pub length: f64,
}

impl ThetaState {
    /// Number of center line points this state encodes.
    #[must_use]
    pub const fn npoints(&self) -> usize {
        self.theta.len() + 2
    }
}

/// Index of the anchor vertex (and anchor segment) for `n` points.
#[must_use]
pub const fn anchor_index(n: usize) -> usize {
    n.saturating_sub(1) / 2
}

/// Wrap an angle to (-pi, pi].
#[must_use]
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Selects how theta is derived and integrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ThetaMethod {
    /// Finite differences of segment angles and cumulative sums.
    #[default]
    Discrete,
    /// Cubic spline of the segment angles through their midpoints; theta
    /// is its derivative at the vertices and reconstruction solves for
    /// the headings that reproduce it.
    Spline,
}

/// Bidirectional conversion between a center line and a [`ThetaState`].
pub trait ThetaMapping {
    /// Derive the turning-angle state of `center`, optionally resampled
    /// to `samples` points first.
    ///
    /// # Errors
    ///
    /// [`ShapeError::TooFewPoints`] for fewer than three points and
    /// [`ShapeError::Degenerate`] for a zero-length center line.
    fn theta_from_center(
        &self,
        center: &Curve,
        samples: Option<usize>,
    ) -> Result<ThetaState, ShapeError>;

    /// Reconstruct the center line and its unit normals. `points`
    /// resamples theta to `points - 2` values before integrating.
    ///
    /// # Errors
    ///
    /// [`ShapeError::TooFewPoints`] if fewer than two points would be
    /// produced and [`ShapeError::Degenerate`] for a non-positive or
    /// non-finite length.
    fn center_and_normals_from_theta(
        &self,
        state: &ThetaState,
        points: Option<usize>,
    ) -> Result<(Curve, Vec<Point>), ShapeError>;

    /// Reconstruct the center line only.
    ///
    /// # Errors
    ///
    /// As [`center_and_normals_from_theta`](Self::center_and_normals_from_theta).
    fn center_from_theta(
        &self,
        state: &ThetaState,
        points: Option<usize>,
    ) -> Result<Curve, ShapeError> {
        self.center_and_normals_from_theta(state, points)
            .map(|(center, _)| center)
    }
}

impl ThetaMapping for ThetaMethod {
    fn theta_from_center(
        &self,
        center: &Curve,
        samples: Option<usize>,
    ) -> Result<ThetaState, ShapeError> {
        let center = prepare_center(center, samples)?;
        match *self {
            Self::Discrete => Ok(discrete_theta(&center)),
            Self::Spline => spline_theta(&center),
        }
    }

    fn center_and_normals_from_theta(
        &self,
        state: &ThetaState,
        points: Option<usize>,
    ) -> Result<(Curve, Vec<Point>), ShapeError> {
        let theta = prepare_theta(state, points)?;
        match *self {
            Self::Discrete => Ok(discrete_center(&theta, state)),
            Self::Spline if theta.len() >= 2 => spline_center(&theta, state),
            Self::Spline => Ok(discrete_center(&theta, state)),
        }
    }
}

fn prepare_center(center: &Curve, samples: Option<usize>) -> Result<Curve, ShapeError> {
    require_points("center line", center.len(), 3)?;
    let center = match samples {
        Some(n) if n != center.len() => {
            require_points("center line samples", n, 3)?;
            resample(center, n, 0.0)?
        }
        _ => center.clone(),
    };
    let length = center.arc_length();
    if !length.is_finite() || length <= 0.0 {
        return Err(ShapeError::Degenerate("center line has zero length".into()));
    }
    Ok(center)
}

fn prepare_theta(state: &ThetaState, points: Option<usize>) -> Result<Vec<f64>, ShapeError> {
    if !state.length.is_finite() || state.length <= 0.0 {
        return Err(ShapeError::Degenerate(format!(
            "center line length must be positive, got {}",
            state.length
        )));
    }
    match points {
        Some(n) if n != state.npoints() => {
            require_points("reconstructed center line", n, 2)?;
            if state.theta.is_empty() {
                Ok(vec![0.0; n - 2])
            } else {
                Ok(resample_values(&state.theta, n - 2))
            }
        }
        _ => Ok(state.theta.clone()),
    }
}

/// Segment headings, unwrapped so consecutive values differ by at most pi.
fn unwrapped_segment_angles(points: &[Point]) -> Vec<f64> {
    let mut angles: Vec<f64> = Vec::with_capacity(points.len().saturating_sub(1));
    for w in points.windows(2) {
        let a = (w[1] - w[0]).angle();
        let next = angles.last().map_or(a, |&prev| prev + wrap_angle(a - prev));
        angles.push(next);
    }
    angles
}

#[allow(clippy::cast_precision_loss)]
fn discrete_theta(center: &Curve) -> ThetaState {
    let points = center.points();
    let n = points.len();
    let n2 = anchor_index(n);
    let scale = (n - 1) as f64;
    let angles: Vec<f64> = points.windows(2).map(|w| (w[1] - w[0]).angle()).collect();
    let theta = angles
        .windows(2)
        .map(|a| wrap_angle(a[1] - a[0]) * scale)
        .collect();
    ThetaState {
        theta,
        orientation: wrap_angle(angles[n2]),
        anchor: points[n2],
        length: center.arc_length(),
    }
}

fn spline_theta(center: &Curve) -> Result<ThetaState, ShapeError> {
    let points = center.points();
    let n = points.len();
    let n2 = anchor_index(n);
    let length = center.arc_length();
    let arc: Vec<f64> = cumulative_arc(points)
        .into_iter()
        .map(|s| s / length)
        .collect();
    let mids: Vec<f64> = arc.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect();
    let angles = unwrapped_segment_angles(points);
    let orientation = wrap_angle(angles[n2]);
    let phi = CubicSpline::new(mids, angles)?;
    let theta = arc[1..n - 1].iter().map(|&s| phi.derivative(s)).collect();
    Ok(ThetaState {
        theta,
        orientation,
        anchor: points[n2],
        length,
    })
}

/// Vertex normals from segment angles: average of the adjacent segment
/// headings (endpoints take their own segment) rotated by +pi/2.
fn vertex_normals(segment_angles: &[f64]) -> Vec<Point> {
    let m = segment_angles.len();
    (0..=m)
        .map(|i| {
            let tangent = if i == 0 {
                segment_angles[0]
            } else if i == m {
                segment_angles[m - 1]
            } else {
                0.5 * (segment_angles[i - 1] + segment_angles[i])
            };
            Point::from_angle(tangent + FRAC_PI_2)
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn discrete_center(theta: &[f64], state: &ThetaState) -> (Curve, Vec<Point>) {
    let n = theta.len() + 2;
    let n2 = anchor_index(n);
    let delta = 1.0 / (n - 1) as f64;

    let mut phi = Vec::with_capacity(n - 1);
    phi.push(0.0);
    for t in theta {
        let prev = phi[phi.len() - 1];
        phi.push(t.mul_add(delta, prev));
    }
    let shift = state.orientation - phi[n2];
    for a in &mut phi {
        *a += shift;
    }
    place_segments(&phi, state)
}

/// Lay out `n - 1` equal segments with the given headings and move the
/// anchor vertex onto `state.anchor`.
#[allow(clippy::cast_precision_loss)]
fn place_segments(headings: &[f64], state: &ThetaState) -> (Curve, Vec<Point>) {
    let n = headings.len() + 1;
    let n2 = anchor_index(n);
    let step = state.length / (n - 1) as f64;

    let mut points = Vec::with_capacity(n);
    points.push(Point::ZERO);
    for &a in headings {
        let prev = points[points.len() - 1];
        points.push(prev + Point::from_angle(a) * step);
    }
    let offset = state.anchor - points[n2];
    for p in &mut points {
        *p += offset;
    }

    (Curve::new(points), vertex_normals(headings))
}

/// Inverse of [`spline_theta`] for equal segments: recovers the segment
/// headings whose midpoint spline has the given derivatives at the
/// interior vertices, with the anchor segment pinned to the orientation.
///
/// Derivatives of a natural spline are linear in its values, so column
/// `j` of the system is the derivative profile of the spline through a
/// unit heading at segment `j`.
#[allow(clippy::cast_precision_loss)]
fn spline_center(theta: &[f64], state: &ThetaState) -> Result<(Curve, Vec<Point>), ShapeError> {
    let n = theta.len() + 2;
    let n2 = anchor_index(n);
    let scale = (n - 1) as f64;
    let mids: Vec<f64> = (0..n - 1).map(|j| (j as f64 + 0.5) / scale).collect();
    let vertices: Vec<f64> = (1..n - 1).map(|i| i as f64 / scale).collect();

    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(n - 1);
    for j in 0..n - 1 {
        let mut unit = vec![0.0; n - 1];
        unit[j] = 1.0;
        let basis = CubicSpline::new(mids.clone(), unit)?;
        columns.push(vertices.iter().map(|&s| basis.derivative(s)).collect());
    }

    let free: Vec<usize> = (0..n - 1).filter(|&j| j != n2).collect();
    let system = DMatrix::from_fn(n - 2, n - 2, |k, c| columns[free[c]][k]);
    let rhs = DVector::from_iterator(
        n - 2,
        theta
            .iter()
            .zip(&columns[n2])
            .map(|(t, d)| d.mul_add(-state.orientation, *t)),
    );
    let solved = system.lu().solve(&rhs).ok_or_else(|| {
        ShapeError::Degenerate("turning angles do not determine the segment headings".into())
    })?;

    let mut headings = vec![state.orientation; n - 1];
    for (&j, &a) in free.iter().zip(solved.iter()) {
        headings[j] = a;
    }
    Ok(place_segments(&headings, state))
}

/// Unit normals at every vertex of `center`, pointing to the left of the
/// direction of travel (the tangent rotated by +pi/2).
///
/// # Errors
///
/// [`ShapeError::TooFewPoints`] for fewer than two points.
pub fn normals_from_center(center: &Curve) -> Result<Vec<Point>, ShapeError> {
    require_points("center line", center.len(), 2)?;
    Ok(vertex_normals(&unwrapped_segment_angles(center.points())))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::curve::linspace;

    fn arc(n: usize, radius: f64, span: f64, start: f64) -> Curve {
        linspace(start, start + span, n)
            .into_iter()
            .map(|t| Point::new(40.0 + radius * t.cos(), 25.0 + radius * t.sin()))
            .collect()
    }

    /// A smooth S-shaped curve of 60 units built from equal-length
    /// segments, so the discrete encoding is exact.
    #[allow(clippy::cast_precision_loss)]
    fn wiggle(n: usize) -> Curve {
        let step = 60.0 / (n - 1) as f64;
        let mut p = Point::new(5.0, 0.0);
        let mut points = vec![p];
        for j in 0..n - 1 {
            let s = (j as f64 + 0.5) / (n - 1) as f64;
            p += Point::from_angle(0.6 * (TAU * s).sin()) * step;
            points.push(p);
        }
        Curve::new(points)
    }

    fn max_deviation(a: &Curve, b: &Curve) -> f64 {
        a.iter()
            .zip(b)
            .map(|(p, q)| p.distance(*q))
            .fold(0.0, f64::max)
    }

    #[test]
    fn wrap_angle_range() {
        assert!((wrap_angle(PI) - PI).abs() < 1e-12);
        assert!((wrap_angle(-PI) - PI).abs() < 1e-12);
        assert!((wrap_angle(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert!((wrap_angle(0.25) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn discrete_round_trip_is_exact() {
        for n in [5, 6, 21, 50] {
            let c = wiggle(n);
            let state = ThetaMethod::Discrete.theta_from_center(&c, None).unwrap();
            assert_eq!(state.theta.len(), n - 2);
            let back = ThetaMethod::Discrete
                .center_from_theta(&state, None)
                .unwrap();
            let dev = max_deviation(&c, &back);
            assert!(dev < 1e-9, "n = {n}: deviation {dev}");
        }
    }

    #[test]
    fn spline_round_trip_on_arc() {
        let c = arc(41, 30.0, 2.0, 0.3);
        let state = ThetaMethod::Spline.theta_from_center(&c, None).unwrap();
        let back = ThetaMethod::Spline.center_from_theta(&state, None).unwrap();
        let dev = max_deviation(&c, &back);
        assert!(dev < 1e-6, "deviation {dev}");
    }

    #[test]
    fn spline_round_trip_on_wiggle() {
        for n in [6, 21, 60] {
            let c = wiggle(n);
            let state = ThetaMethod::Spline.theta_from_center(&c, None).unwrap();
            let back = ThetaMethod::Spline.center_from_theta(&state, None).unwrap();
            let dev = max_deviation(&c, &back);
            assert!(dev < 1e-6, "n = {n}: deviation {dev}");
        }
    }

    #[test]
    fn spline_round_trip_on_five_point_zigzag() {
        let c = Curve::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.5),
            Point::new(2.0, 0.0),
            Point::new(3.0, 0.5),
            Point::new(4.0, 0.0),
        ]);
        let state = ThetaMethod::Spline.theta_from_center(&c, None).unwrap();
        assert_eq!(state.theta.len(), 3);
        let (back, normals) = ThetaMethod::Spline
            .center_and_normals_from_theta(&state, None)
            .unwrap();
        let dev = max_deviation(&c, &back);
        assert!(dev < 1e-9, "deviation {dev}");
        for (a, b) in normals.iter().zip(normals_from_center(&c).unwrap()) {
            assert!(a.distance(b) < 1e-9);
        }
    }

    #[test]
    fn variants_agree_at_high_resolution() {
        let c = wiggle(200);
        let d = ThetaMethod::Discrete.theta_from_center(&c, None).unwrap();
        let s = ThetaMethod::Spline.theta_from_center(&c, None).unwrap();
        assert!((d.orientation - s.orientation).abs() < 1e-2);
        assert!((d.length - s.length).abs() < 1e-2);
        let worst = d
            .theta
            .iter()
            .zip(&s.theta)
            .skip(5)
            .take(d.theta.len() - 10)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        assert!(worst < 1e-2, "max theta difference {worst}");
    }

    #[test]
    fn anchor_is_middle_vertex() {
        let c = wiggle(21);
        let state = ThetaMethod::Discrete.theta_from_center(&c, None).unwrap();
        assert_eq!(state.anchor, c[10]);
        let c = wiggle(20);
        let state = ThetaMethod::Discrete.theta_from_center(&c, None).unwrap();
        assert_eq!(state.anchor, c[9]);
    }

    #[test]
    fn straight_line_has_zero_theta_and_known_orientation() {
        let c: Curve = (0..7)
            .map(|i| Point::new(f64::from(i), f64::from(i)))
            .collect();
        let state = ThetaMethod::Discrete.theta_from_center(&c, None).unwrap();
        assert!(state.theta.iter().all(|t| t.abs() < 1e-12));
        assert!((state.orientation - PI / 4.0).abs() < 1e-12);
        assert!((state.length - 6.0 * 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn arc_theta_equals_turned_angle() {
        let c = arc(30, 10.0, 1.5, 0.0);
        let state = ThetaMethod::Discrete.theta_from_center(&c, None).unwrap();
        for t in &state.theta {
            assert!((t - 1.5).abs() < 1e-9, "theta {t}");
        }
    }

    #[test]
    fn requested_points_resample_theta() {
        let c = wiggle(21);
        let state = ThetaMethod::Discrete.theta_from_center(&c, None).unwrap();
        let (center, normals) = ThetaMethod::Discrete
            .center_and_normals_from_theta(&state, Some(41))
            .unwrap();
        assert_eq!(center.len(), 41);
        assert_eq!(normals.len(), 41);
        assert!(center[20].distance(state.anchor) < 1e-9);
    }

    #[test]
    fn normals_are_unit_and_left_of_travel() {
        let c = Curve::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(2.0, 0.0),
        ]);
        let normals = normals_from_center(&c).unwrap();
        for n in &normals {
            assert!((n.norm() - 1.0).abs() < 1e-12);
            assert!((n.y - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn vertex_normal_bisects_corner() {
        let c = Curve::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
        ]);
        let normals = normals_from_center(&c).unwrap();
        let expected = Point::from_angle(PI / 4.0 + FRAC_PI_2);
        assert!(normals[1].distance(expected) < 1e-12);
    }

    #[test]
    fn too_few_points_is_an_error() {
        let c = Curve::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)]);
        let err = ThetaMethod::Discrete
            .theta_from_center(&c, None)
            .unwrap_err();
        assert!(matches!(err, ShapeError::TooFewPoints { .. }));
    }

    #[test]
    fn zero_length_state_is_rejected() {
        let state = ThetaState {
            theta: vec![0.0; 3],
            orientation: 0.0,
            anchor: Point::ZERO,
            length: 0.0,
        };
        assert!(matches!(
            ThetaMethod::Spline.center_from_theta(&state, None),
            Err(ShapeError::Degenerate(_))
        ));
    }
}
