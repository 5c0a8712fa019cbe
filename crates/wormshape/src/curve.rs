//! Polyline primitives: arc-length resampling, Gaussian smoothing,
//! projection onto polylines, and closed-contour helpers.
//!
//! Smoothing widths are always given in samples of the curve being
//! smoothed (a Gaussian sigma). Open curves are smoothed with odd
//! reflection about their endpoints, which keeps both endpoints fixed
//! and leaves straight lines unchanged.

use geo::{Closest, ClosestPoint};

use crate::types::{Curve, Point, ShapeError, require_len, require_points};

/// Resample `curve` to `n` points equally spaced in arc length.
///
/// With `smooth > 0` the points are first smoothed with a Gaussian of
/// that sigma (in samples), endpoints fixed.
///
/// # Errors
///
/// Returns [`ShapeError::TooFewPoints`] if `curve` has fewer than two
/// points or `n < 2`, and [`ShapeError::Degenerate`] if the curve has
/// zero length.
pub fn resample(curve: &Curve, n: usize, smooth: f64) -> Result<Curve, ShapeError> {
    require_points("curve", curve.len(), 2)?;
    require_points("resampled curve", n, 2)?;

    let smoothed;
    let points: &[Point] = if smooth > 0.0 {
        smoothed = smooth_open(curve.points(), smooth);
        &smoothed
    } else {
        curve.points()
    };

    let arc = cumulative_arc(points);
    let total = arc[arc.len() - 1];
    if !total.is_finite() || total <= 0.0 {
        return Err(ShapeError::Degenerate("curve has zero length".into()));
    }

    Ok(arc_positions(total, n)
        .map(|t| interpolate_at(points, &arc, t))
        .collect())
}

/// Resample a center line and its width profile jointly, to `n` samples
/// equally spaced along the center line.
///
/// # Errors
///
/// As [`resample`], plus [`ShapeError::LengthMismatch`] if `width` is
/// not aligned with `center`.
pub fn resample_with_width(
    center: &Curve,
    width: &[f64],
    n: usize,
    smooth: f64,
) -> Result<(Curve, Vec<f64>), ShapeError> {
    require_points("center line", center.len(), 2)?;
    require_len("width profile", width.len(), center.len())?;
    require_points("resampled center line", n, 2)?;

    let (points, width) = if smooth > 0.0 {
        let w = smooth_open_values(width, smooth)
            .into_iter()
            .map(|v| v.max(0.0))
            .collect();
        (smooth_open(center.points(), smooth), w)
    } else {
        (center.points().to_vec(), width.to_vec())
    };

    let arc = cumulative_arc(&points);
    let total = arc[arc.len() - 1];
    if !total.is_finite() || total <= 0.0 {
        return Err(ShapeError::Degenerate("center line has zero length".into()));
    }

    let mut out_points = Vec::with_capacity(n);
    let mut out_width = Vec::with_capacity(n);
    for t in arc_positions(total, n) {
        let (j, frac) = locate(&arc, t);
        let next = (j + 1).min(points.len() - 1);
        out_points.push(points[j].lerp(points[next], frac));
        out_width.push(width[j] + (width[next] - width[j]) * frac);
    }
    Ok((Curve::new(out_points), out_width))
}

/// Linearly resample a 1D sequence to `n` values over the same
/// normalized index range.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn resample_values(values: &[f64], n: usize) -> Vec<f64> {
    match (values.len(), n) {
        (_, 0) | (0, _) => Vec::new(),
        (1, _) => vec![values[0]; n],
        (_, 1) => vec![values[0]],
        (m, _) => {
            if m == n {
                return values.to_vec();
            }
            (0..n)
                .map(|k| {
                    let pos = k as f64 * (m - 1) as f64 / (n - 1) as f64;
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let j = (pos.floor() as usize).min(m - 2);
                    let frac = pos - j as f64;
                    values[j] + (values[j + 1] - values[j]) * frac
                })
                .collect()
        }
    }
}

/// Cumulative arc length at every vertex, starting at zero.
#[must_use]
pub fn cumulative_arc(points: &[Point]) -> Vec<f64> {
    let mut arc = Vec::with_capacity(points.len());
    let mut total = 0.0;
    for (i, p) in points.iter().enumerate() {
        if i > 0 {
            total += points[i - 1].distance(*p);
        }
        arc.push(total);
    }
    arc
}

#[allow(clippy::cast_precision_loss)]
fn arc_positions(total: f64, n: usize) -> impl Iterator<Item = f64> {
    (0..n).map(move |k| {
        if k + 1 == n {
            total
        } else {
            total * k as f64 / (n - 1) as f64
        }
    })
}

/// Segment index and fraction for arc position `t`.
fn locate(arc: &[f64], t: f64) -> (usize, f64) {
    let last = arc.len() - 1;
    let j = arc.partition_point(|&s| s <= t).saturating_sub(1).min(last);
    if j == last {
        return (last, 0.0);
    }
    let len = arc[j + 1] - arc[j];
    if len > 0.0 {
        (j, ((t - arc[j]) / len).clamp(0.0, 1.0))
    } else {
        (j, 0.0)
    }
}

fn interpolate_at(points: &[Point], arc: &[f64], t: f64) -> Point {
    let (j, frac) = locate(arc, t);
    let next = (j + 1).min(points.len() - 1);
    points[j].lerp(points[next], frac)
}

/// Normalized Gaussian weights for offsets `-radius..=radius`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (3.0 * sigma).ceil().max(1.0) as usize;
    #[allow(clippy::cast_precision_loss)]
    let weights: Vec<f64> = (0..=2 * radius)
        .map(|k| {
            let d = k as f64 - radius as f64;
            (-0.5 * d * d / (sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Odd reflection about the endpoints: index `-k` maps to
/// `2*x[0] - x[k]`, index `n-1+k` to `2*x[n-1] - x[n-1-k]`.
fn reflected<T>(values: &[T], i: isize, reflect: impl Fn(T, T) -> T) -> T
where
    T: Copy,
{
    let n = values.len().cast_signed();
    if i < 0 {
        let k = (-i).min(n - 1).cast_unsigned();
        reflect(values[0], values[k])
    } else if i >= n {
        let k = (i - (n - 1)).min(n - 1).cast_unsigned();
        reflect(values[values.len() - 1], values[values.len() - 1 - k])
    } else {
        values[i.cast_unsigned()]
    }
}

/// Gaussian smoothing of an open point sequence, endpoints fixed.
#[must_use]
pub fn smooth_open(points: &[Point], sigma: f64) -> Vec<Point> {
    if sigma <= 0.0 || points.len() < 3 {
        return points.to_vec();
    }
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2).cast_signed();
    let mut out: Vec<Point> = (0..points.len())
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .fold(Point::ZERO, |acc, (k, &w)| {
                    let j = i.cast_signed() + k.cast_signed() - radius;
                    acc + reflected(points, j, |end, p| end * 2.0 - p) * w
                })
        })
        .collect();
    let last = points.len() - 1;
    out[0] = points[0];
    out[last] = points[last];
    out
}

/// Gaussian smoothing of an open scalar sequence, endpoints fixed.
#[must_use]
pub fn smooth_open_values(values: &[f64], sigma: f64) -> Vec<f64> {
    if sigma <= 0.0 || values.len() < 3 {
        return values.to_vec();
    }
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2).cast_signed();
    let mut out: Vec<f64> = (0..values.len())
        .map(|i| {
            kernel.iter().enumerate().fold(0.0, |acc, (k, &w)| {
                let j = i.cast_signed() + k.cast_signed() - radius;
                w.mul_add(reflected(values, j, |end, v| 2.0f64.mul_add(end, -v)), acc)
            })
        })
        .collect();
    let last = values.len() - 1;
    out[0] = values[0];
    out[last] = values[last];
    out
}

/// Gaussian smoothing of a cyclic point sequence (no repeated closing
/// point).
#[must_use]
pub fn smooth_closed(points: &[Point], sigma: f64) -> Vec<Point> {
    let n = points.len();
    if sigma <= 0.0 || n < 3 {
        return points.to_vec();
    }
    let kernel = gaussian_kernel(sigma);
    let radius = kernel.len() / 2;
    (0..n)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .fold(Point::ZERO, |acc, (k, &w)| {
                    let j = (i + n * (radius / n + 1) + k - radius) % n;
                    acc + points[j] * w
                })
        })
        .collect()
}

/// Gaussian smoothing of a cyclic scalar sequence.
#[must_use]
pub fn smooth_closed_values(values: &[f64], sigma: f64) -> Vec<f64> {
    let n = values.len();
    if sigma <= 0.0 || n < 3 {
        return values.to_vec();
    }
    let kernel = gaussian_kernel(sigma);
    let radius = kernel.len() / 2;
    (0..n)
        .map(|i| {
            kernel.iter().enumerate().fold(0.0, |acc, (k, &w)| {
                let j = (i + n * (radius / n + 1) + k - radius) % n;
                w.mul_add(values[j], acc)
            })
        })
        .collect()
}

/// Resample a cyclic point sequence (no repeated closing point) to `n`
/// points equally spaced along its perimeter, starting at `points[0]`.
///
/// # Errors
///
/// As [`resample`].
pub fn resample_closed(points: &[Point], n: usize) -> Result<Vec<Point>, ShapeError> {
    require_points("closed contour", points.len(), 3)?;
    require_points("resampled contour", n, 3)?;
    let mut closed = points.to_vec();
    closed.push(points[0]);
    let mut out = resample(&Curve::new(closed), n + 1, 0.0)?.into_points();
    out.pop();
    Ok(out)
}

/// Drop a repeated closing point, if present.
#[must_use]
pub fn open_cycle(points: &[Point]) -> &[Point] {
    match (points.first(), points.last()) {
        (Some(a), Some(b)) if points.len() > 1 && a.distance_squared(*b) < 1e-18 => {
            &points[..points.len() - 1]
        }
        _ => points,
    }
}

/// Shoelace signed area of a cyclic point sequence.
///
/// Positive for counterclockwise order in a y-up frame.
#[must_use]
pub fn signed_area(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    0.5 * (0..n)
        .map(|i| points[i].cross(points[(i + 1) % n]))
        .sum::<f64>()
}

/// Normalized position of the projection of `p` onto segment `a -> b`,
/// clamped to `[0, 1]`.
#[must_use]
pub fn segment_fraction(a: Point, b: Point, p: Point) -> f64 {
    let d = b - a;
    let len2 = d.dot(d);
    if len2 <= 0.0 {
        return 0.0;
    }
    ((p - a).dot(d) / len2).clamp(0.0, 1.0)
}

/// Nearest point to `p` on the polyline through `points`.
///
/// Falls back to the nearest vertex when `geo` cannot decide (empty or
/// degenerate input).
#[must_use]
pub fn project_onto(p: Point, points: &[Point]) -> Point {
    if points.len() == 1 {
        return points[0];
    }
    let line = geo::LineString::new(points.iter().map(|&q| q.into()).collect());
    match line.closest_point(&geo::Point::new(p.x, p.y)) {
        Closest::Intersection(q) | Closest::SinglePoint(q) => q.into(),
        Closest::Indeterminate => nearest_vertex(p, points).map_or(p, |(_, q)| q),
    }
}

/// Index and position of the vertex nearest to `p`.
#[must_use]
pub fn nearest_vertex(p: Point, points: &[Point]) -> Option<(usize, Point)> {
    points
        .iter()
        .copied()
        .enumerate()
        .min_by(|(_, a), (_, b)| p.distance_squared(*a).total_cmp(&p.distance_squared(*b)))
}

/// `n` evenly spaced values from `a` to `b` inclusive.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn linspace(a: f64, b: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![a],
        _ => (0..n)
            .map(|i| {
                if i + 1 == n {
                    b
                } else {
                    (b - a).mul_add(i as f64 / (n - 1) as f64, a)
                }
            })
            .collect(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn arc(n: usize, radius: f64, span: f64) -> Curve {
        linspace(0.0, span, n)
            .into_iter()
            .map(|t| Point::new(radius * t.cos(), radius * t.sin()))
            .collect()
    }

    fn max_deviation(a: &Curve, b: &Curve) -> f64 {
        a.iter()
            .zip(b)
            .map(|(p, q)| p.distance(*q))
            .fold(0.0, f64::max)
    }

    #[test]
    fn resample_line_is_evenly_spaced() {
        let c = Curve::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(10.0, 0.0),
        ]);
        let r = resample(&c, 11, 0.0).unwrap();
        assert_eq!(r.len(), 11);
        for (i, p) in r.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let expected = i as f64;
            assert!((p.x - expected).abs() < 1e-12, "point {i} at {p:?}");
        }
    }

    #[test]
    fn resample_keeps_endpoints() {
        let c = arc(50, 20.0, 2.0);
        let r = resample(&c, 13, 2.0).unwrap();
        assert!(r[0].distance(c[0]) < 1e-12);
        assert!(r[12].distance(c[49]) < 1e-12);
    }

    #[test]
    fn resampling_twice_matches_resampling_once() {
        let c = arc(400, 30.0, 2.5);
        let once = resample(&c, 40, 0.0).unwrap();
        let twice = resample(&once, 40, 0.0).unwrap();
        let dev = max_deviation(&once, &twice);
        assert!(dev < 1e-3, "deviation {dev}");
    }

    #[test]
    fn zero_length_curve_is_degenerate() {
        let c = Curve::new(vec![Point::new(1.0, 1.0); 4]);
        assert!(matches!(
            resample(&c, 5, 0.0),
            Err(ShapeError::Degenerate(_))
        ));
    }

    #[test]
    fn smoothing_leaves_straight_lines_alone() {
        let pts: Vec<Point> = (0..20)
            .map(|i| Point::new(f64::from(i), 2.0f64.mul_add(f64::from(i), 1.0)))
            .collect();
        let s = smooth_open(&pts, 3.0);
        for (a, b) in pts.iter().zip(&s) {
            assert!(a.distance(*b) < 1e-9);
        }
    }

    #[test]
    fn joint_resample_interpolates_width() {
        let c = Curve::new(vec![Point::new(0.0, 0.0), Point::new(4.0, 0.0)]);
        let (rc, rw) = resample_with_width(&c, &[0.0, 8.0], 5, 0.0).unwrap();
        assert_eq!(rc.len(), 5);
        assert_eq!(rw.len(), 5);
        assert!((rw[2] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn resample_values_endpoints_and_midpoint() {
        let v = resample_values(&[0.0, 10.0, 20.0], 5);
        assert_eq!(v.len(), 5);
        assert!((v[0]).abs() < 1e-12);
        assert!((v[2] - 10.0).abs() < 1e-12);
        assert!((v[4] - 20.0).abs() < 1e-12);
    }

    #[test]
    fn closed_smoothing_preserves_circle_center() {
        let pts: Vec<Point> = arc(65, 10.0, std::f64::consts::TAU).into_points();
        let cycle = open_cycle(&pts);
        assert_eq!(cycle.len(), 64);
        let s = smooth_closed(cycle, 2.0);
        let mean = Curve::new(s).mean();
        assert!(mean.norm() < 1e-9);
    }

    #[test]
    fn signed_area_orientation() {
        let square = [
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(0.0, 2.0),
        ];
        assert!((signed_area(&square) - 4.0).abs() < 1e-12);
        let rev: Vec<Point> = square.iter().rev().copied().collect();
        assert!((signed_area(&rev) + 4.0).abs() < 1e-12);
    }

    #[test]
    fn projection_onto_polyline() {
        let line = [Point::new(0.0, 0.0), Point::new(10.0, 0.0)];
        let q = project_onto(Point::new(3.0, 5.0), &line);
        assert!(q.distance(Point::new(3.0, 0.0)) < 1e-12);
        assert!((segment_fraction(line[0], line[1], Point::new(-2.0, 1.0))).abs() < 1e-12);
    }
}
