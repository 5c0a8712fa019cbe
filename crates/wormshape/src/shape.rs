//! Boundary construction: left/right sides from a center line and a
//! width profile, the inverse of [`crate::midline`].

use serde::{Deserialize, Serialize};

use crate::curve::{linspace, resample, resample_values};
use crate::theta::{ThetaMapping, ThetaMethod, ThetaState, normals_from_center};
use crate::types::{Curve, Point, ShapeError, require_len, require_points};

/// Scale of the default width profile (its value at mid-body).
pub const DEFAULT_WIDTH_SCALE: f64 = 9.56 * 0.5;

/// Exponent of the default width profile.
pub const DEFAULT_WIDTH_EXPONENT: f64 = 0.351;

/// Left and right boundaries of a shape, plus the center line normals
/// used to place them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapePair {
    /// `center + width/2 * normal`.
    pub left: Curve,
    /// `center - width/2 * normal`.
    pub right: Curve,
    /// Unit normals at each center line vertex.
    pub normals: Vec<Point>,
}

/// Build the boundaries of a shape from its center line and width.
///
/// Normals are computed from the center line unless given. A width
/// profile of a different length is resampled to the center line's
/// point count.
///
/// # Errors
///
/// [`ShapeError::TooFewPoints`] for a center line of fewer than two
/// points or an empty width, and [`ShapeError::LengthMismatch`] if
/// `normals` is supplied with the wrong length.
pub fn shape_from_center(
    center: &Curve,
    width: &[f64],
    normals: Option<&[Point]>,
) -> Result<ShapePair, ShapeError> {
    require_points("center line", center.len(), 2)?;
    require_points("width profile", width.len(), 1)?;

    let normals = match normals {
        Some(n) => {
            require_len("normals", n.len(), center.len())?;
            n.to_vec()
        }
        None => normals_from_center(center)?,
    };
    let width = if width.len() == center.len() {
        width.to_vec()
    } else {
        resample_values(width, center.len())
    };

    let (left, right) = center
        .iter()
        .zip(&normals)
        .zip(&width)
        .map(|((&c, &n), &w)| {
            let offset = n * (0.5 * w);
            (c + offset, c - offset)
        })
        .unzip();

    Ok(ShapePair {
        left: Curve::new(left),
        right: Curve::new(right),
        normals,
    })
}

/// Build the boundaries directly from a turning-angle state.
///
/// # Errors
///
/// As [`ThetaMapping::center_and_normals_from_theta`] and
/// [`shape_from_center`].
pub fn shape_from_theta(
    state: &ThetaState,
    width: &[f64],
    method: ThetaMethod,
    points: Option<usize>,
) -> Result<ShapePair, ShapeError> {
    let (center, normals) = method.center_and_normals_from_theta(state, points)?;
    shape_from_center(&center, width, Some(&normals))
}

/// Closed outline polygon: left from head to tail, then right from
/// tail back to head, with the head point repeated at the end.
#[must_use]
pub fn polygon(shape: &ShapePair) -> Curve {
    let mut points: Vec<Point> = shape.left.points().to_vec();
    points.extend(shape.right.points().iter().rev());
    if let Some(&first) = points.first() {
        points.push(first);
    }
    Curve::new(points)
}

/// The closed outline resampled to `npoints` points (closing point
/// included).
///
/// # Errors
///
/// As [`resample`].
pub fn outline(shape: &ShapePair, npoints: usize) -> Result<Curve, ShapeError> {
    resample(&polygon(shape), npoints, 0.0)
}

/// The default width profile:
/// `a * x^b * (1 - x)^b * 0.5^(-2b)` for `x` in `[0, 1]`, zero at both
/// ends and [`DEFAULT_WIDTH_SCALE`] at the middle.
#[must_use]
pub fn default_width(npoints: usize) -> Vec<f64> {
    let b = DEFAULT_WIDTH_EXPONENT;
    let norm = 0.5f64.powf(-2.0 * b);
    linspace(0.0, 1.0, npoints)
        .into_iter()
        .map(|x| DEFAULT_WIDTH_SCALE * x.powf(b) * (1.0 - x).powf(b) * norm)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn straight(n: usize) -> Curve {
        (0..n)
            .map(|i| Point::new(f64::from(u32::try_from(i).unwrap()), 5.0))
            .collect()
    }

    #[test]
    fn straight_center_offsets_symmetrically() {
        let c = straight(5);
        let shape = shape_from_center(&c, &[2.0; 5], None).unwrap();
        for i in 0..5 {
            assert!((shape.left[i].y - 6.0).abs() < 1e-12);
            assert!((shape.right[i].y - 4.0).abs() < 1e-12);
            assert!((shape.left[i].x - c[i].x).abs() < 1e-12);
        }
    }

    #[test]
    fn width_is_resampled_to_center_length() {
        let c = straight(9);
        let shape = shape_from_center(&c, &[0.0, 4.0, 0.0], None).unwrap();
        assert_eq!(shape.left.len(), 9);
        assert!((shape.left[4].y - 7.0).abs() < 1e-12);
        assert!((shape.left[2].y - 6.0).abs() < 1e-12);
    }

    #[test]
    fn wrong_normals_length_is_an_error() {
        let c = straight(4);
        let normals = vec![Point::new(0.0, 1.0); 3];
        let err = shape_from_center(&c, &[1.0; 4], Some(&normals)).unwrap_err();
        assert!(matches!(err, ShapeError::LengthMismatch { .. }));
    }

    #[test]
    fn default_width_shape() {
        let w = default_width(21);
        assert_eq!(w.len(), 21);
        assert!(w[0].abs() < 1e-12 && w[20].abs() < 1e-12);
        assert!((w[10] - DEFAULT_WIDTH_SCALE).abs() < 1e-9);
        assert!(w.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn polygon_is_closed_and_goes_around() {
        let c = straight(4);
        let shape = shape_from_center(&c, &[2.0; 4], None).unwrap();
        let poly = polygon(&shape);
        assert_eq!(poly.len(), 9);
        assert!(poly.is_closed());
        assert_eq!(poly[4], shape.right[3]);
    }

    #[test]
    fn theta_shape_matches_center_shape() {
        let c = straight(7);
        let state = ThetaMethod::Discrete.theta_from_center(&c, None).unwrap();
        let w = default_width(7);
        let a = shape_from_theta(&state, &w, ThetaMethod::Discrete, None).unwrap();
        let b = shape_from_center(&c, &w, None).unwrap();
        for (p, q) in a.left.iter().zip(&b.left) {
            assert!(p.distance(*q) < 1e-9);
        }
    }
}
