//! Polygon moments: area, centroid and Hu invariants of a closed
//! contour, plus the log-Hu shape distance used to match a contour
//! against the previous frame's.

use crate::types::Point;

/// Raw and central moments of a closed polygon up to third order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolygonMoments {
    /// Unsigned area.
    pub area: f64,
    /// Centroid (falls back to the vertex mean for zero-area input).
    pub centroid: Point,
    nu: NormalizedMoments,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct NormalizedMoments {
    n20: f64,
    n11: f64,
    n02: f64,
    n30: f64,
    n21: f64,
    n12: f64,
    n03: f64,
}

impl PolygonMoments {
    /// Compute the moments of the polygon through `points` (cyclic; a
    /// repeated closing point contributes nothing).
    #[must_use]
    #[allow(clippy::similar_names, clippy::many_single_char_names)]
    pub fn of(points: &[Point]) -> Self {
        let n = points.len();
        let mut m = [0.0_f64; 10];
        for i in 0..n {
            let p = points[i];
            let q = points[(i + 1) % n];
            let (xi, yi, xj, yj) = (p.x, p.y, q.x, q.y);
            let a = xi * yj - xj * yi;
            m[0] += a;
            m[1] += a * (xi + xj);
            m[2] += a * (yi + yj);
            m[3] += a * (xi * xi + xi * xj + xj * xj);
            m[4] += a * (xi * (2.0 * yi + yj) + xj * (yi + 2.0 * yj));
            m[5] += a * (yi * yi + yi * yj + yj * yj);
            m[6] += a * (xi + xj) * (xi * xi + xj * xj);
            m[7] += a
                * (xi * xi * (3.0 * yi + yj)
                    + 2.0 * xi * xj * (yi + yj)
                    + xj * xj * (yi + 3.0 * yj));
            m[8] += a
                * (yi * yi * (3.0 * xi + xj)
                    + 2.0 * yi * yj * (xi + xj)
                    + yj * yj * (xi + 3.0 * xj));
            m[9] += a * (yi + yj) * (yi * yi + yj * yj);
        }
        let scale = [2.0, 6.0, 6.0, 12.0, 24.0, 12.0, 20.0, 60.0, 60.0, 20.0];
        for (v, s) in m.iter_mut().zip(scale) {
            *v /= s;
        }
        if m[0] < 0.0 {
            for v in &mut m {
                *v = -*v;
            }
        }
        let [m00, m10, m01, m20, m11, m02, m30, m21, m12, m03] = m;

        if m00 <= f64::EPSILON {
            let mean = if n == 0 {
                Point::ZERO
            } else {
                #[allow(clippy::cast_precision_loss)]
                let inv = 1.0 / n as f64;
                points.iter().fold(Point::ZERO, |acc, &p| acc + p) * inv
            };
            return Self {
                area: 0.0,
                centroid: mean,
                nu: NormalizedMoments::default(),
            };
        }

        let cx = m10 / m00;
        let cy = m01 / m00;
        let mu20 = m20 - cx * m10;
        let mu11 = m11 - cx * m01;
        let mu02 = m02 - cy * m01;
        let mu30 = m30 - 3.0 * cx * m20 + 2.0 * cx * cx * m10;
        let mu21 = m21 - 2.0 * cx * m11 - cy * m20 + 2.0 * cx * cx * m01;
        let mu12 = m12 - 2.0 * cy * m11 - cx * m02 + 2.0 * cy * cy * m10;
        let mu03 = m03 - 3.0 * cy * m02 + 2.0 * cy * cy * m01;

        let s2 = m00 * m00;
        let s3 = m00.powf(2.5);
        Self {
            area: m00,
            centroid: Point::new(cx, cy),
            nu: NormalizedMoments {
                n20: mu20 / s2,
                n11: mu11 / s2,
                n02: mu02 / s2,
                n30: mu30 / s3,
                n21: mu21 / s3,
                n12: mu12 / s3,
                n03: mu03 / s3,
            },
        }
    }

    /// The seven Hu moment invariants.
    #[must_use]
    pub fn hu(&self) -> [f64; 7] {
        let NormalizedMoments {
            n20,
            n11,
            n02,
            n30,
            n21,
            n12,
            n03,
        } = self.nu;
        let t0 = n30 + n12;
        let t1 = n21 + n03;
        let q0 = n30 - 3.0 * n12;
        let q1 = 3.0 * n21 - n03;
        [
            n20 + n02,
            (n20 - n02).powi(2) + 4.0 * n11 * n11,
            q0 * q0 + q1 * q1,
            t0 * t0 + t1 * t1,
            q0 * t0 * (t0 * t0 - 3.0 * t1 * t1) + q1 * t1 * (3.0 * t0 * t0 - t1 * t1),
            (n20 - n02) * (t0 * t0 - t1 * t1) + 4.0 * n11 * t0 * t1,
            q1 * t0 * (t0 * t0 - 3.0 * t1 * t1) - q0 * t1 * (3.0 * t0 * t0 - t1 * t1),
        ]
    }
}

/// Shape distance between two contours: the L1 distance between their
/// log-scaled Hu invariants. Zero for identical shapes, invariant to
/// translation, rotation and scale.
#[must_use]
pub fn match_shapes(a: &[Point], b: &[Point]) -> f64 {
    const EPS: f64 = 1e-5;
    let ha = PolygonMoments::of(a).hu();
    let hb = PolygonMoments::of(b).hu();
    ha.iter()
        .zip(&hb)
        .filter(|(x, y)| x.abs() > EPS && y.abs() > EPS)
        .map(|(x, y)| (log_scaled(*x) - log_scaled(*y)).abs())
        .sum()
}

fn log_scaled(h: f64) -> f64 {
    h.signum() * h.abs().log10()
}
