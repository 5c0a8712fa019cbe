//! Natural cubic splines, scalar and parametric.
//!
//! [`CubicSpline`] interpolates `y(x)` through strictly increasing knots
//! with zero second derivative at both ends. Beyond the knot range the
//! first/last piece's cubic is extended. [`ParametricSpline`] pairs two
//! of them over a chord-length parameter to interpolate a point
//! sequence.

use crate::types::{Point, ShapeError, require_len, require_points};

/// Natural cubic spline through `(x[i], y[i])`.
#[derive(Debug, Clone, PartialEq)]
pub struct CubicSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    /// Second derivative at each knot.
    m: Vec<f64>,
    /// Integral from `x[0]` to `x[i]`.
    cumulative: Vec<f64>,
}

impl CubicSpline {
    /// Fit a natural cubic spline.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::TooFewPoints`] for fewer than two knots,
    /// [`ShapeError::LengthMismatch`] if `x` and `y` differ in length,
    /// and [`ShapeError::Degenerate`] if `x` is not strictly increasing
    /// or contains non-finite values.
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self, ShapeError> {
        require_points("spline knots", x.len(), 2)?;
        require_len("spline values", y.len(), x.len())?;
        if x.iter().chain(&y).any(|v| !v.is_finite()) {
            return Err(ShapeError::Degenerate(
                "spline data contains non-finite values".into(),
            ));
        }
        if x.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ShapeError::Degenerate(
                "spline knots must be strictly increasing".into(),
            ));
        }

        let m = natural_second_derivatives(&x, &y);
        let mut spline = Self {
            x,
            y,
            m,
            cumulative: Vec::new(),
        };
        let n = spline.x.len();
        let mut cumulative = Vec::with_capacity(n);
        cumulative.push(0.0);
        for i in 0..n - 1 {
            let full = spline.piece_integral(i, spline.x[i + 1]);
            cumulative.push(cumulative[i] + full);
        }
        spline.cumulative = cumulative;
        Ok(spline)
    }

    /// The knot positions.
    #[must_use]
    pub fn knots(&self) -> &[f64] {
        &self.x
    }

    /// `(x[0], x[n-1])`.
    #[must_use]
    pub fn domain(&self) -> (f64, f64) {
        (self.x[0], self.x[self.x.len() - 1])
    }

    /// Index of the piece used to evaluate at `v`.
    fn piece(&self, v: f64) -> usize {
        let n = self.x.len();
        self.x
            .partition_point(|&xi| xi <= v)
            .saturating_sub(1)
            .min(n - 2)
    }

    /// Piece coefficients: `(h, a, b, left_dist, right_dist)` where the
    /// piece is `m_i r^3/(6h) + m_{i+1} l^3/(6h) + a r + b l` with
    /// `l = v - x_i` and `r = x_{i+1} - v`.
    fn coefficients(&self, i: usize, v: f64) -> (f64, f64, f64, f64, f64) {
        let h = self.x[i + 1] - self.x[i];
        let a = self.y[i] / h - self.m[i] * h / 6.0;
        let b = self.y[i + 1] / h - self.m[i + 1] * h / 6.0;
        (h, a, b, v - self.x[i], self.x[i + 1] - v)
    }

    /// Integral of piece `i` from `x[i]` to `v`.
    fn piece_integral(&self, i: usize, v: f64) -> f64 {
        let (h, a, b, l, r) = self.coefficients(i, v);
        let (mi, mj) = (self.m[i], self.m[i + 1]);
        mi * (h.powi(4) - r.powi(4)) / (24.0 * h)
            + mj * l.powi(4) / (24.0 * h)
            + a * (h * h - r * r) / 2.0
            + b * l * l / 2.0
    }

    /// Spline value at `v`.
    #[must_use]
    pub fn eval(&self, v: f64) -> f64 {
        let i = self.piece(v);
        let (h, a, b, l, r) = self.coefficients(i, v);
        self.m[i] * r.powi(3) / (6.0 * h) + self.m[i + 1] * l.powi(3) / (6.0 * h) + a * r + b * l
    }

    /// First derivative at `v`.
    #[must_use]
    pub fn derivative(&self, v: f64) -> f64 {
        let i = self.piece(v);
        let (h, a, b, l, r) = self.coefficients(i, v);
        -self.m[i] * r * r / (2.0 * h) + self.m[i + 1] * l * l / (2.0 * h) - a + b
    }

    /// Second derivative at `v`.
    #[must_use]
    pub fn second_derivative(&self, v: f64) -> f64 {
        let i = self.piece(v);
        let (h, _, _, l, r) = self.coefficients(i, v);
        (self.m[i] * r + self.m[i + 1] * l) / h
    }

    /// Antiderivative with value zero at `x[0]`.
    #[must_use]
    pub fn antiderivative(&self, v: f64) -> f64 {
        let i = self.piece(v);
        self.cumulative[i] + self.piece_integral(i, v)
    }

    /// Definite integral from `a` to `b`.
    #[must_use]
    pub fn integral(&self, a: f64, b: f64) -> f64 {
        self.antiderivative(b) - self.antiderivative(a)
    }
}

/// Solve the tridiagonal system for the knot second derivatives with
/// natural end conditions (Thomas algorithm).
fn natural_second_derivatives(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    let mut m = vec![0.0; n];
    if n < 3 {
        return m;
    }

    let interior = n - 2;
    let mut diag = vec![0.0; interior];
    let mut upper = vec![0.0; interior];
    let mut rhs = vec![0.0; interior];
    for k in 0..interior {
        let i = k + 1;
        let h0 = x[i] - x[i - 1];
        let h1 = x[i + 1] - x[i];
        diag[k] = 2.0 * (h0 + h1);
        upper[k] = h1;
        rhs[k] = 6.0 * ((y[i + 1] - y[i]) / h1 - (y[i] - y[i - 1]) / h0);
    }

    // Forward sweep; the sub-diagonal entry for row k is h0 = x[k+1] - x[k].
    for k in 1..interior {
        let lower = x[k + 1] - x[k];
        let w = lower / diag[k - 1];
        diag[k] -= w * upper[k - 1];
        rhs[k] -= w * rhs[k - 1];
    }

    let mut solution = vec![0.0; interior];
    solution[interior - 1] = rhs[interior - 1] / diag[interior - 1];
    for k in (0..interior - 1).rev() {
        solution[k] = (rhs[k] - upper[k] * solution[k + 1]) / diag[k];
    }
    m[1..=interior].copy_from_slice(&solution);
    m
}

/// A planar curve `(x(u), y(u))` interpolating a point sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct ParametricSpline {
    x: CubicSpline,
    y: CubicSpline,
}

impl ParametricSpline {
    /// Interpolate `points` over their cumulative chord length.
    ///
    /// Consecutive duplicates are dropped first.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::TooFewPoints`] if fewer than two distinct
    /// points remain.
    pub fn through(points: &[Point]) -> Result<Self, ShapeError> {
        let mut kept: Vec<Point> = Vec::with_capacity(points.len());
        for &p in points {
            if kept.last().is_none_or(|q| q.distance_squared(p) > 1e-18) {
                kept.push(p);
            }
        }
        let params = chord_parameters(&kept);
        Self::with_parameters(params, &kept)
    }

    /// Interpolate `points` at the given strictly increasing parameters.
    ///
    /// # Errors
    ///
    /// Same conditions as [`CubicSpline::new`].
    pub fn with_parameters(params: Vec<f64>, points: &[Point]) -> Result<Self, ShapeError> {
        let xs = points.iter().map(|p| p.x).collect();
        let ys = points.iter().map(|p| p.y).collect();
        Ok(Self {
            x: CubicSpline::new(params.clone(), xs)?,
            y: CubicSpline::new(params, ys)?,
        })
    }

    /// Parameter range of the knots.
    #[must_use]
    pub fn domain(&self) -> (f64, f64) {
        self.x.domain()
    }

    /// Knot parameters.
    #[must_use]
    pub fn parameters(&self) -> &[f64] {
        self.x.knots()
    }

    /// Position at `u`.
    #[must_use]
    pub fn eval(&self, u: f64) -> Point {
        Point::new(self.x.eval(u), self.y.eval(u))
    }

    /// First derivative (tangent, not normalized) at `u`.
    #[must_use]
    pub fn derivative(&self, u: f64) -> Point {
        Point::new(self.x.derivative(u), self.y.derivative(u))
    }

    /// Second derivative at `u`.
    #[must_use]
    pub fn second_derivative(&self, u: f64) -> Point {
        Point::new(self.x.second_derivative(u), self.y.second_derivative(u))
    }

    /// Signed curvature `(x'y'' - y'x'') / |r'|^3` at `u`.
    ///
    /// Positive where the curve turns counterclockwise.
    #[must_use]
    pub fn curvature(&self, u: f64) -> f64 {
        let d1 = self.derivative(u);
        let d2 = self.second_derivative(u);
        let speed = d1.norm();
        if speed <= f64::EPSILON {
            return 0.0;
        }
        d1.cross(d2) / speed.powi(3)
    }
}

/// Cumulative chord length along `points`, starting at zero.
#[must_use]
pub fn chord_parameters(points: &[Point]) -> Vec<f64> {
    let mut params = Vec::with_capacity(points.len());
    let mut total = 0.0;
    params.push(total);
    for w in points.windows(2) {
        total += w[0].distance(w[1]);
        params.push(total);
    }
    if points.is_empty() {
        params.clear();
    }
    params
}
