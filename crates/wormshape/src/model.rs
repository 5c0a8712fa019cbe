//! The worm model: a center line with a width profile, plus the
//! deformations and measurements used when fitting it to frames.
//!
//! The model stores its center line as explicit points from head to
//! tail. Every shape query (sides, outline, mask, occlusions, contour
//! distances) is derived from that center line and the width on demand,
//! so the model never holds stale geometry.
//!
//! Deformations are available as `&mut self` methods and as
//! [`Transform`] values, which can be applied to a snapshot with
//! [`WormModel::apply`] and committed later with [`Transform::commit`].

use image::Luma;
use rustfft::FftPlanner;
use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::curve::linspace;
use crate::detect::{DetectionHints, DetectionOutcome, DetectorConfig, detect_shape};
use crate::matching::{DistanceOptions, distance_shape_to_contour};
use crate::midline::{MidlineExtractor, MidlineMethod, MidlineOptions};
use crate::occlusion::{DEFAULT_MARGIN, Occlusions, self_occlusions};
use crate::shape::{ShapePair, default_width, outline, polygon, shape_from_center};
use crate::spline::{ParametricSpline, chord_parameters};
use crate::theta::{ThetaMapping, ThetaMethod, ThetaState, normals_from_center};
use crate::types::{Curve, Dimensions, GrayImage, Point, ShapeError, require_len, require_points};

/// Placement and rendering defaults of a model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Midpoint of a newly created straight model.
    pub position: Point,
    /// Length of a newly created straight model.
    pub length: f64,
    /// Pivot used by [`WormModel::rotate`] when none is given.
    pub rotation_center: Point,
    /// Size of the raster produced by [`WormModel::default_mask`].
    pub mask_dimensions: Dimensions,
}

impl ModelConfig {
    /// Default [`position`](Self::position).
    pub const DEFAULT_POSITION: Point = Point::new(75.0, 75.0);
    /// Default [`length`](Self::length).
    pub const DEFAULT_LENGTH: f64 = 50.0;
    /// Default [`rotation_center`](Self::rotation_center).
    pub const DEFAULT_ROTATION_CENTER: Point = Point::new(75.0, 75.0);
    /// Default [`mask_dimensions`](Self::mask_dimensions).
    pub const DEFAULT_MASK_DIMENSIONS: Dimensions = Dimensions {
        width: 151,
        height: 151,
    };
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            position: Self::DEFAULT_POSITION,
            length: Self::DEFAULT_LENGTH,
            rotation_center: Self::DEFAULT_ROTATION_CENTER,
            mask_dimensions: Self::DEFAULT_MASK_DIMENSIONS,
        }
    }
}

/// Scalar summary of a posture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// First center line point.
    pub head: Point,
    /// Last center line point.
    pub tail: Point,
    /// Middle of the center line.
    pub center: Point,
    /// Straight-line head to tail distance.
    pub head_tail_distance: f64,
    /// Straight-line head to middle distance.
    pub head_center_distance: f64,
    /// Straight-line tail to middle distance.
    pub tail_center_distance: f64,
    /// Mean signed curvature along the center line.
    pub curvature_mean: f64,
    /// Sum of absolute curvature at the center line points.
    pub curvature_variation: f64,
    /// `true` when the body overlaps itself.
    pub curled: bool,
}

/// A center line with a width profile and the scalars carried through
/// parameter vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WormModel {
    center: Curve,
    width: Vec<f64>,
    length: f64,
    speed: f64,
    config: ModelConfig,
}

impl WormModel {
    /// A straight horizontal worm of `config.length` centered on
    /// `config.position`, with the default width profile.
    ///
    /// # Errors
    ///
    /// [`ShapeError::TooFewPoints`] for fewer than three points.
    pub fn new(npoints: usize, config: ModelConfig) -> Result<Self, ShapeError> {
        require_points("worm model", npoints, 3)?;
        let half = config.length / 2.0;
        let center = linspace(-half, half, npoints)
            .into_iter()
            .map(|dx| config.position + Point::new(dx, 0.0))
            .collect();
        Ok(Self {
            center,
            width: default_width(npoints),
            length: config.length,
            speed: 0.0,
            config,
        })
    }

    /// A model with the given center line. `width` defaults to the
    /// standard profile.
    ///
    /// # Errors
    ///
    /// [`ShapeError::TooFewPoints`] for fewer than three points and
    /// [`ShapeError::LengthMismatch`] when `width` is not index-aligned
    /// with `center`.
    pub fn from_center(
        center: Curve,
        width: Option<Vec<f64>>,
        config: ModelConfig,
    ) -> Result<Self, ShapeError> {
        require_points("center line", center.len(), 3)?;
        let width = match width {
            Some(w) => {
                require_len("width profile", w.len(), center.len())?;
                w
            }
            None => default_width(center.len()),
        };
        let length = center.arc_length();
        Ok(Self {
            center,
            width,
            length,
            speed: 0.0,
            config,
        })
    }

    /// A model whose center line and width are derived from two body
    /// sides with `method`, resampled to `npoints`.
    ///
    /// # Errors
    ///
    /// As [`MidlineExtractor::center_from_sides`] and
    /// [`from_center`](Self::from_center).
    pub fn from_shape(
        left: &Curve,
        right: &Curve,
        method: MidlineMethod,
        npoints: usize,
        config: ModelConfig,
    ) -> Result<Self, ShapeError> {
        let options = MidlineOptions {
            npoints: Some(npoints),
            ..MidlineOptions::default()
        };
        let midline = method.center_from_sides(left, right, &options)?;
        Self::from_center(midline.center, Some(midline.width), config)
    }

    /// Detect the worm in `image` and, on success, adopt the detected
    /// center line and width. The detector produces as many points as the
    /// model has. A failed detection leaves the model unchanged.
    ///
    /// # Errors
    ///
    /// [`ShapeError::InvalidConfig`] for an unusable detector config.
    #[allow(clippy::wrong_self_convention)]
    pub fn from_image(
        &mut self,
        image: &GrayImage,
        detector: &DetectorConfig,
        hints: &DetectionHints,
    ) -> Result<DetectionOutcome, ShapeError> {
        let config = DetectorConfig {
            npoints: self.npoints(),
            ..detector.clone()
        };
        let result = detect_shape(image, &config, hints)?;
        if result.outcome.is_detected() {
            self.length = result.center.arc_length();
            self.center = result.center;
            self.width = result.width;
        }
        Ok(result.outcome)
    }

    // ───────────────────────── Parameters ─────────────────────────

    /// Number of center line points.
    #[must_use]
    pub const fn npoints(&self) -> usize {
        self.center.len()
    }

    /// The center line from head to tail.
    #[must_use]
    pub const fn center(&self) -> &Curve {
        &self.center
    }

    /// The width at each center line point.
    #[must_use]
    pub fn width(&self) -> &[f64] {
        &self.width
    }

    /// The recorded length. Updated by [`set_length`](Self::set_length),
    /// construction and full parameter vectors, not by deformations.
    #[must_use]
    pub const fn length(&self) -> f64 {
        self.length
    }

    /// The recorded speed.
    #[must_use]
    pub const fn speed(&self) -> f64 {
        self.speed
    }

    /// The placement defaults this model was built with.
    #[must_use]
    pub const fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Record `length`, or the current center line arc length when `None`.
    pub fn set_length(&mut self, length: Option<f64>) {
        self.length = length.unwrap_or_else(|| self.center.arc_length());
    }

    /// Flat parameter vector `[x0, y0, ..., x(n-1), y(n-1)]`, followed by
    /// `[length, speed, w0, ..., w(n-1)]` when `full`.
    #[must_use]
    pub fn parameters(&self, full: bool) -> Vec<f64> {
        let mut values = self.center.to_flat();
        if full {
            values.push(self.length);
            values.push(self.speed);
            values.extend_from_slice(&self.width);
        }
        values
    }

    /// Load a parameter vector in the layout of
    /// [`parameters`](Self::parameters), either the short (`2n`) or the
    /// full (`3n + 2`) form.
    ///
    /// # Errors
    ///
    /// [`ShapeError::LengthMismatch`] for any other length.
    pub fn set_parameters(&mut self, values: &[f64]) -> Result<(), ShapeError> {
        let n = self.npoints();
        let (short, full) = (2 * n, 3 * n + 2);
        if values.len() != short && values.len() != full {
            return Err(ShapeError::LengthMismatch {
                what: "model parameters",
                expected: if values.len() > short { full } else { short },
                found: values.len(),
            });
        }
        self.center = values[..short]
            .chunks_exact(2)
            .map(|xy| Point::new(xy[0], xy[1]))
            .collect();
        if values.len() == full {
            self.length = values[short];
            self.speed = values[short + 1];
            self.width = values[short + 2..].to_vec();
        }
        Ok(())
    }

    // ───────────────────────── Shape queries ─────────────────────────

    /// Unit normals along the center line, to the left of travel.
    ///
    /// # Errors
    ///
    /// As [`normals_from_center`].
    pub fn normals(&self) -> Result<Vec<Point>, ShapeError> {
        normals_from_center(&self.center)
    }

    /// Turning-angle state of the center line.
    ///
    /// # Errors
    ///
    /// As [`ThetaMapping::theta_from_center`].
    pub fn theta(&self, method: ThetaMethod) -> Result<ThetaState, ShapeError> {
        method.theta_from_center(&self.center, None)
    }

    /// The middle vertex, or the mean of the two middle vertices for an
    /// even point count.
    #[must_use]
    pub fn center_point(&self) -> Point {
        let n = self.npoints();
        let half = n / 2;
        if n % 2 == 0 {
            self.center[half - 1].midpoint(self.center[half])
        } else {
            self.center[half]
        }
    }

    /// Left and right sides.
    ///
    /// # Errors
    ///
    /// As [`shape_from_center`].
    pub fn shape(&self) -> Result<ShapePair, ShapeError> {
        shape_from_center(&self.center, &self.width, None)
    }

    /// Closed outline polygon (head repeated at the end).
    ///
    /// # Errors
    ///
    /// As [`shape`](Self::shape).
    pub fn polygon(&self) -> Result<Curve, ShapeError> {
        Ok(polygon(&self.shape()?))
    }

    /// Closed outline resampled to `npoints` points.
    ///
    /// # Errors
    ///
    /// As [`shape`](Self::shape) and [`outline`].
    pub fn outline(&self, npoints: usize) -> Result<Curve, ShapeError> {
        outline(&self.shape()?, npoints)
    }

    /// Binary raster of the body: the union of the quads between
    /// consecutive side samples, foreground `255`.
    ///
    /// # Errors
    ///
    /// As [`shape`](Self::shape).
    pub fn mask(&self, dimensions: Dimensions) -> Result<GrayImage, ShapeError> {
        let shape = self.shape()?;
        let mut mask = GrayImage::new(dimensions.width, dimensions.height);
        let (left, right) = (shape.left.points(), shape.right.points());
        for i in 0..left.len().saturating_sub(1) {
            let quad = pixel_ring(&[left[i], right[i], right[i + 1], left[i + 1]]);
            if quad.len() >= 3 {
                imageproc::drawing::draw_polygon_mut(&mut mask, &quad, Luma([255]));
            }
        }
        Ok(mask)
    }

    /// [`mask`](Self::mask) at the configured dimensions.
    ///
    /// # Errors
    ///
    /// As [`shape`](Self::shape).
    pub fn default_mask(&self) -> Result<GrayImage, ShapeError> {
        self.mask(self.config.mask_dimensions)
    }

    /// First center line point.
    #[must_use]
    pub fn head(&self) -> Point {
        self.center[0]
    }

    /// Last center line point.
    #[must_use]
    pub fn tail(&self) -> Point {
        self.center[self.npoints() - 1]
    }

    /// `(head, tail)`.
    #[must_use]
    pub fn head_tail(&self) -> (Point, Point) {
        (self.head(), self.tail())
    }

    /// Boundary samples hidden under another part of the body.
    ///
    /// # Errors
    ///
    /// As [`shape`](Self::shape) and [`self_occlusions`].
    pub fn self_occlusions(&self, margin: f64) -> Result<Occlusions, ShapeError> {
        let shape = self.shape()?;
        self_occlusions(&shape.left, &shape.right, margin)
    }

    /// Distances from the outline to `contour` along the normals,
    /// flattened as `[head, left.., right.., tail]` with head/tail hints
    /// and `[left[..n-1], right[1..]]` without. `None` marks samples
    /// without a match.
    ///
    /// # Errors
    ///
    /// As [`shape`](Self::shape) and [`distance_shape_to_contour`].
    pub fn distance_to_contour(
        &self,
        contour: &[Point],
        options: &DistanceOptions,
    ) -> Result<Vec<Option<f64>>, ShapeError> {
        let shape = self.shape()?;
        let distances =
            distance_shape_to_contour(&shape.left, &shape.right, &shape.normals, contour, options)?;
        Ok(distances.flattened())
    }

    /// Positions, end distances, curvature statistics and whether the
    /// body overlaps itself.
    ///
    /// # Errors
    ///
    /// [`ShapeError::TooFewPoints`] when the center line collapses to a
    /// point, and as [`self_occlusions`](Self::self_occlusions).
    pub fn measure(&self) -> Result<Measurement, ShapeError> {
        let (head, tail) = self.head_tail();
        let center = self.center[(self.npoints() - 1) / 2];

        let spline = ParametricSpline::through(self.center.points())?;
        let curvature: Vec<f64> = spline
            .parameters()
            .iter()
            .map(|&u| spline.curvature(u))
            .collect();
        #[allow(clippy::cast_precision_loss)]
        let curvature_mean = curvature.iter().sum::<f64>() / curvature.len() as f64;
        let curvature_variation = curvature.iter().map(|k| k.abs()).sum();

        Ok(Measurement {
            head,
            tail,
            center,
            head_tail_distance: head.distance(tail),
            head_center_distance: head.distance(center),
            tail_center_distance: tail.distance(center),
            curvature_mean,
            curvature_variation,
            curled: !self.self_occlusions(DEFAULT_MARGIN)?.is_empty(),
        })
    }

    // ───────────────────────── Deformations ─────────────────────────

    /// Shift the whole body by `offset`.
    pub fn translate(&mut self, offset: Point) {
        for p in self.center.points_mut() {
            *p += offset;
        }
    }

    /// Rotate the body by `angle` radians about `pivot`, or about the
    /// configured rotation center.
    pub fn rotate(&mut self, angle: f64, pivot: Option<Point>) {
        let pivot = pivot.unwrap_or(self.config.rotation_center);
        for p in self.center.points_mut() {
            *p = p.rotated_about(pivot, angle);
        }
    }

    /// Slide the body along its own center line by `distance` body
    /// lengths; positive values move towards the head. Points pushed past
    /// an end follow the end segment's direction when `straight`, and the
    /// end of the spline otherwise.
    ///
    /// # Errors
    ///
    /// [`ShapeError::TooFewPoints`] or [`ShapeError::Degenerate`] for a
    /// center line with no extent.
    pub fn move_forward(&mut self, distance: f64, straight: bool) -> Result<(), ShapeError> {
        let points = self.center.points();
        let chord = chord_parameters(points);
        let total = chord.last().copied().unwrap_or(0.0);
        if !(total > 0.0 && total.is_finite()) {
            return Err(ShapeError::Degenerate(
                "center line has zero length".to_string(),
            ));
        }
        let u: Vec<f64> = chord.iter().map(|c| c / total).collect();
        let spline = ParametricSpline::through(points)?;

        let n = points.len();
        let head_dir = (points[0] - points[1]).unit();
        let tail_dir = (points[n - 1] - points[n - 2]).unit();
        let moved = u
            .iter()
            .map(|&ui| {
                let us = ui - distance;
                if straight && us < 0.0 {
                    points[0] - head_dir * (us * total)
                } else if straight && us > 1.0 {
                    points[n - 1] + tail_dir * ((us - 1.0) * total)
                } else {
                    spline.eval(us * total)
                }
            })
            .collect();
        self.center = moved;
        Ok(())
    }

    /// Scale the center line by `factor` about its middle.
    pub fn stretch(&mut self, factor: f64) {
        let pivot = self.center_point();
        for p in self.center.points_mut() {
            *p = pivot + (*p - pivot) * factor;
        }
    }

    /// Scale the width profile by `factor`.
    pub fn widen(&mut self, factor: f64) {
        for w in &mut self.width {
            *w *= factor;
        }
    }

    /// [`stretch`](Self::stretch) and [`widen`](Self::widen) by the same
    /// factor.
    pub fn scale(&mut self, factor: f64) {
        self.stretch(factor);
        self.widen(factor);
    }

    /// Add `mode_amplitudes` to the lowest Fourier modes of the turning
    /// angles, keeping the middle segment's placement and the length.
    ///
    /// Modes beyond the half spectrum of the `n - 2` angles are ignored.
    ///
    /// # Errors
    ///
    /// As [`theta`](Self::theta).
    pub fn curve(&mut self, mode_amplitudes: &[f64]) -> Result<(), ShapeError> {
        let method = ThetaMethod::Discrete;
        let mut state = self.theta(method)?;
        state.theta = add_fourier_modes(&state.theta, mode_amplitudes);
        self.center = method.center_from_theta(&state, None)?;
        Ok(())
    }

    /// Bend the head (or tail) half by adding an exponentially decaying
    /// turning-angle profile `amount * exp(-exponent * s)`, with `s`
    /// running from the bent end towards the middle.
    ///
    /// # Errors
    ///
    /// As [`theta`](Self::theta).
    pub fn bend(&mut self, amount: f64, exponent: f64, head: bool) -> Result<(), ShapeError> {
        let method = ThetaMethod::Discrete;
        let mut state = self.theta(method)?;
        let m = state.theta.len();
        let count = (m / 2).saturating_sub(1);
        let profile = linspace(0.0, 1.0, count)
            .into_iter()
            .map(|s| amount * (-exponent * s).exp());
        if head {
            for (t, delta) in state.theta[..count].iter_mut().zip(profile) {
                *t += delta;
            }
        } else {
            for (t, delta) in state.theta[m - count..].iter_mut().rev().zip(profile) {
                *t += delta;
            }
        }
        self.center = method.center_from_theta(&state, None)?;
        Ok(())
    }

    /// Reverse head and tail.
    pub fn swap_head_tail(&mut self) {
        self.center = self.center.reversed();
        self.width.reverse();
    }

    /// A copy of this model with `transform` applied.
    ///
    /// # Errors
    ///
    /// As [`Transform::commit`].
    pub fn apply(&self, transform: &Transform) -> Result<Self, ShapeError> {
        let mut next = self.clone();
        transform.commit(&mut next)?;
        Ok(next)
    }
}

/// A deformation, as a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Transform {
    /// [`WormModel::translate`].
    Translate(Point),
    /// [`WormModel::rotate`].
    Rotate {
        /// Angle in radians.
        angle: f64,
        /// Pivot, `None` for the configured rotation center.
        pivot: Option<Point>,
    },
    /// [`WormModel::move_forward`].
    MoveForward {
        /// Distance in body lengths.
        distance: f64,
        /// Extrapolate straight past the ends.
        straight: bool,
    },
    /// [`WormModel::stretch`].
    Stretch(f64),
    /// [`WormModel::widen`].
    Widen(f64),
    /// [`WormModel::scale`].
    Scale(f64),
    /// [`WormModel::curve`].
    Curve(Vec<f64>),
    /// [`WormModel::bend`].
    Bend {
        /// Turning-angle amplitude at the bent end.
        amount: f64,
        /// Decay rate towards the middle.
        exponent: f64,
        /// Bend the head half, otherwise the tail half.
        head: bool,
    },
    /// [`WormModel::swap_head_tail`].
    SwapHeadTail,
}

impl Transform {
    /// Apply this deformation to `model` in place.
    ///
    /// # Errors
    ///
    /// As the corresponding [`WormModel`] method.
    pub fn commit(&self, model: &mut WormModel) -> Result<(), ShapeError> {
        match self {
            Self::Translate(offset) => model.translate(*offset),
            Self::Rotate { angle, pivot } => model.rotate(*angle, *pivot),
            Self::MoveForward { distance, straight } => {
                model.move_forward(*distance, *straight)?;
            }
            Self::Stretch(f) => model.stretch(*f),
            Self::Widen(f) => model.widen(*f),
            Self::Scale(f) => model.scale(*f),
            Self::Curve(modes) => model.curve(modes)?,
            Self::Bend {
                amount,
                exponent,
                head,
            } => model.bend(*amount, *exponent, *head)?,
            Self::SwapHeadTail => model.swap_head_tail(),
        }
        Ok(())
    }
}

/// Integer pixel ring of a polygon with consecutive duplicates and a
/// repeated closing point removed.
fn pixel_ring(points: &[Point]) -> Vec<imageproc::point::Point<i32>> {
    let mut ring: Vec<imageproc::point::Point<i32>> = Vec::with_capacity(points.len());
    for p in points {
        #[allow(clippy::cast_possible_truncation)]
        let q = imageproc::point::Point::new(p.x.round() as i32, p.y.round() as i32);
        if ring.last() != Some(&q) {
            ring.push(q);
        }
    }
    while ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

/// Add real `amplitudes` to the first Fourier coefficients of `signal`,
/// mirrored onto the conjugate half so the result stays real.
fn add_fourier_modes(signal: &[f64], amplitudes: &[f64]) -> Vec<f64> {
    let m = signal.len();
    if m == 0 || amplitudes.is_empty() {
        return signal.to_vec();
    }
    let mut spectrum: Vec<Complex<f64>> = signal.iter().map(|&v| Complex::new(v, 0.0)).collect();
    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(m).process(&mut spectrum);

    for (k, &a) in amplitudes.iter().enumerate().take(m / 2 + 1) {
        spectrum[k] += a;
        let mirror = (m - k) % m;
        if mirror != k {
            spectrum[mirror] += a;
        }
    }

    planner.plan_fft_inverse(m).process(&mut spectrum);
    #[allow(clippy::cast_precision_loss)]
    let scale = 1.0 / m as f64;
    spectrum.iter().map(|c| c.re * scale).collect()
}
