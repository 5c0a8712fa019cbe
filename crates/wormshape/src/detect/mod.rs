//! Image-based worm shape detection.
//!
//! [`detect_shape`] turns one grayscale frame into a center line, a width
//! profile and the two body sides. It runs the staged
//! [`Detection`](pipeline::Detection) pipeline:
//!
//! ```rust
//! # use wormshape::{DetectionHints, DetectorConfig, GrayImage};
//! # use wormshape::detect::{Detection, Halted};
//! # fn run(image: &GrayImage) -> Result<(), Halted> {
//! let config = DetectorConfig::default();
//! let hints = DetectionHints::default();
//! let finished = Detection::new(image, &config, &hints)
//!     .smooth()
//!     .threshold()
//!     .select_contour()?
//!     .locate_head_tail()?
//!     .split_sides()?
//!     .derive_midline()?;
//! let (result, _diagnostics) = finished.into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Frames where no body can be found are not errors: they produce a
//! [`DetectionOutcome::Failed`] result with zero-filled outputs of the
//! configured sizes. The `Err` path of [`detect_shape`] is reserved for
//! configuration that can never work.

mod pipeline;
mod select;

use serde::{Deserialize, Serialize};

pub use pipeline::{
    Detection, Finished, Halted, HeadTailLocated, Pending, Selected, SidesSplit, Smoothed,
    Thresholded,
};

use crate::contour::ContourTracerKind;
use crate::diagnostics::DetectionDiagnostics;
use crate::head_tail::HeadTailResolution;
use crate::moments::PolygonMoments;
use crate::threshold::Polarity;
use crate::types::{Curve, GrayImage, Point, ShapeError};

/// Detector parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Gaussian pre-smoothing sigma in pixels, `None` to skip.
    pub sigma: Option<f32>,
    /// Fixed threshold level. Overrides the Otsu-derived level.
    pub absolute_threshold: Option<f64>,
    /// Multiplier applied to Otsu's level.
    pub threshold_factor: f64,
    /// Level multiplier for the single retry when no contour is found,
    /// `None` to never retry.
    pub threshold_reduce: Option<f64>,
    /// Whether the worm is brighter or darker than the background.
    pub polarity: Polarity,
    /// Contour tracing algorithm.
    pub tracer: ContourTracerKind,
    /// Samples along the contour and along each side.
    pub ncontour: usize,
    /// Minimum curvature peak prominence for head/tail candidates.
    pub delta: f64,
    /// Multiplier for the single peak search retry, `None` to never retry.
    pub delta_reduce: Option<f64>,
    /// Contour smoothing before the curvature fit (sigma in samples).
    pub smooth_head_tail: f64,
    /// Separate smoothing for the side curves, `None` to reuse the
    /// head/tail fit.
    pub smooth_left_right: Option<f64>,
    /// Smoothing of the final center line (sigma in samples).
    pub smooth_center: f64,
    /// Center line point count.
    pub npoints: usize,
    /// Samples kept verbatim at each end of the minimal-advancement walk.
    pub center_offset: usize,
}

impl DetectorConfig {
    /// Default [`sigma`](Self::sigma).
    pub const DEFAULT_SIGMA: f32 = 1.0;
    /// Default [`threshold_factor`](Self::threshold_factor).
    pub const DEFAULT_THRESHOLD_FACTOR: f64 = 0.95;
    /// Default [`threshold_reduce`](Self::threshold_reduce).
    pub const DEFAULT_THRESHOLD_REDUCE: f64 = 0.9;
    /// Default [`ncontour`](Self::ncontour).
    pub const DEFAULT_NCONTOUR: usize = 100;
    /// Default [`delta`](Self::delta).
    pub const DEFAULT_DELTA: f64 = 0.3;
    /// Default [`delta_reduce`](Self::delta_reduce).
    pub const DEFAULT_DELTA_REDUCE: f64 = 0.5;
    /// Default [`smooth_head_tail`](Self::smooth_head_tail).
    pub const DEFAULT_SMOOTH_HEAD_TAIL: f64 = 2.0;
    /// Default [`smooth_center`](Self::smooth_center).
    pub const DEFAULT_SMOOTH_CENTER: f64 = 2.0;
    /// Default [`npoints`](Self::npoints).
    pub const DEFAULT_NPOINTS: usize = 21;
    /// Default [`center_offset`](Self::center_offset).
    pub const DEFAULT_CENTER_OFFSET: usize = 3;

    /// Check that every parameter is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), ShapeError> {
        let invalid = |msg: String| Err(ShapeError::InvalidConfig(msg));

        if let Some(sigma) = self.sigma
            && !(sigma.is_finite() && sigma >= 0.0)
        {
            return invalid(format!("sigma must be finite and non-negative, got {sigma}"));
        }
        if let Some(level) = self.absolute_threshold
            && !level.is_finite()
        {
            return invalid(format!("absolute_threshold must be finite, got {level}"));
        }
        if !(self.threshold_factor.is_finite() && self.threshold_factor > 0.0) {
            return invalid(format!(
                "threshold_factor must be positive, got {}",
                self.threshold_factor
            ));
        }
        for (name, factor) in [
            ("threshold_reduce", self.threshold_reduce),
            ("delta_reduce", self.delta_reduce),
        ] {
            if let Some(f) = factor
                && !(f.is_finite() && f > 0.0)
            {
                return invalid(format!("{name} must be positive, got {f}"));
            }
        }
        if self.ncontour < 4 {
            return invalid(format!("ncontour must be at least 4, got {}", self.ncontour));
        }
        if self.npoints < 2 {
            return invalid(format!("npoints must be at least 2, got {}", self.npoints));
        }
        if !(self.delta.is_finite() && self.delta >= 0.0) {
            return invalid(format!("delta must be non-negative, got {}", self.delta));
        }
        for (name, sigma) in [
            ("smooth_head_tail", Some(self.smooth_head_tail)),
            ("smooth_left_right", self.smooth_left_right),
            ("smooth_center", Some(self.smooth_center)),
        ] {
            if let Some(s) = sigma
                && !(s.is_finite() && s >= 0.0)
            {
                return invalid(format!("{name} must be non-negative, got {s}"));
            }
        }
        if self.center_offset == 0 {
            return invalid("center_offset must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sigma: Some(Self::DEFAULT_SIGMA),
            absolute_threshold: None,
            threshold_factor: Self::DEFAULT_THRESHOLD_FACTOR,
            threshold_reduce: Some(Self::DEFAULT_THRESHOLD_REDUCE),
            polarity: Polarity::default(),
            tracer: ContourTracerKind::default(),
            ncontour: Self::DEFAULT_NCONTOUR,
            delta: Self::DEFAULT_DELTA,
            delta_reduce: Some(Self::DEFAULT_DELTA_REDUCE),
            smooth_head_tail: Self::DEFAULT_SMOOTH_HEAD_TAIL,
            smooth_left_right: None,
            smooth_center: Self::DEFAULT_SMOOTH_CENTER,
            npoints: Self::DEFAULT_NPOINTS,
            center_offset: Self::DEFAULT_CENTER_OFFSET,
        }
    }
}

/// Prior knowledge about the worm, usually taken from the previous frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionHints {
    /// A previous outline, matched by shape when several contours compete.
    pub contour: Option<Curve>,
    /// Expected body area in square pixels.
    pub size: Option<f64>,
    /// Expected `(head, tail)` positions.
    pub head_tail: Option<(Point, Point)>,
}

/// Which threshold pass produced the contours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThresholdPass {
    /// The configured level.
    Primary,
    /// The level times `threshold_reduce`, after the first pass found
    /// nothing.
    Reduced,
}

/// Which rule chose the body contour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContourSelection {
    /// Only one contour was found.
    Single,
    /// Only one outer contour with positive area was found.
    SingleOuter,
    /// Closest shape match to the hint contour.
    ContourHint,
    /// Area closest to the size hint.
    SizeHint,
    /// Centroid closest to the image center.
    MostCentral,
}

impl ContourSelection {
    /// Legacy status contribution of this rule.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Single => 1,
            Self::SingleOuter => 2,
            Self::ContourHint => 3,
            Self::SizeHint => 4,
            Self::MostCentral => 5,
        }
    }
}

/// The branch taken at each decision point of a successful detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DetectionStatus {
    /// Threshold pass.
    pub threshold: ThresholdPass,
    /// Contour selection rule.
    pub contour: ContourSelection,
    /// Head/tail resolution branch.
    pub head_tail: HeadTailResolution,
}

impl DetectionStatus {
    /// Legacy integer status: `1000` for a reduced threshold, plus the
    /// contour rule (`1..=5`), plus the head/tail branch (`10..=60`).
    #[must_use]
    pub const fn code(&self) -> i32 {
        let reduced = match self.threshold {
            ThresholdPass::Primary => 0,
            ThresholdPass::Reduced => 1000,
        };
        reduced + self.contour.code() + self.head_tail.code()
    }
}

/// Overall outcome of a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectionOutcome {
    /// No body was found.
    Failed,
    /// A body was found along the recorded branches.
    Detected(DetectionStatus),
}

impl DetectionOutcome {
    /// Legacy integer status, `-1` for a failure.
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::Failed => -1,
            Self::Detected(status) => status.code(),
        }
    }

    /// Returns `true` when a body was found.
    #[must_use]
    pub const fn is_detected(&self) -> bool {
        matches!(self, Self::Detected(_))
    }
}

/// Output of a detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// How the result was obtained.
    pub outcome: DetectionOutcome,
    /// Center line from head to tail, `npoints` long.
    pub center: Curve,
    /// Left side from head to tail, `ncontour` long.
    pub left: Curve,
    /// Right side from head to tail, `ncontour` long.
    pub right: Curve,
    /// Body width at each center line point.
    pub width: Vec<f64>,
    /// The selected outline as sampled for the head/tail search, empty on
    /// failure.
    pub contour: Curve,
}

impl DetectionResult {
    /// A zero-filled failure result of the configured sizes.
    #[must_use]
    pub fn failed(config: &DetectorConfig) -> Self {
        Self {
            outcome: DetectionOutcome::Failed,
            center: Curve::zeros(config.npoints),
            left: Curve::zeros(config.ncontour),
            right: Curve::zeros(config.ncontour),
            width: vec![0.0; config.npoints],
            contour: Curve::default(),
        }
    }

    /// Hints for detecting the same worm in the next frame: this outline,
    /// its area, and the two ends of the center line. Empty after a
    /// failure.
    #[must_use]
    pub fn next_hints(&self) -> DetectionHints {
        if !self.outcome.is_detected() {
            return DetectionHints::default();
        }
        let ends = self
            .center
            .first()
            .copied()
            .zip(self.center.last().copied());
        DetectionHints {
            contour: Some(self.contour.clone()),
            size: Some(PolygonMoments::of(self.contour.points()).area),
            head_tail: ends,
        }
    }
}

/// Reasons a detection run stops early. [`detect_shape`] reports them as
/// a [`DetectionOutcome::Failed`] result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DetectionError {
    /// Neither threshold pass yielded a usable contour.
    #[error("no contour found")]
    NoContour,

    /// A geometric step on the selected contour failed.
    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// Detect the worm in `image`.
///
/// # Errors
///
/// Returns [`ShapeError::InvalidConfig`] if `config` fails
/// [`DetectorConfig::validate`]. Frames without a usable body yield
/// `Ok` with [`DetectionOutcome::Failed`].
pub fn detect_shape(
    image: &GrayImage,
    config: &DetectorConfig,
    hints: &DetectionHints,
) -> Result<DetectionResult, ShapeError> {
    detect_shape_with_diagnostics(image, config, hints).map(|(result, _)| result)
}

/// As [`detect_shape`], also returning per-stage diagnostics.
///
/// # Errors
///
/// As [`detect_shape`].
pub fn detect_shape_with_diagnostics(
    image: &GrayImage,
    config: &DetectorConfig,
    hints: &DetectionHints,
) -> Result<(DetectionResult, DetectionDiagnostics), ShapeError> {
    config.validate()?;
    let run = Detection::new(image, config, hints)
        .smooth()
        .threshold()
        .select_contour()
        .and_then(Selected::locate_head_tail)
        .and_then(HeadTailLocated::split_sides)
        .and_then(SidesSplit::derive_midline);

    match run {
        Ok(finished) => {
            let (result, diagnostics) = finished.into_result();
            tracing::info!(code = result.outcome.code(), "worm detected");
            Ok((result, diagnostics))
        }
        Err(Halted {
            reason,
            diagnostics,
        }) => {
            tracing::warn!(%reason, "detection failed");
            Ok((DetectionResult::failed(config), diagnostics))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Luma;

    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(DetectorConfig::default().validate(), Ok(()));
    }

    #[test]
    fn impossible_values_are_rejected() {
        let cases = [
            DetectorConfig {
                ncontour: 2,
                ..DetectorConfig::default()
            },
            DetectorConfig {
                threshold_factor: 0.0,
                ..DetectorConfig::default()
            },
            DetectorConfig {
                sigma: Some(f32::NAN),
                ..DetectorConfig::default()
            },
            DetectorConfig {
                smooth_left_right: Some(-1.0),
                ..DetectorConfig::default()
            },
            DetectorConfig {
                center_offset: 0,
                ..DetectorConfig::default()
            },
        ];
        for config in cases {
            assert!(matches!(
                config.validate(),
                Err(ShapeError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn invalid_config_is_the_only_error() {
        let image = GrayImage::from_pixel(8, 8, Luma([0]));
        let config = DetectorConfig {
            npoints: 1,
            ..DetectorConfig::default()
        };
        let result = detect_shape(&image, &config, &DetectionHints::default());
        assert!(matches!(result, Err(ShapeError::InvalidConfig(_))));
    }

    #[test]
    fn status_codes_combine_every_branch() {
        let status = DetectionStatus {
            threshold: ThresholdPass::Reduced,
            contour: ContourSelection::SizeHint,
            head_tail: HeadTailResolution::SinglePeakAntipode,
        };
        assert_eq!(status.code(), 1044);
        assert_eq!(DetectionOutcome::Detected(status).code(), 1044);
        let primary = DetectionStatus {
            threshold: ThresholdPass::Primary,
            contour: ContourSelection::Single,
            head_tail: HeadTailResolution::TwoPeaks,
        };
        assert_eq!(primary.code(), 21);
        assert_eq!(DetectionOutcome::Failed.code(), -1);
    }

    #[test]
    fn failure_is_zero_filled_to_configured_sizes() {
        let config = DetectorConfig {
            npoints: 15,
            ncontour: 40,
            ..DetectorConfig::default()
        };
        let image = GrayImage::from_pixel(30, 30, Luma([77]));
        let (result, diagnostics) =
            detect_shape_with_diagnostics(&image, &config, &DetectionHints::default()).unwrap();
        assert_eq!(result.outcome, DetectionOutcome::Failed);
        assert_eq!(result.center.len(), 15);
        assert_eq!(result.width.len(), 15);
        assert_eq!(result.left.len(), 40);
        assert_eq!(result.right.len(), 40);
        assert!(result.width.iter().all(|w| *w == 0.0));
        assert!(result.center.iter().all(|p| *p == Point::ZERO));
        assert!(result.next_hints().contour.is_none());
        assert_eq!(diagnostics.summary.status_code, -1);
    }

    #[test]
    fn detection_hands_hints_to_the_next_frame() {
        let image = GrayImage::from_fn(100, 60, |x, y| {
            let dx = (f64::from(x) - 50.0) / 35.0;
            let dy = (f64::from(y) - 30.0) / 7.0;
            let inside = dx.mul_add(dx, dy * dy) <= 1.0;
            Luma([if inside { 230 } else { 10 }])
        });
        let result =
            detect_shape(&image, &DetectorConfig::default(), &DetectionHints::default()).unwrap();
        assert!(result.outcome.is_detected());
        let hints = result.next_hints();
        let area = hints.size.unwrap();
        // Ellipse area pi * 35 * 7 is about 770.
        assert!((500.0..900.0).contains(&area), "area {area}");
        let (head, tail) = hints.head_tail.unwrap();
        assert!(head.distance(tail) > 50.0);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = DetectorConfig {
            sigma: None,
            polarity: Polarity::Dark,
            smooth_left_right: Some(1.5),
            ..DetectorConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: DetectorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
        let partial: DetectorConfig = serde_json::from_str(r#"{"npoints": 31}"#).unwrap();
        assert_eq!(partial.npoints, 31);
        assert_eq!(partial.ncontour, DetectorConfig::DEFAULT_NCONTOUR);
    }
}
