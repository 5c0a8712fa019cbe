//! Incremental detection: advance stage by stage, inspecting each
//! intermediate result before continuing.
//!
//! Each stage method consumes `self` and returns the next state (or a
//! `Result` for stages that can stop the run), carrying the inputs and
//! the diagnostics gathered so far. A stopped run is reported as a
//! [`Halted`] value that still holds those diagnostics.

use std::time::Duration;

use crate::blur::gaussian_blur;
use crate::contour::{ContourTracer, TracedContour};
use crate::curve::resample_closed;
use crate::diagnostics::{DetectionDiagnostics, Recorder, StageMetrics, contour_stats};
use crate::head_tail::{
    ContourSpline, CurvatureProfile, HeadTail, HeadTailResolution, orient_clockwise,
    resolve_head_tail, tip_peaks_with_retry,
};
use crate::midline::{Midline, MidlineExtractor, MidlineMethod, MidlineOptions};
use crate::threshold::{binary_mask, foreground_count, is_uniform, threshold_level};
use crate::types::{Curve, Dimensions, GrayImage};

use super::{
    ContourSelection, DetectionError, DetectionHints, DetectionOutcome, DetectionResult,
    DetectionStatus, DetectorConfig, ThresholdPass, select,
};

/// A detection run that stopped before producing a body.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{reason}")]
pub struct Halted {
    /// Why the run stopped.
    pub reason: DetectionError,
    /// Diagnostics of the stages that did run.
    pub diagnostics: DetectionDiagnostics,
}

/// Inputs and bookkeeping shared by every stage.
struct Context<'a> {
    config: &'a DetectorConfig,
    hints: &'a DetectionHints,
    dimensions: Dimensions,
    recorder: Recorder,
}

impl Context<'_> {
    fn halt(self, reason: impl Into<DetectionError>) -> Halted {
        Halted {
            reason: reason.into(),
            diagnostics: self.recorder.finish(-1),
        }
    }
}

/// Entry point of the staged detector.
pub struct Detection;

impl Detection {
    /// Start a run on `image`. Nothing is computed until the first stage
    /// method is called.
    #[must_use = "call .smooth() to start the detection"]
    pub fn new<'a>(
        image: &'a GrayImage,
        config: &'a DetectorConfig,
        hints: &'a DetectionHints,
    ) -> Pending<'a> {
        Pending {
            ctx: Context {
                config,
                hints,
                dimensions: Dimensions {
                    width: image.width(),
                    height: image.height(),
                },
                recorder: Recorder::new(image.width(), image.height()),
            },
            image,
        }
    }
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Run state before any processing has occurred.
#[must_use = "detection stages are consumed by advancing; call .smooth() to continue"]
pub struct Pending<'a> {
    ctx: Context<'a>,
    image: &'a GrayImage,
}

impl<'a> Pending<'a> {
    /// Apply the optional Gaussian pre-smoothing.
    pub fn smooth(mut self) -> Smoothed<'a> {
        let sigma = self.ctx.config.sigma.filter(|s| *s > 0.0);
        let (smoothed, duration) = Recorder::time(|| match sigma {
            Some(s) => gaussian_blur(self.image, s),
            None => self.image.clone(),
        });
        tracing::debug!(?sigma, "smoothed frame");
        self.ctx
            .recorder
            .stage(|d| &mut d.blur, duration, StageMetrics::Blur { sigma });
        Smoothed {
            ctx: self.ctx,
            smoothed,
        }
    }
}

// ───────────────────────── Stage 1: Smoothed ─────────────────────────

/// The frame after pre-smoothing.
#[must_use = "detection stages are consumed by advancing; call .threshold() to continue"]
pub struct Smoothed<'a> {
    ctx: Context<'a>,
    smoothed: GrayImage,
}

impl<'a> Smoothed<'a> {
    /// The smoothed frame.
    #[must_use]
    pub const fn smoothed(&self) -> &GrayImage {
        &self.smoothed
    }

    /// Threshold the frame and trace contours, retrying once at a reduced
    /// level when the first pass finds none.
    pub fn threshold(mut self) -> Thresholded<'a> {
        let config = self.ctx.config;
        let image = &self.smoothed;
        let ((pass, level, reduced_level, mask, contours), duration) = Recorder::time(|| {
            let level = threshold_level(image, config.absolute_threshold, config.threshold_factor);
            let (mask, contours) = trace_at(image, level, config);
            match config.threshold_reduce {
                Some(factor) if contours.is_empty() => {
                    let reduced = level * factor;
                    tracing::warn!(level, reduced, "no contour at threshold, retrying reduced");
                    let (mask, contours) = trace_at(image, reduced, config);
                    (ThresholdPass::Reduced, level, Some(reduced), mask, contours)
                }
                _ => (ThresholdPass::Primary, level, None, mask, contours),
            }
        });

        let stats = contour_stats(&contours);
        tracing::debug!(
            level,
            ?reduced_level,
            contours = contours.len(),
            points = stats.total,
            "thresholded frame"
        );
        self.ctx.recorder.set_contour_count(contours.len());
        self.ctx.recorder.stage(
            |d| &mut d.threshold,
            duration,
            StageMetrics::Threshold {
                level,
                reduced_level,
                foreground_pixels: foreground_count(&mask),
                total_pixels: u64::from(mask.width()) * u64::from(mask.height()),
                contour_count: contours.len(),
                total_point_count: stats.total,
                min_contour_points: stats.min,
                max_contour_points: stats.max,
            },
        );
        Thresholded {
            ctx: self.ctx,
            pass,
            mask,
            contours,
        }
    }
}

/// Mask at `level` and its contours with at least three points. Uniform
/// masks have none.
fn trace_at(
    image: &GrayImage,
    level: f64,
    config: &DetectorConfig,
) -> (GrayImage, Vec<TracedContour>) {
    let mask = binary_mask(image, level, config.polarity);
    if is_uniform(&mask) {
        return (mask, Vec::new());
    }
    let contours = config
        .tracer
        .trace(&mask)
        .into_iter()
        .filter(|c| c.points.len() >= 3)
        .collect();
    (mask, contours)
}

// ───────────────────────── Stage 2: Thresholded ──────────────────────

/// Foreground mask and its traced contours.
#[must_use = "detection stages are consumed by advancing; call .select_contour() to continue"]
pub struct Thresholded<'a> {
    ctx: Context<'a>,
    pass: ThresholdPass,
    mask: GrayImage,
    contours: Vec<TracedContour>,
}

impl<'a> Thresholded<'a> {
    /// The foreground mask of the pass that was kept.
    #[must_use]
    pub const fn mask(&self) -> &GrayImage {
        &self.mask
    }

    /// Every usable contour of the mask.
    #[must_use]
    pub fn contours(&self) -> &[TracedContour] {
        &self.contours
    }

    /// Choose the body contour.
    ///
    /// # Errors
    ///
    /// Returns [`Halted`] with [`DetectionError::NoContour`] when neither
    /// threshold pass found a contour.
    pub fn select_contour(mut self) -> Result<Selected<'a>, Halted> {
        if self.contours.is_empty() {
            return Err(self.ctx.halt(DetectionError::NoContour));
        }
        let center = self.ctx.dimensions.center();
        let ((index, rule), duration) =
            Recorder::time(|| select::choose(&self.contours, self.ctx.hints, center));
        let candidates = self.contours.len();
        let contour = self.contours.swap_remove(index);
        let area = contour.area();
        tracing::debug!(?rule, candidates, area, "selected contour");
        self.ctx.recorder.stage(
            |d| &mut d.selection,
            duration,
            StageMetrics::Selection {
                rule,
                candidates,
                area,
                points: contour.points.len(),
            },
        );
        Ok(Selected {
            ctx: self.ctx,
            pass: self.pass,
            rule,
            contour: contour.points,
        })
    }
}

// ───────────────────────── Stage 3: Selected ─────────────────────────

/// The chosen body outline in pixel coordinates.
#[must_use = "detection stages are consumed by advancing; call .locate_head_tail() to continue"]
pub struct Selected<'a> {
    ctx: Context<'a>,
    pass: ThresholdPass,
    rule: ContourSelection,
    contour: Curve,
}

impl<'a> Selected<'a> {
    /// The selected outline as traced.
    #[must_use]
    pub const fn contour(&self) -> &Curve {
        &self.contour
    }

    /// Fit the outline and find the head and tail among its curvature
    /// peaks.
    ///
    /// # Errors
    ///
    /// Returns [`Halted`] when the outline is too small or degenerate to
    /// fit.
    pub fn locate_head_tail(mut self) -> Result<HeadTailLocated<'a>, Halted> {
        let config = self.ctx.config;
        let hint = self.ctx.hints.head_tail;
        let (result, duration) = Recorder::time(|| -> Result<_, DetectionError> {
            let oriented = orient_clockwise(self.contour.points());
            let perimeter: f64 = oriented
                .iter()
                .zip(oriented.iter().cycle().skip(1))
                .map(|(a, b)| a.distance(*b))
                .sum();
            let unit_samples = unit_spacing_count(perimeter);
            let resampled = resample_closed(&oriented, unit_samples)?;
            let spline = ContourSpline::fit(&resampled, config.smooth_head_tail)?;
            let profile = spline.profile(config.ncontour);
            let peaks = tip_peaks_with_retry(&profile.curvature, config.delta, config.delta_reduce);
            let ends = resolve_head_tail(&profile.points, &peaks, hint);
            Ok((spline, profile, peaks.len(), ends))
        });
        let (spline, profile, peaks, ends) = match result {
            Ok(fit) => fit,
            Err(e) => return Err(self.ctx.halt(e)),
        };
        tracing::debug!(peaks, resolution = ?ends.resolution, "located head and tail");
        self.ctx.recorder.stage(
            |d| &mut d.head_tail,
            duration,
            StageMetrics::HeadTail {
                peaks,
                samples: profile.points.len(),
                resolution: ends.resolution,
            },
        );
        Ok(HeadTailLocated {
            ctx: self.ctx,
            pass: self.pass,
            rule: self.rule,
            spline,
            profile,
            ends,
        })
    }
}

/// Sample count giving roughly one pixel between contour samples.
fn unit_spacing_count(perimeter: f64) -> usize {
    if perimeter.is_finite() && perimeter > 3.0 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let n = perimeter.round() as usize;
        n
    } else {
        3
    }
}

// ───────────────────────── Stage 4: HeadTailLocated ──────────────────

/// The fitted outline with head and tail resolved.
#[must_use = "detection stages are consumed by advancing; call .split_sides() to continue"]
pub struct HeadTailLocated<'a> {
    ctx: Context<'a>,
    pass: ThresholdPass,
    rule: ContourSelection,
    spline: ContourSpline,
    profile: CurvatureProfile,
    ends: HeadTail,
}

impl<'a> HeadTailLocated<'a> {
    /// Samples and tip curvature along the outline.
    #[must_use]
    pub const fn profile(&self) -> &CurvatureProfile {
        &self.profile
    }

    /// The resolved head and tail sample indices.
    #[must_use]
    pub const fn ends(&self) -> &HeadTail {
        &self.ends
    }

    /// Split the outline into the left (forward) and right (backward)
    /// walks from head to tail.
    ///
    /// # Errors
    ///
    /// Returns [`Halted`] when refitting with `smooth_left_right` fails.
    pub fn split_sides(mut self) -> Result<SidesSplit<'a>, Halted> {
        let config = self.ctx.config;
        let head = self.profile.params[self.ends.head];
        let tail = self.profile.params[self.ends.tail];
        let (split, duration) = Recorder::time(|| -> Result<_, DetectionError> {
            let refit;
            let spline = match config.smooth_left_right {
                Some(s) => {
                    refit = self.spline.refit(s)?;
                    &refit
                }
                None => &self.spline,
            };
            Ok(spline.split(head, tail, config.ncontour))
        });
        let (left, right) = match split {
            Ok((left, right)) => (Curve::new(left), Curve::new(right)),
            Err(e) => return Err(self.ctx.halt(e)),
        };
        tracing::debug!(
            left = left.arc_length(),
            right = right.arc_length(),
            "split sides"
        );
        self.ctx.recorder.stage(
            |d| &mut d.sides,
            duration,
            StageMetrics::Sides {
                samples: left.len(),
                refit: config.smooth_left_right.is_some(),
                left_length: left.arc_length(),
                right_length: right.arc_length(),
            },
        );
        Ok(SidesSplit {
            ctx: self.ctx,
            pass: self.pass,
            rule: self.rule,
            resolution: self.ends.resolution,
            contour: Curve::new(self.profile.points),
            left,
            right,
        })
    }
}

// ───────────────────────── Stage 5: SidesSplit ───────────────────────

/// Left and right body sides, both running from head to tail.
#[must_use = "detection stages are consumed by advancing; call .derive_midline() to continue"]
pub struct SidesSplit<'a> {
    ctx: Context<'a>,
    pass: ThresholdPass,
    rule: ContourSelection,
    resolution: HeadTailResolution,
    contour: Curve,
    left: Curve,
    right: Curve,
}

impl SidesSplit<'_> {
    /// The left side.
    #[must_use]
    pub const fn left(&self) -> &Curve {
        &self.left
    }

    /// The right side.
    #[must_use]
    pub const fn right(&self) -> &Curve {
        &self.right
    }

    /// Derive the center line and width with the minimal-advancement
    /// walk.
    ///
    /// # Errors
    ///
    /// Returns [`Halted`] when the sides are degenerate.
    pub fn derive_midline(mut self) -> Result<Finished, Halted> {
        let config = self.ctx.config;
        let method = MidlineMethod::MinimalAdvancement {
            offset: config.center_offset,
        };
        let options = MidlineOptions {
            npoints: Some(config.npoints),
            smooth: config.smooth_center,
            ..MidlineOptions::default()
        };
        let (midline, duration) =
            Recorder::time(|| method.center_from_sides(&self.left, &self.right, &options));
        let Midline { center, width } = match midline {
            Ok(m) => m,
            Err(e) => return Err(self.ctx.halt(e)),
        };
        let length = center.arc_length();
        let max_width = width.iter().copied().fold(0.0, f64::max);
        tracing::debug!(length, max_width, "derived midline");
        self.ctx.recorder.stage(
            |d| &mut d.midline,
            duration,
            StageMetrics::Midline {
                npoints: center.len(),
                length,
                max_width,
            },
        );

        let status = DetectionStatus {
            threshold: self.pass,
            contour: self.rule,
            head_tail: self.resolution,
        };
        let outcome = DetectionOutcome::Detected(status);
        Ok(Finished {
            result: DetectionResult {
                outcome,
                center,
                left: self.left,
                right: self.right,
                width,
                contour: self.contour,
            },
            diagnostics: self.ctx.recorder.finish(outcome.code()),
        })
    }
}

// ───────────────────────── Stage 6: Finished ─────────────────────────

/// A completed detection.
#[must_use = "call .into_result() to extract the DetectionResult"]
pub struct Finished {
    result: DetectionResult,
    diagnostics: DetectionDiagnostics,
}

impl Finished {
    /// The detection result.
    #[must_use]
    pub const fn result(&self) -> &DetectionResult {
        &self.result
    }

    /// Total wall-clock time of the run.
    #[must_use]
    pub const fn total_duration(&self) -> Duration {
        self.diagnostics.total_duration
    }

    /// Consume the run, returning the result and its diagnostics.
    #[must_use]
    pub fn into_result(self) -> (DetectionResult, DetectionDiagnostics) {
        (self.result, self.diagnostics)
    }
}
