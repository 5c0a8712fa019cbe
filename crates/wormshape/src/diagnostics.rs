//! Detection diagnostics: timing, counts, and other metrics for each stage.
//!
//! Collected by
//! [`detect_shape_with_diagnostics`](crate::detect::detect_shape_with_diagnostics)
//! for every frame, including frames where detection halts early; the
//! stages that never ran stay `None`.
//!
//! Durations go over the wire as seconds in an `f64`.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::contour::TracedContour;
use crate::detect::ContourSelection;
use crate::head_tail::HeadTailResolution;

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single detection run.
///
/// Stages after a failure are never reached and stay `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionDiagnostics {
    /// Gaussian pre-smoothing.
    pub blur: Option<StageDiagnostics>,
    /// Thresholding and contour tracing, including the reduced retry.
    pub threshold: Option<StageDiagnostics>,
    /// Choice among several contours.
    pub selection: Option<StageDiagnostics>,
    /// Spline fit and head/tail localization.
    pub head_tail: Option<StageDiagnostics>,
    /// Split into left and right sides.
    pub sides: Option<StageDiagnostics>,
    /// Center line and width.
    pub midline: Option<StageDiagnostics>,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary of the run.
    pub summary: DetectionSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Gaussian blur metrics.
    Blur {
        /// Sigma used, `None` when smoothing was off.
        sigma: Option<f32>,
    },
    /// Threshold and contour tracing metrics.
    Threshold {
        /// Level of the first pass.
        level: f64,
        /// Level of the retry, if one was needed.
        reduced_level: Option<f64>,
        /// Foreground pixels in the final mask.
        foreground_pixels: u64,
        /// Total pixel count.
        total_pixels: u64,
        /// Number of contours found.
        contour_count: usize,
        /// Total number of points across all contours.
        total_point_count: usize,
        /// Minimum points in any single contour.
        min_contour_points: usize,
        /// Maximum points in any single contour.
        max_contour_points: usize,
    },
    /// Contour selection metrics.
    Selection {
        /// Which rule picked the contour.
        rule: ContourSelection,
        /// Number of contours considered.
        candidates: usize,
        /// Enclosed area of the chosen contour.
        area: f64,
        /// Points on the chosen contour.
        points: usize,
    },
    /// Head/tail localization metrics.
    HeadTail {
        /// Curvature peaks found (after any retry).
        peaks: usize,
        /// Samples along the contour.
        samples: usize,
        /// Which fallback resolved the two ends.
        resolution: HeadTailResolution,
    },
    /// Side split metrics.
    Sides {
        /// Samples per side.
        samples: usize,
        /// Whether the sides were refitted with their own smoothing.
        refit: bool,
        /// Arc length of the left side.
        left_length: f64,
        /// Arc length of the right side.
        right_length: f64,
    },
    /// Midline metrics.
    Midline {
        /// Center line points.
        npoints: usize,
        /// Center line arc length.
        length: f64,
        /// Largest width.
        max_width: f64,
    },
}

/// High-level summary of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Legacy status code (-1 on failure).
    pub status_code: i32,
    /// Number of contours found.
    pub contour_count: usize,
}

impl DetectionDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Detection Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{}  |  Status: {}",
            self.summary.image_width, self.summary.image_height, self.summary.status_code,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<16} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Blur", &self.blur),
            ("Threshold", &self.threshold),
            ("Selection", &self.selection),
            ("Head/Tail", &self.head_tail),
            ("Sides", &self.sides),
            ("Midline", &self.midline),
        ];
        for (name, diag) in stages {
            let Some(diag) = diag else {
                lines.push(format!("{name:<16} {:>10} {:>10}  (not reached)", "-", "-"));
                continue;
            };
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<16} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!("Contours: {}", self.summary.contour_count));

        lines.join("\n")
    }
}

/// Accumulates stage diagnostics while the detection pipeline advances.
#[derive(Debug, Clone)]
pub(crate) struct Recorder {
    started: Instant,
    diagnostics: DetectionDiagnostics,
}

impl Recorder {
    pub(crate) fn new(image_width: u32, image_height: u32) -> Self {
        Self {
            started: Instant::now(),
            diagnostics: DetectionDiagnostics {
                summary: DetectionSummary {
                    image_width,
                    image_height,
                    status_code: -1,
                    contour_count: 0,
                },
                ..DetectionDiagnostics::default()
            },
        }
    }

    /// Run `f`, returning its output and its timing.
    pub(crate) fn time<T>(f: impl FnOnce() -> T) -> (T, Duration) {
        let start = Instant::now();
        let out = f();
        (out, start.elapsed())
    }

    pub(crate) fn stage(
        &mut self,
        slot: fn(&mut DetectionDiagnostics) -> &mut Option<StageDiagnostics>,
        duration: Duration,
        metrics: StageMetrics,
    ) {
        *slot(&mut self.diagnostics) = Some(StageDiagnostics { duration, metrics });
    }

    pub(crate) const fn set_contour_count(&mut self, count: usize) {
        self.diagnostics.summary.contour_count = count;
    }

    pub(crate) fn finish(mut self, status_code: i32) -> DetectionDiagnostics {
        self.diagnostics.summary.status_code = status_code;
        self.diagnostics.total_duration = self.started.elapsed();
        self.diagnostics
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Blur { sigma } => match sigma {
            Some(s) => format!("sigma={s:.2}"),
            None => "off".to_string(),
        },
        StageMetrics::Threshold {
            level,
            reduced_level,
            foreground_pixels,
            total_pixels,
            contour_count,
            total_point_count,
            min_contour_points,
            max_contour_points,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let fill = if *total_pixels > 0 {
                *foreground_pixels as f64 / *total_pixels as f64 * 100.0
            } else {
                0.0
            };
            let retry = reduced_level.map_or_else(String::new, |r| format!(" retry={r:.1}"));
            format!(
                "level={level:.1}{retry} fg={fill:.1}% {contour_count} contours, {total_point_count} pts (min={min_contour_points} max={max_contour_points})",
            )
        }
        StageMetrics::Selection {
            rule,
            candidates,
            area,
            points,
        } => format!("{rule:?} of {candidates}, area={area:.1} pts={points}"),
        StageMetrics::HeadTail {
            peaks,
            samples,
            resolution,
        } => format!("{peaks} peaks over {samples} samples, {resolution:?}"),
        StageMetrics::Sides {
            samples,
            refit,
            left_length,
            right_length,
        } => {
            let refit = if *refit { " refit" } else { "" };
            format!("{samples} samples{refit}, left={left_length:.1} right={right_length:.1}")
        }
        StageMetrics::Midline {
            npoints,
            length,
            max_width,
        } => format!("{npoints} pts, length={length:.1} max_width={max_width:.2}"),
    }
}

/// Point count statistics for a set of traced contours.
pub(crate) struct ContourStats {
    /// Total number of points across all contours.
    pub total: usize,
    /// Minimum number of points in any single contour.
    pub min: usize,
    /// Maximum number of points in any single contour.
    pub max: usize,
}

/// Compute point count statistics for traced contours.
pub(crate) fn contour_stats(contours: &[TracedContour]) -> ContourStats {
    let lengths = || contours.iter().map(|c| c.points.len());
    ContourStats {
        total: lengths().sum(),
        min: lengths().min().unwrap_or(0),
        max: lengths().max().unwrap_or(0),
    }
}
