//! Center line and width from a pair of boundary curves.
//!
//! This module defines the [`MidlineExtractor`] trait for pluggable
//! midline strategies and the [`MidlineMethod`] enum for selecting one
//! at runtime. Every strategy receives the two sides running from head
//! to tail and returns a center line with an index-aligned width
//! profile.
//!
//! # Strategy pattern
//!
//! The strategies trade cost for robustness: [`Mean`](MidlineMethod::Mean)
//! is exact for parallel sides, [`Projection`](MidlineMethod::Projection)
//! tolerates uneven sampling, [`Voronoi`](MidlineMethod::Voronoi) and
//! [`Erosion`](MidlineMethod::Erosion) handle strongly bent outlines, and
//! [`MinimalAdvancement`](MidlineMethod::MinimalAdvancement) is the
//! monotone walk used by the image detector.

mod advance;
mod erosion;
mod projection;
mod voronoi;

use serde::{Deserialize, Serialize};

use crate::curve::{resample, resample_with_width};
use crate::types::{Curve, Point, ShapeError, require_len, require_points};

/// Parameters of the erosion strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErosionParams {
    /// Erosion distance added per iteration (pixels).
    pub step: f64,
    /// Iteration cap.
    pub max_iter: usize,
    /// Peak threshold for the head/tail search on the eroded outline.
    pub delta: f64,
    /// Number of samples along the eroded outline.
    pub ncontour: usize,
    /// Smoothing of the eroded outline before the curvature fit.
    pub smooth: f64,
}

impl ErosionParams {
    /// Default [`step`](Self::step).
    pub const DEFAULT_STEP: f64 = 0.1;
    /// Default [`max_iter`](Self::max_iter).
    pub const DEFAULT_MAX_ITER: usize = 100;
    /// Default [`delta`](Self::delta).
    pub const DEFAULT_DELTA: f64 = 0.3;
    /// Default [`ncontour`](Self::ncontour).
    pub const DEFAULT_NCONTOUR: usize = 100;
    /// Default [`smooth`](Self::smooth).
    pub const DEFAULT_SMOOTH: f64 = 1.0;
}

impl Default for ErosionParams {
    fn default() -> Self {
        Self {
            step: Self::DEFAULT_STEP,
            max_iter: Self::DEFAULT_MAX_ITER,
            delta: Self::DEFAULT_DELTA,
            ncontour: Self::DEFAULT_NCONTOUR,
            smooth: Self::DEFAULT_SMOOTH,
        }
    }
}

/// Selects which midline strategy to use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MidlineMethod {
    /// Pointwise average of same-index boundary samples.
    Mean,
    /// Average of each sample pair with their projections onto the
    /// opposite side, optionally restricted to the index window
    /// `i - k .. i + k` around each sample.
    Projection {
        /// `k` for the projection window, `None` for the whole side.
        neighbours: Option<usize>,
    },
    /// Interior Voronoi vertices of the outline polygon.
    Voronoi,
    /// Average of the sides of the maximally eroded outline.
    Erosion(ErosionParams),
    /// Monotone walk advancing whichever side lags behind.
    MinimalAdvancement {
        /// Samples kept verbatim at each end.
        offset: usize,
    },
}

impl Default for MidlineMethod {
    fn default() -> Self {
        Self::Projection { neighbours: None }
    }
}

/// Sampling options shared by all strategies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidlineOptions {
    /// Output point count. `None` keeps the working sample count.
    pub npoints: Option<usize>,
    /// Working sample count for both sides. `None` uses the larger side.
    pub nsamples: Option<usize>,
    /// Resample the sides even when their lengths already agree.
    pub resample: bool,
    /// Smoothing (Gaussian sigma in samples) of the final resampling.
    pub smooth: f64,
}

impl Default for MidlineOptions {
    fn default() -> Self {
        Self {
            npoints: None,
            nsamples: None,
            resample: false,
            smooth: 0.0,
        }
    }
}

/// A center line with its index-aligned width profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Midline {
    /// Center line from head to tail.
    pub center: Curve,
    /// Boundary separation at each center line point.
    pub width: Vec<f64>,
}

/// Trait for midline strategies.
///
/// Input: left and right sides, both running from head to tail.
/// Output: a [`Midline`] whose width has the same length as its center.
pub trait MidlineExtractor {
    /// Derive the center line and width between `left` and `right`.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError`] for sides with fewer than two points,
    /// zero-length sides, or geometry the strategy cannot process.
    fn center_from_sides(
        &self,
        left: &Curve,
        right: &Curve,
        options: &MidlineOptions,
    ) -> Result<Midline, ShapeError>;
}

impl MidlineExtractor for MidlineMethod {
    fn center_from_sides(
        &self,
        left: &Curve,
        right: &Curve,
        options: &MidlineOptions,
    ) -> Result<Midline, ShapeError> {
        let (left, right) = prepare_sides(left, right, options)?;
        let raw = match *self {
            Self::Mean => mean(&left, &right),
            Self::Projection { neighbours } => projection::center(&left, &right, neighbours),
            Self::Voronoi => voronoi::center(&left, &right)?,
            Self::Erosion(params) => erosion::center(&left, &right, &params)?,
            Self::MinimalAdvancement { offset } => advance::center(&left, &right, offset),
        };
        finalize(raw, left.len(), options)
    }
}

/// Resample both sides to a common count when needed.
fn prepare_sides(
    left: &Curve,
    right: &Curve,
    options: &MidlineOptions,
) -> Result<(Curve, Curve), ShapeError> {
    require_points("left side", left.len(), 2)?;
    require_points("right side", right.len(), 2)?;
    let n = options
        .nsamples
        .unwrap_or_else(|| left.len().max(right.len()));
    require_points("side samples", n, 2)?;

    let left = if options.resample || left.len() != n {
        resample(left, n, 0.0)?
    } else {
        left.clone()
    };
    let right = if options.resample || right.len() != n {
        resample(right, n, 0.0)?
    } else {
        right.clone()
    };
    Ok((left, right))
}

/// Resample the raw strategy output to the requested count.
fn finalize(
    raw: Midline,
    nsamples: usize,
    options: &MidlineOptions,
) -> Result<Midline, ShapeError> {
    require_len("midline width", raw.width.len(), raw.center.len())?;
    let target = options.npoints.unwrap_or(nsamples);
    if target == raw.center.len() && options.smooth <= 0.0 {
        return Ok(raw);
    }
    let (center, width) = resample_with_width(&raw.center, &raw.width, target, options.smooth)?;
    Ok(Midline { center, width })
}

fn mean(left: &Curve, right: &Curve) -> Midline {
    let (center, width): (Vec<Point>, Vec<f64>) = left
        .iter()
        .zip(right)
        .map(|(&l, &r)| (l.midpoint(r), l.distance(r)))
        .unzip();
    Midline {
        center: Curve::new(center),
        width,
    }
}
