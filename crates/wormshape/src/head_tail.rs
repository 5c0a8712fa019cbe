//! Head/tail localization on a closed contour.
//!
//! The contour is oriented clockwise (negative shoelace area), so that
//! convex tips have negative signed curvature, then fitted with a
//! periodic-by-padding parametric spline. Head and tail candidates are
//! the peaks of the negated curvature; a fixed priority of fallbacks
//! resolves them to exactly two contour samples. The contour between
//! them, walked forward and backward, gives the left and right sides.

use serde::{Deserialize, Serialize};

use crate::curve::{linspace, nearest_vertex, open_cycle, signed_area, smooth_closed};
use crate::peaks::{Peak, find_peaks};
use crate::spline::{ParametricSpline, chord_parameters};
use crate::types::{Point, ShapeError, require_points};

/// Maximum number of wraparound samples padded on each side.
const MAX_PADDING: usize = 20;

/// How the two head/tail samples were chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeadTailResolution {
    /// Two or more peaks, assigned by nearness to the head/tail hint.
    HintedPeaks,
    /// The two highest peaks.
    TwoPeaks,
    /// One peak, assigned to the nearer hint; the other end is the
    /// contour sample nearest the other hint.
    HintedSinglePeak,
    /// One peak plus the sample half a contour away.
    SinglePeakAntipode,
    /// No peaks; both ends are the contour samples nearest the hints.
    HintedNoPeaks,
    /// No peaks and no hint: sample zero and the opposite sample.
    NoPeaks,
}

impl HeadTailResolution {
    /// Legacy status contribution of this branch.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::HintedPeaks => 10,
            Self::TwoPeaks => 20,
            Self::HintedSinglePeak => 30,
            Self::SinglePeakAntipode => 40,
            Self::HintedNoPeaks => 50,
            Self::NoPeaks => 60,
        }
    }
}

/// Resolved head and tail sample indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadTail {
    /// Head sample index.
    pub head: usize,
    /// Tail sample index.
    pub tail: usize,
    /// Which branch produced the indices.
    pub resolution: HeadTailResolution,
}

/// Reorder a cyclic point sequence to clockwise orientation (negative
/// shoelace area), dropping a repeated closing point.
#[must_use]
pub fn orient_clockwise(points: &[Point]) -> Vec<Point> {
    let cycle = open_cycle(points);
    if signed_area(cycle) > 0.0 {
        cycle.iter().rev().copied().collect()
    } else {
        cycle.to_vec()
    }
}

/// A closed contour fitted with a parametric spline over one period,
/// padded at both ends so the fit is smooth across the seam.
#[derive(Debug, Clone)]
pub struct ContourSpline {
    raw: Vec<Point>,
    spline: ParametricSpline,
    start: f64,
    period: f64,
}

impl ContourSpline {
    /// Fit `points` (cyclic, no repeated closing point). `smooth` is a
    /// Gaussian sigma in samples applied circularly before fitting.
    ///
    /// Parameters are the chord lengths of the unsmoothed points, so
    /// fits with different smoothing share one parameterization.
    ///
    /// # Errors
    ///
    /// [`ShapeError::TooFewPoints`] if fewer than three distinct points
    /// remain, [`ShapeError::Degenerate`] for coincident input.
    pub fn fit(points: &[Point], smooth: f64) -> Result<Self, ShapeError> {
        let mut raw: Vec<Point> = Vec::with_capacity(points.len());
        for &p in open_cycle(points) {
            if raw.last().is_none_or(|q| q.distance_squared(p) > 1e-18) {
                raw.push(p);
            }
        }
        while raw.len() > 1 && raw[0].distance_squared(raw[raw.len() - 1]) <= 1e-18 {
            raw.pop();
        }
        require_points("closed contour", raw.len(), 3)?;

        let n = raw.len();
        let nextra = (n - 1).min(MAX_PADDING);
        let padded_raw = pad_cycle(&raw, nextra);
        let params = chord_parameters(&padded_raw);
        let start = params[nextra];
        let period = params[nextra + n] - start;

        let values = if smooth > 0.0 {
            pad_cycle(&smooth_closed(&raw, smooth), nextra)
        } else {
            padded_raw
        };
        let spline = ParametricSpline::with_parameters(params, &values)?;
        Ok(Self {
            raw,
            spline,
            start,
            period,
        })
    }

    /// Refit the same contour with different smoothing, keeping the
    /// parameterization.
    ///
    /// # Errors
    ///
    /// As [`fit`](Self::fit).
    pub fn refit(&self, smooth: f64) -> Result<Self, ShapeError> {
        Self::fit(&self.raw, smooth)
    }

    /// Perimeter in parameter units.
    #[must_use]
    pub const fn period(&self) -> f64 {
        self.period
    }

    /// `count` parameters equally spaced over one period.
    #[must_use]
    pub fn sample_parameters(&self, count: usize) -> Vec<f64> {
        let mut us = linspace(self.start, self.start + self.period, count + 1);
        us.pop();
        us
    }

    fn wrap(&self, u: f64) -> f64 {
        (u - self.start).rem_euclid(self.period) + self.start
    }

    /// Position at parameter `u` (wrapped into one period).
    #[must_use]
    pub fn eval(&self, u: f64) -> Point {
        self.spline.eval(self.wrap(u))
    }

    /// Tip curvature at `u`: the negated signed curvature, positive on
    /// convex parts of a clockwise contour.
    #[must_use]
    pub fn tip_curvature(&self, u: f64) -> f64 {
        -self.spline.curvature(self.wrap(u))
    }

    /// Evaluate `count` equally spaced samples.
    #[must_use]
    pub fn profile(&self, count: usize) -> CurvatureProfile {
        let params = self.sample_parameters(count);
        let points = params.iter().map(|&u| self.eval(u)).collect();
        let curvature = params.iter().map(|&u| self.tip_curvature(u)).collect();
        CurvatureProfile {
            params,
            points,
            curvature,
        }
    }

    /// Split the contour into the forward (left) and backward (right)
    /// walks from parameter `head` to parameter `tail`, `count` samples
    /// each. Both walks start at the head and end at the tail.
    #[must_use]
    pub fn split(&self, head: f64, tail: f64, count: usize) -> (Vec<Point>, Vec<Point>) {
        let forward_end = if tail > head {
            tail
        } else {
            tail + self.period
        };
        let backward_end = if tail < head {
            tail
        } else {
            tail - self.period
        };
        let left = linspace(head, forward_end, count)
            .into_iter()
            .map(|u| self.eval(u))
            .collect();
        let right = linspace(head, backward_end, count)
            .into_iter()
            .map(|u| self.eval(u))
            .collect();
        (left, right)
    }
}

/// `cycle[n-k..] ++ cycle ++ [cycle[0]] ++ cycle[1..=k]`.
fn pad_cycle(cycle: &[Point], k: usize) -> Vec<Point> {
    let n = cycle.len();
    let mut out = Vec::with_capacity(n + 2 * k + 1);
    out.extend_from_slice(&cycle[n - k..]);
    out.extend_from_slice(cycle);
    out.push(cycle[0]);
    out.extend_from_slice(&cycle[1..=k]);
    out
}

/// Equally spaced samples along a contour with their tip curvature.
#[derive(Debug, Clone, PartialEq)]
pub struct CurvatureProfile {
    /// Spline parameter of each sample.
    pub params: Vec<f64>,
    /// Sample positions.
    pub points: Vec<Point>,
    /// Tip curvature (negated signed curvature) of each sample.
    pub curvature: Vec<f64>,
}

/// Peaks of a cyclic tip-curvature signal above `delta`.
///
/// The signal is padded circularly so peaks near the seam are found
/// once.
#[must_use]
pub fn tip_peaks(curvature: &[f64], delta: f64) -> Vec<Peak> {
    let n = curvature.len();
    if n < 3 {
        return Vec::new();
    }
    let nextra = (n - 1).min(MAX_PADDING);
    let mut padded = Vec::with_capacity(n + 2 * nextra);
    padded.extend_from_slice(&curvature[n - nextra..]);
    padded.extend_from_slice(curvature);
    padded.extend_from_slice(&curvature[..nextra]);
    find_peaks(&padded, delta)
        .into_iter()
        .filter(|p| p.index >= nextra && p.index < nextra + n)
        .map(|p| Peak {
            index: p.index - nextra,
            value: p.value,
        })
        .collect()
}

/// Tip peaks with one retry at a reduced `delta` when fewer than two
/// peaks are found.
#[must_use]
pub fn tip_peaks_with_retry(curvature: &[f64], delta: f64, reduce: Option<f64>) -> Vec<Peak> {
    let peaks = tip_peaks(curvature, delta);
    match reduce {
        Some(factor) if peaks.len() < 2 => {
            let retried = tip_peaks(curvature, delta * factor);
            tracing::debug!(
                delta,
                reduced = delta * factor,
                before = peaks.len(),
                after = retried.len(),
                "retried head/tail peak detection"
            );
            retried
        }
        _ => peaks,
    }
}

/// Resolve head and tail among `points` (the profile samples) from the
/// detected `peaks` and an optional `(head, tail)` position hint.
#[must_use]
pub fn resolve_head_tail(
    points: &[Point],
    peaks: &[Peak],
    hint: Option<(Point, Point)>,
) -> HeadTail {
    let n = points.len();
    let antipode = |i: usize| if n == 0 { 0 } else { (i + n / 2) % n };
    let nearest = |target: Point, skip: Option<usize>| {
        points
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != skip)
            .min_by(|(_, a), (_, b)| {
                target
                    .distance_squared(**a)
                    .total_cmp(&target.distance_squared(**b))
            })
            .map_or(0, |(i, _)| i)
    };
    let sorted = |a: usize, b: usize| (a.min(b), a.max(b));

    match (peaks.len(), hint) {
        (2.., Some((h, t))) => {
            let candidates: Vec<Point> = peaks.iter().map(|p| points[p.index]).collect();
            let locate = |q: Point| {
                nearest_vertex(q, &candidates).map_or((0, 0.0), |(i, p)| (i, p.distance(q)))
            };
            let (hi, hd) = locate(h);
            let (ti, td) = locate(t);
            let (hi, ti) = if hi != ti {
                (hi, ti)
            } else if hd <= td {
                (hi, second_nearest(t, &candidates, hi))
            } else {
                (second_nearest(h, &candidates, ti), ti)
            };
            HeadTail {
                head: peaks[hi].index,
                tail: peaks[ti].index,
                resolution: HeadTailResolution::HintedPeaks,
            }
        }
        (2.., None) => {
            let mut by_height: Vec<&Peak> = peaks.iter().collect();
            by_height.sort_by(|a, b| b.value.total_cmp(&a.value));
            let (head, tail) = sorted(by_height[0].index, by_height[1].index);
            HeadTail {
                head,
                tail,
                resolution: HeadTailResolution::TwoPeaks,
            }
        }
        (1, Some((h, t))) => {
            let peak = peaks[0].index;
            let p = points[peak];
            let (head, tail) = if p.distance_squared(h) <= p.distance_squared(t) {
                (peak, nearest(t, Some(peak)))
            } else {
                (nearest(h, Some(peak)), peak)
            };
            HeadTail {
                head,
                tail,
                resolution: HeadTailResolution::HintedSinglePeak,
            }
        }
        (1, None) => {
            let peak = peaks[0].index;
            let (head, tail) = sorted(peak, antipode(peak));
            HeadTail {
                head,
                tail,
                resolution: HeadTailResolution::SinglePeakAntipode,
            }
        }
        (_, Some((h, t))) => {
            let head = nearest(h, None);
            let tail = nearest(t, Some(head));
            HeadTail {
                head,
                tail,
                resolution: HeadTailResolution::HintedNoPeaks,
            }
        }
        (_, None) => HeadTail {
            head: 0,
            tail: antipode(0),
            resolution: HeadTailResolution::NoPeaks,
        },
    }
}

fn second_nearest(target: Point, candidates: &[Point], taken: usize) -> usize {
    candidates
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != taken)
        .min_by(|(_, a), (_, b)| {
            target
                .distance_squared(**a)
                .total_cmp(&target.distance_squared(**b))
        })
        .map_or(taken, |(i, _)| i)
}
