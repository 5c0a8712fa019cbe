//! Choosing the body outline among several traced contours.

use crate::contour::TracedContour;
use crate::moments::{PolygonMoments, match_shapes};
use crate::types::Point;

use super::{ContourSelection, DetectionHints};

/// Pick one of `contours` (non-empty) and report the rule that decided.
///
/// Rules in priority order: the only contour; the only outer contour with
/// positive area; the best shape match to the contour hint; the area
/// closest to the size hint; the centroid closest to `center`.
pub(super) fn choose(
    contours: &[TracedContour],
    hints: &DetectionHints,
    center: Point,
) -> (usize, ContourSelection) {
    if contours.len() == 1 {
        return (0, ContourSelection::Single);
    }

    let outer: Vec<usize> = (0..contours.len())
        .filter(|&i| contours[i].outer && contours[i].parent.is_none() && contours[i].area() > 0.0)
        .collect();
    let candidates = if outer.is_empty() {
        (0..contours.len()).collect()
    } else {
        outer
    };
    if let [only] = candidates[..] {
        return (only, ContourSelection::SingleOuter);
    }

    if let Some(hint) = hints.contour.as_ref().filter(|c| c.len() >= 3) {
        let best = argmin(&candidates, |i| {
            match_shapes(contours[i].points.points(), hint.points())
        });
        return (best, ContourSelection::ContourHint);
    }

    if let Some(size) = hints.size {
        let best = argmin(&candidates, |i| (contours[i].area() - size).abs());
        return (best, ContourSelection::SizeHint);
    }

    let best = argmin(&candidates, |i| {
        PolygonMoments::of(contours[i].points.points())
            .centroid
            .distance_squared(center)
    });
    (best, ContourSelection::MostCentral)
}

/// The candidate with the smallest cost. Ties keep the earliest index.
fn argmin(candidates: &[usize], cost: impl Fn(usize) -> f64) -> usize {
    candidates
        .iter()
        .map(|&i| (i, cost(i)))
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map_or(0, |(i, _)| i)
}
