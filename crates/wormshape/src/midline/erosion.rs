//! Midline by repeated inward buffering of the outline.
//!
//! The outline is eroded in fixed steps for as long as the result stays
//! a single simple polygon. The last valid outline is a thin proxy of
//! the skeleton: its tips are located like the detector locates head
//! and tail, its two sides are averaged, and the eroded distance is
//! added back to the width.

use geo::Buffer;
use tracing::{debug, warn};

use super::voronoi::outline_polygon;
use super::{ErosionParams, Midline};
use crate::curve::resample_closed;
use crate::head_tail::{ContourSpline, orient_clockwise, resolve_head_tail, tip_peaks_with_retry};
use crate::types::{Curve, Point, ShapeError};

/// Factor applied to `delta` when the first peak search finds fewer than
/// two tips.
const DELTA_REDUCE: f64 = 0.5;

pub(super) fn center(
    left: &Curve,
    right: &Curve,
    params: &ErosionParams,
) -> Result<Midline, ShapeError> {
    if !(params.step.is_finite() && params.step > 0.0) {
        return Err(ShapeError::InvalidConfig(format!(
            "erosion step must be positive, got {}",
            params.step
        )));
    }
    let (Some(&head), Some(&tail)) = (left.first(), left.last()) else {
        return Err(ShapeError::TooFewPoints {
            what: "left side",
            needed: 2,
            found: left.len(),
        });
    };

    let polygon = outline_polygon(left, right);
    let mut ring: Vec<Point> = polygon.exterior().coords().map(|&c| c.into()).collect();
    let mut eroded = 0.0;
    let mut exhausted = true;
    for k in 1..=params.max_iter {
        #[allow(clippy::cast_precision_loss)]
        let distance = params.step * k as f64;
        match single_ring(&polygon.buffer(-distance)) {
            Some(next) => {
                ring = next;
                eroded = distance;
            }
            None => {
                exhausted = false;
                break;
            }
        }
    }
    if exhausted {
        warn!(
            max_iter = params.max_iter,
            eroded, "erosion stopped at the iteration cap"
        );
    }
    debug!(eroded, vertices = ring.len(), "last valid eroded outline");

    let contour = resample_closed(&orient_clockwise(&ring), params.ncontour)?;
    let spline = ContourSpline::fit(&contour, params.smooth)?;
    let profile = spline.profile(params.ncontour);
    let peaks = tip_peaks_with_retry(&profile.curvature, params.delta, Some(DELTA_REDUCE));
    let tips = resolve_head_tail(&profile.points, &peaks, None);
    debug!(resolution = ?tips.resolution, "eroded outline tips");

    let (mut a, mut b) = spline.split(
        profile.params[tips.head],
        profile.params[tips.tail],
        left.len(),
    );
    if a
        .first()
        .is_some_and(|&p| p.distance_squared(head) > p.distance_squared(tail))
    {
        a.reverse();
        b.reverse();
    }

    let mut center = Vec::with_capacity(a.len() + 2);
    let mut width = Vec::with_capacity(a.len() + 2);
    center.push(head);
    width.push(0.0);
    for (&p, &q) in a.iter().zip(&b) {
        center.push(p.midpoint(q));
        width.push(2.0f64.mul_add(eroded, p.distance(q)));
    }
    center.push(tail);
    width.push(0.0);

    Ok(Midline {
        center: Curve::new(center),
        width,
    })
}

/// The exterior of `eroded` when it is exactly one polygon without holes.
fn single_ring(eroded: &geo::MultiPolygon<f64>) -> Option<Vec<Point>> {
    let [polygon] = eroded.0.as_slice() else {
        return None;
    };
    if !polygon.interiors().is_empty() || polygon.exterior().0.len() < 4 {
        return None;
    }
    Some(polygon.exterior().coords().map(|&c| c.into()).collect())
}
