//! Distances from a body outline to an observed contour.
//!
//! Every boundary sample searches along its normal for the nearest
//! crossing with the contour. Contour segments are indexed in an R\*-tree
//! so each search only tests the segments whose bounding boxes meet the
//! search line. Samples without a valid crossing (occluded or outside
//! the search range) stay unresolved.

use geo::Line;
use geo::line_intersection::{LineIntersection, line_intersection};
use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree};
use serde::{Deserialize, Serialize};

use crate::curve::{open_cycle, signed_area};
use crate::types::{Curve, Point, ShapeError, require_len, require_points};

/// Default search distances `[inward, outward]` along the normals.
pub const DEFAULT_SEARCH_RADIUS: [f64; 2] = [5.0, 20.0];

/// A contour segment tagged with its index.
type IndexedSegment = GeomWithData<Line<f64>, usize>;

/// Options for [`distance_shape_to_contour`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceOptions {
    /// How far to search `[inward, outward]` from each sample.
    pub search_radius: [f64; 2],
    /// Minimum dot product between the contour's outward normal and the
    /// sample's outward normal for a crossing to count.
    pub min_alignment: Option<f64>,
    /// Candidate head/tail positions on the contour. When set, the
    /// outline's end points are matched to these instead of searched.
    pub head_tail_hints: Option<Vec<Point>>,
}

impl Default for DistanceOptions {
    fn default() -> Self {
        Self {
            search_radius: DEFAULT_SEARCH_RADIUS,
            min_alignment: None,
            head_tail_hints: None,
        }
    }
}

/// Per-sample results for one side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideDistances {
    /// Distance to the matched contour point, `None` when unresolved.
    pub distances: Vec<Option<f64>>,
    /// The matched contour point.
    pub points: Vec<Option<Point>>,
}

/// An outline end point matched to one of the head/tail hints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HintMatch {
    /// Index into the hint list.
    pub index: usize,
    /// The hint position.
    pub point: Point,
    /// Distance from the outline end point.
    pub distance: f64,
}

/// Head and tail hint assignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadTailMatch {
    /// Match for `left[0]`.
    pub head: Option<HintMatch>,
    /// Match for `left[n-1]`.
    pub tail: Option<HintMatch>,
}

/// Result of [`distance_shape_to_contour`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContourDistances {
    /// Left side samples (end points excluded when hints were given).
    pub left: SideDistances,
    /// Right side samples (end points excluded when hints were given).
    pub right: SideDistances,
    /// End point matches, present when hints were given.
    pub head_tail: Option<HeadTailMatch>,
}

impl ContourDistances {
    /// All distances as one list: `[head, left.., right.., tail]` with
    /// hints, otherwise `[left[..n-1], right[1..]]` so the shared end
    /// points appear once.
    #[must_use]
    pub fn flattened(&self) -> Vec<Option<f64>> {
        let left = &self.left.distances;
        let right = &self.right.distances;
        match self.head_tail {
            Some(ends) => std::iter::once(ends.head.map(|m| m.distance))
                .chain(left.iter().copied())
                .chain(right.iter().copied())
                .chain(std::iter::once(ends.tail.map(|m| m.distance)))
                .collect(),
            None => left[..left.len().saturating_sub(1)]
                .iter()
                .chain(right.iter().skip(1))
                .copied()
                .collect(),
        }
    }

    /// Number of samples without a match.
    #[must_use]
    pub fn unresolved(&self) -> usize {
        self.flattened().iter().filter(|d| d.is_none()).count()
    }
}

/// Outward unit normals at the vertices of a closed contour.
///
/// # Errors
///
/// [`ShapeError::TooFewPoints`] for fewer than three distinct vertices.
pub fn normals_from_contour(contour: &[Point]) -> Result<Vec<Point>, ShapeError> {
    let cycle = open_cycle(contour);
    let n = cycle.len();
    require_points("contour", n, 3)?;
    let sign = outward_sign(cycle);
    Ok((0..n)
        .map(|i| {
            let tangent = cycle[(i + 1) % n] - cycle[(i + n - 1) % n];
            tangent.unit().perp() * sign
        })
        .collect())
}

/// `-1` for counterclockwise contours, whose outward side is to the
/// right of travel, `+1` otherwise.
fn outward_sign(cycle: &[Point]) -> f64 {
    if signed_area(cycle) > 0.0 { -1.0 } else { 1.0 }
}

/// Match every outline sample to the contour along its normal.
///
/// `normals` are the center line normals; the left side searches along
/// `+normal` and the right side along `-normal`, from `search_radius[0]`
/// inside the outline to `search_radius[1]` outside it.
///
/// # Errors
///
/// [`ShapeError::LengthMismatch`] when sides and normals disagree in
/// length, [`ShapeError::TooFewPoints`] for a contour of fewer than three
/// vertices.
pub fn distance_shape_to_contour(
    left: &Curve,
    right: &Curve,
    normals: &[Point],
    contour: &[Point],
    options: &DistanceOptions,
) -> Result<ContourDistances, ShapeError> {
    require_len("right side", right.len(), left.len())?;
    require_len("normals", normals.len(), left.len())?;
    let index = ContourIndex::new(contour)?;
    let [inward, outward] = options.search_radius;

    let range = match options.head_tail_hints {
        Some(_) if left.len() >= 2 => 1..left.len() - 1,
        _ => 0..left.len(),
    };

    let alignment = options.min_alignment;
    let search = |side: &Curve, direction: f64| {
        let mut result = SideDistances::default();
        for i in range.clone() {
            let p = side[i];
            let n = normals[i] * direction;
            let (near, far) = (p - n * inward, p + n * outward);
            let hit = index.nearest_crossing(p, near, far, n, alignment);
            result.distances.push(hit.map(|q| q.distance(p)));
            result.points.push(hit);
        }
        result
    };
    let left_distances = search(left, 1.0);
    let right_distances = search(right, -1.0);

    let head_tail = options.head_tail_hints.as_deref().map(|hints| {
        match (left.first(), left.last()) {
            (Some(&head), Some(&tail)) => match_head_tail(head, tail, hints),
            _ => HeadTailMatch::default(),
        }
    });

    let distances = ContourDistances {
        left: left_distances,
        right: right_distances,
        head_tail,
    };
    tracing::trace!(
        samples = left.len(),
        unresolved = distances.unresolved(),
        "matched outline to contour"
    );
    Ok(distances)
}

/// Assign head and tail to their nearest hints. When both want the same
/// hint, the farther end takes its second choice, or nothing if there is
/// only one hint.
fn match_head_tail(head: Point, tail: Point, hints: &[Point]) -> HeadTailMatch {
    let ranked = |end: Point| {
        let mut order: Vec<HintMatch> = hints
            .iter()
            .enumerate()
            .map(|(index, &point)| HintMatch {
                index,
                point,
                distance: end.distance(point),
            })
            .collect();
        order.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        order
    };
    let head_order = ranked(head);
    let tail_order = ranked(tail);
    let (Some(&best_head), Some(&best_tail)) = (head_order.first(), tail_order.first()) else {
        return HeadTailMatch::default();
    };

    if best_head.index != best_tail.index {
        return HeadTailMatch {
            head: Some(best_head),
            tail: Some(best_tail),
        };
    }
    if best_head.distance <= best_tail.distance {
        HeadTailMatch {
            head: Some(best_head),
            tail: tail_order.get(1).copied(),
        }
    } else {
        HeadTailMatch {
            head: head_order.get(1).copied(),
            tail: Some(best_tail),
        }
    }
}

/// Contour segments in an R\*-tree plus their outward normals.
struct ContourIndex {
    tree: RTree<IndexedSegment>,
    normals: Vec<Point>,
}

impl ContourIndex {
    fn new(contour: &[Point]) -> Result<Self, ShapeError> {
        let cycle = open_cycle(contour);
        let n = cycle.len();
        require_points("contour", n, 3)?;
        let sign = outward_sign(cycle);

        let normals = (0..n)
            .map(|i| (cycle[(i + 1) % n] - cycle[i]).unit().perp() * sign)
            .collect();
        let segments = (0..n)
            .map(|i| GeomWithData::new(Line::new(cycle[i], cycle[(i + 1) % n]), i))
            .collect();
        Ok(Self {
            tree: RTree::bulk_load(segments),
            normals,
        })
    }

    /// The crossing of `start -> end` with the contour nearest `origin`.
    fn nearest_crossing(
        &self,
        origin: Point,
        start: Point,
        end: Point,
        direction: Point,
        min_alignment: Option<f64>,
    ) -> Option<Point> {
        let search = Line::new(start, end);
        let envelope = AABB::from_corners(geo::Point::from(start), geo::Point::from(end));
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .filter(|segment| {
                min_alignment.is_none_or(|min| self.normals[segment.data].dot(direction) >= min)
            })
            .filter_map(|segment| match line_intersection(search, *segment.geom())? {
                LineIntersection::SinglePoint { intersection, .. } => Some(intersection.into()),
                LineIntersection::Collinear { intersection } => {
                    let a: Point = intersection.start.into();
                    let b: Point = intersection.end.into();
                    let a_first = a.distance_squared(origin) <= b.distance_squared(origin);
                    Some(if a_first { a } else { b })
                }
            })
            .map(|q: Point| (q.distance_squared(origin), q))
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, q)| q)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::shape::{polygon, shape_from_center};

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ]
    }

    fn band() -> (Curve, Curve, Vec<Point>) {
        let center: Curve = (0..=20)
            .map(|i| Point::new(f64::from(i) * 2.0, 10.0))
            .collect();
        let shape = shape_from_center(&center, &[4.0; 21], None).unwrap();
        (shape.left, shape.right, shape.normals)
    }

    #[test]
    fn outline_on_its_own_contour_is_at_zero_distance() {
        let (left, right, normals) = band();
        let shape = crate::shape::ShapePair {
            left: left.clone(),
            right: right.clone(),
            normals: normals.clone(),
        };
        let contour = polygon(&shape);
        let options = DistanceOptions::default();
        let outline = contour.points();
        let d = distance_shape_to_contour(&left, &right, &normals, outline, &options).unwrap();
        assert_eq!(d.unresolved(), 0);
        for dist in d.flattened() {
            assert!(dist.unwrap() < 1e-9);
        }
    }

    #[test]
    fn enclosing_contour_is_found_outward() {
        let (left, right, normals) = band();
        let contour = rect(-5.0, 6.0, 45.0, 14.0);
        let options = DistanceOptions::default();
        let d = distance_shape_to_contour(&left, &right, &normals, &contour, &options).unwrap();
        assert_eq!(d.left.distances.len(), 21);
        for dist in d.left.distances.iter().chain(&d.right.distances) {
            assert!((dist.unwrap() - 2.0).abs() < 1e-9);
        }
        assert!((d.left.points[5].unwrap().y - 14.0).abs() < 1e-9);
        assert!((d.right.points[5].unwrap().y - 6.0).abs() < 1e-9);
    }

    #[test]
    fn misaligned_crossings_are_skipped() {
        let (left, right, normals) = band();
        // Left samples sit at y = 12; the bottom edge is closer but faces
        // the other way.
        let contour = rect(-5.0, 7.0, 45.0, 22.0);
        let options = DistanceOptions {
            search_radius: [6.0, 20.0],
            ..DistanceOptions::default()
        };
        let plain = distance_shape_to_contour(&left, &right, &normals, &contour, &options).unwrap();
        assert!((plain.left.distances[3].unwrap() - 5.0).abs() < 1e-9);

        let aligned = DistanceOptions {
            min_alignment: Some(0.5),
            ..options
        };
        let filtered =
            distance_shape_to_contour(&left, &right, &normals, &contour, &aligned).unwrap();
        assert!((filtered.left.distances[3].unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_samples_are_unresolved() {
        let (left, right, normals) = band();
        let contour = rect(100.0, 100.0, 120.0, 120.0);
        let options = DistanceOptions::default();
        let d = distance_shape_to_contour(&left, &right, &normals, &contour, &options).unwrap();
        assert!(d.left.distances.iter().all(Option::is_none));
        assert_eq!(d.flattened().len(), 40);
    }

    #[test]
    fn hints_match_the_ends() {
        let (left, right, normals) = band();
        let contour = rect(-5.0, 6.0, 45.0, 14.0);
        let options = DistanceOptions {
            head_tail_hints: Some(vec![Point::new(43.0, 12.0), Point::new(-3.0, 12.0)]),
            ..DistanceOptions::default()
        };
        let d = distance_shape_to_contour(&left, &right, &normals, &contour, &options).unwrap();
        assert_eq!(d.left.distances.len(), 19);
        let ends = d.head_tail.unwrap();
        assert_eq!(ends.head.unwrap().index, 1);
        assert_eq!(ends.tail.unwrap().index, 0);
        assert!((ends.head.unwrap().distance - 3.0).abs() < 1e-9);
        assert_eq!(d.flattened().len(), 2 + 19 + 19);
    }

    #[test]
    fn conflicting_hint_goes_to_the_nearer_end() {
        let head = Point::new(0.0, 0.0);
        let tail = Point::new(10.0, 0.0);
        let single = match_head_tail(head, tail, &[Point::new(2.0, 0.0)]);
        assert_eq!(single.head.unwrap().index, 0);
        assert!(single.tail.is_none());

        let both_near_tail = match_head_tail(
            head,
            tail,
            &[Point::new(8.0, 0.0), Point::new(20.0, 0.0)],
        );
        assert_eq!(both_near_tail.tail.unwrap().index, 0);
        assert_eq!(both_near_tail.head.unwrap().index, 1);
    }

    #[test]
    fn contour_normals_point_outward_for_either_orientation() {
        let ccw = rect(0.0, 0.0, 4.0, 2.0);
        let mut cw = ccw.clone();
        cw.reverse();
        for contour in [ccw, cw] {
            let normals = normals_from_contour(&contour).unwrap();
            let center = Point::new(2.0, 1.0);
            for (p, n) in contour.iter().zip(&normals) {
                assert!((*p - center).dot(*n) > 0.0);
                assert!((n.norm() - 1.0).abs() < 1e-12);
            }
        }
    }
}
