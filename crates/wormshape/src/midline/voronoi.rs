//! Midline from the interior Voronoi vertices of the outline polygon.
//!
//! The Voronoi vertices of the boundary samples are the circumcenters of
//! their Delaunay triangles. Those strictly inside the outline
//! approximate the medial axis; they are chained greedily from the head
//! to the tail.

use geo::{Contains, TriangulateDelaunay};

use super::Midline;
use crate::curve::project_onto;
use crate::types::{Curve, Point, ShapeError};

/// Squared distance below which two chain points are merged.
const MERGE_DISTANCE_SQ: f64 = 1e-12;

pub(super) fn center(left: &Curve, right: &Curve) -> Result<Midline, ShapeError> {
    let (Some(&head), Some(&tail)) = (left.first(), left.last()) else {
        return Err(ShapeError::TooFewPoints {
            what: "left side",
            needed: 2,
            found: 0,
        });
    };

    let polygon = outline_polygon(left, right);
    let triangles = polygon
        .unconstrained_triangulation()
        .map_err(|e| ShapeError::Triangulation(format!("{e:?}")))?;

    let mut vertices: Vec<Point> = triangles
        .iter()
        .filter_map(|t| {
            let [a, b, c] = t.to_array();
            circumcenter(a.into(), b.into(), c.into())
        })
        .filter(|p| polygon.contains(&geo::Point::from(*p)))
        .collect();
    tracing::trace!(vertices = vertices.len(), "interior voronoi vertices");

    let mut chain = vec![head];
    let mut current = head;
    loop {
        let nearest = vertices
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                current
                    .distance_squared(**a)
                    .total_cmp(&current.distance_squared(**b))
            })
            .map(|(i, _)| i);
        let Some(index) = nearest else { break };
        current = vertices.swap_remove(index);
        if chain
            .last()
            .is_none_or(|last| last.distance_squared(current) > MERGE_DISTANCE_SQ)
        {
            chain.push(current);
        }
    }
    if chain.len() > 1
        && chain
            .last()
            .is_some_and(|last| last.distance_squared(tail) <= MERGE_DISTANCE_SQ)
    {
        chain.pop();
    }
    chain.push(tail);

    let last = chain.len() - 1;
    let width = chain
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            if i == 0 || i == last {
                0.0
            } else {
                project_onto(c, left.points()).distance(project_onto(c, right.points()))
            }
        })
        .collect();

    Ok(Midline {
        center: Curve::new(chain),
        width,
    })
}

/// Closed polygon `left ++ reversed(right)` with consecutive duplicates
/// removed.
pub(super) fn outline_polygon(left: &Curve, right: &Curve) -> geo::Polygon<f64> {
    let mut ring: Vec<Point> = Vec::with_capacity(left.len() + right.len());
    for &p in left.iter().chain(right.iter().rev()) {
        if ring
            .last()
            .is_none_or(|q| q.distance_squared(p) > MERGE_DISTANCE_SQ)
        {
            ring.push(p);
        }
    }
    while ring.len() > 1
        && ring[0].distance_squared(ring[ring.len() - 1]) <= MERGE_DISTANCE_SQ
    {
        ring.pop();
    }
    let exterior = geo::LineString::new(ring.into_iter().map(geo::Coord::from).collect());
    geo::Polygon::new(exterior, Vec::new())
}

/// Circumcenter of a triangle, `None` when it is degenerate.
fn circumcenter(a: Point, b: Point, c: Point) -> Option<Point> {
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    if d.abs() <= f64::EPSILON {
        return None;
    }
    let (a2, b2, c2) = (a.dot(a), b.dot(b), c.dot(c));
    Some(Point::new(
        (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d,
        (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d,
    ))
}
