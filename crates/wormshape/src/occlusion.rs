//! Self-occlusion of a body outline.
//!
//! The body is the union of the quads spanned by consecutive sample
//! pairs, `[left_j, left_{j+1}, right_{j+1}, right_j]`. A boundary
//! sample is occluded when it lies inside a quad from another part of
//! the body by more than a margin, as happens when a worm crosses over
//! itself.
//!
//! This flags the same samples as shrinking the outline polygon
//! `left ++ reversed(right)` inward by the margin and testing
//! containment, but stays well defined when the outline crosses itself
//! and needs no polygon offsetting per query.

use geo::Contains;
use serde::{Deserialize, Serialize};

use crate::curve::project_onto;
use crate::types::{Curve, Point, ShapeError, require_len};

/// Default inset below which a sample counts as lying on a quad edge.
pub const DEFAULT_MARGIN: f64 = 0.01;

/// Occlusion state of one side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideOcclusion {
    /// `true` for every sample that is not occluded.
    pub visible: Vec<bool>,
    /// Indices of occluded samples.
    pub indices: Vec<usize>,
    /// Positions of occluded samples.
    pub points: Vec<Point>,
}

impl SideOcclusion {
    fn from_flags(side: &Curve, visible: Vec<bool>) -> Self {
        let indices: Vec<usize> = visible
            .iter()
            .enumerate()
            .filter_map(|(i, &v)| (!v).then_some(i))
            .collect();
        let points = indices.iter().map(|&i| side[i]).collect();
        Self {
            visible,
            indices,
            points,
        }
    }
}

/// Occluded samples on both sides of a body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Occlusions {
    /// Left side samples.
    pub left: SideOcclusion,
    /// Right side samples.
    pub right: SideOcclusion,
}

impl Occlusions {
    /// `true` when no sample on either side is occluded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.left.indices.is_empty() && self.right.indices.is_empty()
    }

    /// Total number of occluded samples.
    #[must_use]
    pub fn count(&self) -> usize {
        self.left.indices.len() + self.right.indices.len()
    }
}

/// Find boundary samples covered by another part of the body.
///
/// The quads touching sample `i` (and their immediate neighbours,
/// indices `i - 2 ..= i + 1`) are skipped so that no sample occludes
/// itself at a bend.
///
/// # Errors
///
/// [`ShapeError::LengthMismatch`] when the sides differ in length.
pub fn self_occlusions(left: &Curve, right: &Curve, margin: f64) -> Result<Occlusions, ShapeError> {
    require_len("right side", right.len(), left.len())?;
    let quads = body_quads(left, right);

    let flags = |side: &Curve| -> Vec<bool> {
        side.iter()
            .enumerate()
            .map(|(i, &p)| !is_covered(&quads, i, p, margin))
            .collect()
    };
    let occlusions = Occlusions {
        left: SideOcclusion::from_flags(left, flags(left)),
        right: SideOcclusion::from_flags(right, flags(right)),
    };
    if !occlusions.is_empty() {
        tracing::debug!(occluded = occlusions.count(), "self-occlusion");
    }
    Ok(occlusions)
}

struct Quad {
    ring: [Point; 5],
    polygon: geo::Polygon<f64>,
}

fn body_quads(left: &Curve, right: &Curve) -> Vec<Quad> {
    (0..left.len().saturating_sub(1))
        .map(|j| {
            let ring = [left[j], left[j + 1], right[j + 1], right[j], left[j]];
            let exterior = geo::LineString::new(ring.iter().map(|&p| p.into()).collect());
            Quad {
                ring,
                polygon: geo::Polygon::new(exterior, Vec::new()),
            }
        })
        .collect()
}

fn is_covered(quads: &[Quad], index: usize, p: Point, margin: f64) -> bool {
    let query = geo::Point::from(p);
    quads.iter().enumerate().any(|(j, quad)| {
        let near = j + 2 >= index && j <= index + 1;
        !near
            && quad.polygon.contains(&query)
            && project_onto(p, &quad.ring).distance(p) > margin
    })
}
