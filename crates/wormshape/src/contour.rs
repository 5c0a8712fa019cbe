//! Contour tracing: extract closed outlines from a binary body mask.
//!
//! This module defines the [`ContourTracer`] trait for pluggable contour
//! tracing algorithms and the [`ContourTracerKind`] enum for selecting
//! one at runtime. Tracers report the border hierarchy so that holes
//! inside a coiled body can be told apart from outer outlines.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::curve::signed_area;
use crate::types::{Curve, Point};

/// Selects which contour tracing algorithm to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContourTracerKind {
    /// Suzuki-Abe border following via `imageproc::contours::find_contours`.
    #[default]
    BorderFollowing,
}

/// One traced border.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracedContour {
    /// Border pixel centers in tracing order, without a repeated closing
    /// point.
    pub points: Curve,
    /// `true` for the outer border of a foreground region, `false` for
    /// the border of a hole inside one.
    pub outer: bool,
    /// Index of the enclosing border in the same trace, if any.
    pub parent: Option<usize>,
}

impl TracedContour {
    /// Unsigned enclosed area (shoelace).
    #[must_use]
    pub fn area(&self) -> f64 {
        signed_area(self.points.points()).abs()
    }
}

/// Trait for contour tracing strategies.
///
/// Input: a binary mask (non-zero pixels = body).
/// Output: every border with its hierarchy, in the order found.
pub trait ContourTracer {
    /// Trace the borders of the foreground regions in `mask`.
    fn trace(&self, mask: &GrayImage) -> Vec<TracedContour>;
}

impl ContourTracer for ContourTracerKind {
    fn trace(&self, mask: &GrayImage) -> Vec<TracedContour> {
        match *self {
            Self::BorderFollowing => trace_border_following(mask),
        }
    }
}

/// Converts `imageproc` contour points (integer grid coordinates) into
/// floating-point [`Point`]s. Parent indices are kept as reported, so
/// nothing is filtered out here.
fn trace_border_following(mask: &GrayImage) -> Vec<TracedContour> {
    let contours: Vec<imageproc::contours::Contour<u32>> =
        imageproc::contours::find_contours(mask);

    contours
        .into_iter()
        .map(|c| TracedContour {
            points: c
                .points
                .into_iter()
                .map(|p| Point::new(f64::from(p.x), f64::from(p.y)))
                .collect(),
            outer: c.border_type == imageproc::contours::BorderType::Outer,
            parent: c.parent,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(width: u32, height: u32, inside: impl Fn(u32, u32) -> bool) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            image::Luma([if inside(x, y) { 255 } else { 0 }])
        })
    }

    #[test]
    fn default_is_border_following() {
        assert_eq!(
            ContourTracerKind::default(),
            ContourTracerKind::BorderFollowing
        );
    }

    #[test]
    fn empty_mask_has_no_contours() {
        let mask = GrayImage::new(10, 10);
        assert!(ContourTracerKind::BorderFollowing.trace(&mask).is_empty());
    }

    #[test]
    fn rectangle_has_one_outer_contour() {
        let mask = filled(20, 20, |x, y| (5..15).contains(&x) && (5..12).contains(&y));
        let contours = ContourTracerKind::BorderFollowing.trace(&mask);
        assert_eq!(contours.len(), 1);
        let c = &contours[0];
        assert!(c.outer);
        assert!(c.parent.is_none());
        // Pixel-center outline of a 10x7 block spans 9x6.
        assert!((c.area() - 54.0).abs() < 1e-9);
    }

    #[test]
    fn ring_reports_its_hole() {
        let mask = filled(30, 30, |x, y| {
            let (dx, dy) = (f64::from(x) - 15.0, f64::from(y) - 15.0);
            let r = dx.hypot(dy);
            (5.0..10.0).contains(&r)
        });
        let contours = ContourTracerKind::BorderFollowing.trace(&mask);
        assert_eq!(contours.len(), 2);
        let hole = contours.iter().find(|c| !c.outer).map(|c| c.parent);
        assert_eq!(hole, Some(Some(0)));
    }
}
