//! Minimal-advancement walk along both sides.
//!
//! Both sides are stepped in lockstep from the head. At every step the
//! current sample of each side is projected onto the current segment of
//! the other; the side whose sample projects further back is behind and
//! advances, paired with its projection onto the other side. The walk is
//! monotone on both sides, so bends never pair a sample with the wrong
//! part of the body.

use super::Midline;
use crate::curve::segment_fraction;
use crate::types::{Curve, Point};

/// Fractions closer than this count as level.
const LEVEL_TOLERANCE: f64 = 1e-12;

pub(super) fn center(left: &Curve, right: &Curve, offset: usize) -> Midline {
    let (paired_left, paired_right) = walk(left.points(), right.points(), offset);
    let (center, width) = paired_left
        .iter()
        .zip(&paired_right)
        .map(|(&l, &r)| (l.midpoint(r), l.distance(r)))
        .unzip();
    Midline {
        center: Curve::new(center),
        width,
    }
}

/// Paired samples along both sides, the first and last `offset` samples
/// of each side kept verbatim.
fn walk(left: &[Point], right: &[Point], offset: usize) -> (Vec<Point>, Vec<Point>) {
    let n = left.len().min(right.len());
    if n < 4 {
        return (left[..n].to_vec(), right[..n].to_vec());
    }
    let offset = offset.clamp(1, (n - 2) / 2);

    let mut paired_left = left[..offset].to_vec();
    let mut paired_right = right[..offset].to_vec();

    let stop = n - offset - 1;
    let (mut il, mut ir) = (offset, offset);
    while il < stop && ir < stop {
        let (l, r) = (left[il], right[ir]);
        let (l0, l1) = (left[il - 1], left[il]);
        let (r0, r1) = (right[ir - 1], right[ir]);
        // How far along the other side's current segment each sample sits.
        let on_left = segment_fraction(l0, l1, r);
        let on_right = segment_fraction(r0, r1, l);

        if (on_left - on_right).abs() <= LEVEL_TOLERANCE {
            paired_left.push(l);
            paired_right.push(r);
            il += 1;
            ir += 1;
        } else if on_left < on_right {
            paired_left.push(l0.lerp(l1, on_left));
            paired_right.push(r);
            ir += 1;
        } else {
            paired_left.push(l);
            paired_right.push(r0.lerp(r1, on_right));
            il += 1;
        }
    }

    paired_left.extend_from_slice(&left[n - offset..n]);
    paired_right.extend_from_slice(&right[n - offset..n]);
    (paired_left, paired_right)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn side(xs: &[f64], y: f64) -> Vec<Point> {
        xs.iter().map(|&x| Point::new(x, y)).collect()
    }

    #[test]
    fn evenly_sampled_sides_pair_index_by_index() {
        let xs: Vec<f64> = (0..12).map(f64::from).collect();
        let (l, r) = walk(&side(&xs, 1.0), &side(&xs, -1.0), 2);
        assert_eq!(l.len(), r.len());
        for (p, q) in l.iter().zip(&r) {
            assert!((p.x - q.x).abs() < 1e-12);
        }
    }

    #[test]
    fn lagging_side_is_paired_with_its_projection() {
        // The right side is sampled twice as densely over the middle.
        let left = side(&[0.0, 1.0, 2.0, 4.0, 6.0, 8.0, 9.0, 10.0], 1.0);
        let right = side(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 9.0, 10.0], -1.0);
        let (l, r) = walk(&left, &right, 1);
        assert_eq!(l.len(), r.len());
        for (p, q) in l.iter().zip(&r).take(l.len() - 1).skip(1) {
            assert!((p.x - q.x).abs() < 1e-12, "{p:?} vs {q:?}");
        }
        // Both walks are monotone.
        assert!(l.windows(2).all(|w| w[0].x <= w[1].x));
        assert!(r.windows(2).all(|w| w[0].x <= w[1].x));
    }

    #[test]
    fn width_is_the_full_separation() {
        let xs: Vec<f64> = (0..10).map(f64::from).collect();
        let left: Curve = side(&xs, 2.5).into();
        let right: Curve = side(&xs, -2.5).into();
        let mid = center(&left, &right, 3);
        assert_eq!(mid.center.len(), mid.width.len());
        assert!(mid.width.iter().all(|w| (w - 5.0).abs() < 1e-12));
        assert!(mid.center.iter().all(|c| c.y.abs() < 1e-12));
    }

    #[test]
    fn short_sides_are_paired_directly() {
        let left = side(&[0.0, 1.0, 2.0], 1.0);
        let right = side(&[0.0, 1.0, 2.0], -1.0);
        let (l, r) = walk(&left, &right, 3);
        assert_eq!(l, left);
        assert_eq!(r, right);
    }
}
