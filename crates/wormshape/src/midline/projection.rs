//! Midline by mutual projection of the two sides.

use super::Midline;
use crate::curve::project_onto;
use crate::types::{Curve, Point};

/// Average each sample pair with its projections onto the opposite side.
///
/// With `neighbours = Some(k)` the projection of sample `i` only sees
/// the opposite samples `i - k .. i + k` (half-open, but never without
/// sample `i` itself), which keeps the pairing local on strongly bent
/// bodies.
pub(super) fn center(left: &Curve, right: &Curve, neighbours: Option<usize>) -> Midline {
    let n = left.len().min(right.len());
    let window = |side: &Curve, i: usize| {
        neighbours.map_or(0..side.len(), |k| {
            i.saturating_sub(k)..(i + k).max(i + 1).min(side.len())
        })
    };

    let mut center = Vec::with_capacity(n);
    let mut width = Vec::with_capacity(n);
    for i in 0..n {
        let l = left[i];
        let r = right[i];
        let lr = project_onto(l, &right.points()[window(right, i)]);
        let rl = project_onto(r, &left.points()[window(left, i)]);
        let c: Point = (l + lr + r + rl) * 0.25;

        let on_left = project_onto(c, &left.points()[window(left, i)]);
        let on_right = project_onto(c, &right.points()[window(right, i)]);
        center.push(c);
        width.push(on_left.distance(on_right));
    }

    Midline {
        center: Curve::new(center),
        width,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parallel(n: usize, shift: f64) -> (Curve, Curve) {
        let left = (0..n)
            .map(|i| Point::new(f64::from(u32::try_from(i).unwrap()), 2.0))
            .collect();
        let right = (0..n)
            .map(|i| Point::new(f64::from(u32::try_from(i).unwrap()) + shift, -2.0))
            .collect();
        (left, right)
    }

    #[test]
    fn parallel_sides_give_the_mid_line() {
        let (left, right) = parallel(9, 0.0);
        let mid = center(&left, &right, None);
        assert_eq!(mid.center.len(), 9);
        for (c, w) in mid.center.iter().zip(&mid.width) {
            assert!(c.y.abs() < 1e-12);
            assert!((w - 4.0).abs() < 1e-12);
        }
    }

    #[test]
    fn shifted_sampling_still_measures_the_gap() {
        // The right side is sampled half a step later; projection pairs
        // each sample with the point directly across.
        let (left, right) = parallel(9, 0.5);
        let mid = center(&left, &right, None);
        for w in &mid.width[1..8] {
            assert!((w - 4.0).abs() < 1e-12);
        }
    }

    #[test]
    fn windowed_projection_on_a_u_turn() {
        let left: Curve = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(1.0, 10.0),
        ]
        .into();
        let right: Curve = vec![
            Point::new(0.0, 1.0),
            Point::new(9.0, 1.0),
            Point::new(9.0, 9.0),
            Point::new(1.0, 9.0),
        ]
        .into();
        let local = center(&left, &right, Some(1));
        assert!(local.center[3].distance(Point::new(1.0, 9.5)) < 1e-9);
    }

    #[test]
    fn window_stops_short_of_the_upper_neighbour() {
        let left: Curve = (0..5).map(|i| Point::new(f64::from(i), 0.0)).collect();
        let right: Curve = vec![
            Point::new(0.0, 1.0),
            Point::new(1.0, 1.0),
            Point::new(1.5, 1.0),
            Point::new(2.0, 1.0),
            Point::new(3.0, 1.0),
        ]
        .into();
        // left[2] only sees right[1..3]; right[3] sits directly across
        // but is outside the window.
        let local = center(&left, &right, Some(1));
        assert!(local.center[2].distance(Point::new(1.625, 0.5)) < 1e-9);

        let global = center(&left, &right, None);
        assert!(global.center[2].distance(Point::new(1.75, 0.5)) < 1e-9);
    }

    #[test]
    fn zero_neighbours_still_sees_the_own_sample() {
        let (left, right) = parallel(5, 0.0);
        let mid = center(&left, &right, Some(0));
        for (c, w) in mid.center.iter().zip(&mid.width) {
            assert!(c.y.abs() < 1e-12);
            assert!((w - 4.0).abs() < 1e-12);
        }
    }
}
