//! Integration tests: synthetic worm frames through detection and model
//! fitting.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use image::Luma;
use wormshape::{
    ContourSelection, DetectionHints, DetectionOutcome, DetectorConfig, DistanceOptions, GrayImage,
    HeadTailResolution, MidlineExtractor, MidlineMethod, MidlineOptions, ModelConfig, Point,
    ThresholdPass, WormModel, detect_shape,
};

const BRIGHT: u8 = 220;
const DARK: u8 = 20;

/// A frame painted bright wherever `inside` holds.
fn frame(width: u32, height: u32, inside: impl Fn(f64, f64) -> bool) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        Luma([if inside(f64::from(x), f64::from(y)) {
            BRIGHT
        } else {
            DARK
        }])
    })
}

fn in_ellipse(x: f64, y: f64, center: Point, a: f64, b: f64) -> bool {
    let dx = (x - center.x) / a;
    let dy = (y - center.y) / b;
    dx.mul_add(dx, dy * dy) <= 1.0
}

/// Convex hull of a disc and a point: a teardrop with one sharp tip.
fn in_teardrop(x: f64, y: f64, center: Point, radius: f64, tip: Point) -> bool {
    let p = Point::new(x, y);
    if p.distance(center) <= radius {
        return true;
    }
    let axis = tip - center;
    let d = axis.norm();
    let alpha = (radius / d).acos();
    let dir = axis.unit();
    let t1 = center + dir.rotated(alpha) * radius;
    let t2 = center + dir.rotated(-alpha) * radius;
    let side = |a: Point, b: Point| (b - a).cross(p - a);
    let (s1, s2, s3) = (side(tip, t1), side(t1, t2), side(t2, tip));
    (s1 >= 0.0 && s2 >= 0.0 && s3 >= 0.0) || (s1 <= 0.0 && s2 <= 0.0 && s3 <= 0.0)
}

#[test]
fn ellipse_is_found_tip_to_tip() {
    let center = Point::new(60.0, 40.0);
    let image = frame(120, 80, |x, y| in_ellipse(x, y, center, 40.0, 8.0));
    let config = DetectorConfig::default();
    let result = detect_shape(&image, &config, &DetectionHints::default()).unwrap();

    let DetectionOutcome::Detected(status) = result.outcome else {
        panic!("expected a detection, got {:?}", result.outcome);
    };
    assert_eq!(status.threshold, ThresholdPass::Primary);
    assert_eq!(status.contour, ContourSelection::Single);

    assert_eq!(result.center.len(), config.npoints);
    assert_eq!(result.width.len(), config.npoints);
    assert_eq!(result.left.len(), config.ncontour);
    assert_eq!(result.right.len(), config.ncontour);

    let (head, tail) = (result.center[0], result.center[config.npoints - 1]);
    let (west, east) = if head.x < tail.x {
        (head, tail)
    } else {
        (tail, head)
    };
    assert!(west.x < 32.0 && east.x > 88.0, "ends {west:?} {east:?}");
    for p in &result.center {
        assert!((p.y - 40.0).abs() < 2.5, "center line strays to {p:?}");
    }
    let max_width = result.width.iter().copied().fold(0.0, f64::max);
    assert!((11.0..19.0).contains(&max_width), "max width {max_width}");
    assert!(result.width[0] < max_width / 2.0);
}

#[test]
fn uniform_frame_fails_with_zero_outputs() {
    let image = GrayImage::from_pixel(64, 64, Luma([100]));
    let config = DetectorConfig::default();
    let result = detect_shape(&image, &config, &DetectionHints::default()).unwrap();
    assert_eq!(result.outcome, DetectionOutcome::Failed);
    assert_eq!(result.outcome.code(), -1);
    assert_eq!(result.center.len(), config.npoints);
    assert_eq!(result.left.len(), config.ncontour);
    assert!(result.width.iter().all(|w| *w == 0.0));
}

#[test]
fn size_hint_picks_the_matching_blob() {
    let small = Point::new(30.0, 30.0);
    let large = Point::new(110.0, 80.0);
    let image = frame(160, 120, |x, y| {
        in_ellipse(x, y, small, 10.0, 6.0) || in_ellipse(x, y, large, 35.0, 7.0)
    });
    let hints = DetectionHints {
        size: Some(750.0),
        ..DetectionHints::default()
    };
    let result = detect_shape(&image, &DetectorConfig::default(), &hints).unwrap();
    let DetectionOutcome::Detected(status) = result.outcome else {
        panic!("expected a detection");
    };
    assert_eq!(status.contour, ContourSelection::SizeHint);
    assert_eq!(result.outcome.code() % 10, 4);
    for p in &result.center {
        assert!(p.x > 70.0, "center line left the large blob: {p:?}");
    }
}

#[test]
fn without_hints_the_central_blob_wins() {
    let image = frame(160, 120, |x, y| {
        in_ellipse(x, y, Point::new(20.0, 20.0), 12.0, 5.0)
            || in_ellipse(x, y, Point::new(80.0, 60.0), 30.0, 6.0)
    });
    let result =
        detect_shape(&image, &DetectorConfig::default(), &DetectionHints::default()).unwrap();
    let DetectionOutcome::Detected(status) = result.outcome else {
        panic!("expected a detection");
    };
    assert_eq!(status.contour, ContourSelection::MostCentral);
    assert!(result.center.iter().all(|p| p.x > 45.0));
}

#[test]
fn contour_hint_follows_the_shape_from_the_previous_frame() {
    let worm = |x: f64, y: f64, c: Point| in_ellipse(x, y, c, 30.0, 5.0);
    let first = frame(120, 80, |x, y| worm(x, y, Point::new(60.0, 40.0)));
    let previous =
        detect_shape(&first, &DetectorConfig::default(), &DetectionHints::default()).unwrap();
    assert!(previous.outcome.is_detected());

    // A round blob sits at the center; the worm has drifted off it.
    let second = frame(160, 120, |x, y| {
        worm(x, y, Point::new(45.0, 20.0)) || in_ellipse(x, y, Point::new(80.0, 70.0), 12.0, 12.0)
    });
    let hints = DetectionHints {
        contour: Some(previous.contour.clone()),
        ..DetectionHints::default()
    };
    let result = detect_shape(&second, &DetectorConfig::default(), &hints).unwrap();
    let DetectionOutcome::Detected(status) = result.outcome else {
        panic!("expected a detection");
    };
    assert_eq!(status.contour, ContourSelection::ContourHint);
    assert!(result.center.iter().all(|p| p.y < 35.0));
}

#[test]
fn single_sharp_tip_pairs_with_its_antipode() {
    let image = frame(120, 80, |x, y| {
        in_teardrop(x, y, Point::new(40.0, 40.0), 12.0, Point::new(95.0, 40.0))
    });
    let config = DetectorConfig {
        delta_reduce: None,
        ..DetectorConfig::default()
    };
    let result = detect_shape(&image, &config, &DetectionHints::default()).unwrap();
    let DetectionOutcome::Detected(status) = result.outcome else {
        panic!("expected a detection");
    };
    assert_eq!(status.head_tail, HeadTailResolution::SinglePeakAntipode);

    let (head, tail) = (result.center[0], result.center[config.npoints - 1]);
    let (blunt, sharp) = if head.x < tail.x {
        (head, tail)
    } else {
        (tail, head)
    };
    assert!(sharp.x > 85.0, "sharp end at {sharp:?}");
    assert!(blunt.x < 36.0, "blunt end at {blunt:?}");
}

#[test]
fn model_fitted_to_a_frame_matches_its_outline() {
    let image = frame(120, 80, |x, y| in_ellipse(x, y, Point::new(60.0, 40.0), 35.0, 7.0));
    let mut model = WormModel::new(21, ModelConfig::default()).unwrap();
    let outcome = model
        .from_image(&image, &DetectorConfig::default(), &DetectionHints::default())
        .unwrap();
    assert!(outcome.is_detected());
    assert_eq!(model.npoints(), 21);
    assert!((model.center_point().y - 40.0).abs() < 2.0);

    let detection = detect_shape(
        &image,
        &DetectorConfig::default(),
        &DetectionHints::default(),
    )
    .unwrap();
    let distances = model
        .distance_to_contour(detection.contour.points(), &DistanceOptions::default())
        .unwrap();
    let mut resolved: Vec<f64> = distances.into_iter().flatten().collect();
    assert!(resolved.len() > 20);
    resolved.sort_by(f64::total_cmp);
    let median = resolved[resolved.len() / 2];
    assert!(median < 3.0, "median distance {median}");

    assert!(model.self_occlusions(0.01).unwrap().is_empty());
    assert!(!model.measure().unwrap().curled);
}

#[test]
fn failed_frame_leaves_the_model_alone() {
    let mut model = WormModel::new(21, ModelConfig::default()).unwrap();
    let before = model.clone();
    let image = GrayImage::from_pixel(50, 50, Luma([0]));
    let outcome = model
        .from_image(&image, &DetectorConfig::default(), &DetectionHints::default())
        .unwrap();
    assert_eq!(outcome, DetectionOutcome::Failed);
    assert_eq!(model, before);
}

#[test]
fn every_midline_method_recovers_a_model_width() {
    let model = WormModel::new(31, ModelConfig::default()).unwrap();
    let shape = model.shape().unwrap();
    for method in [
        MidlineMethod::Mean,
        MidlineMethod::Projection { neighbours: None },
        MidlineMethod::Voronoi,
        MidlineMethod::MinimalAdvancement { offset: 3 },
    ] {
        let options = MidlineOptions {
            npoints: Some(31),
            ..MidlineOptions::default()
        };
        let midline = method
            .center_from_sides(&shape.left, &shape.right, &options)
            .unwrap();
        assert_eq!(midline.center.len(), midline.width.len());
        let mid = midline.width[15];
        assert!(
            (mid - model.width()[15]).abs() < 0.5,
            "{method:?} width {mid} vs {}",
            model.width()[15]
        );
    }
}
