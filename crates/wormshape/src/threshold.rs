//! Foreground segmentation by a global intensity threshold.

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

/// Mask value of foreground pixels.
pub const FOREGROUND: u8 = 255;

/// Which side of the threshold the worm is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Polarity {
    /// The worm is brighter than the background (dark-field imaging).
    #[default]
    Bright,
    /// The worm is darker than the background (bright-field imaging).
    Dark,
}

/// The threshold level: `absolute` when given, otherwise `factor` times
/// Otsu's level for `image`.
#[must_use]
pub fn threshold_level(image: &GrayImage, absolute: Option<f64>, factor: f64) -> f64 {
    absolute.unwrap_or_else(|| {
        if image.width() == 0 || image.height() == 0 {
            return 0.0;
        }
        factor * f64::from(imageproc::contrast::otsu_level(image))
    })
}

/// Binary mask of the pixels strictly brighter (or darker) than `level`.
#[must_use = "returns the foreground mask"]
pub fn binary_mask(image: &GrayImage, level: f64, polarity: Polarity) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let v = f64::from(image.get_pixel(x, y).0[0]);
        let foreground = match polarity {
            Polarity::Bright => v > level,
            Polarity::Dark => v < level,
        };
        Luma([if foreground { FOREGROUND } else { 0 }])
    })
}

/// Number of foreground pixels in a mask.
#[must_use]
pub fn foreground_count(mask: &GrayImage) -> u64 {
    mask.pixels().map(|p| u64::from(p.0[0] == FOREGROUND)).sum()
}

/// `true` when the mask is all foreground or all background; such a mask
/// has no usable outline.
#[must_use]
pub fn is_uniform(mask: &GrayImage) -> bool {
    let count = foreground_count(mask);
    count == 0 || count == u64::from(mask.width()) * u64::from(mask.height())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_level(width: u32) -> GrayImage {
        GrayImage::from_fn(width, 4, |x, _| Luma([if x < width / 2 { 30 } else { 200 }]))
    }

    #[test]
    fn absolute_level_wins_over_otsu() {
        assert!((threshold_level(&two_level(10), Some(42.0), 0.5) - 42.0).abs() < f64::EPSILON);
    }

    #[test]
    fn otsu_level_separates_two_levels() {
        let level = threshold_level(&two_level(10), None, 1.0);
        assert!((30.0..200.0).contains(&level), "level {level}");
    }

    #[test]
    fn polarity_selects_the_foreground() {
        let img = two_level(10);
        let bright = binary_mask(&img, 100.0, Polarity::Bright);
        let dark = binary_mask(&img, 100.0, Polarity::Dark);
        assert_eq!(foreground_count(&bright), 20);
        assert_eq!(foreground_count(&dark), 20);
        assert_eq!(bright.get_pixel(9, 0).0[0], FOREGROUND);
        assert_eq!(dark.get_pixel(0, 0).0[0], FOREGROUND);
    }

    #[test]
    fn uniform_masks_are_detected() {
        let img = GrayImage::from_pixel(6, 6, Luma([90]));
        assert!(is_uniform(&binary_mask(&img, 50.0, Polarity::Bright)));
        assert!(is_uniform(&binary_mask(&img, 150.0, Polarity::Bright)));
        assert!(!is_uniform(&binary_mask(&two_level(6), 100.0, Polarity::Bright)));
    }
}
