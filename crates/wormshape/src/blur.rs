//! Gaussian pre-smoothing of the input frame.
//!
//! Wraps [`imageproc::filter::gaussian_blur_f32`] so that pixel noise and
//! the cuticle texture do not fragment the thresholded body mask.

use image::GrayImage;

/// Apply Gaussian blur to a grayscale frame.
///
/// Non-positive or non-finite sigma values return the image unchanged,
/// since `imageproc`'s underlying function panics on `sigma <= 0.0`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    if !sigma.is_finite() || sigma <= 0.0 || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    imageproc::filter::gaussian_blur_f32(image, sigma)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A dark frame with a bright horizontal bar in rows 4..8.
    fn bar_image() -> GrayImage {
        GrayImage::from_fn(16, 12, |_x, y| {
            if (4..8).contains(&y) {
                image::Luma([220])
            } else {
                image::Luma([20])
            }
        })
    }

    #[test]
    fn zero_sigma_returns_identical_image() {
        let img = bar_image();
        assert_eq!(gaussian_blur(&img, 0.0), img);
    }

    #[test]
    fn nan_sigma_returns_identical_image() {
        let img = bar_image();
        assert_eq!(gaussian_blur(&img, f32::NAN), img);
    }

    #[test]
    fn output_dimensions_preserved() {
        let blurred = gaussian_blur(&GrayImage::new(17, 31), 1.0);
        assert_eq!((blurred.width(), blurred.height()), (17, 31));
    }

    #[test]
    fn blur_softens_bar_edges() {
        let blurred = gaussian_blur(&bar_image(), 1.5);
        let outside = blurred.get_pixel(8, 3).0[0];
        let inside = blurred.get_pixel(8, 4).0[0];
        assert!(outside > 20, "expected the row above the bar to brighten, got {outside}");
        assert!(inside < 220, "expected the bar edge to darken, got {inside}");
    }

    #[test]
    fn uniform_interior_stays_uniform() {
        // Each separable pass may truncate a level, so the value can sink
        // a little; it must still be the same everywhere inside.
        let img = GrayImage::from_pixel(48, 48, image::Luma([90]));
        let blurred = gaussian_blur(&img, 2.0);
        let reference = blurred.get_pixel(24, 24).0[0];
        assert!(reference.abs_diff(90) <= 3, "got {reference}");
        for y in 18..30 {
            for x in 18..30 {
                assert_eq!(blurred.get_pixel(x, y).0[0], reference, "at ({x}, {y})");
            }
        }
    }
}
