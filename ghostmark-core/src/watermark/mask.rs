//! Color-selective isolation of watermark pixels

use crate::config::ExtractionConfig;
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

/// Per-channel tolerance box around the watermark color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl ColorRange {
    /// `[c - below, c + above]` per channel, saturating at 0 and 255
    pub fn around(color: [u8; 3], below: u8, above: u8) -> Self {
        Self {
            lower: color.map(|c| c.saturating_sub(below)),
            upper: color.map(|c| c.saturating_add(above)),
        }
    }

    pub fn contains(&self, pixel: &Rgb<u8>) -> bool {
        (0..3).all(|i| self.lower[i] <= pixel[i] && pixel[i] <= self.upper[i])
    }
}

/// 255 where the pixel falls inside `range`, 0 elsewhere
pub fn color_mask(frame: &RgbImage, range: &ColorRange) -> GrayImage {
    GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
        if range.contains(frame.get_pixel(x, y)) {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Binary dilation with a 3x3 square structuring element
pub fn dilate(mask: &GrayImage, iterations: u32) -> GrayImage {
    let mut current = mask.clone();
    let (width, height) = current.dimensions();
    for _ in 0..iterations {
        let source = current.clone();
        current = GrayImage::from_fn(width, height, |x, y| {
            let hit = (x.saturating_sub(1)..=(x + 1).min(width - 1)).any(|nx| {
                (y.saturating_sub(1)..=(y + 1).min(height - 1))
                    .any(|ny| source.get_pixel(nx, ny)[0] > 0)
            });
            Luma([if hit { 255 } else { 0 }])
        });
    }
    current
}

/// Keep pixels under the mask, zero the rest
pub fn isolate(frame: &RgbImage, mask: &GrayImage) -> RgbImage {
    RgbImage::from_fn(frame.width(), frame.height(), |x, y| {
        if mask.get_pixel(x, y)[0] > 0 {
            *frame.get_pixel(x, y)
        } else {
            Rgb([0, 0, 0])
        }
    })
}

/// Luma conversion followed by a hard threshold: values above `threshold` become 255
pub fn binarize(isolated: &RgbImage, threshold: u8) -> GrayImage {
    let mut gray = DynamicImage::ImageRgb8(isolated.clone()).into_luma8();
    for pixel in gray.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > threshold { 255 } else { 0 };
    }
    gray
}

/// Full frame preparation: mask, dilate, isolate, binarize
pub fn prepare_frame(frame: &DynamicImage, color: [u8; 3], config: &ExtractionConfig) -> GrayImage {
    let rgb = frame.to_rgb8();
    let range = ColorRange::around(color, config.tolerance_below, config.tolerance_above);
    let mask = dilate(&color_mask(&rgb, &range), config.dilate_iterations);
    binarize(&isolate(&rgb, &mask), 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARK: [u8; 3] = [255, 254, 250];

    #[test]
    fn test_range_saturates() {
        let range = ColorRange::around(MARK, 5, 3);
        assert_eq!(range.lower, [250, 249, 245]);
        assert_eq!(range.upper, [255, 255, 253]);
        assert!(range.contains(&Rgb(MARK)));
        assert!(range.contains(&Rgb([250, 249, 245])));
        assert!(!range.contains(&Rgb([255, 255, 255])));
        assert!(!range.contains(&Rgb([0, 0, 0])));
    }

    #[test]
    fn test_dilate_grows_single_pixel() {
        let mut mask = GrayImage::new(5, 5);
        mask.put_pixel(2, 2, Luma([255]));

        let once = dilate(&mask, 1);
        let lit = once.pixels().filter(|p| p[0] == 255).count();
        assert_eq!(lit, 9);
        assert_eq!(once.get_pixel(0, 0)[0], 0);

        let twice = dilate(&mask, 2);
        assert_eq!(twice.pixels().filter(|p| p[0] == 255).count(), 25);
    }

    #[test]
    fn test_dilate_handles_edges() {
        let mut mask = GrayImage::new(3, 3);
        mask.put_pixel(0, 0, Luma([255]));
        let out = dilate(&mask, 1);
        assert_eq!(out.pixels().filter(|p| p[0] == 255).count(), 4);
    }

    #[test]
    fn test_zero_iterations_is_identity() {
        let mut mask = GrayImage::new(3, 3);
        mask.put_pixel(1, 1, Luma([255]));
        assert_eq!(dilate(&mask, 0), mask);
    }

    #[test]
    fn test_prepare_frame_isolates_watermark_color() {
        // white page, black body text at x=1, watermark at x=7
        let mut frame = RgbImage::from_pixel(10, 3, Rgb([255, 255, 255]));
        frame.put_pixel(1, 1, Rgb([0, 0, 0]));
        frame.put_pixel(7, 1, Rgb(MARK));

        let config = ExtractionConfig {
            dilate_iterations: 0,
            ..ExtractionConfig::default()
        };
        let out = prepare_frame(&DynamicImage::ImageRgb8(frame), MARK, &config);

        assert_eq!(out.get_pixel(7, 1)[0], 255);
        assert_eq!(out.get_pixel(1, 1)[0], 0);
        // pure white background is outside the tolerance box
        assert_eq!(out.get_pixel(4, 1)[0], 0);
    }

    #[test]
    fn test_binarize_threshold() {
        let mut isolated = RgbImage::new(3, 1);
        isolated.put_pixel(1, 0, Rgb([1, 1, 1]));
        isolated.put_pixel(2, 0, Rgb([2, 2, 2]));
        let out = binarize(&isolated, 1);
        assert_eq!(out.as_raw(), &vec![0, 0, 255]);
    }
}
