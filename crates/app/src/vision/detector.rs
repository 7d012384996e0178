//! Object detection seam and the built-in colour-blob detector.

use image::{Rgb, RgbImage};

use crate::vision::points::Point;

/// Locates the tracked object in a frame. `None` means the object was not
/// found this frame, which is an expected outcome rather than an error.
pub(crate) trait Detector: Send {
    fn detect(&mut self, frame: &RgbImage) -> Option<Point>;
}

/// Finds the centroid of all pixels within `tolerance` of a target colour.
#[derive(Clone, Debug)]
pub(crate) struct ColorBlobDetector {
    target: Rgb<u8>,
    tolerance: u8,
    min_pixels: usize,
}

impl ColorBlobDetector {
    pub(crate) fn new(target: Rgb<u8>, tolerance: u8, min_pixels: usize) -> Self {
        Self {
            target,
            tolerance,
            min_pixels: min_pixels.max(1),
        }
    }

    fn matches(&self, pixel: &Rgb<u8>) -> bool {
        pixel
            .0
            .iter()
            .zip(self.target.0.iter())
            .all(|(value, target)| value.abs_diff(*target) <= self.tolerance)
    }
}

impl Detector for ColorBlobDetector {
    fn detect(&mut self, frame: &RgbImage) -> Option<Point> {
        let mut count: u64 = 0;
        let mut sum_x: u64 = 0;
        let mut sum_y: u64 = 0;
        for (x, y, pixel) in frame.enumerate_pixels() {
            if self.matches(pixel) {
                count += 1;
                sum_x += u64::from(x);
                sum_y += u64::from(y);
            }
        }

        if (count as usize) < self.min_pixels {
            return None;
        }

        Some(Point::new((sum_x / count) as i32, (sum_y / count) as i32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_blob(center: (u32, u32), color: Rgb<u8>) -> RgbImage {
        let mut frame = RgbImage::from_pixel(100, 100, Rgb([10, 10, 10]));
        for y in center.1 - 5..center.1 + 5 {
            for x in center.0 - 5..center.0 + 5 {
                frame.put_pixel(x, y, color);
            }
        }
        frame
    }

    #[test]
    fn finds_blob_centroid() {
        let frame = frame_with_blob((50, 30), Rgb([250, 5, 5]));
        let mut detector = ColorBlobDetector::new(Rgb([255, 0, 0]), 40, 20);
        let found = detector.detect(&frame).expect("blob");
        assert!((found.x - 50).abs() <= 1);
        assert!((found.y - 30).abs() <= 1);
    }

    #[test]
    fn ignores_other_colours() {
        let frame = frame_with_blob((50, 50), Rgb([0, 255, 0]));
        let mut detector = ColorBlobDetector::new(Rgb([255, 0, 0]), 40, 20);
        assert_eq!(detector.detect(&frame), None);
    }

    #[test]
    fn small_blobs_fall_below_minimum() {
        let frame = frame_with_blob((50, 50), Rgb([255, 0, 0]));
        let mut detector = ColorBlobDetector::new(Rgb([255, 0, 0]), 0, 101);
        assert_eq!(detector.detect(&frame), None);
    }
}
