//! Frame reduction, JPEG compression, and multipart framing for the MJPEG
//! stream.

use std::borrow::Cow;

use actix_web::web::Bytes;
use anyhow::{Result, anyhow};
use image::{RgbImage, codecs::jpeg::JpegEncoder, imageops::FilterType};

pub(crate) const MJPEG_BOUNDARY: &str = "frame";

#[derive(Clone, Copy, Debug)]
pub(crate) struct StreamEncoder {
    /// Percentage by which each dimension shrinks before encoding.
    reduce_percent: u8,
    jpeg_quality: u8,
}

impl StreamEncoder {
    pub(crate) fn new(reduce_percent: u8, jpeg_quality: u8) -> Self {
        Self {
            reduce_percent: reduce_percent.min(99),
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    pub(crate) fn reduce<'a>(&self, frame: &'a RgbImage) -> Cow<'a, RgbImage> {
        if self.reduce_percent == 0 {
            return Cow::Borrowed(frame);
        }
        let keep = u32::from(100 - self.reduce_percent);
        let width = (frame.width() * keep / 100).max(1);
        let height = (frame.height() * keep / 100).max(1);
        Cow::Owned(image::imageops::resize(
            frame,
            width,
            height,
            FilterType::Triangle,
        ))
    }

    pub(crate) fn encode_jpeg(&self, frame: &RgbImage) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, self.jpeg_quality)
            .encode_image(frame)
            .map_err(|err| anyhow!("JPEG encode failed: {err}"))?;
        Ok(buffer)
    }

    /// Reduce, compress, and frame one stream part.
    pub(crate) fn stream_part(&self, frame: &RgbImage) -> Result<Bytes> {
        let reduced = self.reduce(frame);
        let jpeg = self.encode_jpeg(&reduced)?;
        Ok(multipart_part(&jpeg))
    }
}

pub(crate) fn multipart_part(jpeg: &[u8]) -> Bytes {
    let mut payload = Vec::with_capacity(jpeg.len() + 64);
    payload.extend_from_slice(b"--");
    payload.extend_from_slice(MJPEG_BOUNDARY.as_bytes());
    payload.extend_from_slice(b"\r\n");
    payload.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
    payload.extend_from_slice(jpeg);
    payload.extend_from_slice(b"\r\n");
    Bytes::from(payload)
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    #[test]
    fn reduces_each_dimension_by_percentage() {
        let frame = RgbImage::new(200, 100);
        let reduced = StreamEncoder::new(30, 85).reduce(&frame);
        assert_eq!(reduced.dimensions(), (140, 70));
    }

    #[test]
    fn zero_reduction_borrows_frame() {
        let frame = RgbImage::new(20, 10);
        let reduced = StreamEncoder::new(0, 85).reduce(&frame);
        assert!(matches!(reduced, Cow::Borrowed(_)));
    }

    #[test]
    fn encodes_valid_jpeg() {
        let frame = RgbImage::from_pixel(32, 32, Rgb([200, 30, 30]));
        let jpeg = StreamEncoder::new(0, 90).encode_jpeg(&frame).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 32));
    }

    #[test]
    fn stream_part_is_framed_with_boundary_and_content_type() {
        let frame = RgbImage::new(40, 40);
        let part = StreamEncoder::new(50, 80).stream_part(&frame).unwrap();
        let header = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";
        assert!(part.starts_with(header));
        assert!(part.ends_with(b"\r\n"));
        let jpeg = &part[header.len()..part.len() - 2];
        let decoded = image::load_from_memory(jpeg).unwrap();
        assert_eq!(decoded.width(), 20);
    }
}
