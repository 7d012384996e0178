//! Frame acquisition for the video server.
//!
//! Sources are pull-based: the capture loop owns a [`FrameSource`] and calls
//! [`FrameSource::read`] once per cycle. Physical cameras are backed by OpenCV
//! (behind the `opencv` feature); a synthetic [`TestPattern`] is always
//! available for demos and headless runs.

#[cfg(feature = "opencv")]
mod camera;
mod pattern;
mod types;

#[cfg(feature = "opencv")]
pub use camera::OpenCvCamera;
pub use pattern::TestPattern;
pub use types::{CaptureError, Frame, FrameFormat, FrameSource};

/// Open the source described by `uri`.
///
/// `pattern` selects the synthetic source; anything else is treated as a
/// camera index, device path, or stream URL handed to OpenCV.
pub fn open_source(
    uri: &str,
    target_size: (i32, i32),
) -> Result<Box<dyn FrameSource>, CaptureError> {
    if uri == "pattern" {
        return Ok(Box::new(TestPattern::new(target_size)));
    }
    open_device(uri, target_size)
}

#[cfg(feature = "opencv")]
fn open_device(uri: &str, target_size: (i32, i32)) -> Result<Box<dyn FrameSource>, CaptureError> {
    Ok(Box::new(OpenCvCamera::open(uri, target_size)?))
}

#[cfg(not(feature = "opencv"))]
fn open_device(uri: &str, _target_size: (i32, i32)) -> Result<Box<dyn FrameSource>, CaptureError> {
    Err(CaptureError::Unsupported {
        uri: uri.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_uri_opens_synthetic_source() {
        let mut source = open_source("pattern", (64, 48)).expect("pattern source");
        let frame = source.read().expect("frame");
        assert_eq!((frame.width, frame.height), (64, 48));
        assert_eq!(frame.data.len(), frame.expected_len());
    }

    #[cfg(not(feature = "opencv"))]
    #[test]
    fn device_uri_without_opencv_is_unsupported() {
        let err = open_source("0", (64, 48)).err().expect("error");
        assert!(matches!(err, CaptureError::Unsupported { .. }));
    }
}
