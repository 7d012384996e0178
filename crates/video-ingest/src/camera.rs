//! OpenCV-backed camera source.

use anyhow::anyhow;
use chrono::Utc;
use opencv::{
    core::{self, Mat, MatTraitConstManual},
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureTrait},
};
use tracing::{debug, warn};

use crate::types::{CaptureError, Frame, FrameFormat, FrameSource};

/// Camera opened through OpenCV's `VideoCapture`.
///
/// Frames are resized to the requested size when the device ignores the
/// resolution hint.
pub struct OpenCvCamera {
    cap: VideoCapture,
    frame: Mat,
    scratch: Mat,
    target_size: (i32, i32),
}

impl OpenCvCamera {
    pub fn open(uri: &str, target_size: (i32, i32)) -> Result<Self, CaptureError> {
        let mut cap = open_video_capture(uri)?;
        configure_camera(&mut cap, target_size);
        debug!(
            uri,
            width = target_size.0,
            height = target_size.1,
            "camera opened"
        );
        Ok(Self {
            cap,
            frame: Mat::default(),
            scratch: Mat::default(),
            target_size,
        })
    }
}

impl FrameSource for OpenCvCamera {
    fn read(&mut self) -> Result<Frame, CaptureError> {
        let grabbed = self.cap.read(&mut self.frame).map_err(other)?;
        let size = self.frame.size().map_err(other)?;
        if !grabbed || size.width <= 0 {
            return Err(CaptureError::EndOfStream);
        }

        let (target_w, target_h) = self.target_size;
        let working = if size.width != target_w || size.height != target_h {
            opencv::imgproc::resize(
                &self.frame,
                &mut self.scratch,
                core::Size {
                    width: target_w,
                    height: target_h,
                },
                0.0,
                0.0,
                opencv::imgproc::INTER_LINEAR,
            )
            .map_err(other)?;
            &self.scratch
        } else {
            &self.frame
        };

        let data = working.data_bytes().map_err(other)?.to_vec();

        Ok(Frame {
            data,
            width: target_w,
            height: target_h,
            timestamp_ms: Utc::now().timestamp_millis(),
            format: FrameFormat::Bgr8,
        })
    }
}

fn other(err: opencv::Error) -> CaptureError {
    CaptureError::Other(anyhow!(err))
}

/// Parse a `/dev/videoX` style URI and return the zero-based index if present.
pub(crate) fn parse_device_index(uri: &str) -> Option<i32> {
    if let Ok(index) = uri.parse::<i32>() {
        return Some(index);
    }
    uri.strip_prefix("/dev/video")
        .filter(|stripped| !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit()))
        .and_then(|stripped| stripped.parse::<i32>().ok())
}

/// Attempt to open a camera input either by index or URI.
fn open_video_capture(uri: &str) -> Result<VideoCapture, CaptureError> {
    if let Some(index) = parse_device_index(uri) {
        for backend in [videoio::CAP_V4L, videoio::CAP_ANY] {
            match VideoCapture::new(index, backend) {
                Ok(cap) => {
                    if cap.is_opened().map_err(other)? {
                        return Ok(cap);
                    }
                }
                Err(err) => {
                    warn!("failed to open device #{index} with backend {backend}: {err}");
                }
            }
        }
    }

    for backend in [videoio::CAP_V4L, videoio::CAP_ANY] {
        match VideoCapture::from_file(uri, backend) {
            Ok(cap) => {
                if cap.is_opened().map_err(other)? {
                    return Ok(cap);
                }
            }
            Err(err) => {
                warn!("failed to open {uri} with backend {backend}: {err}");
            }
        }
    }

    Err(CaptureError::Open {
        uri: uri.to_string(),
    })
}

/// Apply the resolution hint and prefer MJPG, falling back to YUYV.
fn configure_camera(cap: &mut VideoCapture, target_size: (i32, i32)) {
    let mut fourcc_set = false;
    if let Ok(mjpg) = videoio::VideoWriter::fourcc('M', 'J', 'P', 'G') {
        if matches!(cap.set(videoio::CAP_PROP_FOURCC, mjpg as f64), Ok(true)) {
            fourcc_set = true;
        }
    }
    if !fourcc_set {
        if let Ok(yuyv) = videoio::VideoWriter::fourcc('Y', 'U', 'Y', 'V') {
            let _ = cap.set(videoio::CAP_PROP_FOURCC, yuyv as f64);
        }
    }
    let _ = cap.set(videoio::CAP_PROP_FRAME_WIDTH, target_size.0 as f64);
    let _ = cap.set(videoio::CAP_PROP_FRAME_HEIGHT, target_size.1 as f64);
}
