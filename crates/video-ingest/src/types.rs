use thiserror::Error;

/// Raw frame captured from a video source.
#[derive(Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: i32,
    pub height: i32,
    pub timestamp_ms: i64,
    pub format: FrameFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameFormat {
    Bgr8,
    Rgb8,
}

impl Frame {
    /// Number of bytes a tightly packed frame of this size must carry.
    pub fn expected_len(&self) -> usize {
        (self.width.max(0) as usize) * (self.height.max(0) as usize) * 3
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to open video source {uri:?}")]
    Open { uri: String },
    #[error("video source {uri:?} requires the `opencv` feature")]
    Unsupported { uri: String },
    #[error("video source ended")]
    EndOfStream,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Pull-based frame producer owned by exactly one capture loop.
///
/// `read` blocks until the device delivers the next frame. Any error is
/// terminal for the source.
pub trait FrameSource: Send {
    fn read(&mut self) -> Result<Frame, CaptureError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn read(&mut self) -> Result<Frame, CaptureError> {
        (**self).read()
    }
}
