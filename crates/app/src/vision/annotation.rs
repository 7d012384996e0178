//! Polyline overlay: records detections into the active polyline and draws
//! every polyline onto the outgoing frame.

use anyhow::{Result, anyhow};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_hollow_circle_mut, draw_line_segment_mut};
use video_ingest::{Frame, FrameFormat};

use crate::vision::{
    points::Point,
    state::{AnnotationState, SharedState},
};

const LINE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const MARKER_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LINE_THICKNESS: i32 = 2;
const MARKER_RADIUS: i32 = 10;

#[derive(Clone, Debug)]
pub(crate) struct AnnotationEngine {
    line_color: Rgb<u8>,
    thickness: i32,
    marker: Option<Rgb<u8>>,
}

impl Default for AnnotationEngine {
    fn default() -> Self {
        Self {
            line_color: LINE_COLOR,
            thickness: LINE_THICKNESS,
            marker: Some(MARKER_COLOR),
        }
    }
}

impl AnnotationEngine {
    pub(crate) fn with_marker(mut self, enabled: bool) -> Self {
        self.marker = enabled.then_some(MARKER_COLOR);
        self
    }

    /// Run the annotation step for one capture cycle and return how many
    /// strokes were drawn.
    pub(crate) fn apply(
        &self,
        store: &SharedState,
        frame: &mut RgbImage,
        detection: Option<Point>,
    ) -> usize {
        let annotation = store.record_detection(detection);
        let strokes = self.render(frame, &annotation);
        if let (Some(color), Some(point)) = (self.marker, detection) {
            draw_hollow_circle_mut(frame, (point.x, point.y), MARKER_RADIUS, color);
            draw_cross_mut(frame, color, point.x, point.y);
        }
        strokes
    }

    /// Draw finished segments and the active polyline, skipping any pair of
    /// samples that touches a gap.
    pub(crate) fn render(&self, frame: &mut RgbImage, annotation: &AnnotationState) -> usize {
        let mut drawn = 0;
        for polyline in annotation.polylines() {
            for (from, to) in polyline.strokes() {
                self.stroke(frame, from, to);
                drawn += 1;
            }
        }
        drawn
    }

    fn stroke(&self, frame: &mut RgbImage, from: Point, to: Point) {
        for offset in 0..self.thickness.max(1) {
            let offset = offset as f32;
            draw_line_segment_mut(
                frame,
                (from.x as f32 + offset, from.y as f32),
                (to.x as f32 + offset, to.y as f32),
                self.line_color,
            );
            draw_line_segment_mut(
                frame,
                (from.x as f32, from.y as f32 + offset),
                (to.x as f32, to.y as f32 + offset),
                self.line_color,
            );
        }
    }
}

/// Convert a captured frame into an RGB image buffer.
pub(crate) fn frame_to_image(frame: &Frame) -> Result<RgbImage> {
    if frame.data.len() != frame.expected_len() {
        return Err(anyhow!(
            "unexpected frame buffer size: got {} bytes, expected {}",
            frame.data.len(),
            frame.expected_len()
        ));
    }
    let data = match frame.format {
        FrameFormat::Rgb8 => frame.data.clone(),
        FrameFormat::Bgr8 => bgr_to_rgb(&frame.data),
    };
    RgbImage::from_vec(frame.width as u32, frame.height as u32, data)
        .ok_or_else(|| anyhow!("failed to convert frame into image buffer"))
}

fn bgr_to_rgb(input: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(input.len());
    for chunk in input.chunks_exact(3) {
        output.extend_from_slice(&[chunk[2], chunk[1], chunk[0]]);
    }
    output
}
