//! Synthetic frame source: a red dot orbiting over a dark gradient.

use std::{
    thread,
    time::{Duration, Instant},
};

use chrono::Utc;

use crate::types::{CaptureError, Frame, FrameFormat, FrameSource};

const FRAME_INTERVAL: Duration = Duration::from_millis(33);
const DOT_RADIUS: i32 = 12;

pub struct TestPattern {
    width: i32,
    height: i32,
    tick: u64,
    last: Option<Instant>,
    paced: bool,
}

impl TestPattern {
    pub fn new(target_size: (i32, i32)) -> Self {
        Self {
            width: target_size.0.max(1),
            height: target_size.1.max(1),
            tick: 0,
            last: None,
            paced: true,
        }
    }

    /// Disable the ~30 fps pacing so frames are produced as fast as requested.
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }

    /// Centre of the dot for the current tick.
    pub fn dot_center(&self) -> (i32, i32) {
        let angle = self.tick as f32 * 0.05;
        let radius_x = (self.width / 3) as f32;
        let radius_y = (self.height / 3) as f32;
        let cx = self.width as f32 / 2.0 + radius_x * angle.cos();
        let cy = self.height as f32 / 2.0 + radius_y * angle.sin();
        (cx.round() as i32, cy.round() as i32)
    }

    fn pace(&mut self) {
        if !self.paced {
            return;
        }
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < FRAME_INTERVAL {
                thread::sleep(FRAME_INTERVAL - elapsed);
            }
        }
        self.last = Some(Instant::now());
    }

    fn render(&self) -> Vec<u8> {
        let (dot_x, dot_y) = self.dot_center();
        let mut data = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for y in 0..self.height {
            let shade = (32 * i64::from(y) / i64::from(self.height)) as u8;
            for x in 0..self.width {
                let dx = x - dot_x;
                let dy = y - dot_y;
                if dx * dx + dy * dy <= DOT_RADIUS * DOT_RADIUS {
                    // BGR
                    data.extend_from_slice(&[0, 0, 255]);
                } else {
                    data.extend_from_slice(&[shade, shade, shade]);
                }
            }
        }
        data
    }
}

impl FrameSource for TestPattern {
    fn read(&mut self) -> Result<Frame, CaptureError> {
        self.pace();
        let data = self.render();
        self.tick = self.tick.wrapping_add(1);
        Ok(Frame {
            data,
            width: self.width,
            height: self.height,
            timestamp_ms: Utc::now().timestamp_millis(),
            format: FrameFormat::Bgr8,
        })
    }
}
