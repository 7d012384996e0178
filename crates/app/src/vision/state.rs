//! Process-wide state shared between the capture thread and the HTTP server.
//!
//! The store holds two independently locked pieces: the frame slot (latest
//! annotated frame plus its detection) and the annotation state (polylines
//! and drawing mode). Every access goes through a method that holds the lock
//! for a pointer swap or a bounded copy, never for I/O or encoding.

use std::{
    mem,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU8, Ordering},
    },
};

use image::RgbImage;
use serde::Serialize;

use crate::vision::points::{Point, PointSequence, Sample};

/// Lifecycle of the capture loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum CaptureState {
    Idle,
    Running,
    Stopped,
}

impl CaptureState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => CaptureState::Idle,
            1 => CaptureState::Running,
            _ => CaptureState::Stopped,
        }
    }
}

/// Latest published frame and the detection computed for it.
#[derive(Clone)]
pub(crate) struct FrameSlot {
    pub(crate) frame: Option<Arc<RgbImage>>,
    pub(crate) detection: Option<Point>,
    /// Most recent successful detection; origin until the first one.
    pub(crate) last_position: Point,
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self {
            frame: None,
            detection: None,
            last_position: Point::ORIGIN,
        }
    }
}

/// Polylines drawn over the feed.
#[derive(Clone, Debug, Default)]
pub(crate) struct AnnotationState {
    pub(crate) segments: Vec<Arc<PointSequence>>,
    pub(crate) active: PointSequence,
    pub(crate) drawing: bool,
}

impl AnnotationState {
    /// Append this cycle's detection to the active polyline when drawing.
    pub(crate) fn record(&mut self, detection: Option<Point>) {
        if self.drawing {
            self.active.push(Sample::from(detection));
        }
    }

    pub(crate) fn start_line(&mut self) {
        self.active = PointSequence::default();
        self.drawing = true;
    }

    /// Finish the active polyline. Runs even when not drawing, in which case
    /// the (possibly empty) active sequence still becomes a segment.
    pub(crate) fn stop_line(&mut self) {
        let finished = mem::take(&mut self.active);
        self.segments.push(Arc::new(finished));
        self.drawing = false;
    }

    /// Wipe all polylines. Drawing mode is left as it was.
    pub(crate) fn clear(&mut self) {
        self.segments.clear();
        self.active = PointSequence::default();
    }

    /// Finished segments followed by the active polyline.
    pub(crate) fn polylines(&self) -> impl Iterator<Item = &PointSequence> {
        self.segments
            .iter()
            .map(Arc::as_ref)
            .chain(std::iter::once(&self.active))
    }
}

/// Summary of the store for the status endpoint.
#[derive(Clone, Copy, Debug, Serialize)]
pub(crate) struct StoreStatus {
    pub(crate) capture: CaptureState,
    pub(crate) drawing: bool,
    pub(crate) segments: usize,
    pub(crate) active_len: usize,
    pub(crate) has_frame: bool,
    /// Detection for the latest frame, `null` when the object was not found.
    pub(crate) detection: Option<Point>,
}

#[derive(Default)]
pub(crate) struct SharedState {
    frame: Mutex<FrameSlot>,
    annotation: Mutex<AnnotationState>,
    capture: AtomicU8,
}

pub(crate) type SharedStore = Arc<SharedState>;

impl SharedState {
    pub(crate) fn new() -> SharedStore {
        Arc::new(Self::default())
    }

    fn frame_slot(&self) -> MutexGuard<'_, FrameSlot> {
        self.frame.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn annotation(&self) -> MutexGuard<'_, AnnotationState> {
        self.annotation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the frame slot with a freshly annotated frame.
    pub(crate) fn publish(&self, frame: RgbImage, detection: Option<Point>) {
        let frame = Arc::new(frame);
        let mut slot = self.frame_slot();
        slot.frame = Some(frame);
        slot.detection = detection;
        if let Some(position) = detection {
            slot.last_position = position;
        }
    }

    /// Snapshot of the frame slot; cheap because the frame is shared.
    pub(crate) fn latest(&self) -> FrameSlot {
        self.frame_slot().clone()
    }

    pub(crate) fn last_position(&self) -> Point {
        self.frame_slot().last_position
    }

    /// Record a capture cycle's detection and return a copy of the annotation
    /// state to render from, both under one lock acquisition.
    pub(crate) fn record_detection(&self, detection: Option<Point>) -> AnnotationState {
        let mut annotation = self.annotation();
        annotation.record(detection);
        annotation.clone()
    }

    /// Run `f` against the annotation state under its lock.
    pub(crate) fn with_annotation<T>(&self, f: impl FnOnce(&mut AnnotationState) -> T) -> T {
        let mut guard = self.annotation();
        f(&mut *guard)
    }

    #[cfg(test)]
    pub(crate) fn annotation_snapshot(&self) -> AnnotationState {
        self.annotation().clone()
    }

    pub(crate) fn capture_state(&self) -> CaptureState {
        CaptureState::from_u8(self.capture.load(Ordering::Acquire))
    }

    pub(crate) fn set_capture_state(&self, state: CaptureState) {
        self.capture.store(state as u8, Ordering::Release);
    }

    pub(crate) fn status(&self) -> StoreStatus {
        let (drawing, segments, active_len) =
            self.with_annotation(|state| (state.drawing, state.segments.len(), state.active.len()));
        let (has_frame, detection) = {
            let slot = self.frame_slot();
            (slot.frame.is_some(), slot.detection)
        };
        StoreStatus {
            capture: self.capture_state(),
            drawing,
            segments,
            active_len,
            has_frame,
            detection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::points::POLYLINE_CAPACITY;

    #[test]
    fn starts_idle_with_sentinel_position() {
        let store = SharedState::new();
        let slot = store.latest();
        assert!(slot.frame.is_none());
        assert_eq!(slot.detection, None);
        assert_eq!(store.last_position(), Point::ORIGIN);
        assert_eq!(store.capture_state(), CaptureState::Idle);

        let annotation = store.annotation_snapshot();
        assert!(annotation.segments.is_empty());
        assert!(annotation.active.is_empty());
        assert!(!annotation.drawing);
    }

    #[test]
    fn publish_keeps_last_known_position_through_misses() {
        let store = SharedState::new();
        store.publish(RgbImage::new(4, 4), Some(Point::new(3, 2)));
        store.publish(RgbImage::new(4, 4), None);
        let slot = store.latest();
        assert_eq!(slot.detection, None);
        assert_eq!(slot.last_position, Point::new(3, 2));
        assert!(slot.frame.is_some());
    }

    #[test]
    fn snapshot_outlives_next_publish() {
        let store = SharedState::new();
        store.publish(RgbImage::from_pixel(2, 2, image::Rgb([1, 1, 1])), None);
        let held = store.latest().frame.unwrap();
        store.publish(RgbImage::from_pixel(2, 2, image::Rgb([9, 9, 9])), None);
        assert_eq!(held.get_pixel(0, 0).0, [1, 1, 1]);
        assert_eq!(store.latest().frame.unwrap().get_pixel(0, 0).0, [9, 9, 9]);
    }

    #[test]
    fn start_line_twice_equals_once() {
        let mut state = AnnotationState::default();
        state.start_line();
        state.record(Some(Point::new(1, 1)));
        state.start_line();
        assert!(state.drawing);
        assert!(state.active.is_empty());
        assert!(state.segments.is_empty());
    }

    #[test]
    fn record_appends_gaps_only_while_drawing() {
        let mut state = AnnotationState::default();
        state.record(Some(Point::new(1, 1)));
        assert!(state.active.is_empty());

        state.start_line();
        state.record(Some(Point::new(1, 1)));
        state.record(None);
        let samples: Vec<_> = state.active.iter().collect();
        assert_eq!(samples, vec![Sample::At(Point::new(1, 1)), Sample::Gap]);
    }

    #[test]
    fn clear_keeps_drawing_mode() {
        let mut state = AnnotationState::default();
        state.start_line();
        state.record(Some(Point::new(1, 1)));
        state.stop_line();
        state.start_line();
        state.record(Some(Point::new(2, 2)));
        state.clear();
        assert!(state.segments.is_empty());
        assert!(state.active.is_empty());
        assert!(state.drawing);
    }

    // Stopping while idle still appends the empty active polyline.
    #[test]
    fn stop_while_idle_appends_degenerate_segment() {
        let mut state = AnnotationState::default();
        state.stop_line();
        state.stop_line();
        assert_eq!(state.segments.len(), 2);
        assert!(state.segments.iter().all(|segment| segment.is_empty()));
        assert!(!state.drawing);
    }

    #[test]
    fn interleaved_operations_respect_bounds() {
        let mut state = AnnotationState::default();
        let mut stops_while_drawing = 0;
        for cycle in 0..5_000u32 {
            match cycle % 997 {
                0 => state.start_line(),
                500 => {
                    if state.drawing {
                        stops_while_drawing += 1;
                        state.stop_line();
                    }
                }
                800 if cycle > 3_000 => state.clear(),
                _ => {}
            }
            let detection = (cycle % 7 != 0).then(|| Point::new(cycle as i32, 0));
            state.record(detection);
            assert!(state.active.len() <= POLYLINE_CAPACITY);
            assert!(state.segments.len() <= stops_while_drawing);
        }
        assert!(stops_while_drawing > 0);
    }

    #[test]
    fn polylines_yield_segments_then_active() {
        let mut state = AnnotationState::default();
        state.start_line();
        state.record(Some(Point::new(1, 1)));
        state.stop_line();
        state.start_line();
        state.record(Some(Point::new(2, 2)));
        state.record(Some(Point::new(3, 3)));
        let lens: Vec<_> = state.polylines().map(PointSequence::len).collect();
        assert_eq!(lens, vec![1, 2]);
    }

    #[test]
    fn status_reflects_store() {
        let store = SharedState::new();
        store.set_capture_state(CaptureState::Running);
        store.with_annotation(AnnotationState::start_line);
        store.record_detection(Some(Point::new(5, 5)));
        let status = store.status();
        assert_eq!(status.capture, CaptureState::Running);
        assert!(status.drawing);
        assert_eq!(status.active_len, 1);
        assert_eq!(status.segments, 0);
        assert!(!status.has_frame);
        assert_eq!(status.detection, None);

        store.publish(RgbImage::new(2, 2), Some(Point::new(5, 5)));
        let status = store.status();
        assert!(status.has_frame);
        assert_eq!(status.detection, Some(Point::new(5, 5)));
    }
}
