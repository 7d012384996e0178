//! Capture loop: acquire → detect → annotate → publish, once per frame the
//! source delivers.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Instant,
};

use anyhow::Result;
use tracing::{debug, error, info, warn};
use video_ingest::{CaptureError, FrameSource};

use crate::vision::{
    annotation::{AnnotationEngine, frame_to_image},
    detector::Detector,
    points::Point,
    state::{CaptureState, SharedState, SharedStore},
    telemetry,
};

/// Why the capture loop stopped.
#[derive(Debug)]
pub(crate) enum CaptureOutcome {
    Shutdown,
    SourceFailed(CaptureError),
}

/// Everything the capture thread owns.
pub(crate) struct CaptureLoop<S, D> {
    pub(crate) source: S,
    pub(crate) detector: D,
    pub(crate) engine: AnnotationEngine,
    pub(crate) store: SharedStore,
}

impl<S: FrameSource, D: Detector> CaptureLoop<S, D> {
    /// Run one capture cycle and return the detection it published.
    pub(crate) fn cycle(&mut self) -> Result<Option<Point>, CaptureError> {
        let frame = self.source.read()?;
        let mut image = frame_to_image(&frame)?;
        let detection = self.detector.detect(&image);
        self.engine.apply(&self.store, &mut image, detection);
        self.store.publish(image, detection);
        Ok(detection)
    }

    /// Drive cycles until the source fails or `shutdown` is raised.
    pub(crate) fn run(mut self, shutdown: &AtomicBool) -> CaptureOutcome {
        self.store.set_capture_state(CaptureState::Running);
        info!("Capture loop running");

        let mut frame_number: u64 = 0;
        let outcome = loop {
            if shutdown.load(Ordering::Relaxed) {
                break CaptureOutcome::Shutdown;
            }

            let cycle_start = Instant::now();
            let span = tracing::debug_span!("capture.cycle", frame = frame_number);
            let result = span.in_scope(|| self.cycle());
            match result {
                Ok(detection) => {
                    frame_number = frame_number.wrapping_add(1);
                    metrics::counter!("videoserver_frames_captured_total").increment(1);
                    let hit = if detection.is_some() { "hit" } else { "miss" };
                    metrics::counter!("videoserver_detections_total", "result" => hit).increment(1);
                    metrics::histogram!("videoserver_capture_cycle_seconds")
                        .record(cycle_start.elapsed().as_secs_f64());
                    if frame_number % 300 == 0 {
                        debug!(frame = frame_number, ?detection, "Capture heartbeat");
                    }
                }
                Err(err) => break CaptureOutcome::SourceFailed(err),
            }
        };

        self.store.set_capture_state(CaptureState::Stopped);
        match &outcome {
            CaptureOutcome::Shutdown => info!(frames = frame_number, "Capture loop stopped"),
            CaptureOutcome::SourceFailed(CaptureError::EndOfStream) => {
                warn!(
                    frames = frame_number,
                    "Video source ended; serving last frame"
                )
            }
            CaptureOutcome::SourceFailed(err) => {
                error!(
                    frames = frame_number,
                    "Capture error: {err}; serving last frame"
                )
            }
        }
        outcome
    }
}

/// Spawn the capture thread. The store is marked `Stopped` when it exits.
pub(crate) fn spawn_capture_thread<S, D>(
    capture: CaptureLoop<S, D>,
    shutdown: Arc<AtomicBool>,
) -> io::Result<thread::JoinHandle<CaptureOutcome>>
where
    S: FrameSource + 'static,
    D: Detector + 'static,
{
    telemetry::spawn_thread("vision-capture", move || capture.run(&shutdown))
}

/// Mark the store stopped when the source could not even be opened.
pub(crate) fn report_open_failure(store: &SharedState, err: &CaptureError) {
    error!("Failed to open video source: {err}; serving without capture");
    store.set_capture_state(CaptureState::Stopped);
}
