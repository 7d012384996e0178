//! Token-guarded operations on the annotation state.

use thiserror::Error;
use tracing::{debug, warn};

use crate::vision::{
    points::Point,
    state::{AnnotationState, SharedStore},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum ControlError {
    #[error("Invalid token")]
    Unauthorized,
}

pub(crate) struct ControlApi {
    store: SharedStore,
    token: String,
}

impl ControlApi {
    pub(crate) fn new(store: SharedStore, token: impl Into<String>) -> Self {
        Self {
            store,
            token: token.into(),
        }
    }

    fn authorize(&self, op: &'static str, token: &str) -> Result<(), ControlError> {
        if token == self.token {
            metrics::counter!("videoserver_control_requests_total", "op" => op, "outcome" => "ok")
                .increment(1);
            Ok(())
        } else {
            warn!(op, "Rejected control request with invalid token");
            metrics::counter!(
                "videoserver_control_requests_total",
                "op" => op,
                "outcome" => "unauthorized"
            )
            .increment(1);
            Err(ControlError::Unauthorized)
        }
    }

    fn mutate(
        &self,
        op: &'static str,
        token: &str,
        f: impl FnOnce(&mut AnnotationState),
    ) -> Result<(), ControlError> {
        self.authorize(op, token)?;
        self.store.with_annotation(f);
        debug!(op, "Annotation state updated");
        Ok(())
    }

    /// Drop every polyline. Drawing mode is unchanged.
    pub(crate) fn clear_canvas(&self, token: &str) -> Result<(), ControlError> {
        self.mutate("clear_canvas", token, AnnotationState::clear)
    }

    /// Begin a fresh polyline, discarding any in progress.
    pub(crate) fn start_line(&self, token: &str) -> Result<(), ControlError> {
        self.mutate("start_line", token, AnnotationState::start_line)
    }

    /// Finish the active polyline and leave drawing mode.
    pub(crate) fn stop_line(&self, token: &str) -> Result<(), ControlError> {
        self.mutate("stop_line", token, AnnotationState::stop_line)
    }

    /// Last known object position; the origin before any detection.
    pub(crate) fn object_position(&self, token: &str) -> Result<Point, ControlError> {
        self.authorize("get_object_position", token)?;
        Ok(self.store.last_position())
    }
}

#[cfg(test)]
mod tests {
    use image::RgbImage;

    use super::*;
    use crate::vision::state::SharedState;

    fn api() -> ControlApi {
        ControlApi::new(SharedState::new(), "abc")
    }

    #[test]
    fn wrong_token_changes_nothing() {
        let api = api();
        api.start_line("abc").unwrap();
        api.store.record_detection(Some(Point::new(1, 1)));

        assert_eq!(api.clear_canvas("nope"), Err(ControlError::Unauthorized));
        assert_eq!(api.stop_line("ABC"), Err(ControlError::Unauthorized));
        assert_eq!(api.start_line(""), Err(ControlError::Unauthorized));
        assert_eq!(api.object_position("abc "), Err(ControlError::Unauthorized));

        let state = api.store.annotation_snapshot();
        assert!(state.drawing);
        assert_eq!(state.active.len(), 1);
        assert!(state.segments.is_empty());
    }

    #[test]
    fn start_stop_clear_cycle() {
        let api = api();
        api.start_line("abc").unwrap();
        api.store.record_detection(Some(Point::new(1, 1)));
        api.store.record_detection(Some(Point::new(2, 2)));
        api.stop_line("abc").unwrap();

        let state = api.store.annotation_snapshot();
        assert_eq!(state.segments.len(), 1);
        assert_eq!(state.segments[0].len(), 2);
        assert!(!state.drawing);

        api.clear_canvas("abc").unwrap();
        let state = api.store.annotation_snapshot();
        assert!(state.segments.is_empty());
        assert!(state.active.is_empty());
    }

    #[test]
    fn clear_while_drawing_stays_in_drawing_mode() {
        let api = api();
        api.start_line("abc").unwrap();
        api.clear_canvas("abc").unwrap();
        assert!(api.store.annotation_snapshot().drawing);
    }

    #[test]
    fn object_position_reports_last_detection() {
        let api = api();
        assert_eq!(api.object_position("abc"), Ok(Point::ORIGIN));
        api.store
            .publish(RgbImage::new(2, 2), Some(Point::new(7, 8)));
        api.store.publish(RgbImage::new(2, 2), None);
        assert_eq!(api.object_position("abc"), Ok(Point::new(7, 8)));
    }
}
