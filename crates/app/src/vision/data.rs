use serde::{Deserialize, Serialize};

use crate::vision::{control::ControlError, points::Point};

/// Body accepted by every control endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenRequest {
    pub(crate) token: String,
}

/// `{"status": "ok"}`, optionally with coordinates, or
/// `{"status": "error", "message": ...}`.
#[derive(Debug, Serialize)]
pub(crate) struct ControlResponse {
    pub(crate) status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) coords: Option<Point>,
}

impl ControlResponse {
    pub(crate) fn ok() -> Self {
        Self {
            status: "ok",
            message: None,
            coords: None,
        }
    }

    pub(crate) fn coords(position: Point) -> Self {
        Self {
            coords: Some(position),
            ..Self::ok()
        }
    }

    pub(crate) fn error(err: &ControlError) -> Self {
        Self {
            status: "error",
            message: Some(err.to_string()),
            coords: None,
        }
    }
}

impl From<Result<(), ControlError>> for ControlResponse {
    fn from(result: Result<(), ControlError>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(err) => Self::error(&err),
        }
    }
}

impl From<Result<Point, ControlError>> for ControlResponse {
    fn from(result: Result<Point, ControlError>) -> Self {
        match result {
            Ok(position) => Self::coords(position),
            Err(err) => Self::error(&err),
        }
    }
}
