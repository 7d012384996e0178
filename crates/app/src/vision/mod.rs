//! Live annotation pipeline: capture frames, detect the tracked object, draw
//! operator polylines, and serve the result over HTTP.
//!
//! - `config`: CLI configuration parsing.
//! - `pipeline`: Supervises the capture and server threads.
//! - `capture`: The acquire → detect → annotate → publish loop.
//! - `detector`: Detection seam and the colour-blob detector.
//! - `annotation`: Polyline recording and rendering.
//! - `points`: Points, gap markers, and the bounded polyline ring.
//! - `state`: The store shared by capture and serving.
//! - `control`: Token-guarded control operations.
//! - `encoding`: Stream frame reduction, JPEG, multipart framing.
//! - `server`: Actix Web endpoints.
//! - `telemetry`: Tracing and metrics setup.
//! - `data`: Request and response bodies.

pub use config::{VisionCliArgs, VisionConfig};
pub use pipeline::run;

mod annotation;
mod capture;
mod config;
mod control;
mod data;
mod detector;
mod encoding;
mod pipeline;
mod points;
mod server;
mod state;
pub(crate) mod telemetry;
