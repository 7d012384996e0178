//! Supervisor wiring the capture thread, the HTTP server thread, and Ctrl+C
//! handling together.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use anyhow::{Context, Result, anyhow};
use tracing::{info, warn};

use crate::vision::{
    VisionConfig,
    annotation::AnnotationEngine,
    capture::{CaptureLoop, report_open_failure, spawn_capture_thread},
    control::ControlApi,
    detector::ColorBlobDetector,
    encoding::StreamEncoder,
    server::{ServerState, spawn_preview_server},
    state::SharedState,
    telemetry,
};

/// Run capture and serving until Ctrl+C or the server exits.
///
/// A capture failure does not end the run; the server keeps streaming the
/// last published frame.
pub fn run(config: VisionConfig) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler({
        let shutdown = shutdown.clone();
        move || {
            shutdown.store(true, Ordering::SeqCst);
            let _ = shutdown_tx.try_send(());
        }
    })
    .context("Failed to install Ctrl+C handler")?;

    let prometheus = telemetry::init_metrics_recorder();
    let pipeline_span = tracing::info_span!(
        "vision.pipeline",
        source = %config.source_uri,
        source_kind = ?config.source_kind,
        width = config.width,
        height = config.height,
        port = config.port
    );
    let _pipeline_guard = pipeline_span.enter();

    let store = SharedState::new();

    let capture_handle =
        match video_ingest::open_source(&config.source_uri, (config.width, config.height)) {
            Ok(source) => {
                let capture = CaptureLoop {
                    source,
                    detector: ColorBlobDetector::new(
                        config.target_color,
                        config.color_tolerance,
                        config.min_blob_pixels,
                    ),
                    engine: AnnotationEngine::default().with_marker(config.show_marker),
                    store: store.clone(),
                };
                Some(
                    spawn_capture_thread(capture, shutdown.clone())
                        .context("Failed to spawn capture thread")?,
                )
            }
            Err(err) => {
                report_open_failure(&store, &err);
                None
            }
        };

    let (server_exit_tx, server_exit_rx) = crossbeam_channel::bounded(1);
    let server = spawn_preview_server(
        ServerState {
            store: store.clone(),
            control: ControlApi::new(store.clone(), config.token.clone()),
            encoder: StreamEncoder::new(config.reduce_percent, config.jpeg_quality),
            stream_interval: config.stream_interval,
            metrics: prometheus,
        },
        (config.host.clone(), config.port),
        server_exit_tx,
    )
    .context("Failed to start preview server")?;

    info!(
        "Streaming at http://{}:{}/video (Ctrl+C to stop)",
        config.host, config.port
    );

    let server_result = crossbeam_channel::select! {
        recv(shutdown_rx) -> _ => {
            info!("Shutdown requested");
            Ok(())
        }
        recv(server_exit_rx) -> result => match result {
            Ok(Ok(())) => {
                warn!("Preview server exited");
                Ok(())
            }
            Ok(Err(err)) => Err(anyhow!(err)),
            Err(_) => Err(anyhow!("preview server thread vanished")),
        },
    };

    shutdown.store(true, Ordering::SeqCst);
    server.stop();

    if let Some(handle) = capture_handle {
        if handle.is_finished() {
            let _ = handle.join();
        } else {
            // Likely blocked on camera I/O; process exit reclaims it.
            warn!("Capture thread still busy; not waiting for it");
        }
    }

    server_result.context("Preview server failed")
}
