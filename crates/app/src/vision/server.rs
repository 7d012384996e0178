//! Actix Web server exposing the MJPEG feed and the control API.
//!
//! The server runs a single-worker Actix system on a dedicated thread, so every
//! stream and control handler interleaves on one executor. Stream loops only
//! read the store; control handlers mutate it through `ControlApi`.

use std::{io, time::Duration};

use actix_web::{
    App, HttpResponse, HttpServer, guard,
    http::header,
    middleware::DefaultHeaders,
    web::{self, Bytes},
};
use anyhow::{Context, Result};
use async_stream::stream;
use crossbeam_channel::Sender;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::{
    sync::oneshot,
    time::{Interval, MissedTickBehavior},
};
use tracing::{error, info, warn};

use crate::vision::{
    control::ControlApi,
    data::{ControlResponse, TokenRequest},
    encoding::{MJPEG_BOUNDARY, StreamEncoder},
    state::SharedStore,
    telemetry,
};

const INDEX_HTML: &str = r#"<!doctype html>
<html>
  <head><meta charset="utf-8"><title>videoserver</title></head>
  <body style="margin:0;background:#111;display:flex;justify-content:center">
    <img src="/video" alt="live feed" style="max-width:100%">
  </body>
</html>
"#;

/// Shared state backing HTTP handlers.
pub(crate) struct ServerState {
    pub(crate) store: SharedStore,
    pub(crate) control: ControlApi,
    pub(crate) encoder: StreamEncoder,
    pub(crate) stream_interval: Duration,
    pub(crate) metrics: Option<&'static PrometheusHandle>,
}

#[derive(Default)]
/// Handle for the server thread.
pub(crate) struct PreviewServer {
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl PreviewServer {
    /// Stop the server without draining open streams and wait for its thread.
    pub(crate) fn stop(self) {
        if let Some(tx) = self.shutdown {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle {
            let _ = handle.join();
        }
    }
}

/// Spawn the server thread. Its final result is sent on `exit_tx`, whether it
/// failed to bind or was stopped.
pub(crate) fn spawn_preview_server(
    state: ServerState,
    bind: (String, u16),
    exit_tx: Sender<io::Result<()>>,
) -> Result<PreviewServer> {
    let data = web::Data::new(state);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handle = telemetry::spawn_thread("vision-server", move || {
        let result = actix_web::rt::System::new().block_on(async move {
            let server = HttpServer::new(move || {
                let data = data.clone();
                App::new()
                    .wrap(cors_headers())
                    .configure(move |cfg| routes(cfg, data))
            })
            .workers(1)
            .disable_signals()
            .bind(bind)?
            .run();

            let srv_handle = server.handle();
            actix_web::rt::spawn(async move {
                let _ = shutdown_rx.await;
                srv_handle.stop(false).await;
            });

            server.await
        });
        if let Err(err) = &result {
            error!("HTTP server error: {err}");
        }
        let _ = exit_tx.send(result);
    })
    .context("Failed to spawn preview server thread")?;

    Ok(PreviewServer {
        shutdown: Some(shutdown_tx),
        handle: Some(handle),
    })
}

/// Permissive CORS headers added to every response.
pub(crate) fn cors_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .add((header::ACCESS_CONTROL_ALLOW_HEADERS, "*"))
        .add((header::ACCESS_CONTROL_ALLOW_METHODS, "*"))
        .add((header::ACCESS_CONTROL_EXPOSE_HEADERS, "Content-Type"))
}

pub(crate) fn routes(cfg: &mut web::ServiceConfig, data: web::Data<ServerState>) {
    cfg.app_data(data)
        .app_data(web::JsonConfig::default().content_type_required(false))
        // Registered first so preflights never hit a method-restricted resource.
        .service(
            web::resource("/{tail:.*}")
                .guard(guard::Options())
                .to(preflight),
        )
        .route("/", web::get().to(index_route))
        .route("/video", web::get().to(stream_handler))
        .route("/stream.mjpg", web::get().to(stream_handler))
        .route("/clear_canvas", web::post().to(clear_canvas))
        .route("/start_line", web::post().to(start_line))
        .route("/stop_line", web::post().to(stop_line))
        .route("/get_spot_face_coords", web::get().to(object_coords))
        .route("/status", web::get().to(status_handler))
        .route("/metrics", web::get().to(metrics_handler));
}

async fn preflight() -> HttpResponse {
    HttpResponse::NoContent()
        .insert_header((header::ACCESS_CONTROL_MAX_AGE, "600"))
        .finish()
}

async fn index_route() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(INDEX_HTML)
}

async fn clear_canvas(
    state: web::Data<ServerState>,
    body: web::Json<TokenRequest>,
) -> HttpResponse {
    HttpResponse::Ok().json(ControlResponse::from(
        state.control.clear_canvas(&body.token),
    ))
}

async fn start_line(state: web::Data<ServerState>, body: web::Json<TokenRequest>) -> HttpResponse {
    HttpResponse::Ok().json(ControlResponse::from(state.control.start_line(&body.token)))
}

async fn stop_line(state: web::Data<ServerState>, body: web::Json<TokenRequest>) -> HttpResponse {
    HttpResponse::Ok().json(ControlResponse::from(state.control.stop_line(&body.token)))
}

async fn object_coords(
    state: web::Data<ServerState>,
    body: web::Json<TokenRequest>,
) -> HttpResponse {
    HttpResponse::Ok().json(ControlResponse::from(
        state.control.object_position(&body.token),
    ))
}

async fn status_handler(state: web::Data<ServerState>) -> HttpResponse {
    HttpResponse::Ok().json(state.store.status())
}

async fn metrics_handler(state: web::Data<ServerState>) -> HttpResponse {
    match state.metrics {
        Some(handle) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(telemetry::render_metrics(handle)),
        None => HttpResponse::ServiceUnavailable().body("metrics recorder unavailable"),
    }
}

/// Stream the annotated feed as multipart JPEG parts.
///
/// Each iteration re-reads whatever frame is currently published, so a
/// stalled capture loop keeps repeating its last frame.
async fn stream_handler(state: web::Data<ServerState>) -> HttpResponse {
    let state = state.into_inner();
    let stream = stream! {
        let _client = StreamClient::connect();
        let mut pacing = pacing_interval(state.stream_interval);
        loop {
            match pacing.as_mut() {
                Some(interval) => {
                    interval.tick().await;
                }
                None => tokio::task::yield_now().await,
            }

            let frame = match state.store.latest().frame {
                Some(frame) => frame,
                None => continue,
            };
            match state.encoder.stream_part(&frame) {
                Ok(part) => {
                    yield Ok::<Bytes, actix_web::Error>(part);
                }
                Err(err) => warn!("Skipping stream frame: {err}"),
            }
        }
    };

    HttpResponse::Ok()
        .append_header((header::CACHE_CONTROL, "no-cache"))
        .content_type(format!(
            "multipart/x-mixed-replace; boundary={MJPEG_BOUNDARY}"
        ))
        .streaming(stream)
}

fn pacing_interval(period: Duration) -> Option<Interval> {
    if period.is_zero() {
        return None;
    }
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    Some(interval)
}

/// Tracks connected stream clients for the lifetime of a stream.
struct StreamClient;

impl StreamClient {
    fn connect() -> Self {
        metrics::gauge!("videoserver_stream_clients").increment(1.0);
        info!("Stream client connected");
        Self
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        metrics::gauge!("videoserver_stream_clients").decrement(1.0);
        info!("Stream client disconnected");
    }
}
