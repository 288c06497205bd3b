//! HTTP transport.
//!
//! An axum router with two routes:
//!
//! | Route | Handler |
//! |---|---|
//! | `GET /healthz` | [`LoadSnapshot`](crate::monitor::LoadSnapshot) as JSON |
//! | anything else | the [`RequestPipeline`] |
//!
//! The pipeline does its own method and path validation, so every request
//! that is not a health check goes to it, including `POST /healthz`. The body
//! is collected in full (up to one byte past the limit) before the pipeline
//! runs on the blocking pool.

use crate::config::{ConfigError, ServerConfig};
use crate::imaging::RustCodec;
use crate::monitor::{LoadMonitor, LoadState};
use crate::request::{InboundRequest, PipelineOptions, RequestPipeline, Response, Status};
use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::IntoResponse;
use axum::routing::get;
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RequestPipeline<RustCodec>>,
    pub load: Arc<LoadState>,
}

impl AppState {
    pub fn new(pipeline: RequestPipeline<RustCodec>, load: Arc<LoadState>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            load,
        }
    }

    /// State for `config`, with a fresh [`LoadState`].
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            RequestPipeline::new(RustCodec::new(), PipelineOptions::from_server_config(config)),
            Arc::new(LoadState::new(&config.monitor)),
        )
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz).fallback(process))
        .fallback(process)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.load.snapshot())
}

async fn process(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> axum::response::Response {
    let limit = state.pipeline.options().max_body_bytes;
    let content_length = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok());

    // One byte past the limit is enough for the pipeline to reject it
    let read_limit = usize::try_from(limit.saturating_add(1)).unwrap_or(usize::MAX);
    let body = match axum::body::to_bytes(body, read_limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(error = %e, "reading request body failed");
            return into_http(Response::empty(Status::BadRequest));
        }
    };

    let pipeline = state.pipeline.clone();
    let path = uri.path().to_string();
    let joined = tokio::task::spawn_blocking(move || {
        pipeline.handle(&InboundRequest {
            method: method.as_str(),
            path: &path,
            content_length,
            body: &body,
        })
    })
    .await;

    let response = match joined {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "request pipeline panicked");
            Response::empty(Status::InternalServerError)
        }
    };
    into_http(response)
}

fn status_code(status: Status) -> StatusCode {
    match status {
        Status::Ok => StatusCode::OK,
        Status::NoContent => StatusCode::NO_CONTENT,
        Status::BadRequest => StatusCode::BAD_REQUEST,
        Status::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn into_http(response: Response) -> axum::response::Response {
    (
        status_code(response.status),
        [(header::CONTENT_TYPE, response.content_type)],
        response.body,
    )
        .into_response()
}

/// Bind, start the load monitor, and serve until Ctrl-C.
pub async fn serve(config: ServerConfig) -> Result<(), ServerError> {
    config.validate()?;

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    let local = listener.local_addr()?;
    let state = AppState::from_config(&config);

    let _monitor = config
        .monitor
        .enabled
        .then(|| LoadMonitor::new(state.load.clone(), local, &config.monitor).start());

    info!(
        rayon_threads = rayon::current_num_threads(),
        max_body_bytes = config.limits.max_body_bytes,
        output_format = ?config.imaging.output_format,
        crop_clamp = ?config.imaging.crop_clamp,
        "listening on http://{local}"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
}
