//! Request pipeline: from raw request to encoded response.
//!
//! A request moves through a fixed sequence of states. Any state can fail;
//! failure is terminal and carries the error that decides the status code.
//!
//! ```text
//! Parsing ──► Decoding ──► CropApplying ──► FilterApplying ──► Responding (200)
//!    │            │             │                 │
//!    └────────────┴─────────────┴─────────────────┴──► Failed (204 / 400 / 500)
//! ```
//!
//! | State | Checks | Failure |
//! |---|---|---|
//! | Parsing | method, path shape, body size, crop rectangle | 400 |
//! | Decoding | body is an image | 400 (bad data) / 500 (codec fault) |
//! | CropApplying | rectangle overlaps the image | 204 (no overlap) / 400 (zero size) / 500 |
//! | FilterApplying | filter name and argument | 400 / 500 |
//! | Responding | encode | never: an encode failure still answers 200 |
//!
//! The filter name is only resolved after the crop, so a rectangle that
//! misses the image answers 204 even when the filter name is bad.
//!
//! The pipeline is transport-agnostic: it takes an [`InboundRequest`] of
//! borrowed parts and returns a [`Response`]. The HTTP layer in
//! [`server`](crate::server) and the `process` CLI command both drive it.

use crate::config::ServerConfig;
use crate::imaging::{
    Bitmap, CodecError, CropClamp, CropError, CropRect, Filter, ImageCodec, LosslessFormat,
    apply_filter, crop,
};
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Largest accepted request body, in bytes.
pub const MAX_CONTENT_LENGTH: u64 = 102_400;

/// Content type of every response.
pub const RESPONSE_CONTENT_TYPE: &str = "application/octet-stream";

/// First path segment of a processing request.
const PROCESS_SEGMENT: &str = "process";

/// Response status. Only the four codes the pipeline can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    NoContent,
    BadRequest,
    InternalServerError,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::NoContent => 204,
            Status::BadRequest => 400,
            Status::InternalServerError => 500,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::NoContent => "No Content",
            Status::BadRequest => "Bad Request",
            Status::InternalServerError => "Internal Server Error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Pipeline state names, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Parsing,
    Decoding,
    CropApplying,
    FilterApplying,
    Responding,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Malformed method, path, body size, rectangle, or filter.
    #[error("invalid request: {0}")]
    Validation(String),
    /// The crop rectangle does not overlap the image.
    #[error("crop rectangle does not overlap the image")]
    Geometry,
    #[error("cannot decode image: {0}")]
    Decode(#[source] CodecError),
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl PipelineError {
    pub fn status(&self) -> Status {
        match self {
            PipelineError::Validation(_) => Status::BadRequest,
            PipelineError::Geometry => Status::NoContent,
            PipelineError::Decode(e) if e.is_client_error() => Status::BadRequest,
            PipelineError::Decode(_) | PipelineError::Unexpected(_) => {
                Status::InternalServerError
            }
        }
    }
}

/// The parts of an inbound request the pipeline looks at.
#[derive(Debug, Clone, Copy)]
pub struct InboundRequest<'a> {
    pub method: &'a str,
    /// Path without query string.
    pub path: &'a str,
    /// Declared `Content-Length`, if any.
    pub content_length: Option<u64>,
    pub body: &'a [u8],
}

/// A validated processing request: where to crop, which filter to run.
///
/// The filter name is kept as text until the filter stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRequest {
    pub rect: CropRect,
    pub filter_name: String,
}

impl FilterRequest {
    /// Resolve the filter name (and its argument, for `threshold(N)`).
    pub fn filter(&self) -> Result<Filter, PipelineError> {
        self.filter_name
            .parse()
            .map_err(|e| PipelineError::Validation(format!("{e}")))
    }
}

/// Finished response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Response {
    /// Status only, no body.
    pub fn empty(status: Status) -> Self {
        Self {
            status,
            content_type: RESPONSE_CONTENT_TYPE,
            body: Vec::new(),
        }
    }
}

/// Tunables for [`RequestPipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub max_body_bytes: u64,
    pub output_format: LosslessFormat,
    pub crop_clamp: CropClamp,
}

impl PipelineOptions {
    /// Build options from the loaded server config.
    pub fn from_server_config(config: &ServerConfig) -> Self {
        Self {
            max_body_bytes: config.limits.max_body_bytes,
            output_format: config.imaging.output_format,
            crop_clamp: config.imaging.crop_clamp,
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_body_bytes: MAX_CONTENT_LENGTH,
            output_format: LosslessFormat::default(),
            crop_clamp: CropClamp::default(),
        }
    }
}

/// Split a URL path into segments the way `Uri.Segments` does: every segment
/// keeps its trailing `/`, and a leading `/` is a segment on its own.
///
/// `/process/sepia/1,2,3,4` → `["/", "process/", "sepia/", "1,2,3,4"]`
pub fn url_segments(path: &str) -> Vec<&str> {
    path.split_inclusive('/').collect()
}

/// The Parsing state: method, path, body size and crop rectangle.
pub fn parse_request(
    request: &InboundRequest<'_>,
    max_body_bytes: u64,
) -> Result<FilterRequest, PipelineError> {
    if !request.method.eq_ignore_ascii_case("POST") {
        return Err(PipelineError::Validation(format!(
            "method {} not allowed",
            request.method
        )));
    }

    let segments = url_segments(request.path);
    if segments.len() != 4 {
        return Err(PipelineError::Validation(format!(
            "expected /process/<filter>/<x,y,w,h>, got {}",
            request.path
        )));
    }

    let declared = request.content_length.unwrap_or(0);
    if declared > max_body_bytes || request.body.len() as u64 > max_body_bytes {
        return Err(PipelineError::Validation(format!(
            "body exceeds {max_body_bytes} bytes"
        )));
    }

    let segments: Vec<&str> = segments.iter().map(|s| s.trim_matches('/')).collect();
    if !segments[1].eq_ignore_ascii_case(PROCESS_SEGMENT) {
        return Err(PipelineError::Validation(format!(
            "unknown endpoint {}",
            segments[1]
        )));
    }

    let rect: CropRect = segments[3]
        .parse()
        .map_err(|e| PipelineError::Validation(format!("{e}")))?;

    Ok(FilterRequest {
        rect,
        filter_name: segments[2].to_string(),
    })
}

/// Pipeline states. Each non-terminal state owns what the next one needs.
enum State<'r> {
    Parsing(&'r InboundRequest<'r>),
    Decoding(FilterRequest, &'r [u8]),
    CropApplying(FilterRequest, Bitmap),
    FilterApplying(FilterRequest, Bitmap),
    Responding(Bitmap),
    Failed(PipelineError),
}

impl State<'_> {
    fn stage(&self) -> Option<Stage> {
        match self {
            State::Parsing(_) => Some(Stage::Parsing),
            State::Decoding(..) => Some(Stage::Decoding),
            State::CropApplying(..) => Some(Stage::CropApplying),
            State::FilterApplying(..) => Some(Stage::FilterApplying),
            State::Responding(_) => Some(Stage::Responding),
            State::Failed(_) => None,
        }
    }
}

/// Drives one request through parse → decode → crop → filter → encode.
///
/// Holds no per-request state; one pipeline serves every request.
pub struct RequestPipeline<C> {
    codec: C,
    options: PipelineOptions,
}

impl<C: ImageCodec> RequestPipeline<C> {
    pub fn new(codec: C, options: PipelineOptions) -> Self {
        Self { codec, options }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run a request to completion. Never fails: every error becomes a status.
    pub fn handle(&self, request: &InboundRequest<'_>) -> Response {
        let mut state = State::Parsing(request);
        let mut stage = Stage::Parsing;

        loop {
            if let Some(current) = state.stage() {
                stage = current;
            }
            state = match state {
                State::Parsing(req) => match parse_request(req, self.options.max_body_bytes) {
                    Ok(parsed) => State::Decoding(parsed, req.body),
                    Err(e) => State::Failed(e),
                },
                State::Decoding(parsed, body) => match self.codec.decode(body) {
                    Ok(image) => State::CropApplying(parsed, image),
                    Err(e) => State::Failed(PipelineError::Decode(e)),
                },
                State::CropApplying(parsed, image) => {
                    match crop(image, parsed.rect, self.options.crop_clamp) {
                        Ok(cropped) => State::FilterApplying(parsed, cropped),
                        Err(e) => State::Failed(crop_failure(e)),
                    }
                }
                State::FilterApplying(parsed, mut image) => {
                    match parsed.filter().and_then(|filter| {
                        apply_filter(&mut image, filter)
                            .map_err(|e| PipelineError::Unexpected(e.to_string()))
                    }) {
                        Ok(()) => State::Responding(image),
                        Err(e) => State::Failed(e),
                    }
                }
                State::Responding(image) => return self.respond(&image),
                State::Failed(error) => {
                    let status = error.status();
                    debug!(?stage, %status, %error, "request failed");
                    return Response::empty(status);
                }
            };
        }
    }

    /// Encode the result. An encode failure is logged and leaves the body empty.
    fn respond(&self, image: &Bitmap) -> Response {
        let mut response = Response::empty(Status::Ok);
        match self.codec.encode(image, self.options.output_format) {
            Ok(bytes) => response.body = bytes,
            Err(e) => warn!(error = %e, "encoding response failed, sending empty body"),
        }
        debug!(
            width = image.width(),
            height = image.height(),
            bytes = response.body.len(),
            "request processed"
        );
        response
    }
}

/// Run a file through the pipeline as if it were `POST`ed to
/// `/process/<filter>/<rect>`. Only reading the file can fail.
pub fn process_file<C: ImageCodec>(
    pipeline: &RequestPipeline<C>,
    input: &Path,
    filter: &str,
    rect: &str,
) -> std::io::Result<Response> {
    let body = fs::read(input)?;
    let path = format!("/{PROCESS_SEGMENT}/{filter}/{rect}");
    Ok(pipeline.handle(&InboundRequest {
        method: "POST",
        path: &path,
        content_length: Some(body.len() as u64),
        body: &body,
    }))
}

fn crop_failure(error: CropError) -> PipelineError {
    match error {
        CropError::OutOfRange => PipelineError::Geometry,
        CropError::EmptyRegion => PipelineError::Validation(error.to_string()),
        CropError::Buffer(e) => PipelineError::Unexpected(e.to_string()),
    }
}
