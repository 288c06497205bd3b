//! # Image Transformer
//!
//! A small HTTP service that crops an uploaded image and applies one pixel
//! filter to the result. One request in, one encoded image out:
//!
//! ```text
//! POST /process/<filter>/<x>,<y>,<width>,<height>     (image in the body)
//! ```
//!
//! `<filter>` is `grayscale`, `sepia` or `threshold(N)` with `N` in `0..=100`.
//! The rectangle is four signed integers; a negative width or height extends
//! the rectangle left or up from `x`/`y`.
//!
//! # Architecture: Request Pipeline
//!
//! Every request walks the same five states, each of which can fail:
//!
//! ```text
//! Parsing → Decoding → CropApplying → FilterApplying → Responding
//! ```
//!
//! The pipeline in [`request`] knows nothing about HTTP. The axum layer in
//! [`server`] hands it the method, path, declared length and body, and maps
//! the resulting status back to a response. The `process` CLI command drives
//! the same pipeline on files, so everything the server does can be tried
//! without a network.
//!
//! | Status | Meaning |
//! |--------|---------|
//! | 200 | cropped, filtered and encoded (body may be empty if encoding failed) |
//! | 204 | the crop rectangle does not overlap the image |
//! | 400 | bad method, path, rectangle, filter, body size, or image data |
//! | 500 | anything unexpected |
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Bitmaps, scoped pixel buffers, the three filters, crop, and the codec |
//! | [`request`] | Request validation and the state machine that turns a request into a response |
//! | [`server`] | axum router, body collection, blocking-pool dispatch, `serve` |
//! | [`monitor`] | Background task that probes `/healthz` and tracks average latency |
//! | [`config`] | `config.toml` loading, merging over stock defaults, and validation |
//! | [`output`] | CLI output formatting for the `process` command |
//!
//! # Design Decisions
//!
//! ## Bottom-Up Memory Layout
//!
//! [`imaging::Bitmap`] stores pixels as blue, green, red (and alpha), with each
//! row padded to a multiple of four bytes. Filters address pixels through a
//! [`imaging::PixelBuffer`], which validates its rectangle once when it is
//! acquired and then hands out plain slices. Access is exclusive for the
//! buffer's lifetime because it holds a mutable borrow of the bitmap.
//!
//! ## Row-Parallel Filters
//!
//! Grayscale, sepia and threshold only ever look at one pixel at a time, so
//! rows are spread across the rayon pool. The result is identical to a
//! sequential pass. The pool size comes from `[processing] max_threads`.
//!
//! ## Lossless Output Only
//!
//! Responses are PNG by default (BMP and TIFF are configurable). A lossy
//! encoder would blur exactly the pixels the filters just computed.
//!
//! ## Crop Clamp Compatibility
//!
//! The right and bottom edges are clamped with `x + width > W - x` rather than
//! `x + width > W`, which can widen a rectangle that already fits. That is the
//! default; `crop_clamp = "strict"` switches to the plain rule.

pub mod config;
pub mod imaging;
pub mod monitor;
pub mod output;
pub mod request;
pub mod server;

#[cfg(test)]
pub(crate) mod test_helpers;
