//! Image codec trait and shared error type.
//!
//! The [`ImageCodec`] trait is the boundary between encoded image bytes and
//! [`Bitmap`] storage. The request pipeline only ever talks to this trait.
//!
//! The production implementation is
//! [`RustCodec`](super::rust_codec::RustCodec), built on the `image` crate.

use super::bitmap::Bitmap;
use super::params::LosslessFormat;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    /// The input bytes are not a well-formed image.
    #[error("Malformed image: {0}")]
    Malformed(String),
    /// The input is an image, but in a format or variant that cannot be decoded.
    #[error("Unsupported image: {0}")]
    Unsupported(String),
    /// Anything else: resource limits, encoder failures, I/O on the output side.
    #[error("Codec failed: {0}")]
    Failed(String),
}

impl CodecError {
    /// Whether the error is the caller's fault (bad input) rather than ours.
    pub fn is_client_error(&self) -> bool {
        matches!(self, CodecError::Malformed(_) | CodecError::Unsupported(_))
    }
}

/// Trait for image codecs.
///
/// `Send + Sync` so one codec can be shared by every request handler.
pub trait ImageCodec: Send + Sync {
    /// Decode encoded image bytes into a bitmap.
    fn decode(&self, bytes: &[u8]) -> Result<Bitmap, CodecError>;

    /// Encode a bitmap in the given lossless format.
    fn encode(&self, image: &Bitmap, format: LosslessFormat) -> Result<Vec<u8>, CodecError>;
}
