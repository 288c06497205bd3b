//! Pure Rust codec on top of the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (PNG, JPEG, BMP, GIF, TIFF, WebP) | `image::load_from_memory` |
//! | Encode (PNG, BMP, TIFF) | `image::DynamicImage::write_to` |
//!
//! ## Format mapping
//!
//! | Decoded color type | Bitmap format |
//! |---|---|
//! | 8- or 16-bit luminance | [`PixelFormat::Gray8`] (filters leave it alone) |
//! | anything with alpha, luminance + alpha included | [`PixelFormat::Argb32`] |
//! | anything else | [`PixelFormat::Rgb24`] |
//!
//! The `image` crate hands out RGB(A) byte order; bitmaps store B, G, R(, A),
//! so red and blue are swapped on the way in and again on the way out.
//!
//! Luminance with alpha is expanded to [`PixelFormat::Argb32`] because
//! [`PixelFormat::Gray8`] has nowhere to keep the alpha channel. Filters and
//! crop therefore run on it like on any color image.

use super::bitmap::{Bitmap, PixelFormat};
use super::codec::{CodecError, ImageCodec};
use super::params::LosslessFormat;
use image::{DynamicImage, GrayImage, ImageError, ImageFormat, RgbImage, RgbaImage};
use std::io::Cursor;

/// Codec using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustCodec;

impl RustCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn map_decode_error(error: ImageError) -> CodecError {
    match error {
        // Truncated input surfaces as an I/O error from the in-memory reader
        ImageError::Decoding(_) | ImageError::IoError(_) => {
            CodecError::Malformed(error.to_string())
        }
        ImageError::Unsupported(_) => CodecError::Unsupported(error.to_string()),
        other => CodecError::Failed(other.to_string()),
    }
}

/// Swap the first and third byte of every `pixel_size` chunk (RGB ⇄ BGR).
fn swap_red_blue(bytes: &mut [u8], pixel_size: usize) {
    for pixel in bytes.chunks_exact_mut(pixel_size) {
        pixel.swap(0, 2);
    }
}

fn to_bitmap(image: DynamicImage) -> Result<Bitmap, CodecError> {
    let (width, height) = (image.width(), image.height());
    let (format, mut packed) = match image {
        DynamicImage::ImageLuma8(gray) => (PixelFormat::Gray8, gray.into_raw()),
        gray @ DynamicImage::ImageLuma16(_) => (PixelFormat::Gray8, gray.into_luma8().into_raw()),
        other if other.color().has_alpha() => (PixelFormat::Argb32, other.into_rgba8().into_raw()),
        other => (PixelFormat::Rgb24, other.into_rgb8().into_raw()),
    };
    if format.is_supported() {
        swap_red_blue(&mut packed, format.bytes_per_pixel());
    }
    Bitmap::from_packed(width, height, format, &packed)
        .ok_or_else(|| CodecError::Malformed(format!("image has no pixels ({width}x{height})")))
}

fn to_dynamic(bitmap: &Bitmap) -> Result<DynamicImage, CodecError> {
    let (width, height) = (bitmap.width(), bitmap.height());
    let mut packed = bitmap.to_packed();
    let dynamic = match bitmap.format() {
        PixelFormat::Rgb24 => {
            swap_red_blue(&mut packed, 3);
            RgbImage::from_raw(width, height, packed).map(DynamicImage::ImageRgb8)
        }
        PixelFormat::Argb32 => {
            swap_red_blue(&mut packed, 4);
            RgbaImage::from_raw(width, height, packed).map(DynamicImage::ImageRgba8)
        }
        PixelFormat::Gray8 => {
            GrayImage::from_raw(width, height, packed).map(DynamicImage::ImageLuma8)
        }
    };
    dynamic.ok_or_else(|| CodecError::Failed("Failed to create image from bitmap data".into()))
}

fn image_format(format: LosslessFormat) -> ImageFormat {
    match format {
        LosslessFormat::Png => ImageFormat::Png,
        LosslessFormat::Bmp => ImageFormat::Bmp,
        LosslessFormat::Tiff => ImageFormat::Tiff,
    }
}

impl ImageCodec for RustCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Bitmap, CodecError> {
        let image = image::load_from_memory(bytes).map_err(map_decode_error)?;
        to_bitmap(image)
    }

    fn encode(&self, image: &Bitmap, format: LosslessFormat) -> Result<Vec<u8>, CodecError> {
        let dynamic = to_dynamic(image)?;
        let mut out = Cursor::new(Vec::new());
        dynamic
            .write_to(&mut out, image_format(format))
            .map_err(|e| CodecError::Failed(format!("{format:?} encode failed: {e}")))?;
        Ok(out.into_inner())
    }
}
