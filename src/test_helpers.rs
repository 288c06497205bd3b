//! Shared test utilities for the image-transformer test suite.
//!
//! Provides bitmap fixture builders, pixel extractors, and encoded-image
//! helpers for tests that go through the codec.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let mut bitmap = solid(4, 4, PixelFormat::Rgb24, &[255, 0, 0]);
//! sepia(&mut bitmap).unwrap();
//! assert_eq!(pixel_at(&bitmap, 0, 0), vec![33, 42, 48]);
//! ```

use crate::imaging::{Bitmap, PixelFormat};
use image::DynamicImage;
use std::io::Cursor;

// =========================================================================
// Bitmap fixtures
// =========================================================================

/// A bitmap where every pixel holds `pixel` (storage byte order).
pub fn solid(width: u32, height: u32, format: PixelFormat, pixel: &[u8]) -> Bitmap {
    assert_eq!(pixel.len(), format.bytes_per_pixel(), "pixel size mismatch");
    let packed = pixel.repeat((width * height) as usize);
    Bitmap::from_packed(width, height, format, &packed).unwrap()
}

/// A bitmap whose bytes vary with position, so misplaced copies show up.
pub fn gradient(width: u32, height: u32, format: PixelFormat) -> Bitmap {
    let size = format.bytes_per_pixel();
    let mut packed = Vec::with_capacity((width * height) as usize * size);
    for y in 0..height {
        for x in 0..width {
            for channel in 0..size as u32 {
                packed.push(((x * 37 + y * 91 + channel * 53) % 256) as u8);
            }
        }
    }
    Bitmap::from_packed(width, height, format, &packed).unwrap()
}

// =========================================================================
// Pixel extraction
// =========================================================================

/// Every pixel in row-major order, one `Vec` per pixel.
pub fn pixels(bitmap: &Bitmap) -> Vec<Vec<u8>> {
    bitmap
        .to_packed()
        .chunks(bitmap.format().bytes_per_pixel())
        .map(<[u8]>::to_vec)
        .collect()
}

/// Bytes of the pixel at `(x, y)`. Panics when out of range.
pub fn pixel_at(bitmap: &Bitmap, x: u32, y: u32) -> Vec<u8> {
    assert!(
        x < bitmap.width() && y < bitmap.height(),
        "({x}, {y}) outside {}x{}",
        bitmap.width(),
        bitmap.height()
    );
    pixels(bitmap)[(y * bitmap.width() + x) as usize].clone()
}

// =========================================================================
// Encoded images
// =========================================================================

/// PNG-encode an `image` crate image.
pub fn encode_png(image: DynamicImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// A solid RGB PNG, `rgb` in the usual R, G, B order.
pub fn solid_png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    encode_png(DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        width,
        height,
        image::Rgb(rgb),
    )))
}
