//! High-level image operations: the three pixel filters and crop.
//!
//! Every operation checks the pixel format first and returns the image
//! untouched when it is not [`Rgb24`](crate::imaging::PixelFormat::Rgb24) or
//! [`Argb32`](crate::imaging::PixelFormat::Argb32). That is not an error.
//!
//! Filters walk a [`PixelBuffer`] over the whole image, row by row, and only
//! ever write the B, G and R bytes of a pixel. Rows are independent, so they
//! are spread over the rayon pool.

use super::bitmap::Bitmap;
use super::calculations::{Geometry, intensity, resolve_crop, sepia as sepia_pixel};
use super::params::{CropClamp, CropRect, Filter, Threshold};
use super::pixel_buffer::{BufferError, PixelBuffer};
use rayon::prelude::*;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CropError {
    #[error("crop rectangle does not overlap the image")]
    OutOfRange,
    #[error("crop rectangle has zero width or height")]
    EmptyRegion,
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// Run `f` on the B, G, R(, A) bytes of every pixel.
fn for_each_pixel<F>(image: &mut Bitmap, f: F) -> Result<(), BufferError>
where
    F: Fn(&mut [u8]) + Send + Sync,
{
    if !image.format().is_supported() {
        return Ok(());
    }

    let mut buffer = PixelBuffer::whole(image)?;
    let pixel_size = buffer.pixel_size();
    buffer.par_rows_mut().for_each(|row| {
        for pixel in row.chunks_exact_mut(pixel_size) {
            f(pixel);
        }
    });
    buffer.release();
    Ok(())
}

/// Replace each pixel with its channel mean.
pub fn grayscale(image: &mut Bitmap) -> Result<(), BufferError> {
    for_each_pixel(image, |px| {
        let value = intensity(px[0], px[1], px[2]);
        px[..3].fill(value);
    })
}

/// White where the channel mean reaches `threshold`'s level, black elsewhere.
pub fn threshold(image: &mut Bitmap, threshold: Threshold) -> Result<(), BufferError> {
    let level = threshold.level();
    for_each_pixel(image, |px| {
        let value = if intensity(px[0], px[1], px[2]) >= level {
            255
        } else {
            0
        };
        px[..3].fill(value);
    })
}

/// Classic sepia tone.
pub fn sepia(image: &mut Bitmap) -> Result<(), BufferError> {
    for_each_pixel(image, |px| {
        let toned = sepia_pixel(px[0], px[1], px[2]);
        px[..3].copy_from_slice(&toned);
    })
}

/// Apply one [`Filter`] in place.
pub fn apply_filter(image: &mut Bitmap, filter: Filter) -> Result<(), BufferError> {
    match filter {
        Filter::Grayscale => grayscale(image),
        Filter::Sepia => sepia(image),
        Filter::Threshold(t) => threshold(image, t),
    }
}

/// Cut `rect` out of `image` into a newly allocated bitmap.
///
/// The input is consumed. On success it is replaced by the cropped copy; on
/// error it is dropped before the error is returned. Unsupported formats come
/// back unchanged. See [`resolve_crop`] for the geometry rules.
pub fn crop(image: Bitmap, rect: CropRect, clamp: CropClamp) -> Result<Bitmap, CropError> {
    if !image.format().is_supported() {
        return Ok(image);
    }

    let mut source = image;
    let region = resolve_crop(rect, (source.width(), source.height()), clamp).map_err(
        |geometry| match geometry {
            Geometry::OutOfRange => CropError::OutOfRange,
            Geometry::Empty => CropError::EmptyRegion,
        },
    )?;

    let mut cropped = Bitmap::new(region.width, region.height, source.format())
        .ok_or(CropError::EmptyRegion)?;
    {
        let src = PixelBuffer::acquire(
            &mut source,
            region.x,
            region.y,
            region.width,
            region.height,
        )?;
        let mut dst = PixelBuffer::whole(&mut cropped)?;
        // Whole pixels, alpha included
        for row in 0..src.height() {
            dst.row_mut(row).copy_from_slice(src.row(row));
        }
    }

    tracing::debug!(
        from_width = source.width(),
        from_height = source.height(),
        x = region.x,
        y = region.y,
        width = region.width,
        height = region.height,
        "cropped"
    );
    Ok(cropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::PixelFormat;
    use crate::test_helpers::{gradient, pixel_at, pixels, solid};

    const FORMATS: [PixelFormat; 2] = [PixelFormat::Rgb24, PixelFormat::Argb32];

    fn threshold_of(value: i64) -> Threshold {
        Threshold::new(value).unwrap()
    }

    // =========================================================================
    // filter tests
    // =========================================================================

    #[test]
    fn grayscale_sets_channels_to_mean() {
        let mut bitmap = solid(3, 3, PixelFormat::Argb32, &[10, 20, 40, 99]);
        grayscale(&mut bitmap).unwrap();
        assert!(pixels(&bitmap).iter().all(|px| px == &[23, 23, 23, 99]));
    }

    #[test]
    fn grayscale_is_idempotent() {
        for format in FORMATS {
            let mut once = gradient(17, 9, format);
            grayscale(&mut once).unwrap();
            let mut twice = once.clone();
            grayscale(&mut twice).unwrap();
            assert_eq!(once, twice, "{format:?}");
        }
    }

    #[test]
    fn filters_skip_unsupported_formats() {
        let original = solid(4, 4, PixelFormat::Gray8, &[200]);
        for filter in [
            Filter::Grayscale,
            Filter::Sepia,
            Filter::Threshold(threshold_of(0)),
        ] {
            let mut bitmap = original.clone();
            apply_filter(&mut bitmap, filter).unwrap();
            assert_eq!(bitmap, original, "{filter}");
        }
    }

    #[test]
    fn threshold_zero_turns_everything_white() {
        for format in FORMATS {
            let mut bitmap = gradient(13, 7, format);
            let alphas: Vec<u8> = pixels(&bitmap)
                .iter()
                .filter_map(|px| px.get(3).copied())
                .collect();

            threshold(&mut bitmap, threshold_of(0)).unwrap();

            let after = pixels(&bitmap);
            assert!(after.iter().all(|px| px[..3] == [255, 255, 255]), "{format:?}");
            let alphas_after: Vec<u8> = after.iter().filter_map(|px| px.get(3).copied()).collect();
            assert_eq!(alphas, alphas_after);
        }
    }

    #[test]
    fn threshold_hundred_needs_full_intensity() {
        let mut white = solid(2, 2, PixelFormat::Rgb24, &[255, 255, 255]);
        threshold(&mut white, threshold_of(100)).unwrap();
        assert_eq!(pixel_at(&white, 1, 1), vec![255, 255, 255]);

        let mut almost = solid(2, 2, PixelFormat::Rgb24, &[255, 255, 254]);
        threshold(&mut almost, threshold_of(100)).unwrap();
        assert_eq!(pixel_at(&almost, 1, 1), vec![0, 0, 0]);
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        // level for 50 is 127
        let mut at = solid(1, 1, PixelFormat::Rgb24, &[127, 127, 127]);
        threshold(&mut at, threshold_of(50)).unwrap();
        assert_eq!(pixel_at(&at, 0, 0), vec![255, 255, 255]);

        let mut below = solid(1, 1, PixelFormat::Rgb24, &[127, 127, 126]);
        threshold(&mut below, threshold_of(50)).unwrap();
        assert_eq!(pixel_at(&below, 0, 0), vec![0, 0, 0]);
    }

    #[test]
    fn sepia_on_solid_rgb24() {
        let mut bitmap = solid(50, 50, PixelFormat::Rgb24, &[255, 0, 0]);
        sepia(&mut bitmap).unwrap();
        assert!(pixels(&bitmap).iter().all(|px| px == &[33, 42, 48]));
    }

    #[test]
    fn sepia_leaves_alpha_alone() {
        let mut bitmap = solid(50, 50, PixelFormat::Argb32, &[255, 0, 0, 77]);
        sepia(&mut bitmap).unwrap();
        assert!(pixels(&bitmap).iter().all(|px| px == &[33, 42, 48, 77]));
    }

    #[test]
    fn sepia_matches_per_pixel_formula() {
        let original = gradient(11, 6, PixelFormat::Rgb24);
        let mut bitmap = original.clone();
        sepia(&mut bitmap).unwrap();
        for (before, after) in pixels(&original).iter().zip(pixels(&bitmap)) {
            assert_eq!(after, sepia_pixel(before[0], before[1], before[2]));
        }
    }

    #[test]
    fn filters_never_touch_row_padding() {
        // 5 px * 3 bytes = 15, stride 16: one padding byte per row
        let mut bitmap = solid(5, 4, PixelFormat::Rgb24, &[1, 2, 3]);
        threshold(&mut bitmap, threshold_of(0)).unwrap();
        let stride = bitmap.stride();
        for row in 0..4 {
            assert_eq!(bitmap.data()[row * stride + 15], 0);
        }
    }

    // =========================================================================
    // crop tests
    // =========================================================================

    #[test]
    fn crop_to_full_rect_is_identity() {
        for format in FORMATS {
            let original = gradient(23, 11, format);
            let cropped =
                crop(original.clone(), CropRect::new(0, 0, 23, 11), CropClamp::Legacy).unwrap();
            assert_eq!(cropped, original, "{format:?}");
        }
    }

    #[test]
    fn crop_copies_the_selected_region() {
        for format in FORMATS {
            let original = gradient(20, 20, format);
            let cropped =
                crop(original.clone(), CropRect::new(3, 4, 5, 6), CropClamp::Legacy).unwrap();

            assert_eq!((cropped.width(), cropped.height()), (5, 6));
            for y in 0..6 {
                for x in 0..5 {
                    assert_eq!(pixel_at(&cropped, x, y), pixel_at(&original, x + 3, y + 4));
                }
            }
        }
    }

    #[test]
    fn crop_with_negative_width_matches_positive() {
        let original = gradient(30, 30, PixelFormat::Rgb24);
        let negative =
            crop(original.clone(), CropRect::new(10, 2, -5, 5), CropClamp::Legacy).unwrap();
        let positive = crop(original, CropRect::new(5, 2, 5, 5), CropClamp::Legacy).unwrap();
        assert_eq!(negative, positive);
    }

    #[test]
    fn crop_outside_image_is_out_of_range() {
        let original = gradient(100, 100, PixelFormat::Argb32);
        assert_eq!(
            crop(original, CropRect::new(1000, 0, 10, 10), CropClamp::Legacy),
            Err(CropError::OutOfRange)
        );
    }

    #[test]
    fn crop_of_zero_width_is_empty() {
        let original = gradient(10, 10, PixelFormat::Rgb24);
        assert_eq!(
            crop(original, CropRect::new(2, 2, 0, 5), CropClamp::Legacy),
            Err(CropError::EmptyRegion)
        );
    }

    #[test]
    fn crop_keeps_alpha() {
        let original = solid(4, 4, PixelFormat::Argb32, &[1, 2, 3, 4]);
        let cropped = crop(original, CropRect::new(1, 1, 2, 2), CropClamp::Legacy).unwrap();
        assert!(pixels(&cropped).iter().all(|px| px == &[1, 2, 3, 4]));
    }

    #[test]
    fn crop_skips_unsupported_formats() {
        let original = solid(4, 4, PixelFormat::Gray8, &[9]);
        // even a rectangle that would be out of range
        let result = crop(original.clone(), CropRect::new(1000, 0, 1, 1), CropClamp::Legacy);
        assert_eq!(result, Ok(original));
    }

    #[test]
    fn crop_clamp_mode_is_honoured() {
        let original = gradient(100, 10, PixelFormat::Rgb24);
        let rect = CropRect::new(40, 0, 30, 10);
        let legacy = crop(original.clone(), rect, CropClamp::Legacy).unwrap();
        let strict = crop(original, rect, CropClamp::Strict).unwrap();
        assert_eq!(legacy.width(), 60);
        assert_eq!(strict.width(), 30);
    }
}
