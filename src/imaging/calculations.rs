//! Pure calculation functions for crop geometry and per-pixel arithmetic.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::{CropClamp, CropRect};

/// A crop rectangle after normalization and clamping. Always inside the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Why a crop rectangle could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Geometry {
    /// The rectangle does not overlap the image at all.
    OutOfRange,
    /// The rectangle overlaps but has zero width or height.
    Empty,
}

/// Resolve a caller rectangle against an image of `image` = (width, height).
///
/// In order:
/// 1. Negative sizes extend left/up from the anchor: `x += w; w = -w`.
/// 2. No overlap with the image → [`Geometry::OutOfRange`].
/// 3. A negative left/top edge is cut off, shrinking the size.
/// 4. The right/bottom edge is clamped according to `clamp`.
///
/// Arithmetic is done in `i64`, so no `i32` input can overflow.
///
/// # Examples
/// ```
/// # use image_transformer::imaging::{CropClamp, CropRect, resolve_crop};
/// // width -5 at x=10 is the same as width 5 at x=5
/// let a = resolve_crop(CropRect::new(10, 0, -5, 5), (100, 100), CropClamp::Legacy);
/// let b = resolve_crop(CropRect::new(5, 0, 5, 5), (100, 100), CropClamp::Legacy);
/// assert_eq!(a, b);
/// ```
pub fn resolve_crop(
    rect: CropRect,
    image: (u32, u32),
    clamp: CropClamp,
) -> Result<CropRegion, Geometry> {
    let (x, width) = clamp_axis(
        i64::from(rect.x),
        i64::from(rect.width),
        i64::from(image.0),
        clamp,
    )?;
    let (y, height) = clamp_axis(
        i64::from(rect.y),
        i64::from(rect.height),
        i64::from(image.1),
        clamp,
    )?;

    if width <= 0 || height <= 0 {
        return Err(Geometry::Empty);
    }

    Ok(CropRegion {
        x: x as u32,
        y: y as u32,
        width: width as u32,
        height: height as u32,
    })
}

/// One axis of [`resolve_crop`]. Returns the clamped (start, length).
fn clamp_axis(
    mut start: i64,
    mut len: i64,
    extent: i64,
    clamp: CropClamp,
) -> Result<(i64, i64), Geometry> {
    if len < 0 {
        start += len;
        len = -len;
    }

    if start + len <= 0 || start >= extent {
        return Err(Geometry::OutOfRange);
    }

    if start < 0 {
        len += start;
        start = 0;
    }

    let limit = match clamp {
        CropClamp::Legacy => extent - start,
        CropClamp::Strict => extent,
    };
    if start + len > limit {
        len = extent - start;
    }

    Ok((start, len))
}

/// Mean of the three color channels, truncated.
#[inline]
pub fn intensity(b: u8, g: u8, r: u8) -> u8 {
    ((u16::from(b) + u16::from(g) + u16::from(r)) / 3) as u8
}

/// Sepia tone for one pixel. Takes and returns channels in B, G, R order.
///
/// Every output channel is computed from the original input values, saturated
/// at 255 and truncated.
#[inline]
pub fn sepia(b: u8, g: u8, r: u8) -> [u8; 3] {
    let (b, g, r) = (f32::from(b), f32::from(g), f32::from(r));
    let blue = r * 0.272 + g * 0.534 + b * 0.131;
    let green = r * 0.349 + g * 0.686 + b * 0.168;
    let red = r * 0.393 + g * 0.769 + b * 0.189;
    [saturate(blue), saturate(green), saturate(red)]
}

#[inline]
fn saturate(value: f32) -> u8 {
    if value > 255.0 { 255 } else { value as u8 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy(x: i32, y: i32, w: i32, h: i32, image: (u32, u32)) -> Result<CropRegion, Geometry> {
        resolve_crop(CropRect::new(x, y, w, h), image, CropClamp::Legacy)
    }

    fn region(x: u32, y: u32, width: u32, height: u32) -> CropRegion {
        CropRegion {
            x,
            y,
            width,
            height,
        }
    }

    // =========================================================================
    // resolve_crop tests
    // =========================================================================

    #[test]
    fn full_image_is_unchanged() {
        assert_eq!(legacy(0, 0, 100, 80, (100, 80)), Ok(region(0, 0, 100, 80)));
    }

    #[test]
    fn negative_width_measures_leftward() {
        assert_eq!(legacy(10, 0, -5, 5, (100, 100)), legacy(5, 0, 5, 5, (100, 100)));
        assert_eq!(legacy(10, 0, -5, 5, (100, 100)), Ok(region(5, 0, 5, 5)));
    }

    #[test]
    fn negative_height_measures_upward() {
        assert_eq!(legacy(0, 50, 10, -20, (100, 100)), Ok(region(0, 30, 10, 20)));
    }

    #[test]
    fn rectangle_past_right_edge_is_out_of_range() {
        assert_eq!(legacy(1000, 0, 10, 10, (100, 100)), Err(Geometry::OutOfRange));
        assert_eq!(legacy(100, 0, 10, 10, (100, 100)), Err(Geometry::OutOfRange));
    }

    #[test]
    fn rectangle_ending_at_left_edge_is_out_of_range() {
        assert_eq!(legacy(-10, 0, 10, 10, (100, 100)), Err(Geometry::OutOfRange));
        assert_eq!(legacy(0, 0, 10, -5, (100, 100)), Err(Geometry::OutOfRange));
    }

    #[test]
    fn negative_origin_is_cut_off() {
        assert_eq!(legacy(-10, -5, 30, 20, (100, 100)), Ok(region(0, 0, 20, 15)));
    }

    #[test]
    fn oversized_rectangle_is_clamped() {
        assert_eq!(legacy(0, 0, 500, 500, (100, 50)), Ok(region(0, 0, 100, 50)));
        assert_eq!(legacy(90, 40, 50, 50, (100, 50)), Ok(region(90, 40, 10, 10)));
    }

    #[test]
    fn legacy_clamp_can_widen_a_fitting_rectangle() {
        // 40 + 30 > 100 - 40, so width becomes 100 - 40
        assert_eq!(legacy(40, 0, 30, 10, (100, 100)), Ok(region(40, 0, 60, 10)));
    }

    #[test]
    fn strict_clamp_only_shrinks() {
        let strict = |x, w| resolve_crop(CropRect::new(x, 0, w, 10), (100, 100), CropClamp::Strict);
        assert_eq!(strict(40, 30), Ok(region(40, 0, 30, 10)));
        assert_eq!(strict(90, 30), Ok(region(90, 0, 10, 10)));
    }

    #[test]
    fn zero_size_inside_image_is_empty() {
        assert_eq!(legacy(10, 10, 0, 10, (100, 100)), Err(Geometry::Empty));
        assert_eq!(legacy(10, 10, 10, 0, (100, 100)), Err(Geometry::Empty));
    }

    #[test]
    fn extreme_values_do_not_overflow() {
        assert_eq!(
            legacy(i32::MAX, 0, i32::MAX, 10, (100, 100)),
            Err(Geometry::OutOfRange)
        );
        assert_eq!(
            legacy(i32::MIN, i32::MIN, i32::MAX, i32::MAX, (100, 100)),
            Err(Geometry::OutOfRange)
        );
        assert_eq!(
            legacy(0, 0, i32::MIN, 10, (100, 100)),
            Err(Geometry::OutOfRange)
        );
    }

    // =========================================================================
    // pixel arithmetic tests
    // =========================================================================

    #[test]
    fn intensity_truncates() {
        assert_eq!(intensity(0, 0, 0), 0);
        assert_eq!(intensity(255, 255, 255), 255);
        assert_eq!(intensity(1, 1, 0), 0);
        assert_eq!(intensity(100, 50, 51), 67);
    }

    #[test]
    fn sepia_of_blue_byte() {
        assert_eq!(sepia(255, 0, 0), [33, 42, 48]);
    }

    #[test]
    fn sepia_of_red_byte() {
        assert_eq!(sepia(0, 0, 255), [69, 88, 100]);
    }

    #[test]
    fn sepia_saturates() {
        assert_eq!(sepia(255, 255, 255), [238, 255, 255]);
        assert_eq!(sepia(0, 0, 0), [0, 0, 0]);
    }
}
