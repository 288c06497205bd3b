//! Owned pixel storage.
//!
//! A [`Bitmap`] keeps its pixels in blue, green, red(, alpha) byte order with
//! every row padded to a 4-byte boundary. The padding means `stride` is
//! generally larger than `width * pixel_size`, and every piece of code that
//! walks the storage must advance rows by `stride`, never by the nominal row
//! width. [`PixelBuffer`](super::pixel_buffer::PixelBuffer) is the only
//! sanctioned way to read or write pixel bytes.

/// Row alignment in bytes.
const ROW_ALIGN: usize = 4;

/// In-memory pixel layout of a [`Bitmap`].
///
/// Only [`Rgb24`](PixelFormat::Rgb24) and [`Argb32`](PixelFormat::Argb32) are
/// understood by the filters and crop. Anything else passes through them
/// untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 3 bytes per pixel: B, G, R.
    Rgb24,
    /// 4 bytes per pixel: B, G, R, A.
    Argb32,
    /// 1 byte per pixel luminance.
    Gray8,
}

impl PixelFormat {
    /// Bytes per pixel in storage.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb24 => 3,
            PixelFormat::Argb32 => 4,
            PixelFormat::Gray8 => 1,
        }
    }

    /// Whether filters and crop operate on this format.
    pub fn is_supported(self) -> bool {
        matches!(self, PixelFormat::Rgb24 | PixelFormat::Argb32)
    }
}

/// Pixel storage with a fixed format and padded rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    format: PixelFormat,
    stride: usize,
    data: Vec<u8>,
}

impl Bitmap {
    /// Allocate a zero-filled bitmap.
    ///
    /// Returns `None` for a zero width or height.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        let stride = aligned_stride(width, format);
        Some(Self {
            width,
            height,
            format,
            stride,
            data: vec![0; stride * height as usize],
        })
    }

    /// Build a bitmap from tightly packed rows (no padding), in storage byte order.
    ///
    /// Returns `None` when `packed` does not hold exactly
    /// `width * height * bytes_per_pixel` bytes.
    pub fn from_packed(
        width: u32,
        height: u32,
        format: PixelFormat,
        packed: &[u8],
    ) -> Option<Self> {
        let row_len = width as usize * format.bytes_per_pixel();
        if packed.len() != row_len * height as usize {
            return None;
        }
        let mut bitmap = Self::new(width, height, format)?;
        let stride = bitmap.stride;
        for (dst, src) in bitmap
            .data
            .chunks_mut(stride)
            .zip(packed.chunks(row_len))
        {
            dst[..row_len].copy_from_slice(src);
        }
        Some(bitmap)
    }

    /// Copy the pixels out as tightly packed rows, dropping row padding.
    pub fn to_packed(&self) -> Vec<u8> {
        let row_len = self.row_len();
        let mut packed = Vec::with_capacity(row_len * self.height as usize);
        for row in self.data.chunks(self.stride) {
            packed.extend_from_slice(&row[..row_len]);
        }
        packed
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Bytes between the starts of two consecutive rows.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Meaningful bytes per row, excluding padding.
    pub fn row_len(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    #[cfg(test)]
    pub(crate) fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Row stride for `width` pixels of `format`, rounded up to [`ROW_ALIGN`].
fn aligned_stride(width: u32, format: PixelFormat) -> usize {
    let row = width as usize * format.bytes_per_pixel();
    row.div_ceil(ROW_ALIGN) * ROW_ALIGN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb24_rows_are_padded_to_four_bytes() {
        let bitmap = Bitmap::new(5, 2, PixelFormat::Rgb24).unwrap();
        assert_eq!(bitmap.row_len(), 15);
        assert_eq!(bitmap.stride(), 16);
        assert_eq!(bitmap.data().len(), 32);
    }

    #[test]
    fn argb32_rows_need_no_padding() {
        let bitmap = Bitmap::new(5, 2, PixelFormat::Argb32).unwrap();
        assert_eq!(bitmap.stride(), 20);
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(Bitmap::new(0, 10, PixelFormat::Rgb24).is_none());
        assert!(Bitmap::new(10, 0, PixelFormat::Argb32).is_none());
    }

    #[test]
    fn packed_rows_survive_padding() {
        let packed: Vec<u8> = (0..18).collect();
        let bitmap = Bitmap::from_packed(3, 2, PixelFormat::Rgb24, &packed).unwrap();
        assert_eq!(bitmap.stride(), 12);
        assert_eq!(&bitmap.data()[12..21], &packed[9..18]);
        assert_eq!(bitmap.to_packed(), packed);
    }

    #[test]
    fn from_packed_rejects_wrong_length() {
        assert!(Bitmap::from_packed(3, 2, PixelFormat::Rgb24, &[0; 17]).is_none());
    }

    #[test]
    fn only_color_formats_are_supported() {
        assert!(PixelFormat::Rgb24.is_supported());
        assert!(PixelFormat::Argb32.is_supported());
        assert!(!PixelFormat::Gray8.is_supported());
    }
}
