//! Scoped, stride-addressed access to a region of a [`Bitmap`].
//!
//! A [`PixelBuffer`] mutably borrows its bitmap, so no two buffers can be live
//! over the same image. The region is validated once in [`PixelBuffer::acquire`];
//! after that every row and pixel access is a plain slice index into memory
//! that is known to be inside the bitmap.
//!
//! ```text
//! region origin ─┐
//!                ▼
//!   row 0   [B G R][B G R][B G R] pad ...   ◄─ stride ─►
//!   row 1   [B G R][B G R][B G R] pad ...
//!            ◄─── width * pixel_size ───►
//! ```
//!
//! The offset of pixel `(col, row)` from the region origin is
//! `row * stride + col * pixel_size`.

use super::bitmap::{Bitmap, PixelFormat};
use rayon::prelude::*;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("region {width}x{height}+{x}+{y} is outside the {image_width}x{image_height} image")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
    },
    #[error("pixel format {0:?} cannot be addressed by a pixel buffer")]
    UnsupportedFormat(PixelFormat),
}

/// Exclusive view over a rectangle of a bitmap's storage.
///
/// Released when dropped. [`release`](Self::release) may also be called
/// explicitly, any number of times; after the first call the buffer is empty.
#[derive(Debug)]
pub struct PixelBuffer<'a> {
    data: &'a mut [u8],
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    stride: usize,
    pixel_size: usize,
    released: bool,
}

impl<'a> PixelBuffer<'a> {
    /// Lock the `width` x `height` region at `(x, y)`.
    pub fn acquire(
        image: &'a mut Bitmap,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<Self, BufferError> {
        let format = image.format();
        let pixel_size = match format {
            PixelFormat::Rgb24 => 3,
            PixelFormat::Argb32 => 4,
            other => return Err(BufferError::UnsupportedFormat(other)),
        };

        let fits = width > 0
            && height > 0
            && u64::from(x) + u64::from(width) <= u64::from(image.width())
            && u64::from(y) + u64::from(height) <= u64::from(image.height());
        if !fits {
            return Err(BufferError::OutOfBounds {
                x,
                y,
                width,
                height,
                image_width: image.width(),
                image_height: image.height(),
            });
        }

        let stride = image.stride();
        let start = y as usize * stride + x as usize * pixel_size;
        let end = start + (height as usize - 1) * stride + width as usize * pixel_size;
        tracing::trace!(x, y, width, height, stride, "pixel buffer acquired");

        Ok(Self {
            data: &mut image.data_mut()[start..end],
            x,
            y,
            width,
            height,
            stride,
            pixel_size,
            released: false,
        })
    }

    /// Lock the whole image.
    pub fn whole(image: &'a mut Bitmap) -> Result<Self, BufferError> {
        let (width, height) = (image.width(), image.height());
        Self::acquire(image, 0, 0, width, height)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn pixel_size(&self) -> usize {
        self.pixel_size
    }

    /// Byte offset of `(col, row)` relative to the region origin.
    #[inline]
    pub fn byte_offset(&self, col: u32, row: u32) -> usize {
        row as usize * self.stride + col as usize * self.pixel_size
    }

    /// Meaningful bytes of one region row.
    #[inline]
    fn row_len(&self) -> usize {
        self.width as usize * self.pixel_size
    }

    pub fn row(&self, row: u32) -> &[u8] {
        let start = self.byte_offset(0, row);
        &self.data[start..start + self.row_len()]
    }

    pub fn row_mut(&mut self, row: u32) -> &mut [u8] {
        let start = self.byte_offset(0, row);
        let len = self.row_len();
        &mut self.data[start..start + len]
    }

    pub fn pixel(&self, col: u32, row: u32) -> &[u8] {
        let start = self.byte_offset(col, row);
        &self.data[start..start + self.pixel_size]
    }

    pub fn pixel_mut(&mut self, col: u32, row: u32) -> &mut [u8] {
        let start = self.byte_offset(col, row);
        &mut self.data[start..start + self.pixel_size]
    }

    /// Region rows, top to bottom, each trimmed to `width * pixel_size`.
    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut [u8]> + '_ {
        let row_len = self.row_len();
        self.data
            .chunks_mut(self.stride)
            .take(self.height as usize)
            .map(move |row| row.split_at_mut(row_len).0)
    }

    /// Like [`rows_mut`](Self::rows_mut), but spread over the rayon pool.
    pub fn par_rows_mut(&mut self) -> impl IndexedParallelIterator<Item = &mut [u8]> + '_ {
        let row_len = self.row_len();
        self.data
            .par_chunks_mut(self.stride)
            .take(self.height as usize)
            .map(move |row| row.split_at_mut(row_len).0)
    }

    /// Unlock the region. Safe to call more than once; never fails.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.data = Default::default();
        self.width = 0;
        self.height = 0;
        tracing::trace!(x = self.x, y = self.y, "pixel buffer released");
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for PixelBuffer<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
