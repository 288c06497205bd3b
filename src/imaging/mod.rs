//! Image processing in pure Rust, no system libraries.
//!
//! | Operation | Implementation |
//! |---|---|
//! | **Decode / encode** | `image` crate behind the [`ImageCodec`] trait |
//! | **Pixel access** | [`PixelBuffer`] over padded [`Bitmap`] rows |
//! | **Grayscale / Sepia / Threshold** | row-parallel (rayon) per-pixel filters |
//! | **Crop** | geometry in [`resolve_crop`], row copy into a new bitmap |
//!
//! The module is split into:
//! - **Bitmap / PixelBuffer**: storage and scoped, stride-addressed access
//! - **Calculations**: Pure functions for crop geometry and pixel math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Codec**: [`ImageCodec`] trait + [`RustCodec`]
//! - **Operations**: Filters and crop on top of the pixel buffer

mod bitmap;
mod calculations;
pub mod codec;
pub mod operations;
mod params;
pub mod pixel_buffer;
pub mod rust_codec;

pub use bitmap::{Bitmap, PixelFormat};
pub use calculations::{CropRegion, Geometry, resolve_crop};
pub use codec::{CodecError, ImageCodec};
pub use operations::{CropError, apply_filter, crop, grayscale, sepia, threshold};
pub use params::{CropClamp, CropRect, Filter, LosslessFormat, ParamError, Threshold};
pub use pixel_buffer::{BufferError, PixelBuffer};
pub use rust_codec::RustCodec;
