//! Parameter types for image operations.
//!
//! These describe *what* to do to an image: the crop rectangle, the filter to
//! apply and its argument, and the encoding of the result. They are parsed
//! from request text here so the pipeline and the CLI validate input the same
//! way.
//!
//! ## Types
//!
//! - [`CropRect`]: `x,y,w,h` as signed integers. Negative sizes are allowed.
//! - [`Threshold`]: Threshold level, 0–100 inclusive. Rejected outside that range.
//! - [`Filter`]: `grayscale`, `sepia` or `threshold(N)`, case-insensitive.
//!   Text around `threshold(N)` is ignored, and `N` ends at the first `)`.
//! - [`LosslessFormat`]: Output encoding for processed images.
//! - [`CropClamp`]: How the crop rectangle is clamped to the right/bottom edge.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    #[error("crop rectangle must be four comma-separated integers, got {0:?}")]
    Rect(String),
    #[error("unknown filter {0:?}")]
    UnknownFilter(String),
    #[error("threshold must be between 0 and 100, got {0}")]
    ThresholdOutOfRange(i64),
}

/// Caller-supplied crop rectangle, before any normalization or clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl CropRect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

impl FromStr for CropRect {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|part| part.trim().parse::<i32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ParamError::Rect(s.to_string()))?;
        match values.as_slice() {
            &[x, y, width, height] => Ok(Self::new(x, y, width, height)),
            _ => Err(ParamError::Rect(s.to_string())),
        }
    }
}

impl fmt::Display for CropRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

/// Threshold level in percent of full brightness (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Threshold(u8);

impl Threshold {
    pub fn new(value: i64) -> Result<Self, ParamError> {
        u8::try_from(value)
            .ok()
            .filter(|v| *v <= 100)
            .map(Self)
            .ok_or(ParamError::ThresholdOutOfRange(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Intensity at or above which a pixel turns white: `255 * x / 100`, truncated.
    pub fn level(self) -> u8 {
        (255 * u32::from(self.0) / 100) as u8
    }
}

/// A pixel filter applied after cropping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Grayscale,
    Sepia,
    Threshold(Threshold),
}

const THRESHOLD_OPEN: &str = "threshold(";

impl FromStr for Filter {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.to_ascii_lowercase();
        match name.as_str() {
            "grayscale" => return Ok(Filter::Grayscale),
            "sepia" => return Ok(Filter::Sepia),
            _ => {}
        }

        // First `threshold(` anywhere in the name, argument up to the next `)`
        let arg = name
            .find(THRESHOLD_OPEN)
            .map(|at| &name[at + THRESHOLD_OPEN.len()..])
            .and_then(|rest| rest.split_once(')'))
            .map(|(arg, _)| arg)
            .ok_or_else(|| ParamError::UnknownFilter(s.to_string()))?;
        let value: i64 = arg
            .trim()
            .parse()
            .map_err(|_| ParamError::UnknownFilter(s.to_string()))?;
        Threshold::new(value).map(Filter::Threshold)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Grayscale => f.write_str("grayscale"),
            Filter::Sepia => f.write_str("sepia"),
            Filter::Threshold(t) => write!(f, "threshold({})", t.value()),
        }
    }
}

/// Lossless encodings available for the processed image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LosslessFormat {
    #[default]
    Png,
    Bmp,
    Tiff,
}

/// Right/bottom edge clamping applied by crop.
///
/// `Legacy` compares `x + width` against `image_width - x`, which can widen a
/// rectangle that already fits (40+30 on a 100px image becomes 40+60). It is
/// kept as the default so existing clients see the same output. `Strict`
/// compares against `image_width` and only ever shrinks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropClamp {
    #[default]
    Legacy,
    Strict,
}
