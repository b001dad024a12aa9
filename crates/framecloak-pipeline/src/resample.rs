//! Resampling a received carrier back to its recorded geometry.
//!
//! A carrier that went through a scaler cannot be descrambled exactly,
//! but resizing it to the fitted carrier shape lets the inverse steps run
//! and produce a recognizable preview. If the frame already has the
//! target size it is returned unchanged.

use std::fmt;

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, LumaA, Pixel, Rgb, Rgba};
use serde::{Deserialize, Serialize};

use crate::frame::Frame;
use crate::types::{ScrambleError, Shape};

/// Resampling filter used when normalizing a carrier.
///
/// Ordered from fastest/lowest-quality to slowest/highest-quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResampleFilter {
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation: fast, decent quality.
    #[default]
    Triangle,
    /// Bicubic (Catmull-Rom): moderate speed, good quality.
    CatmullRom,
    /// Gaussian: moderate speed, smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest.
    Lanczos3,
}

impl ResampleFilter {
    const fn to_image_filter(self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Triangle => FilterType::Triangle,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Gaussian => FilterType::Gaussian,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl fmt::Display for ResampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
        }
    }
}

fn dims(width: usize, height: usize) -> Result<(u32, u32), ScrambleError> {
    let w = u32::try_from(width)
        .map_err(|_| ScrambleError::InvalidFrame("width exceeds u32".to_owned()))?;
    let h = u32::try_from(height)
        .map_err(|_| ScrambleError::InvalidFrame("height exceeds u32".to_owned()))?;
    Ok((w, h))
}

fn resize_as<P>(frame: &Frame, target: Shape, filter: FilterType) -> Result<Vec<u8>, ScrambleError>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let (w, h) = dims(frame.width(), frame.height())?;
    let (tw, th) = dims(target.width, target.height)?;
    let buffer: ImageBuffer<P, Vec<u8>> = ImageBuffer::from_raw(w, h, frame.as_raw().to_vec())
        .ok_or_else(|| ScrambleError::InvalidFrame("buffer does not match dimensions".to_owned()))?;
    Ok(imageops::resize(&buffer, tw, th, filter).into_raw())
}

/// Resize `frame` to the height and width of `target`.
///
/// Returns the (possibly unchanged) frame and whether resampling was
/// applied.
///
/// # Errors
///
/// Returns [`ScrambleError::ShapeMismatch`] if the channel counts differ,
/// and [`ScrambleError::InvalidFrame`] for channel counts other than
/// 1 to 4, an empty source frame, or dimensions that do not fit `u32`.
pub fn resample(
    frame: &Frame,
    target: Shape,
    filter: ResampleFilter,
) -> Result<(Frame, bool), ScrambleError> {
    if frame.channels() != target.channels {
        return Err(ScrambleError::ShapeMismatch {
            expected: target,
            actual: frame.shape(),
        });
    }
    if frame.shape() == target {
        return Ok((frame.clone(), false));
    }
    if frame.height() == 0 || frame.width() == 0 {
        return Err(ScrambleError::InvalidFrame(format!(
            "cannot resample an empty {} frame",
            frame.shape()
        )));
    }

    let f = filter.to_image_filter();
    let data = match target.channels {
        1 => resize_as::<Luma<u8>>(frame, target, f)?,
        2 => resize_as::<LumaA<u8>>(frame, target, f)?,
        3 => resize_as::<Rgb<u8>>(frame, target, f)?,
        4 => resize_as::<Rgba<u8>>(frame, target, f)?,
        n => {
            return Err(ScrambleError::InvalidFrame(format!(
                "cannot resample a {n}-channel frame"
            )));
        }
    };
    Ok((Frame::new(target, data)?, true))
}
