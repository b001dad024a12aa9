//! Integer pixel buffers.
//!
//! A [`Frame`] is an immutable-by-convention `height × width × channels`
//! buffer of `u8` samples stored row-major with interleaved channels
//! (the same layout as `image::ImageBuffer`). Every transform in this
//! crate borrows its input and returns a freshly allocated frame, so a
//! frame shared between steps is never aliased mutably.

use image::{DynamicImage, RgbImage};

use crate::types::{ScrambleError, Shape};

/// An integer-sample image or video frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    shape: Shape,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap a raw sample buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::InvalidFrame`] if the shape has a zero
    /// dimension or `data.len()` does not equal `shape.sample_count()`.
    pub fn new(shape: Shape, data: Vec<u8>) -> Result<Self, ScrambleError> {
        if shape.height == 0 || shape.width == 0 || shape.channels == 0 {
            return Err(ScrambleError::InvalidFrame(format!(
                "shape {shape} has a zero dimension"
            )));
        }
        if data.len() != shape.sample_count() {
            return Err(ScrambleError::InvalidFrame(format!(
                "shape {shape} needs {} samples, buffer has {}",
                shape.sample_count(),
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// A frame with every sample set to `value`.
    #[must_use]
    pub fn filled(shape: Shape, value: u8) -> Self {
        Self {
            shape,
            data: vec![value; shape.sample_count()],
        }
    }

    /// Build a frame by evaluating `f(row, column, channel)` for every sample.
    #[must_use]
    pub fn from_fn(shape: Shape, mut f: impl FnMut(usize, usize, usize) -> u8) -> Self {
        let mut data = Vec::with_capacity(shape.sample_count());
        for y in 0..shape.height {
            for x in 0..shape.width {
                for c in 0..shape.channels {
                    data.push(f(y, x, c));
                }
            }
        }
        Self { shape, data }
    }

    /// Internal constructor for buffers whose length is already known to
    /// match `shape`.
    pub(crate) fn from_parts(shape: Shape, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), shape.sample_count(), "buffer/shape mismatch");
        Self { shape, data }
    }

    /// The frame's shape.
    #[must_use]
    pub const fn shape(&self) -> Shape {
        self.shape
    }

    /// Number of rows.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.shape.height
    }

    /// Number of columns.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.shape.width
    }

    /// Samples per pixel.
    #[must_use]
    pub const fn channels(&self) -> usize {
        self.shape.channels
    }

    /// All samples, row-major with interleaved channels.
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// Consume the frame and return its sample buffer.
    #[must_use]
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Samples of row `y`.
    ///
    /// # Panics
    ///
    /// Panics if `y >= height`.
    #[must_use]
    pub fn row(&self, y: usize) -> &[u8] {
        let len = self.shape.row_len();
        &self.data[y * len..(y + 1) * len]
    }

    /// Samples of the pixel at row `y`, column `x`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are out of bounds.
    #[must_use]
    pub fn pixel(&self, y: usize, x: usize) -> &[u8] {
        let c = self.shape.channels;
        let start = y * self.shape.row_len() + x * c;
        &self.data[start..start + c]
    }

    /// Stack `top` above `bottom`. Widths and channel counts must agree.
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::InvalidFrame`] if the frames have
    /// different widths or channel counts.
    pub fn stack_vertical(top: &Self, bottom: &Self) -> Result<Self, ScrambleError> {
        if top.width() != bottom.width() || top.channels() != bottom.channels() {
            return Err(ScrambleError::InvalidFrame(format!(
                "cannot stack {} above {}",
                top.shape, bottom.shape
            )));
        }
        let shape = Shape::new(top.height() + bottom.height(), top.width(), top.channels());
        let mut data = Vec::with_capacity(shape.sample_count());
        data.extend_from_slice(&top.data);
        data.extend_from_slice(&bottom.data);
        Ok(Self { shape, data })
    }

    /// Split into the first `at` rows and the remaining rows.
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::InvalidFrame`] unless `0 < at < height`.
    pub fn split_rows(&self, at: usize) -> Result<(Self, Self), ScrambleError> {
        if at == 0 || at >= self.height() {
            return Err(ScrambleError::InvalidFrame(format!(
                "cannot split {} at row {at}",
                self.shape
            )));
        }
        let cut = at * self.shape.row_len();
        let top = Self::from_parts(
            Shape::new(at, self.width(), self.channels()),
            self.data[..cut].to_vec(),
        );
        let bottom = Self::from_parts(
            Shape::new(self.height() - at, self.width(), self.channels()),
            self.data[cut..].to_vec(),
        );
        Ok((top, bottom))
    }

    /// Copy `src` over this frame starting at row `y0`. `src` must have
    /// the same width and channel count and fit below `y0`.
    pub(crate) fn paste_rows(&mut self, y0: usize, src: &Self) {
        debug_assert_eq!(self.width(), src.width());
        debug_assert_eq!(self.channels(), src.channels());
        let start = y0 * self.shape.row_len();
        self.data[start..start + src.data.len()].copy_from_slice(&src.data);
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Convert a three-channel frame to an [`RgbImage`].
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::InvalidFrame`] if the frame does not have
    /// exactly three channels or is too large for `image`'s `u32` sizes.
    pub fn to_rgb_image(&self) -> Result<RgbImage, ScrambleError> {
        if self.channels() != 3 {
            return Err(ScrambleError::InvalidFrame(format!(
                "RGB conversion needs 3 channels, frame has {}",
                self.channels()
            )));
        }
        let width = u32::try_from(self.width())
            .map_err(|_| ScrambleError::InvalidFrame("width exceeds u32".to_string()))?;
        let height = u32::try_from(self.height())
            .map_err(|_| ScrambleError::InvalidFrame("height exceeds u32".to_string()))?;
        RgbImage::from_raw(width, height, self.data.clone())
            .ok_or_else(|| {
                ScrambleError::InvalidFrame("buffer does not match dimensions".to_string())
            })
    }

    /// Convert any decoded image into a three-channel frame.
    #[must_use]
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        Self::from(image.to_rgb8())
    }
}

impl From<RgbImage> for Frame {
    fn from(image: RgbImage) -> Self {
        let shape = Shape::new(image.height() as usize, image.width() as usize, 3);
        Self::from_parts(shape, image.into_raw())
    }
}
