//! Shared types for the framecloak scrambling pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Re-export `RgbImage` so downstream crates can hand frames in and out
/// without depending on `image` directly.
pub use image::RgbImage;

/// Frame shape in samples: rows, columns, and interleaved channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    /// Number of pixel rows.
    pub height: usize,
    /// Number of pixel columns.
    pub width: usize,
    /// Samples per pixel.
    pub channels: usize,
}

impl Shape {
    /// Create a new shape.
    #[must_use]
    pub const fn new(height: usize, width: usize, channels: usize) -> Self {
        Self {
            height,
            width,
            channels,
        }
    }

    /// Shape with height and width swapped.
    #[must_use]
    pub const fn transposed(self) -> Self {
        Self {
            height: self.width,
            width: self.height,
            channels: self.channels,
        }
    }

    /// Number of samples in one row (`width * channels`).
    #[must_use]
    pub const fn row_len(self) -> usize {
        self.width * self.channels
    }

    /// Total number of samples (`height * width * channels`).
    #[must_use]
    pub const fn sample_count(self) -> usize {
        self.height * self.width * self.channels
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.height, self.width, self.channels)
    }
}

/// Errors that can occur while configuring or running a pipeline.
///
/// Configuration and ordering errors indicate caller mistakes and are
/// never retried. [`PayloadNotFound`](Self::PayloadNotFound) and
/// [`PayloadCorrupted`](Self::PayloadCorrupted) are expected outcomes
/// on frames that carry no payload or were heavily distorted.
#[derive(Debug, thiserror::Error)]
pub enum ScrambleError {
    /// The pipeline description or a step configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    Configuration(String),

    /// `transform`/`inverse_transform` was called before `fit`.
    #[error("the pipeline must be fitted before use")]
    FitRequired,

    /// The frame does not have the shape the pipeline was fitted for.
    #[error("expected a frame of shape {expected}, got {actual}")]
    ShapeMismatch {
        /// Shape recorded at fit time.
        expected: Shape,
        /// Shape of the frame that was passed in.
        actual: Shape,
    },

    /// No embedded payload header could be located in the frame.
    #[error("no embedded payload found in frame")]
    PayloadNotFound,

    /// A payload header was found but the payload failed validation.
    #[error("embedded payload is corrupted: {0}")]
    PayloadCorrupted(String),

    /// The descriptor document is not well-formed JSON.
    #[error("malformed descriptor document: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A sample buffer does not match its declared shape.
    #[error("invalid frame buffer: {0}")]
    InvalidFrame(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_transposed_swaps_axes() {
        let s = Shape::new(4, 6, 3);
        assert_eq!(s.transposed(), Shape::new(6, 4, 3));
        assert_eq!(s.transposed().transposed(), s);
    }

    #[test]
    fn shape_counts() {
        let s = Shape::new(4, 6, 3);
        assert_eq!(s.row_len(), 18);
        assert_eq!(s.sample_count(), 72);
    }

    #[test]
    fn shape_display() {
        assert_eq!(Shape::new(1080, 1920, 3).to_string(), "1080x1920x3");
    }

    #[test]
    fn error_fit_required_display() {
        assert_eq!(
            ScrambleError::FitRequired.to_string(),
            "the pipeline must be fitted before use",
        );
    }

    #[test]
    fn error_shape_mismatch_display() {
        let err = ScrambleError::ShapeMismatch {
            expected: Shape::new(8, 8, 3),
            actual: Shape::new(8, 9, 3),
        };
        assert_eq!(err.to_string(), "expected a frame of shape 8x8x3, got 8x9x3");
    }

    #[test]
    fn error_configuration_display() {
        let err = ScrambleError::Configuration("unknown step \"Blur\"".to_string());
        assert_eq!(
            err.to_string(),
            "invalid pipeline configuration: unknown step \"Blur\"",
        );
    }
}
