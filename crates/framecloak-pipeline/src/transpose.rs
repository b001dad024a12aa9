//! Height/width transposition.

use crate::frame::Frame;

/// Swap the row and column axes: the sample at `(y, x)` moves to `(x, y)`.
///
/// Channel order inside each pixel is unchanged. The operation is its
/// own inverse.
#[must_use]
pub fn transpose(frame: &Frame) -> Frame {
    let shape = frame.shape();
    let out_shape = shape.transposed();
    let c = shape.channels;
    let src = frame.as_raw();
    let mut out = vec![0u8; shape.sample_count()];

    for y in 0..shape.height {
        for x in 0..shape.width {
            let s = (y * shape.width + x) * c;
            let d = (x * shape.height + y) * c;
            out[d..d + c].copy_from_slice(&src[s..s + c]);
        }
    }

    Frame::from_parts(out_shape, out)
}
