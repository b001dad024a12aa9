//! Circular (wrap-around) translation.

use crate::frame::Frame;

/// Reduce a signed shift to an offset in `0..len`.
#[allow(
    clippy::cast_possible_wrap,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
const fn wrap_offset(shift: i64, len: usize) -> usize {
    shift.rem_euclid(len as i64) as usize
}

/// Translate a frame by `sx` columns and `sy` rows with wrap-around.
///
/// The sample at `(y, x)` moves to `((y + sy) mod H, (x + sx) mod W)`.
/// Negative shifts move up/left. `shift_wrap(shift_wrap(f, sx, sy), -sx, -sy)`
/// is the identity.
#[must_use]
pub fn shift_wrap(frame: &Frame, sx: i64, sy: i64) -> Frame {
    let shape = frame.shape();
    let dy = wrap_offset(sy, shape.height);
    let dx = wrap_offset(sx, shape.width);
    if dx == 0 && dy == 0 {
        return frame.clone();
    }

    let row_len = shape.row_len();
    let split = (shape.width - dx) * shape.channels;
    let lead = dx * shape.channels;
    let mut out = vec![0u8; shape.sample_count()];

    for y in 0..shape.height {
        let src = frame.row(y);
        let ty = (y + dy) % shape.height;
        let dst = &mut out[ty * row_len..(ty + 1) * row_len];
        dst[lead..].copy_from_slice(&src[..split]);
        dst[..lead].copy_from_slice(&src[split..]);
    }

    Frame::from_parts(shape, out)
}
