//! Invertible linear mixing of the rows inside each row group.
//!
//! Each group of `g` rows is treated as a `g`-vector per sample column
//! and multiplied by `U · L` modulo 256, where `L` is unit
//! lower-triangular and `U` is unit upper-triangular. Both have
//! determinant 1, so the product is invertible over `Z/256` for any
//! choice of off-diagonal coefficients, and the inverse is computed by
//! substitution without ever forming a matrix inverse.
//!
//! Matrices are `g × g`, row-major. Only the strict lower (for `L`) or
//! strict upper (for `U`) entries are read; the diagonal is implicitly 1.

use crate::frame::Frame;

/// Build a unit triangular matrix from `g * g` random bytes.
///
/// Entries on the wrong side of the diagonal are zeroed and the diagonal
/// is set to 1, so the stored matrix is exactly the one applied.
#[must_use]
pub fn unit_triangular(g: usize, mut coefficients: Vec<u8>, lower: bool) -> Vec<u8> {
    debug_assert_eq!(coefficients.len(), g * g);
    for k in 0..g {
        for m in 0..g {
            let keep = if lower { m < k } else { m > k };
            if k == m {
                coefficients[k * g + m] = 1;
            } else if !keep {
                coefficients[k * g + m] = 0;
            }
        }
    }
    coefficients
}

/// Whether `matrix` is a `g × g` unit lower (or upper) triangular matrix.
#[must_use]
pub fn is_unit_triangular(g: usize, matrix: &[u8], lower: bool) -> bool {
    if matrix.len() != g * g {
        return false;
    }
    (0..g).all(|k| {
        (0..g).all(|m| {
            let v = matrix[k * g + m];
            if k == m {
                v == 1
            } else if (lower && m > k) || (!lower && m < k) {
                v == 0
            } else {
                true
            }
        })
    })
}

/// `dst_row += coef * src_row` (or `-=`), element-wise modulo 256.
fn axpy(group: &mut [u8], row_len: usize, dst: usize, src: usize, coef: u8, subtract: bool) {
    if coef == 0 {
        return;
    }
    let (d, s) = if dst < src {
        let (lo, hi) = group.split_at_mut(src * row_len);
        (&mut lo[dst * row_len..(dst + 1) * row_len], &hi[..row_len])
    } else {
        let (lo, hi) = group.split_at_mut(dst * row_len);
        (&mut hi[..row_len], &lo[src * row_len..(src + 1) * row_len])
    };
    for (a, &b) in d.iter_mut().zip(s.iter()) {
        let t = coef.wrapping_mul(b);
        *a = if subtract {
            a.wrapping_sub(t)
        } else {
            a.wrapping_add(t)
        };
    }
}

fn mix_group(group: &mut [u8], row_len: usize, g: usize, lower: &[u8], upper: &[u8]) {
    // L: descending so every source row is still unmodified.
    for k in (0..g).rev() {
        for m in 0..k {
            axpy(group, row_len, k, m, lower[k * g + m], false);
        }
    }
    // U: ascending for the same reason.
    for k in 0..g {
        for m in k + 1..g {
            axpy(group, row_len, k, m, upper[k * g + m], false);
        }
    }
}

fn unmix_group(group: &mut [u8], row_len: usize, g: usize, lower: &[u8], upper: &[u8]) {
    // Back substitution through U.
    for k in (0..g).rev() {
        for m in k + 1..g {
            axpy(group, row_len, k, m, upper[k * g + m], true);
        }
    }
    // Forward substitution through L.
    for k in 0..g {
        for m in 0..k {
            axpy(group, row_len, k, m, lower[k * g + m], true);
        }
    }
}

/// Apply `U · L` to every group of `g` rows.
#[must_use]
pub fn mix_rows(frame: &Frame, g: usize, lower: &[u8], upper: &[u8]) -> Frame {
    let mut out = frame.clone();
    let row_len = frame.shape().row_len();
    for group in out.data_mut().chunks_exact_mut(g * row_len) {
        mix_group(group, row_len, g, lower, upper);
    }
    out
}

/// Undo [`mix_rows`] with the same matrices.
#[must_use]
pub fn unmix_rows(frame: &Frame, g: usize, lower: &[u8], upper: &[u8]) -> Frame {
    let mut out = frame.clone();
    let row_len = frame.shape().row_len();
    for group in out.data_mut().chunks_exact_mut(g * row_len) {
        unmix_group(group, row_len, g, lower, upper);
    }
    out
}
