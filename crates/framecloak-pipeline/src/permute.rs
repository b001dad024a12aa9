//! Row-group permutation.
//!
//! Rows are partitioned into contiguous groups of `group_size` rows.
//! Group `i` is moved, as a block, to group position `destinations[i]`.
//! Applying the inverse table (see [`crate::rng::invert`]) moves every
//! group back.

use crate::frame::Frame;

/// Move row groups to their destination positions.
///
/// `destinations.len() * group_size` must equal the frame height; the
/// caller (step calibration) guarantees it.
#[must_use]
pub fn permute_row_groups(frame: &Frame, group_size: usize, destinations: &[usize]) -> Frame {
    let shape = frame.shape();
    debug_assert_eq!(destinations.len() * group_size, shape.height);

    let block = group_size * shape.row_len();
    let src = frame.as_raw();
    let mut out = vec![0u8; shape.sample_count()];

    for (i, &dest) in destinations.iter().enumerate() {
        out[dest * block..(dest + 1) * block].copy_from_slice(&src[i * block..(i + 1) * block]);
    }

    Frame::from_parts(shape, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng;
    use crate::types::Shape;

    fn row_index_frame(h: usize) -> Frame {
        Frame::from_fn(Shape::new(h, 2, 1), |y, _, _| u8::try_from(y).unwrap_or(0))
    }

    #[test]
    fn moves_whole_groups() {
        let f = row_index_frame(6);
        // groups: [0,1] [2,3] [4,5]; group 0 -> slot 2, 1 -> 0, 2 -> 1
        let p = permute_row_groups(&f, 2, &[2, 0, 1]);
        let firsts: Vec<u8> = (0..6).map(|y| p.row(y)[0]).collect();
        assert_eq!(firsts, vec![2, 3, 4, 5, 0, 1]);
    }

    #[test]
    fn inverse_table_restores_input() {
        let f = Frame::from_fn(Shape::new(24, 5, 3), |y, x, c| {
            u8::try_from((y * 11 + x * 5 + c) % 256).unwrap_or(0)
        });
        let perm = rng::permutation(6, &mut rng::seeded(3, 6, rng::DOMAIN_GROUP_PERMUTATION));
        let scrambled = permute_row_groups(&f, 4, &perm);
        let restored = permute_row_groups(&scrambled, 4, &rng::invert(&perm));
        assert_eq!(restored, f);
    }

    #[test]
    fn identity_permutation_is_noop() {
        let f = row_index_frame(4);
        assert_eq!(permute_row_groups(&f, 1, &[0, 1, 2, 3]), f);
    }
}
