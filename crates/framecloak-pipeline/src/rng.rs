//! Deterministic, platform-independent randomness for step calibration.
//!
//! All fitted tables are derived from a ChaCha20 stream whose 32-byte key
//! is built from the step's `random_seed`, the number of row groups, and
//! a per-table domain tag:
//!
//! ```text
//! [ 0.. 8] random_seed  (u64, little-endian)
//! [ 8..16] group_count  (u64, little-endian)
//! [16..24] domain tag   (8 ASCII bytes, e.g. b"rowperm\0")
//! [24..32] b"fcloak\x00\x01"
//! ```
//!
//! Shuffles are Fisher-Yates with `u32` ranges. `usize` is 32-bit on
//! WASM and 64-bit on native, and `gen_range` over `usize` consumes a
//! different amount of entropy on each, which would produce different
//! permutations for the same seed.

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Domain tag for row-group permutations.
pub const DOMAIN_GROUP_PERMUTATION: [u8; 8] = *b"rowperm\0";
/// Domain tag for the lower-triangular mixing matrix.
pub const DOMAIN_MIX_LOWER: [u8; 8] = *b"mixlow\0\0";
/// Domain tag for the upper-triangular mixing matrix.
pub const DOMAIN_MIX_UPPER: [u8; 8] = *b"mixupp\0\0";

const KEY_SUFFIX: [u8; 8] = *b"fcloak\x00\x01";

/// Build the generator for one calibration table.
#[must_use]
pub fn seeded(random_seed: u64, group_count: usize, domain: [u8; 8]) -> ChaCha20Rng {
    let mut key = [0u8; 32];
    key[..8].copy_from_slice(&random_seed.to_le_bytes());
    key[8..16].copy_from_slice(&(group_count as u64).to_le_bytes());
    key[16..24].copy_from_slice(&domain);
    key[24..].copy_from_slice(&KEY_SUFFIX);
    ChaCha20Rng::from_seed(key)
}

/// A uniformly random permutation of `0..n`.
///
/// Entry `i` is the destination of element `i`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn permutation(n: usize, rng: &mut ChaCha20Rng) -> Vec<usize> {
    let mut perm: Vec<usize> = (0..n).collect();
    for i in (1..n).rev() {
        let j = rng.gen_range(0..=(i as u32)) as usize;
        perm.swap(i, j);
    }
    perm
}

/// The inverse of a permutation: `inverse[perm[i]] == i`.
#[must_use]
pub fn invert(perm: &[usize]) -> Vec<usize> {
    let mut inverse = vec![0; perm.len()];
    for (i, &p) in perm.iter().enumerate() {
        inverse[p] = i;
    }
    inverse
}

/// Whether `perm` is a permutation of `0..perm.len()`.
#[must_use]
pub fn is_permutation(perm: &[usize]) -> bool {
    let mut seen = vec![false; perm.len()];
    for &p in perm {
        match seen.get_mut(p) {
            Some(s) if !*s => *s = true,
            _ => return false,
        }
    }
    true
}

/// `len` bytes drawn from the generator.
#[must_use]
pub fn bytes(len: usize, rng: &mut ChaCha20Rng) -> Vec<u8> {
    let mut out = vec![0u8; len];
    rng.fill_bytes(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = permutation(64, &mut seeded(7, 64, DOMAIN_GROUP_PERMUTATION));
        let b = permutation(64, &mut seeded(7, 64, DOMAIN_GROUP_PERMUTATION));
        assert_eq!(a, b);
    }

    #[test]
    fn is_a_permutation() {
        let p = permutation(100, &mut seeded(1, 100, DOMAIN_GROUP_PERMUTATION));
        assert!(is_permutation(&p));
        let mut sorted = p.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn seed_group_count_and_domain_all_matter() {
        let base = permutation(32, &mut seeded(1, 32, DOMAIN_GROUP_PERMUTATION));
        let other_seed = permutation(32, &mut seeded(2, 32, DOMAIN_GROUP_PERMUTATION));
        let other_count = permutation(32, &mut seeded(1, 33, DOMAIN_GROUP_PERMUTATION));
        let other_domain = permutation(32, &mut seeded(1, 32, DOMAIN_MIX_LOWER));
        assert_ne!(base, other_seed);
        assert_ne!(base, other_count);
        assert_ne!(base, other_domain);
    }

    #[test]
    fn invert_composes_to_identity() {
        let p = permutation(50, &mut seeded(9, 50, DOMAIN_GROUP_PERMUTATION));
        let inv = invert(&p);
        for i in 0..50 {
            assert_eq!(inv[p[i]], i);
            assert_eq!(p[inv[i]], i);
        }
    }

    #[test]
    fn is_permutation_rejects_duplicates_and_out_of_range() {
        assert!(is_permutation(&[2, 0, 1]));
        assert!(!is_permutation(&[0, 0, 1]));
        assert!(!is_permutation(&[0, 3, 1]));
        assert!(is_permutation(&[]));
    }

    #[test]
    fn trivial_permutations() {
        let mut rng = seeded(0, 1, DOMAIN_GROUP_PERMUTATION);
        assert_eq!(permutation(0, &mut rng), Vec::<usize>::new());
        assert_eq!(permutation(1, &mut rng), vec![0]);
    }
}
