//! Keyed Feistel permutation over a variable bit width
//!
//! An asymmetric two-round Feistel network. The input of width `w` is split
//! into its low `s = w/2` bits and high `t = w - s` bits; each round XORs one
//! half with a strong multiply-shift hash of the other. Because every round
//! is an XOR, running the rounds in reverse order undoes them, which is what
//! lets the cuckoo filter recover a stored entry's hash prefix from its
//! bucket index and fingerprint.

use serde::{Deserialize, Serialize};

/// Low `w` bits of `x`
#[inline]
pub(crate) fn mask(w: u32, x: u64) -> u64 {
    if w >= u64::BITS {
        x
    } else {
        x & ((1u64 << w) - 1)
    }
}

/// The `w` bits of `x` that sit above its low `s + t - w` bits
#[inline]
fn high_bits(s: u32, t: u32, w: u32, x: u64) -> u64 {
    mask(w, x >> (s + t - w))
}

/// Strong multiply-shift of the low `w` bits of `x`, keeping the high
/// `s + t - w` bits of the `s + t` bit product
#[inline]
fn subhash(s: u32, t: u32, w: u32, x: u64, key: [u64; 2]) -> u64 {
    let product = mask(w, x)
        .wrapping_mul(mask(s + t, key[0]))
        .wrapping_add(mask(s + t, key[1]));
    high_bits(s, t, s + t - w, product)
}

/// Two-round Feistel network with one multiply-shift key pair per round
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feistel {
    keys: [[u64; 2]; 2],
}

impl Feistel {
    pub fn new(entropy: [u64; 4]) -> Self {
        Self {
            keys: [[entropy[0], entropy[1]], [entropy[2], entropy[3]]],
        }
    }

    /// Permute the low `width` bits of `x`. Bits above `width` must be zero.
    #[inline]
    pub fn permute_forward(&self, width: u32, x: u64) -> u64 {
        debug_assert!(width <= u64::BITS);
        let s = width / 2;
        let t = width - s;

        let l0 = mask(s, x);
        let r0 = high_bits(s, t, t, x);

        // l1: t bits, r1: s bits
        let l1 = r0;
        let r1 = l0 ^ subhash(s, t, t, r0, self.keys[0]);

        // l2: s bits, r2: t bits
        let l2 = r1;
        let r2 = l1 ^ subhash(s, t, s, r1, self.keys[1]);

        (r2 << s) | l2
    }

    /// Inverse of [`permute_forward`](Self::permute_forward) at the same width
    #[inline]
    pub fn permute_backward(&self, width: u32, x: u64) -> u64 {
        debug_assert!(width <= u64::BITS);
        let s = width / 2;
        let t = width - s;

        let l2 = mask(s, x);
        let r2 = high_bits(s, t, t, x);

        let r1 = l2;
        let l1 = r2 ^ subhash(s, t, s, r1, self.keys[1]);

        let r0 = l1;
        let l0 = r1 ^ subhash(s, t, t, r0, self.keys[0]);

        (r0 << s) | l0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const KEYS: [u64; 4] = [
        0x9E37_79B9_7F4A_7C15,
        0xBF58_476D_1CE4_E5B9,
        0x94D0_49BB_1331_11EB,
        0x2545_F491_4F6C_DD1D,
    ];

    #[test]
    fn test_mask_handles_full_width() {
        assert_eq!(mask(0, u64::MAX), 0);
        assert_eq!(mask(10, u64::MAX), 0x3FF);
        assert_eq!(mask(64, u64::MAX), u64::MAX);
    }

    #[test]
    fn test_round_trip_small_widths_exhaustive() {
        let feistel = Feistel::new(KEYS);
        for width in 1..=12 {
            for x in 0..(1u64 << width) {
                let y = feistel.permute_forward(width, x);
                assert!(y < (1u64 << width), "width {} output {} out of range", width, y);
                assert_eq!(feistel.permute_backward(width, y), x);
            }
        }
    }

    #[test]
    fn test_bijective_on_width_10() {
        let feistel = Feistel::new(KEYS);
        let outputs: HashSet<u64> = (0..1024).map(|x| feistel.permute_forward(10, x)).collect();
        assert_eq!(outputs.len(), 1024);
    }

    #[test]
    fn test_round_trip_wide() {
        let feistel = Feistel::new(KEYS);
        for width in [20, 33, 47, 58, 64] {
            let top = mask(width, u64::MAX);
            for x in [0, 1, top, top / 3, top ^ 0x5555] {
                let x = mask(width, x);
                assert_eq!(feistel.permute_backward(width, feistel.permute_forward(width, x)), x);
            }
        }
    }

    #[test]
    fn test_keys_change_permutation() {
        let a = Feistel::new(KEYS);
        let b = Feistel::new([1, 2, 3, 4]);
        let differs = (0..256).any(|x| a.permute_forward(20, x) != b.permute_forward(20, x));
        assert!(differs);
    }
}
