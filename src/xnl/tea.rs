//! TEA-family block cipher used for the XNL authentication response.
//!
//! The cipher runs 32 rounds over a 64-bit block held as two 32-bit halves.
//! It exists solely to interoperate with the fielded peer; no security
//! claim is made, and the key material is calibration data injected by the
//! caller.

use serde::{Deserialize, Serialize};

/// Block size in bytes.
pub const BLOCK_SIZE: usize = 8;

/// Number of cipher rounds.
const ROUNDS: u32 = 32;

/// Key material for the authentication cipher: four 32-bit key words plus
/// the per-deployment round delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeaKey {
    /// Key words k0..k3.
    pub k: [u32; 4],
    /// Round constant added to the running sum each round.
    pub delta: u32,
}

impl TeaKey {
    /// Construct from key words and delta.
    #[must_use]
    pub const fn new(k: [u32; 4], delta: u32) -> Self {
        Self { k, delta }
    }
}

/// Encrypt one 64-bit block.
///
/// The block is read as two big-endian 32-bit halves (lo, hi) and written
/// back the same way. All arithmetic is wrapping 32-bit.
#[must_use]
pub fn encrypt_block(key: &TeaKey, block: [u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
    let [k0, k1, k2, k3] = key.k;
    let mut lo = u32::from_be_bytes([block[0], block[1], block[2], block[3]]);
    let mut hi = u32::from_be_bytes([block[4], block[5], block[6], block[7]]);
    let mut sum = 0u32;

    for _ in 0..ROUNDS {
        sum = sum.wrapping_add(key.delta);
        lo = lo.wrapping_add(
            (hi.wrapping_shl(4).wrapping_add(k0))
                ^ hi.wrapping_add(sum)
                ^ (hi.wrapping_shr(5).wrapping_add(k1)),
        );
        hi = hi.wrapping_add(
            (lo.wrapping_shl(4).wrapping_add(k2))
                ^ lo.wrapping_add(sum)
                ^ (lo.wrapping_shr(5).wrapping_add(k3)),
        );
    }

    let mut out = [0u8; BLOCK_SIZE];
    out[..4].copy_from_slice(&lo.to_be_bytes());
    out[4..].copy_from_slice(&hi.to_be_bytes());
    out
}
