//! Byte-wise Shamir secret sharing over GF(2^8) for 32-byte secrets,
//! used by social recovery to split a secret across a set of peers.

use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{IdentityError, Result};
use crate::gf256;

pub const SECRET_LEN: usize = 32;

/// One Shamir share: evaluation point `x` (1..=255, never 0) and the
/// 32-byte evaluation `y` of the per-byte polynomials at `x`. Zeroized on
/// drop, the same as the key material it's split from.
#[derive(Debug, Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Share {
    pub x: u8,
    pub y: [u8; SECRET_LEN],
}

/// Split `secret` into `share_count` shares such that any `threshold` of
/// them reconstitute it, and fewer reveal nothing.
pub fn split(secret: &[u8; SECRET_LEN], threshold: u8, share_count: u8) -> Result<Vec<Share>> {
    if threshold == 0 || threshold > share_count || share_count == 0 {
        return Err(IdentityError::InvalidThreshold);
    }
    let degree = (threshold - 1) as usize;
    // coefficients[byte_index][term] : term 0 is the secret byte itself,
    // terms 1..=degree are random.
    let mut coefficients = vec![[0u8; SECRET_LEN]; degree + 1];
    coefficients[0] = *secret;
    let mut rng = rand::rngs::OsRng;
    for term in coefficients.iter_mut().skip(1) {
        rng.fill_bytes(term);
    }

    let mut shares = Vec::with_capacity(share_count as usize);
    for i in 1..=share_count {
        let x = i;
        let mut y = [0u8; SECRET_LEN];
        for byte_idx in 0..SECRET_LEN {
            let mut acc = 0u8;
            let mut x_pow = 1u8;
            for term in &coefficients {
                acc = gf256::add(acc, gf256::mul(term[byte_idx], x_pow));
                x_pow = gf256::mul(x_pow, x);
            }
            y[byte_idx] = acc;
        }
        shares.push(Share { x, y });
    }
    Ok(shares)
}

/// Reconstitute the secret from at least `threshold` shares via Lagrange
/// interpolation at `x = 0`, one byte position at a time.
pub fn reconstruct(shares: &[Share], threshold: u8) -> Result<[u8; SECRET_LEN]> {
    if shares.len() < threshold as usize {
        return Err(IdentityError::InsufficientShares {
            have: shares.len(),
            need: threshold as usize,
        });
    }
    let used = &shares[..threshold as usize];
    let mut secret = [0u8; SECRET_LEN];
    for byte_idx in 0..SECRET_LEN {
        let mut acc = 0u8;
        for (i, share_i) in used.iter().enumerate() {
            let mut numerator = 1u8;
            let mut denominator = 1u8;
            for (j, share_j) in used.iter().enumerate() {
                if i == j {
                    continue;
                }
                // Lagrange basis at x = 0: prod (0 - x_j) / (x_i - x_j)
                // Over GF(2^8), subtraction is XOR, so (0 - x_j) == x_j.
                numerator = gf256::mul(numerator, share_j.x);
                denominator = gf256::mul(denominator, gf256::add(share_i.x, share_j.x));
            }
            let basis = gf256::div(numerator, denominator);
            acc = gf256::add(acc, gf256::mul(share_i.y[byte_idx], basis));
        }
        secret[byte_idx] = acc;
    }
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_shares_reconstruct_exactly() {
        let secret = [42u8; SECRET_LEN];
        let shares = split(&secret, 3, 5).unwrap();
        let reconstructed = reconstruct(&shares[1..4], 3).unwrap();
        assert_eq!(reconstructed, secret);
    }

    #[test]
    fn any_threshold_subset_reconstructs() {
        let secret: [u8; SECRET_LEN] = std::array::from_fn(|i| i as u8);
        let shares = split(&secret, 4, 7).unwrap();
        let subset_a: Vec<_> = shares[0..4].to_vec();
        let subset_b: Vec<_> = shares[3..7].to_vec();
        assert_eq!(reconstruct(&subset_a, 4).unwrap(), secret);
        assert_eq!(reconstruct(&subset_b, 4).unwrap(), secret);
    }

    #[test]
    fn fewer_than_threshold_shares_errors() {
        let secret = [7u8; SECRET_LEN];
        let shares = split(&secret, 3, 5).unwrap();
        assert!(matches!(
            reconstruct(&shares[0..2], 3),
            Err(IdentityError::InsufficientShares { have: 2, need: 3 })
        ));
    }

    #[test]
    fn invalid_threshold_is_rejected() {
        let secret = [1u8; SECRET_LEN];
        assert!(split(&secret, 0, 5).is_err());
        assert!(split(&secret, 6, 5).is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// any `threshold`-size subset of a split's shares
        /// reconstructs the original secret, for arbitrary secrets and
        /// arbitrary valid (threshold, share_count) pairs.
        #[test]
        fn any_threshold_subset_reconstructs_arbitrary_secret(
            secret in proptest::array::uniform32(any::<u8>()),
            share_count in 2u8..=20,
            threshold_offset in 0u8..18,
            skip in 0u8..4,
        ) {
            let threshold = 2 + (threshold_offset % (share_count - 1).max(1));
            let threshold = threshold.min(share_count);
            let shares = split(&secret, threshold, share_count).unwrap();

            let skip = (skip as usize) % (share_count as usize - threshold as usize + 1).max(1);
            let subset = &shares[skip..skip + threshold as usize];
            prop_assert_eq!(reconstruct(subset, threshold).unwrap(), secret);
        }
    }
}
