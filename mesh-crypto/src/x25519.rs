//! Edwards -> Montgomery key conversion, ECDH, and HKDF.
//!
//! Raw ECDH output is never used directly as a symmetric key; every ECDH is
//! followed by HKDF-SHA256 with a context label.

use curve25519_dalek::edwards::CompressedEdwardsY;
use sha2::{Digest, Sha256, Sha512};
use x25519_dalek::{PublicKey as XPublicKey, StaticSecret as XPrivateKey};

use crate::error::{CryptoError, Result};
use crate::identity::{PrivateKey, PublicKey};

/// Convert an Ed25519 public key to its birationally-equivalent X25519
/// Montgomery public key.
pub fn to_x25519_pub(ed_pub: &PublicKey) -> Result<[u8; 32]> {
    let compressed = CompressedEdwardsY(*ed_pub.as_bytes());
    let point = compressed
        .decompress()
        .ok_or(CryptoError::InvalidKdfLength)?;
    Ok(point.to_montgomery().to_bytes())
}

/// Convert an Ed25519 private key (32-byte seed) to its corresponding X25519
/// private scalar: SHA-512 the seed, keep the low 32 bytes, clamp (the
/// `x25519_dalek::StaticSecret` constructor applies the standard clamp).
pub fn to_x25519_priv(ed_priv: &PrivateKey) -> [u8; 32] {
    let mut hasher = Sha512::new();
    hasher.update(ed_priv.as_bytes());
    let digest = hasher.finalize();
    let mut scalar_bytes = [0u8; 32];
    scalar_bytes.copy_from_slice(&digest[..32]);
    let secret = XPrivateKey::from(scalar_bytes);
    secret.to_bytes()
}

/// Diffie-Hellman on X25519, followed by HKDF-SHA256 with `label` as the
/// `info` parameter, producing a 32-byte symmetric key.
pub fn ecdh(x_priv: &[u8; 32], x_pub: &[u8; 32], label: &[u8; 16]) -> [u8; 32] {
    let secret = XPrivateKey::from(*x_priv);
    let public = XPublicKey::from(*x_pub);
    let shared = secret.diffie_hellman(&public);
    hkdf_sha256(shared.as_bytes(), label)
}

/// HKDF-SHA256 over `ikm` with `info` as context, producing a 32-byte key.
pub fn hkdf_sha256(ikm: &[u8], info: &[u8]) -> [u8; 32] {
    let hk = hkdf::Hkdf::<Sha256>::new(None, ikm);
    let mut okm = [0u8; 32];
    // 32 bytes is always a valid HKDF-SHA256 output length (max is 255*32).
    hk.expand(info, &mut okm).expect("32-byte HKDF output is always valid");
    okm
}

/// X25519 public key corresponding to a private scalar (used to check the
/// birational-equivalence invariant in tests and by callers constructing
/// ephemeral keys).
pub fn x25519_pub_from_priv(x_priv: &[u8; 32]) -> [u8; 32] {
    XPublicKey::from(&XPrivateKey::from(*x_priv)).to_bytes()
}

/// Generate a fresh ephemeral X25519 keypair (used by ECIES sealing, C9/C11).
pub fn generate_ephemeral() -> ([u8; 32], [u8; 32]) {
    let secret = XPrivateKey::random_from_rng(rand::rngs::OsRng);
    let public = XPublicKey::from(&secret);
    (secret.to_bytes(), public.to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;

    #[test]
    fn ed25519_to_x25519_is_birationally_consistent() {
        let id = Identity::generate();
        let x_priv = to_x25519_priv(id.private_key());
        let x_pub_from_priv = x25519_pub_from_priv(&x_priv);
        let x_pub_from_ed_pub = to_x25519_pub(&id.public).unwrap();
        assert_eq!(x_pub_from_priv, x_pub_from_ed_pub);
    }

    #[test]
    fn ecdh_is_symmetric() {
        let (a_priv, a_pub) = generate_ephemeral();
        let (b_priv, b_pub) = generate_ephemeral();
        let label = *b"mesh-ecies-label";
        let k1 = ecdh(&a_priv, &b_pub, &label);
        let k2 = ecdh(&b_priv, &a_pub, &label);
        assert_eq!(k1, k2);
    }

    #[test]
    fn different_labels_yield_different_keys() {
        let (a_priv, _a_pub) = generate_ephemeral();
        let (_b_priv, b_pub) = generate_ephemeral();
        let k1 = ecdh(&a_priv, &b_pub, b"label-aaaaaaaaaa");
        let k2 = ecdh(&a_priv, &b_pub, b"label-bbbbbbbbbb");
        assert_ne!(k1, k2);
    }
}
