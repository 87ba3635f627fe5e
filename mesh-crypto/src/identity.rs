//! Ed25519 identity keypairs, signing, and verification.

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, Result};

pub const PUBLIC_KEY_LEN: usize = 32;
pub const PRIVATE_KEY_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;

/// Ed25519 public key. Also the basis for the wire-level `sender_id`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; PUBLIC_KEY_LEN] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: PUBLIC_KEY_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    /// The peer ID: uppercase hex of the public key, as the peer identifier convention defines it.
    pub fn peer_id(&self) -> PeerId {
        PeerId(hex::encode_upper(self.0))
    }

    fn verifying_key(&self) -> Result<VerifyingKey> {
        VerifyingKey::from_bytes(&self.0).map_err(|_| CryptoError::SignatureMismatch)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.0))
    }
}

/// Ed25519 private key. Zeroized on drop; never serialized.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey([u8; PRIVATE_KEY_LEN]);

impl PrivateKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; PRIVATE_KEY_LEN] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: PRIVATE_KEY_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; PRIVATE_KEY_LEN] {
        &self.0
    }

    fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.0)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey(**redacted**)")
    }
}

/// Constant-time equality: never branch on secret key bytes.
impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for PrivateKey {}

/// Peer ID: uppercase hex of a public key, whitespace-stripped for comparison
/// (comparison ignores case and whitespace).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    pub fn normalize(raw: &str) -> Self {
        Self(raw.split_whitespace().collect::<String>().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PeerId {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::normalize(s))
    }
}

/// An Ed25519 identity: public/private keypair, zeroized on drop.
#[derive(Clone)]
pub struct Identity {
    pub public: PublicKey,
    private: PrivateKey,
}

impl Identity {
    /// Generate a new identity from a CSPRNG.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let public = PublicKey(signing_key.verifying_key().to_bytes());
        let private = PrivateKey(signing_key.to_bytes());
        Self { public, private }
    }

    pub fn from_keys(public: PublicKey, private: PrivateKey) -> Self {
        Self { public, private }
    }

    pub fn peer_id(&self) -> PeerId {
        self.public.peer_id()
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private
    }

    /// Sign arbitrary bytes. Ed25519 signing is
    /// deterministic given (key, message).
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LEN] {
        self.private.signing_key().sign(message).to_bytes()
    }
}

/// Verify a signature against a message and public key.
/// Comparison is constant-time inside `ed25519_dalek::Verifier`.
pub fn verify(message: &[u8], signature: &[u8], public: &PublicKey) -> bool {
    let Ok(vk) = public.verifying_key() else {
        return false;
    };
    let sig = match ed25519_dalek::Signature::from_slice(signature) {
        Ok(s) => s,
        Err(_) => return false,
    };
    vk.verify(message, &sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_roundtrip() {
        let id = Identity::generate();
        let msg = b"hello mesh";
        let sig = id.sign(msg);
        assert!(verify(msg, &sig, &id.public));
    }

    #[test]
    fn flipped_message_byte_fails() {
        let id = Identity::generate();
        let mut msg = b"hello mesh".to_vec();
        let sig = id.sign(&msg);
        msg[0] ^= 1;
        assert!(!verify(&msg, &sig, &id.public));
    }

    #[test]
    fn flipped_signature_byte_fails() {
        let id = Identity::generate();
        let msg = b"hello mesh";
        let mut sig = id.sign(msg);
        sig[0] ^= 1;
        assert!(!verify(msg, &sig, &id.public));
    }

    #[test]
    fn peer_id_normalizes_whitespace_and_case() {
        let id = Identity::generate();
        let canonical = id.peer_id();
        let noisy = format!(" {} \n", canonical.as_str().to_lowercase());
        assert_eq!(PeerId::normalize(&noisy), canonical);
    }

    #[test]
    fn wrong_key_length_rejected() {
        assert!(PublicKey::from_bytes(&[0u8; 10]).is_err());
        assert!(PrivateKey::from_bytes(&[0u8; 31]).is_err());
    }
}
