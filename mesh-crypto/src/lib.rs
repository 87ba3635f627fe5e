//! Cryptographic primitives for the mesh message plane.
//!
//! Ed25519 identities and signatures, Ed25519-to-X25519 conversion, X25519
//! ECDH with mandatory HKDF-SHA256 key derivation, XChaCha20-Poly1305 AEAD,
//! and explicit secure erasure of key material.

pub mod aead;
pub mod error;
pub mod identity;
pub mod wipe;
pub mod x25519;

pub use aead::{aead_open, aead_seal, KEY_LEN, NONCE_LEN, TAG_LEN};
pub use error::{CryptoError, Result};
pub use identity::{verify, Identity, PeerId, PrivateKey, PublicKey, PRIVATE_KEY_LEN, PUBLIC_KEY_LEN, SIGNATURE_LEN};
pub use wipe::{secure_wipe, secure_wipe_vec};
pub use x25519::{ecdh, generate_ephemeral, hkdf_sha256, to_x25519_priv, to_x25519_pub, x25519_pub_from_priv};
