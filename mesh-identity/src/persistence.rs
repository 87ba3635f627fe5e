//! Plaintext serialization of an `Identity` for storage behind a
//! `PersistentKeyStore`. `mesh-identity` only produces/consumes the
//! plaintext bytes; authenticated encryption of those bytes at rest is the
//! concrete `PersistentKeyStore`'s job (it may be hardware-backed).

use mesh_crypto::{Identity, PrivateKey, PublicKey, PRIVATE_KEY_LEN, PUBLIC_KEY_LEN};

use crate::error::{IdentityError, Result};

struct SerializedIdentity {
    public: [u8; PUBLIC_KEY_LEN],
    private: [u8; PRIVATE_KEY_LEN],
}

/// Encode an identity's raw key material as the plaintext a
/// `PersistentKeyStore::wrap` call will seal.
pub fn export_identity(identity: &Identity) -> Vec<u8> {
    let serialized = SerializedIdentity {
        public: *identity.public.as_bytes(),
        private: *identity.private_key().as_bytes(),
    };
    encode_fixed(&serialized)
}

/// Reconstruct an identity from the plaintext produced by
/// `PersistentKeyStore::unwrap`.
pub fn import_identity(bytes: &[u8]) -> Result<Identity> {
    let serialized: SerializedIdentity =
        decode_fixed(bytes).map_err(|e| IdentityError::BadKey(e.to_string()))?;
    let public = PublicKey::from_bytes(&serialized.public).map_err(|e| IdentityError::BadKey(e.to_string()))?;
    let private =
        PrivateKey::from_bytes(&serialized.private).map_err(|e| IdentityError::BadKey(e.to_string()))?;
    Ok(Identity::from_keys(public, private))
}

fn encode_fixed(value: &SerializedIdentity) -> Vec<u8> {
    let mut out = Vec::with_capacity(PUBLIC_KEY_LEN + PRIVATE_KEY_LEN);
    out.extend_from_slice(&value.public);
    out.extend_from_slice(&value.private);
    out
}

fn decode_fixed(bytes: &[u8]) -> std::result::Result<SerializedIdentity, &'static str> {
    if bytes.len() != PUBLIC_KEY_LEN + PRIVATE_KEY_LEN {
        return Err("serialized identity has the wrong length");
    }
    let mut public = [0u8; PUBLIC_KEY_LEN];
    let mut private = [0u8; PRIVATE_KEY_LEN];
    public.copy_from_slice(&bytes[..PUBLIC_KEY_LEN]);
    private.copy_from_slice(&bytes[PUBLIC_KEY_LEN..]);
    Ok(SerializedIdentity { public, private })
}
