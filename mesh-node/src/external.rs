//! Injectable external collaborators: `PersistentKeyStore`,
//! `BlobStore`, `Clock`, `Rng`. `Transport` lives in `mesh_net` and is
//! re-exported from the crate root for convenience. Concrete
//! platform-specific implementations (hardware keystores, database-backed
//! blob stores) are out of scope Non-goals; only an
//! in-memory reference implementation ships here, for tests and examples.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use mesh_crypto::{aead_open, aead_seal, CryptoError, Identity, KEY_LEN};
use parking_lot::Mutex;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Wall-clock abstraction so the facade and its subsystems can be driven
/// deterministically in tests.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_millis() as u64
    }
}

/// Randomness abstraction for invite codes, share generation, and nonces
/// that call sites want to control in tests.
pub trait Rng: Send + Sync {
    fn fill_bytes(&self, dest: &mut [u8]);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OsRng;

impl Rng for OsRng {
    fn fill_bytes(&self, dest: &mut [u8]) {
        rand::rngs::OsRng.fill_bytes(dest);
    }
}

/// Authenticated storage for the node's long-lived identity. Real
/// implementations may back this with hardware-protected keys; only
/// `wrap`/`unwrap` being authenticated encryption is required here.
#[async_trait]
pub trait PersistentKeyStore: Send + Sync {
    async fn get_or_create_identity(&self) -> Result<Identity, PersistentKeyStoreError>;
    async fn wrap(&self, plaintext: &[u8]) -> Result<Vec<u8>, PersistentKeyStoreError>;
    async fn unwrap(&self, ciphertext: &[u8]) -> Result<Vec<u8>, PersistentKeyStoreError>;
}

#[derive(thiserror::Error, Debug)]
pub enum PersistentKeyStoreError {
    #[error("aead error: {0}")]
    Aead(#[from] CryptoError),
    #[error("no identity has been provisioned")]
    NotProvisioned,
    #[error("wrapped ciphertext is truncated")]
    Truncated,
}

/// Content-addressed blob storage for file transfer, out of the core
/// message plane — the core only ever references blobs by
/// identifier inside payloads.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, bytes: Vec<u8>) -> Result<String, BlobStoreError>;
    async fn get(&self, content_id: &str) -> Result<Vec<u8>, BlobStoreError>;
    async fn has(&self, content_id: &str) -> bool;
}

#[derive(thiserror::Error, Debug)]
pub enum BlobStoreError {
    #[error("blob {0} not found")]
    NotFound(String),
}

/// In-memory `PersistentKeyStore` suitable for tests and examples: holds a
/// single generated identity and wraps/unwraps with the node's own AEAD
/// primitives so the authenticated-encryption contract is exercised for
/// real rather than stubbed out.
pub struct InMemoryKeyStore {
    identity: Mutex<Option<Identity>>,
    wrap_key: [u8; KEY_LEN],
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        let mut wrap_key = [0u8; KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut wrap_key);
        Self { identity: Mutex::new(None), wrap_key }
    }
}

impl Default for InMemoryKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersistentKeyStore for InMemoryKeyStore {
    async fn get_or_create_identity(&self) -> Result<Identity, PersistentKeyStoreError> {
        let mut guard = self.identity.lock();
        if guard.is_none() {
            *guard = Some(Identity::generate());
        }
        Ok(guard.as_ref().expect("just provisioned").clone())
    }

    async fn wrap(&self, plaintext: &[u8]) -> Result<Vec<u8>, PersistentKeyStoreError> {
        let (nonce, ct) = aead_seal(&self.wrap_key, plaintext, b"mesh-node-keystore")?;
        let mut out = Vec::with_capacity(nonce.len() + ct.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ct);
        Ok(out)
    }

    async fn unwrap(&self, ciphertext: &[u8]) -> Result<Vec<u8>, PersistentKeyStoreError> {
        if ciphertext.len() < mesh_crypto::NONCE_LEN {
            return Err(PersistentKeyStoreError::Truncated);
        }
        let (nonce_bytes, ct) = ciphertext.split_at(mesh_crypto::NONCE_LEN);
        let mut nonce = [0u8; mesh_crypto::NONCE_LEN];
        nonce.copy_from_slice(nonce_bytes);
        Ok(aead_open(&self.wrap_key, &nonce, ct, b"mesh-node-keystore")?)
    }
}

/// In-memory `BlobStore` suitable for tests and examples.
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, bytes: Vec<u8>) -> Result<String, BlobStoreError> {
        let id = hex::encode(Sha256::digest(&bytes));
        self.blobs.lock().insert(id.clone(), bytes);
        Ok(id)
    }

    async fn get(&self, content_id: &str) -> Result<Vec<u8>, BlobStoreError> {
        self.blobs
            .lock()
            .get(content_id)
            .cloned()
            .ok_or_else(|| BlobStoreError::NotFound(content_id.to_string()))
    }

    async fn has(&self, content_id: &str) -> bool {
        self.blobs.lock().contains_key(content_id)
    }
}
