use thiserror::Error;

/// Failure modes for the cryptographic primitives.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("signature did not verify")]
    SignatureMismatch,

    #[error("AEAD authentication failed")]
    AeadAuthFailure,

    #[error("HKDF output length is invalid for this hash function")]
    InvalidKdfLength,
}

pub type Result<T> = std::result::Result<T, CryptoError>;
