use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("key material is malformed: {0}")]
    BadKey(String),

    #[error("invite or share payload has expired")]
    Expired,

    #[error("invite was already redeemed or explicitly revoked")]
    Revoked,

    #[error("no invite or share found for that code")]
    Unknown,

    #[error("invite signature did not verify")]
    BadSignature,

    #[error("payload version {found} is incompatible with supported major {supported}")]
    Unsupported { found: u8, supported: u8 },

    #[error("encoded payload of {actual} bytes exceeds the {max}-byte limit")]
    TooLarge { max: usize, actual: usize },

    #[error("timestamp outside the accepted skew window")]
    TimestampSkew,

    #[error("checksum mismatch on decoded payload")]
    BadChecksum,

    #[error("fewer than the threshold number of shares were supplied: have {have}, need {need}")]
    InsufficientShares { have: usize, need: usize },

    #[error("reconstituted secret's fingerprint does not match the expected one")]
    BadFingerprint,

    #[error("share threshold must satisfy 1 <= threshold <= share count")]
    InvalidThreshold,
}

pub type Result<T> = std::result::Result<T, IdentityError>;
