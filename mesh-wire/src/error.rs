use thiserror::Error;

/// Failure modes for decoding and validating a wire frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("malformed message: {0}")]
    BadMessage(String),

    #[error("payload of {actual} bytes exceeds the {max}-byte limit")]
    TooLarge { max: usize, actual: usize },

    #[error("unsupported protocol version {0}")]
    Unsupported(u8),

    #[error("timestamp outside the accepted skew window")]
    TimestampSkew,

    #[error("signature did not verify")]
    SignatureMismatch,
}

pub type Result<T> = std::result::Result<T, WireError>;
