use thiserror::Error;

#[derive(Debug, Error)]
pub enum SocialError {
    #[error("peer {0} is not in the pending potential-contacts set")]
    NotPending(String),

    #[error("node {0} presented a public key that conflicts with the one on record")]
    IdentityMismatch(String),
}

pub type Result<T> = std::result::Result<T, SocialError>;
