//! Top-level error type wrapping every subsystem error so callers can
//! match on one enum instead of threading each crate's error type through
//! the facade's public API.

use mesh_identity::IdentityError;
use mesh_net::NetError;
use mesh_social::SocialError;
use mesh_store::StoreError;
use mesh_wire::WireError;

pub type Result<T> = std::result::Result<T, MeshError>;

#[derive(thiserror::Error, Debug)]
pub enum MeshError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("node is not in the required state for this operation: {0}")]
    InvalidState(String),

    #[error("wire protocol error: {0}")]
    Wire(#[from] WireError),

    #[error("networking error: {0}")]
    Net(#[from] NetError),

    #[error("store-and-forward error: {0}")]
    Store(#[from] StoreError),

    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("social layer error: {0}")]
    Social(#[from] SocialError),

    #[error("configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
