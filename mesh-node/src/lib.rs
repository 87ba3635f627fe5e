//! Mesh node library: configuration loading, injectable external
//! collaborators, and the `MeshNode` facade (C12) that assembles every
//! other crate in the workspace into one running node.

pub mod config;
pub mod error;
pub mod external;
pub mod node;

pub use config::{CliArgs, NodeConfig};
pub use error::{MeshError, Result};
pub use external::{
    BlobStore, BlobStoreError, Clock, InMemoryBlobStore, InMemoryKeyStore, OsRng,
    PersistentKeyStore, PersistentKeyStoreError, Rng, SystemClock,
};
pub use node::{Event, EventStream, IdentityView, MeshNode, NodeState};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
