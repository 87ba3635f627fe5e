//! Durable store-and-forward engine (C8) for the mesh message plane: an
//! outbox and relay cache with quota-aware eviction, indexed for the
//! delivery loop that drains pending messages to peers as they become
//! reachable.

pub mod error;
pub mod quota;
pub mod store;
pub mod types;

pub use error::{Result, StoreError};
pub use quota::{QuotaConfig, QuotaManager, QuotaStatus};
pub use store::{MaintenanceReport, Store};
pub use types::{MessageId, Priority, Status, StoredMessage};
