//! Transport-abstract connection manager, routing table, dedup cache,
//! priority scheduler, message router/relay, and heartbeat monitor for the
//! mesh message plane (C3, C4, C5, C6, C7, C13).

pub mod dedup;
pub mod error;
pub mod heartbeat;
pub mod router;
pub mod routing;
pub mod scheduler;
pub mod transport;

pub use dedup::DedupCache;
pub use error::{NetError, Result};
pub use heartbeat::HeartbeatMonitor;
pub use router::{DropReason, InboundOutcome, InboundResult, RelayPlan, Router};
pub use routing::{PeerEntry, Route, RoutingTable};
pub use scheduler::{ScheduledSend, Scheduler, ShedEvent};
pub use transport::{ConnectionState, PeerInfo, Transport, TransportEvent, TransportManager};
