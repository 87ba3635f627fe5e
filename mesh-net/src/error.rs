use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetError {
    #[error("transport manager is not running")]
    NotRunning,

    #[error("no route to peer {0}")]
    NoRoute(String),

    #[error("peer {0} is unreachable")]
    PeerUnreachable(String),

    #[error("egress queue is over its bandwidth budget")]
    Backpressure,

    #[error("connection attempt timed out")]
    ConnectTimeout,

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("transport {0} is unknown to this manager")]
    UnknownTransport(String),

    #[error(transparent)]
    Wire(#[from] mesh_wire::WireError),
}

pub type Result<T> = std::result::Result<T, NetError>;
