use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The quota manager could not free enough room to admit this message.
    #[error("store quota exceeded: {used} of {max} bytes in use")]
    QuotaExceeded { used: u64, max: u64 },

    /// A `QuotaExceeded` on an own outbound message that must not be
    /// silently dropped; the caller (typically the facade) surfaces this
    /// to the UI rather than discarding the message.
    #[error("message must be retained by the caller; admission failed")]
    MustRetain,

    #[error("no stored message with id {0}")]
    NotFound(uuid::Uuid),

    #[error(transparent)]
    Wire(#[from] mesh_wire::WireError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
