//! Canonical wire encoding and message fingerprinting for the mesh message
//! plane. Deterministic and length-prefixed so a header can be re-encoded
//! with its signature zeroed (for signing) or its `ttl` decremented (for
//! relay) and compared byte-for-byte against the original.

pub mod codec;
pub mod error;
pub mod fingerprint;
pub mod header;
pub mod message_type;
pub mod validate;

pub use codec::{decode_frame, decode_header, encode_frame, encode_header, signing_bytes, HEADER_LEN};
pub use error::{Result, WireError};
pub use fingerprint::{Fingerprint, FINGERPRINT_LEN};
pub use header::{MessageHeader, CURRENT_VERSION, SIGNATURE_LEN};
pub use message_type::{MessageType, PriorityHint};
pub use validate::{check_signature, check_skew, SkewBounds};
