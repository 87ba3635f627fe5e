//! Identity persistence, social recovery secret splitting, and invite/share
//! payloads for the mesh message plane.

pub mod error;
pub mod gf256;
pub mod invite;
pub mod persistence;
pub mod recovery;
pub mod shamir;
pub mod share_payload;

pub use error::{IdentityError, Result};
pub use invite::{create_invite, Contact, CreateInviteOptions, InviteRegistry, PendingInvite, DEFAULT_TTL_MS};
pub use persistence::{export_identity, import_identity};
pub use recovery::{
    fingerprint_of, open_share, reconstruct_and_verify, reseal_share, split_and_seal, SealedShare,
};
pub use shamir::{Share, SECRET_LEN};
pub use share_payload::{
    build_deep_link, build_https_link, decode as decode_share_payload, decode_bootstrap,
    encode as encode_share_payload, encode_bootstrap, extract_code, BootstrapPayload, BootstrapPeer,
    SharePayload, CURRENT_MAJOR, MAX_BOOTSTRAP_PEERS, MAX_ENCODED_BYTES, MAX_SKEW_MS,
};
