//! Invite tokens (C11): signed, time-bounded, single-use invitations that
//! let a new peer bootstrap trust with an inviter before ever exchanging a
//! message.

use std::collections::HashMap;

use mesh_crypto::{verify, Identity, PeerId, PublicKey};
use rand::RngCore;
use tracing::{info, warn};

use crate::error::{IdentityError, Result};

pub const DEFAULT_TTL_MS: u64 = 604_800_000; // 7 days

/// A contact established by redeeming an invite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub peer_id: PeerId,
    pub public_key: PublicKey,
    pub established_at_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct CreateInviteOptions {
    pub inviter_name: Option<String>,
    pub ttl_ms: Option<u64>,
    pub bootstrap_peers: Vec<PeerId>,
    pub metadata: Option<String>,
}

/// An invite awaiting redemption. `signature` covers the code bytes, so a
/// recipient can verify provenance before trusting the inviter's claimed
/// identity in a deep link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInvite {
    pub code: String,
    pub inviter_peer_id: PeerId,
    pub inviter_public_key: PublicKey,
    pub inviter_name: Option<String>,
    pub created_at_ms: u64,
    pub expires_at_ms: u64,
    pub signature: [u8; 64],
    pub bootstrap_peers: Vec<PeerId>,
    pub metadata: Option<String>,
}

fn random_code() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn create_invite(identity: &Identity, opts: CreateInviteOptions, now_ms: u64) -> PendingInvite {
    let code = random_code();
    let ttl = opts.ttl_ms.unwrap_or(DEFAULT_TTL_MS);
    let signature = identity.sign(code.as_bytes());
    info!(inviter = %identity.peer_id(), expires_at_ms = now_ms + ttl, "invite created");
    PendingInvite {
        code,
        inviter_peer_id: identity.peer_id(),
        inviter_public_key: identity.public,
        inviter_name: opts.inviter_name,
        created_at_ms: now_ms,
        expires_at_ms: now_ms + ttl,
        signature,
        bootstrap_peers: opts.bootstrap_peers,
        metadata: opts.metadata,
    }
}

/// Tracks outstanding invites so `validate`/`redeem` can enforce one-time
/// use and expiry. Single-writer; callers serialize access the same way
/// they do with the rest of C12's identity state.
#[derive(Default)]
pub struct InviteRegistry {
    invites: HashMap<String, PendingInvite>,
}

impl InviteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, invite: PendingInvite) {
        self.invites.insert(invite.code.clone(), invite);
    }

    /// Look up an invite without consuming it, checking expiry and
    /// signature.
    pub fn validate(&self, code: &str, now_ms: u64) -> Result<&PendingInvite> {
        let invite = self.invites.get(code).ok_or(IdentityError::Unknown)?;
        if now_ms > invite.expires_at_ms {
            return Err(IdentityError::Expired);
        }
        if !verify(invite.code.as_bytes(), &invite.signature, &invite.inviter_public_key) {
            return Err(IdentityError::BadSignature);
        }
        Ok(invite)
    }

    /// Consume the invite and return the resulting contact. A second call
    /// with the same code returns `Unknown`: an invite is redeemable once.
    pub fn redeem(&mut self, code: &str, now_ms: u64) -> Result<Contact> {
        let invite = match self.validate(code, now_ms) {
            Ok(invite) => invite,
            Err(e) => {
                warn!(code, error = %e, "invite redemption rejected");
                return Err(e);
            }
        };
        let contact = Contact {
            peer_id: invite.inviter_peer_id.clone(),
            public_key: invite.inviter_public_key,
            established_at_ms: now_ms,
        };
        self.invites.remove(code);
        info!(inviter = %contact.peer_id, "invite redeemed");
        Ok(contact)
    }
}
