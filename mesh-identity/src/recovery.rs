//! Social Recovery Splitter (C9): Shamir-split a secret across peers, then
//! ECIES-seal each share to its recipient's X25519 public key so that only
//! that recipient can read it, even though the unsealed share travels
//! through the mesh's ordinary store-and-forward path.

use mesh_crypto::{aead_open, aead_seal, ecdh, generate_ephemeral, secure_wipe_vec};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::{IdentityError, Result};
use crate::shamir::{self, Share, SECRET_LEN};

const ECIES_LABEL: &[u8; 16] = b"recovery-ecies-1";

/// A share sealed to one recipient. `share_id` doubles as the share's
/// Shamir evaluation point `x`, since recovery needs it to interpolate and
/// nothing else in this design needs a share identifier distinct from it.
#[derive(Debug, Clone)]
pub struct SealedShare {
    pub share_id: u8,
    pub ciphertext: Vec<u8>,
    pub ephemeral_pub: [u8; 32],
    pub nonce: [u8; 24],
    pub threshold: u8,
    pub fingerprint: [u8; 32],
}

/// Split `secret` into `share_count` shares and seal each to the
/// corresponding entry in `recipient_x25519_pubs` (same order, same
/// length). `fingerprint` is carried unchanged in every sealed share so the
/// eventual recovery caller can confirm a successful reconstruction.
pub fn split_and_seal(
    secret: &[u8; SECRET_LEN],
    threshold: u8,
    recipient_x25519_pubs: &[[u8; 32]],
    fingerprint: [u8; 32],
) -> Result<Vec<SealedShare>> {
    let share_count = recipient_x25519_pubs.len();
    if share_count == 0 || share_count > u8::MAX as usize {
        return Err(IdentityError::InvalidThreshold);
    }
    let shares = shamir::split(secret, threshold, share_count as u8)?;
    info!(share_count, threshold, "secret split for social recovery");
    shares
        .iter()
        .zip(recipient_x25519_pubs.iter())
        .map(|(share, recipient_pub)| seal_share(share, threshold, fingerprint, recipient_pub))
        .collect()
}

/// Re-seals an already-held, already-opened share to a new recipient's
/// X25519 public key. A share holder uses this to answer a recovery
/// request: open the share addressed to them with `open_share`, then
/// reseal the plaintext `Share` to the requester's ephemeral pubkey
/// without ever needing the original secret or the other shares.
pub fn reseal_share(
    share: &Share,
    threshold: u8,
    fingerprint: [u8; 32],
    new_recipient_x25519_pub: &[u8; 32],
) -> Result<SealedShare> {
    seal_share(share, threshold, fingerprint, new_recipient_x25519_pub)
}

fn seal_share(
    share: &Share,
    threshold: u8,
    fingerprint: [u8; 32],
    recipient_x25519_pub: &[u8; 32],
) -> Result<SealedShare> {
    let (ephemeral_priv, ephemeral_pub) = generate_ephemeral();
    let key = ecdh(&ephemeral_priv, recipient_x25519_pub, ECIES_LABEL);
    let mut plaintext = Vec::with_capacity(1 + SECRET_LEN);
    plaintext.push(share.x);
    plaintext.extend_from_slice(&share.y);
    let (nonce, ciphertext) = aead_seal(&key, &plaintext, &fingerprint)
        .map_err(|e| IdentityError::BadKey(e.to_string()))?;
    secure_wipe_vec(&mut plaintext);
    Ok(SealedShare {
        share_id: share.x,
        ciphertext,
        ephemeral_pub,
        nonce,
        threshold,
        fingerprint,
    })
}

/// Open a sealed share with the recipient's own X25519 private key. The
/// decrypted share bytes are wiped as soon as they're parsed into a
/// `Share`.
pub fn open_share(sealed: &SealedShare, recipient_x25519_priv: &[u8; 32]) -> Result<Share> {
    let key = ecdh(recipient_x25519_priv, &sealed.ephemeral_pub, ECIES_LABEL);
    let mut plaintext = aead_open(&key, &sealed.nonce, &sealed.ciphertext, &sealed.fingerprint)
        .map_err(|e| IdentityError::BadKey(e.to_string()))?;
    if plaintext.len() != 1 + SECRET_LEN {
        secure_wipe_vec(&mut plaintext);
        return Err(IdentityError::BadKey("decrypted share has the wrong length".into()));
    }
    let x = plaintext[0];
    let mut y = [0u8; SECRET_LEN];
    y.copy_from_slice(&plaintext[1..]);
    secure_wipe_vec(&mut plaintext);
    Ok(Share { x, y })
}

/// Reconstitute a secret from opened shares and verify it against the
/// expected fingerprint before returning it.
pub fn reconstruct_and_verify(
    shares: &[Share],
    threshold: u8,
    expected_fingerprint: [u8; 32],
) -> Result<[u8; SECRET_LEN]> {
    let secret = shamir::reconstruct(shares, threshold)?;
    if fingerprint_of(&secret) != expected_fingerprint {
        warn!(shares = shares.len(), threshold, "reconstructed secret failed fingerprint check");
        return Err(IdentityError::BadFingerprint);
    }
    info!(shares = shares.len(), threshold, "secret reconstructed and verified");
    Ok(secret)
}

/// A convenience fingerprint a caller can use when it has no more specific
/// public identifier to bind to the share set: SHA-256 of the secret.
pub fn fingerprint_of(secret: &[u8; SECRET_LEN]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(secret);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_crypto::generate_ephemeral as gen_ephemeral;

    #[test]
    fn split_seal_open_reconstruct_roundtrip() {
        let secret = [9u8; SECRET_LEN];
        let fingerprint = fingerprint_of(&secret);
        let recipients: Vec<_> = (0..5).map(|_| gen_ephemeral()).collect();
        let recipient_pubs: Vec<_> = recipients.iter().map(|(_, p)| *p).collect();

        let sealed = split_and_seal(&secret, 3, &recipient_pubs, fingerprint).unwrap();
        assert_eq!(sealed.len(), 5);

        let opened: Vec<Share> = sealed
            .iter()
            .zip(recipients.iter())
            .take(3)
            .map(|(s, (priv_key, _))| open_share(s, priv_key).unwrap())
            .collect();

        let recovered = reconstruct_and_verify(&opened, 3, fingerprint).unwrap();
        assert_eq!(recovered, secret);
    }

    #[test]
    fn holder_reseals_their_share_to_a_new_requester() {
        let secret = [7u8; SECRET_LEN];
        let fingerprint = fingerprint_of(&secret);
        let holder = gen_ephemeral();
        let sealed = split_and_seal(&secret, 1, &[holder.1], fingerprint).unwrap();

        // Holder opens their own share with their private key.
        let share = open_share(&sealed[0], &holder.0).unwrap();

        // Holder reseals the opened share to a new requester's pubkey.
        let (requester_priv, requester_pub) = gen_ephemeral();
        let resealed = reseal_share(&share, sealed[0].threshold, fingerprint, &requester_pub).unwrap();

        // Requester opens it and recovers the identical share.
        let reopened = open_share(&resealed, &requester_priv).unwrap();
        assert_eq!(reopened.x, share.x);
        assert_eq!(reopened.y, share.y);

        // The original holder's key must not open the resealed copy.
        assert!(open_share(&resealed, &holder.0).is_err());
    }

    #[test]
    fn wrong_recipient_key_fails_to_open() {
        let secret = [1u8; SECRET_LEN];
        let fingerprint = fingerprint_of(&secret);
        let (_, pub_a) = gen_ephemeral();
        let (wrong_priv, _) = gen_ephemeral();
        let sealed = split_and_seal(&secret, 1, &[pub_a], fingerprint).unwrap();
        assert!(open_share(&sealed[0], &wrong_priv).is_err());
    }

    #[test]
    fn tampered_fingerprint_fails_reconstruction_check() {
        let secret = [3u8; SECRET_LEN];
        let fingerprint = fingerprint_of(&secret);
        let bogus_fingerprint = fingerprint_of(&[4u8; SECRET_LEN]);
        let recipients: Vec<_> = (0..3).map(|_| gen_ephemeral()).collect();
        let recipient_pubs: Vec<_> = recipients.iter().map(|(_, p)| *p).collect();
        let sealed = split_and_seal(&secret, 3, &recipient_pubs, fingerprint).unwrap();
        let opened: Vec<Share> = sealed
            .iter()
            .zip(recipients.iter())
            .map(|(s, (priv_key, _))| open_share(s, priv_key).unwrap())
            .collect();
        assert!(matches!(
            reconstruct_and_verify(&opened, 3, bogus_fingerprint),
            Err(IdentityError::BadFingerprint)
        ));
    }
}
