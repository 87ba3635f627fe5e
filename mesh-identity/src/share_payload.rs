//! Wire form of an invite (C11): a compact, checksummed JSON payload sized
//! to fit in a QR code, plus the deep-link and `bootstrap` query-parameter
//! formats peers exchange it in.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{IdentityError, Result};

pub const CURRENT_MAJOR: u8 = 1;
pub const MAX_ENCODED_BYTES: usize = 1024;
pub const MAX_SKEW_MS: u64 = 300_000;
pub const MAX_BOOTSTRAP_PEERS: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ShareBody {
    v: u8,
    p: String,
    n: Option<String>,
    t: u64,
}

/// A `SharePayload` ready to be embedded in a QR code or deep link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharePayload {
    pub version: u8,
    pub inviter_peer_id: String,
    pub inviter_name: Option<String>,
    pub timestamp_ms: u64,
}

#[derive(Serialize, Deserialize)]
struct ShareWire {
    v: u8,
    p: String,
    n: Option<String>,
    t: u64,
    cs: String,
}

fn checksum_of(body: &ShareBody) -> String {
    let bytes = serde_json::to_vec(body).expect("ShareBody serialization cannot fail");
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hex::encode(hasher.finalize())
}

/// Encode to the compact JSON wire form, appending a checksum computed over
/// the deterministic JSON encoding of every other field.
pub fn encode(payload: &SharePayload) -> Result<String> {
    let body = ShareBody {
        v: payload.version,
        p: payload.inviter_peer_id.clone(),
        n: payload.inviter_name.clone(),
        t: payload.timestamp_ms,
    };
    let cs = checksum_of(&body);
    let wire = ShareWire {
        v: body.v,
        p: body.p,
        n: body.n,
        t: body.t,
        cs,
    };
    let json = serde_json::to_string(&wire).map_err(|e| IdentityError::BadKey(e.to_string()))?;
    if json.len() > MAX_ENCODED_BYTES {
        return Err(IdentityError::TooLarge {
            max: MAX_ENCODED_BYTES,
            actual: json.len(),
        });
    }
    Ok(json)
}

/// Decode and validate a share payload: checksum, version-major
/// compatibility, and timestamp skew against `now_ms`.
pub fn decode(json: &str, now_ms: u64) -> Result<SharePayload> {
    if json.len() > MAX_ENCODED_BYTES {
        return Err(IdentityError::TooLarge {
            max: MAX_ENCODED_BYTES,
            actual: json.len(),
        });
    }
    let wire: ShareWire = serde_json::from_str(json).map_err(|e| IdentityError::BadKey(e.to_string()))?;
    let body = ShareBody {
        v: wire.v,
        p: wire.p.clone(),
        n: wire.n.clone(),
        t: wire.t,
    };
    if checksum_of(&body) != wire.cs {
        return Err(IdentityError::BadChecksum);
    }
    if wire.v != CURRENT_MAJOR {
        return Err(IdentityError::Unsupported {
            found: wire.v,
            supported: CURRENT_MAJOR,
        });
    }
    let lower = now_ms.saturating_sub(MAX_SKEW_MS);
    let upper = now_ms.saturating_add(MAX_SKEW_MS);
    if wire.t < lower || wire.t > upper {
        return Err(IdentityError::TimestampSkew);
    }
    Ok(SharePayload {
        version: wire.v,
        inviter_peer_id: wire.p,
        inviter_name: wire.n,
        timestamp_ms: wire.t,
    })
}

/// One peer entry in a `bootstrap` query parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BootstrapPeer {
    pub i: String,
    /// 0 = unknown/unverified connectivity, 1 = previously reachable.
    pub c: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BootstrapPayload {
    pub v: u8,
    pub p: Vec<BootstrapPeer>,
    pub r: Option<String>,
    pub t: u64,
}

/// Base64url-encode a bootstrap payload, truncating to the first 20 peers.
pub fn encode_bootstrap(mut payload: BootstrapPayload) -> String {
    payload.p.truncate(MAX_BOOTSTRAP_PEERS);
    let json = serde_json::to_vec(&payload).expect("BootstrapPayload serialization cannot fail");
    URL_SAFE_NO_PAD.encode(json)
}

pub fn decode_bootstrap(encoded: &str) -> Result<BootstrapPayload> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| IdentityError::BadKey(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| IdentityError::BadKey(e.to_string()))
}

/// Build a custom-scheme deep link: `scheme://join/<CODE>`.
pub fn build_deep_link(scheme: &str, code: &str) -> String {
    format!("{scheme}://join/{code}")
}

/// Build an https join link, optionally carrying `inviter`/`name` query
/// params.
pub fn build_https_link(host: &str, code: &str, inviter: Option<&str>, name: Option<&str>) -> String {
    let mut url = format!("https://{host}/join?code={code}");
    if let Some(inviter) = inviter {
        url.push_str("&inviter=");
        url.push_str(inviter);
    }
    if let Some(name) = name {
        url.push_str("&name=");
        url.push_str(name);
    }
    url
}

/// Extract the invite code from either a custom-scheme deep link
/// (`scheme://join/<CODE>`) or an https join link
/// (`https://host/join?code=<CODE>`).
pub fn extract_code(url: &str) -> Result<String> {
    if let Some(rest) = url.split("://join/").nth(1) {
        let code = rest.split(['?', '&']).next().unwrap_or(rest);
        if code.is_empty() {
            return Err(IdentityError::BadKey("deep link has no code".into()));
        }
        return Ok(code.to_string());
    }
    if let Some(query_start) = url.find('?') {
        let query = &url[query_start + 1..];
        for pair in query.split('&') {
            if let Some(code) = pair.strip_prefix("code=") {
                return Ok(code.to_string());
            }
        }
    }
    Err(IdentityError::BadKey("no code found in url".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SharePayload {
        SharePayload {
            version: CURRENT_MAJOR,
            inviter_peer_id: "ABCDEF0123456789".to_string(),
            inviter_name: Some("alice".to_string()),
            timestamp_ms: 1_700_000_000_000,
        }
    }

    #[test]
    fn encode_decode_roundtrip() {
        let payload = sample();
        let json = encode(&payload).unwrap();
        let decoded = decode(&json, payload.timestamp_ms).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn tampered_field_fails_checksum() {
        let payload = sample();
        let json = encode(&payload).unwrap();
        let tampered = json.replace("alice", "mallory");
        assert_eq!(decode(&tampered, payload.timestamp_ms), Err(IdentityError::BadChecksum));
    }

    #[test]
    fn skew_outside_window_is_rejected() {
        let payload = sample();
        let json = encode(&payload).unwrap();
        assert_eq!(
            decode(&json, payload.timestamp_ms + MAX_SKEW_MS + 1),
            Err(IdentityError::TimestampSkew)
        );
    }

    #[test]
    fn bootstrap_truncates_to_twenty_peers() {
        let peers: Vec<_> = (0..30)
            .map(|i| BootstrapPeer { i: format!("peer{i}"), c: 0 })
            .collect();
        let payload = BootstrapPayload {
            v: 1,
            p: peers,
            r: None,
            t: 1_700_000_000_000,
        };
        let encoded = encode_bootstrap(payload);
        let decoded = decode_bootstrap(&encoded).unwrap();
        assert_eq!(decoded.p.len(), MAX_BOOTSTRAP_PEERS);
    }

    #[test]
    fn extracts_code_from_custom_scheme_and_https() {
        let deep = build_deep_link("mesh", "abc123");
        assert_eq!(extract_code(&deep).unwrap(), "abc123");

        let https = build_https_link("example.com", "abc123", Some("INVITER"), Some("Alice"));
        assert_eq!(extract_code(&https).unwrap(), "abc123");
    }
}
