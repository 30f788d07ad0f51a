// crates/capgate-core/src/core/crypto.rs
// ============================================================================
// Module: Capgate Crypto Primitives
// Description: SHA-256 fingerprints and HMAC-SHA256 sign/verify helpers.
// Purpose: Provide the pure crypto functions under the token and auth layers.
// Dependencies: sha2, hmac, subtle, thiserror
// ============================================================================

//! ## Overview
//! Pure, stateless crypto helpers. Fingerprints are lowercase hex SHA-256
//! digests and are the only persisted form of API keys. HMAC tags are
//! verified with a constant-time comparison; a plain byte-slice equality is
//! a timing side channel and is never used here.

// ============================================================================
// SECTION: Imports
// ============================================================================

use hmac::Hmac;
use hmac::Mac;
use sha2::Digest;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

// ============================================================================
// SECTION: Types
// ============================================================================

/// HMAC-SHA256 instance type.
type HmacSha256 = Hmac<Sha256>;

/// Byte width of a full HMAC-SHA256 tag.
pub const FULL_TAG_BYTES: usize = 32;

/// Crypto primitive failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling and carry no key material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// The HMAC implementation rejected the provided key.
    #[error("hmac key rejected")]
    KeyRejected,
    /// A truncated tag length was out of range.
    #[error("invalid tag length")]
    TagLength,
}

// ============================================================================
// SECTION: Resource Secrets
// ============================================================================

/// Byte width of a per-resource signing secret.
pub const RESOURCE_SECRET_BYTES: usize = 32;

/// Per-resource HMAC signing secret.
///
/// # Invariants
/// - Exactly [`RESOURCE_SECRET_BYTES`] bytes, scoped to one resource; there
///   is no global signing secret.
/// - Debug output never prints the secret bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct ResourceSecret([u8; RESOURCE_SECRET_BYTES]);

impl ResourceSecret {
    /// Creates a secret from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; RESOURCE_SECRET_BYTES]) -> Self {
        Self(bytes)
    }

    /// Returns the raw secret bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; RESOURCE_SECRET_BYTES] {
        &self.0
    }
}

impl std::fmt::Debug for ResourceSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ResourceSecret(..)")
    }
}

// ============================================================================
// SECTION: Fingerprints
// ============================================================================

/// Returns the lowercase hex SHA-256 digest of the input bytes.
///
/// This is the persisted form of API keys; the raw key is never stored.
#[must_use]
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

/// Returns the raw SHA-256 digest of the input bytes.
#[must_use]
pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

// ============================================================================
// SECTION: HMAC
// ============================================================================

/// Computes a full HMAC-SHA256 tag over `message` with `secret`.
///
/// # Errors
///
/// Returns [`CryptoError::KeyRejected`] when the key cannot be loaded.
pub fn hmac_sha256(secret: &[u8], message: &[u8]) -> Result<[u8; FULL_TAG_BYTES], CryptoError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| CryptoError::KeyRejected)?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().into())
}

/// Computes an HMAC-SHA256 tag truncated to `tag_len` bytes.
///
/// # Errors
///
/// Returns [`CryptoError::TagLength`] when `tag_len` is zero or larger than
/// a full tag, and [`CryptoError::KeyRejected`] when the key cannot load.
pub fn hmac_tag(secret: &[u8], message: &[u8], tag_len: usize) -> Result<Vec<u8>, CryptoError> {
    if tag_len == 0 || tag_len > FULL_TAG_BYTES {
        return Err(CryptoError::TagLength);
    }
    let full = hmac_sha256(secret, message)?;
    Ok(full[..tag_len].to_vec())
}

/// Verifies a (possibly truncated) HMAC-SHA256 tag in constant time.
///
/// Any internal failure reads as a verification failure; this function never
/// reports why a tag was rejected.
#[must_use]
pub fn verify_hmac(secret: &[u8], message: &[u8], tag: &[u8]) -> bool {
    if tag.is_empty() || tag.len() > FULL_TAG_BYTES {
        return false;
    }
    let Ok(full) = hmac_sha256(secret, message) else {
        return false;
    };
    full[..tag.len()].ct_eq(tag).into()
}

// ============================================================================
// SECTION: Hex Encoding
// ============================================================================

/// Encodes bytes as a lowercase hex string.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

/// Decodes a lowercase hex string into bytes.
///
/// Returns `None` on odd length, uppercase digits, or any non-hex character;
/// the accepted alphabet is exactly what [`hex_encode`] emits.
#[must_use]
pub fn hex_decode(value: &str) -> Option<Vec<u8>> {
    if value.len() % 2 != 0 {
        return None;
    }
    let mut out = Vec::with_capacity(value.len() / 2);
    for pair in value.as_bytes().chunks_exact(2) {
        let high = hex_nibble(pair[0])?;
        let low = hex_nibble(pair[1])?;
        out.push((high << 4) | low);
    }
    Some(out)
}

/// Decodes one lowercase hex digit.
const fn hex_nibble(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        _ => None,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
