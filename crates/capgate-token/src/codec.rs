// crates/capgate-token/src/codec.rs
// ============================================================================
// Module: Token Codec
// Description: Encode/decode for the three signed token wire formats.
// Purpose: Provide fail-closed issue and verify paths for delegated tokens.
// Dependencies: capgate-core, base64, serde, serde_jcs, serde_json
// ============================================================================

//! ## Overview
//! Wire formats:
//! - **V1** (legacy): standard base64 of a JSON object; the signature is a
//!   full hex HMAC-SHA256 over the RFC 8785 canonical form of the payload
//!   without `sig`. Supported for backward read-compatibility.
//! - **V2**: 34 raw bytes — version, 8-byte resource id, permission bitmap,
//!   4-byte author id, 4-byte expiry seconds, 16-byte truncated tag.
//! - **V3**: 25 raw bytes — version, 6-byte truncated resource id,
//!   permission bitmap, 2-byte truncated author id, 3-byte expiry in hours
//!   since epoch (coarser granularity traded for size), 12-byte tag.
//!
//! Decode dispatches on the first decoded byte, checks length, then expiry,
//! then signature, and reports each failure as a distinct [`TokenError`]
//! variant. The distinction is internal only; the protocol layer collapses
//! every variant to one `INVALID_TOKEN` code so the network caller never
//! learns which check failed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use capgate_core::PrincipalId;
use capgate_core::ResourceId;
use capgate_core::ResourceSecret;
use capgate_core::Timestamp;
use capgate_core::core::identifiers::PRINCIPAL_ID_BYTES;
use capgate_core::core::identifiers::PRINCIPAL_ID_TRUNCATED_BYTES;
use capgate_core::core::identifiers::RESOURCE_ID_BYTES;
use capgate_core::core::identifiers::RESOURCE_ID_TRUNCATED_BYTES;
use capgate_core::crypto;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::claims::AuthorRef;
use crate::claims::TokenClaims;
use crate::claims::TokenPermissions;
use crate::secret::ResourceRef;
use crate::secret::SecretResolver;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Version byte for the V2 format.
const V2_VERSION_BYTE: u8 = 0x02;
/// Version byte for the V3 format.
const V3_VERSION_BYTE: u8 = 0x03;
/// First byte of a V1 JSON token (`{`).
const V1_JSON_BYTE: u8 = b'{';

/// Total decoded length of a V2 token.
const V2_TOTAL_BYTES: usize = 34;
/// Signed-prefix length of a V2 token (everything before the tag).
const V2_SIGNED_BYTES: usize = 18;
/// Tag length of a V2 token.
const V2_TAG_BYTES: usize = 16;

/// Total decoded length of a V3 token.
const V3_TOTAL_BYTES: usize = 25;
/// Signed-prefix length of a V3 token (everything before the tag).
const V3_SIGNED_BYTES: usize = 13;
/// Tag length of a V3 token.
const V3_TAG_BYTES: usize = 12;

/// Seconds per hour, for the V3 expiry encoding.
const SECONDS_PER_HOUR: i64 = 3_600;
/// Maximum value of the 3-byte V3 expiry field.
const MAX_V3_EXPIRY_HOURS: i64 = 0x00ff_ffff;

/// Maximum accepted token text length.
const MAX_TOKEN_CHARS: usize = 1_024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Token codec failures.
///
/// # Invariants
/// - Variants are internal diagnostics only; the protocol layer must map
///   every variant to a single outward `INVALID_TOKEN` code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Token text or payload shape is malformed.
    #[error("token malformed")]
    Malformed,
    /// Decoded length does not match the detected version.
    #[error("token length invalid for version")]
    Length,
    /// First decoded byte is not a known version marker.
    #[error("token version unknown")]
    UnknownVersion,
    /// Token expiry is in the past.
    #[error("token expired")]
    Expired,
    /// No candidate secret produced a matching signature.
    #[error("token signature mismatch")]
    Signature,
    /// No resource matched the token's id material.
    #[error("token resource unknown")]
    UnknownResource,
    /// Claims cannot be represented in the requested format.
    #[error("token not encodable: {0}")]
    NotEncodable(&'static str),
    /// Crypto primitive failure.
    #[error("token crypto failure")]
    Crypto,
}

impl From<crypto::CryptoError> for TokenError {
    fn from(_: crypto::CryptoError) -> Self {
        Self::Crypto
    }
}

// ============================================================================
// SECTION: Version
// ============================================================================

/// Token wire format version.
///
/// # Invariants
/// - Wire bytes are stable; V1 has no version byte and is detected by its
///   JSON leading brace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenVersion {
    /// Legacy JSON format (read-compatibility).
    V1,
    /// Compact binary format.
    V2,
    /// Ultra-compact binary format (default for new tokens).
    V3,
}

// ============================================================================
// SECTION: V1 Wire Shapes
// ============================================================================

/// Unsigned V1 payload, canonicalized with RFC 8785 before signing.
///
/// # Invariants
/// - Field names are the stable legacy wire names.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct V1Payload<'a> {
    /// Full resource id in hex.
    resource_id: String,
    /// Permission labels in read-then-write order.
    permissions: Vec<&'a str>,
    /// Full author id in hex.
    author_id: String,
    /// Expiry in unix seconds.
    expires_at: i64,
}

/// Full V1 wire object including the signature.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct V1Wire {
    /// Full resource id in hex.
    resource_id: String,
    /// Permission labels.
    permissions: Vec<String>,
    /// Full author id in hex.
    author_id: String,
    /// Expiry in unix seconds.
    expires_at: i64,
    /// Hex HMAC-SHA256 over the canonical unsigned payload.
    sig: String,
}

// ============================================================================
// SECTION: Codec
// ============================================================================

/// Stateless encoder/decoder for delegated-access tokens.
pub struct TokenCodec;

impl TokenCodec {
    /// Encodes a token in the requested wire format.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::NotEncodable`] when the expiry does not fit the
    /// format's field, or [`TokenError::Crypto`] on signing failure.
    pub fn encode(
        version: TokenVersion,
        resource_id: ResourceId,
        permissions: TokenPermissions,
        author_id: PrincipalId,
        expires_at: Timestamp,
        secret: &ResourceSecret,
    ) -> Result<String, TokenError> {
        match version {
            TokenVersion::V1 => {
                Self::encode_v1(resource_id, permissions, author_id, expires_at, secret)
            }
            TokenVersion::V2 => {
                Self::encode_v2(resource_id, permissions, author_id, expires_at, secret)
            }
            TokenVersion::V3 => {
                Self::encode_v3(resource_id, permissions, author_id, expires_at, secret)
            }
        }
    }

    /// Encodes a legacy V1 JSON token.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] on canonicalization or signing failure.
    pub fn encode_v1(
        resource_id: ResourceId,
        permissions: TokenPermissions,
        author_id: PrincipalId,
        expires_at: Timestamp,
        secret: &ResourceSecret,
    ) -> Result<String, TokenError> {
        let payload = V1Payload {
            resource_id: resource_id.to_string(),
            permissions: permissions.labels(),
            author_id: author_id.to_string(),
            expires_at: expires_at.as_unix_seconds(),
        };
        let canonical = serde_jcs::to_vec(&payload).map_err(|_| TokenError::Malformed)?;
        let tag = crypto::hmac_sha256(secret.as_bytes(), &canonical)?;
        let wire = V1Wire {
            resource_id: payload.resource_id,
            permissions: permissions.labels().iter().map(ToString::to_string).collect(),
            author_id: payload.author_id,
            expires_at: payload.expires_at,
            sig: crypto::hex_encode(&tag),
        };
        let json = serde_json::to_vec(&wire).map_err(|_| TokenError::Malformed)?;
        Ok(STANDARD.encode(json))
    }

    /// Encodes a compact V2 binary token.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::NotEncodable`] when the expiry does not fit a
    /// 4-byte seconds field.
    pub fn encode_v2(
        resource_id: ResourceId,
        permissions: TokenPermissions,
        author_id: PrincipalId,
        expires_at: Timestamp,
        secret: &ResourceSecret,
    ) -> Result<String, TokenError> {
        let expiry = u32::try_from(expires_at.as_unix_seconds())
            .map_err(|_| TokenError::NotEncodable("expiry out of range for v2"))?;
        let mut bytes = Vec::with_capacity(V2_TOTAL_BYTES);
        bytes.push(V2_VERSION_BYTE);
        bytes.extend_from_slice(resource_id.as_bytes());
        bytes.push(permissions.bits());
        bytes.extend_from_slice(author_id.as_bytes());
        bytes.extend_from_slice(&expiry.to_be_bytes());
        let tag = crypto::hmac_tag(secret.as_bytes(), &bytes, V2_TAG_BYTES)?;
        bytes.extend_from_slice(&tag);
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Encodes an ultra-compact V3 binary token.
    ///
    /// The expiry rounds down to whole hours, so a token never outlives the
    /// instant requested.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::NotEncodable`] when the expiry does not fit a
    /// 3-byte hours field.
    pub fn encode_v3(
        resource_id: ResourceId,
        permissions: TokenPermissions,
        author_id: PrincipalId,
        expires_at: Timestamp,
        secret: &ResourceSecret,
    ) -> Result<String, TokenError> {
        let seconds = expires_at.as_unix_seconds();
        let hours = seconds.div_euclid(SECONDS_PER_HOUR);
        if !(0..=MAX_V3_EXPIRY_HOURS).contains(&hours) {
            return Err(TokenError::NotEncodable("expiry out of range for v3"));
        }
        let hour_bytes = u32::try_from(hours)
            .map_err(|_| TokenError::NotEncodable("expiry out of range for v3"))?
            .to_be_bytes();
        let mut bytes = Vec::with_capacity(V3_TOTAL_BYTES);
        bytes.push(V3_VERSION_BYTE);
        bytes.extend_from_slice(&resource_id.truncated());
        bytes.push(permissions.bits());
        bytes.extend_from_slice(&author_id.truncated());
        bytes.extend_from_slice(&hour_bytes[1..4]);
        let tag = crypto::hmac_tag(secret.as_bytes(), &bytes, V3_TAG_BYTES)?;
        bytes.extend_from_slice(&tag);
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Decodes and verifies a token in any supported format.
    ///
    /// Fails closed: any length, version, expiry, resolution, or signature
    /// problem rejects the token with a distinct internal variant.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] describing the first failed check.
    pub async fn decode(
        token: &str,
        resolver: &dyn SecretResolver,
        now: Timestamp,
    ) -> Result<TokenClaims, TokenError> {
        if token.is_empty() || token.len() > MAX_TOKEN_CHARS {
            return Err(TokenError::Malformed);
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .or_else(|_| STANDARD.decode(token))
            .map_err(|_| TokenError::Malformed)?;
        match bytes.first() {
            Some(&V2_VERSION_BYTE) => Self::decode_v2(&bytes, resolver, now).await,
            Some(&V3_VERSION_BYTE) => Self::decode_v3(&bytes, resolver, now).await,
            Some(&V1_JSON_BYTE) => Self::decode_v1(&bytes, resolver, now).await,
            _ => Err(TokenError::UnknownVersion),
        }
    }

    /// Decodes a legacy V1 JSON token.
    async fn decode_v1(
        bytes: &[u8],
        resolver: &dyn SecretResolver,
        now: Timestamp,
    ) -> Result<TokenClaims, TokenError> {
        let wire: V1Wire = serde_json::from_slice(bytes).map_err(|_| TokenError::Malformed)?;
        let resource_id = ResourceId::parse(&wire.resource_id).map_err(|_| TokenError::Malformed)?;
        let author_id = PrincipalId::parse(&wire.author_id).map_err(|_| TokenError::Malformed)?;
        let permissions =
            TokenPermissions::from_labels(&wire.permissions).ok_or(TokenError::Malformed)?;
        let sig = crypto::hex_decode(&wire.sig).ok_or(TokenError::Malformed)?;
        let expires_at = Timestamp::from_unix_seconds(wire.expires_at);
        if expires_at.is_before(now) {
            return Err(TokenError::Expired);
        }
        let payload = V1Payload {
            resource_id: wire.resource_id,
            permissions: permissions.labels(),
            author_id: wire.author_id,
            expires_at: wire.expires_at,
        };
        let canonical = serde_jcs::to_vec(&payload).map_err(|_| TokenError::Malformed)?;
        let candidates = resolver.resolve(&ResourceRef::Full(resource_id)).await;
        if candidates.is_empty() {
            return Err(TokenError::UnknownResource);
        }
        for (candidate_id, secret) in &candidates {
            if *candidate_id == resource_id
                && crypto::verify_hmac(secret.as_bytes(), &canonical, &sig)
            {
                return Ok(TokenClaims {
                    resource_id,
                    permissions,
                    author: AuthorRef::Full(author_id),
                    expires_at,
                });
            }
        }
        Err(TokenError::Signature)
    }

    /// Decodes a compact V2 binary token.
    async fn decode_v2(
        bytes: &[u8],
        resolver: &dyn SecretResolver,
        now: Timestamp,
    ) -> Result<TokenClaims, TokenError> {
        if bytes.len() != V2_TOTAL_BYTES {
            return Err(TokenError::Length);
        }
        let mut resource_bytes = [0u8; RESOURCE_ID_BYTES];
        resource_bytes.copy_from_slice(&bytes[1..9]);
        let resource_id = ResourceId::from_bytes(resource_bytes);
        let permissions = TokenPermissions::from_bits(bytes[9]).ok_or(TokenError::Malformed)?;
        let mut author_bytes = [0u8; PRINCIPAL_ID_BYTES];
        author_bytes.copy_from_slice(&bytes[10..14]);
        let author_id = PrincipalId::from_bytes(author_bytes);
        let mut expiry_bytes = [0u8; 4];
        expiry_bytes.copy_from_slice(&bytes[14..18]);
        let expires_at = Timestamp::from_unix_seconds(i64::from(u32::from_be_bytes(expiry_bytes)));
        if expires_at.is_before(now) {
            return Err(TokenError::Expired);
        }
        let candidates = resolver.resolve(&ResourceRef::Full(resource_id)).await;
        if candidates.is_empty() {
            return Err(TokenError::UnknownResource);
        }
        let signed = &bytes[..V2_SIGNED_BYTES];
        let tag = &bytes[V2_SIGNED_BYTES..];
        for (candidate_id, secret) in &candidates {
            if *candidate_id == resource_id && crypto::verify_hmac(secret.as_bytes(), signed, tag) {
                return Ok(TokenClaims {
                    resource_id,
                    permissions,
                    author: AuthorRef::Full(author_id),
                    expires_at,
                });
            }
        }
        Err(TokenError::Signature)
    }

    /// Decodes an ultra-compact V3 binary token.
    ///
    /// The truncated resource id may match several live resources; the
    /// signature is the authority, so every candidate is tried and the first
    /// verifying one wins.
    async fn decode_v3(
        bytes: &[u8],
        resolver: &dyn SecretResolver,
        now: Timestamp,
    ) -> Result<TokenClaims, TokenError> {
        if bytes.len() != V3_TOTAL_BYTES {
            return Err(TokenError::Length);
        }
        let mut prefix = [0u8; RESOURCE_ID_TRUNCATED_BYTES];
        prefix.copy_from_slice(&bytes[1..7]);
        let permissions = TokenPermissions::from_bits(bytes[7]).ok_or(TokenError::Malformed)?;
        let mut author_prefix = [0u8; PRINCIPAL_ID_TRUNCATED_BYTES];
        author_prefix.copy_from_slice(&bytes[8..10]);
        let hours = i64::from(u32::from_be_bytes([0, bytes[10], bytes[11], bytes[12]]));
        let expires_at = Timestamp::from_unix_seconds(hours.saturating_mul(SECONDS_PER_HOUR));
        if expires_at.is_before(now) {
            return Err(TokenError::Expired);
        }
        let candidates = resolver.resolve(&ResourceRef::Truncated(prefix)).await;
        if candidates.is_empty() {
            return Err(TokenError::UnknownResource);
        }
        let signed = &bytes[..V3_SIGNED_BYTES];
        let tag = &bytes[V3_SIGNED_BYTES..];
        for (candidate_id, secret) in &candidates {
            if candidate_id.truncated() == prefix
                && crypto::verify_hmac(secret.as_bytes(), signed, tag)
            {
                return Ok(TokenClaims {
                    resource_id: *candidate_id,
                    permissions,
                    author: AuthorRef::Truncated(author_prefix),
                    expires_at,
                });
            }
        }
        Err(TokenError::Signature)
    }
}
