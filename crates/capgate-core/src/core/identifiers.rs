// crates/capgate-core/src/core/identifiers.rs
// ============================================================================
// Module: Capgate Identifiers
// Description: Canonical opaque identifiers for origins, namespaces, and ids.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! This module defines the canonical identifiers used throughout the gateway.
//! Identifiers validate at construction boundaries and serialize as strings
//! on the wire. Resource and principal identifiers are fixed-width byte
//! values rendered as lowercase hex; the token codec depends on those widths.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted length for an origin string in bytes.
pub const MAX_ORIGIN_LENGTH: usize = 255;
/// Byte width of a resource identifier.
pub const RESOURCE_ID_BYTES: usize = 8;
/// Byte width of a truncated resource identifier (token V3).
pub const RESOURCE_ID_TRUNCATED_BYTES: usize = 6;
/// Byte width of a principal identifier.
pub const PRINCIPAL_ID_BYTES: usize = 4;
/// Byte width of a truncated principal identifier (token V3).
pub const PRINCIPAL_ID_TRUNCATED_BYTES: usize = 2;
/// Required prefix for derived namespaces.
pub const NAMESPACE_PREFIX: &str = "origin_";
/// Hex length of the namespace digest portion.
const NAMESPACE_DIGEST_HEX: usize = 64;
/// Minimum hex length of a namespace alias.
pub const MIN_ALIAS_LENGTH: usize = 8;
/// Maximum hex length of a namespace alias.
pub const MAX_ALIAS_LENGTH: usize = 64;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Identifier validation failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Messages never echo the full rejected value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// Origin string failed validation.
    #[error("invalid origin: {0}")]
    InvalidOrigin(&'static str),
    /// Namespace string failed validation.
    #[error("invalid namespace: {0}")]
    InvalidNamespace(&'static str),
    /// Alias string failed validation.
    #[error("invalid alias: {0}")]
    InvalidAlias(&'static str),
    /// Fixed-width identifier failed hex parsing.
    #[error("invalid identifier: {0}")]
    InvalidId(&'static str),
}

// ============================================================================
// SECTION: Origin
// ============================================================================

/// Verified origin of a calling application (`scheme://host[:port]`).
///
/// # Invariants
/// - Always non-empty ASCII without whitespace or control characters.
/// - Contains a scheme separator; at most [`MAX_ORIGIN_LENGTH`] bytes.
/// - The unit of tenant isolation; equality is exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Origin(String);

impl Origin {
    /// Parses and validates an origin string.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidOrigin`] when the value is empty,
    /// too long, non-ASCII, or missing a scheme separator.
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        if value.is_empty() {
            return Err(IdentifierError::InvalidOrigin("empty"));
        }
        if value.len() > MAX_ORIGIN_LENGTH {
            return Err(IdentifierError::InvalidOrigin("too long"));
        }
        for ch in value.chars() {
            if !ch.is_ascii() {
                return Err(IdentifierError::InvalidOrigin("non-ascii"));
            }
            if ch.is_ascii_whitespace() || ch.is_control() {
                return Err(IdentifierError::InvalidOrigin("whitespace or control"));
            }
        }
        let Some((scheme, host)) = value.split_once("://") else {
            return Err(IdentifierError::InvalidOrigin("missing scheme separator"));
        };
        if scheme.is_empty() || host.is_empty() {
            return Err(IdentifierError::InvalidOrigin("empty scheme or host"));
        }
        Ok(Self(value.to_string()))
    }

    /// Returns the origin as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Origin {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// SECTION: Namespace
// ============================================================================

/// Deterministic storage namespace derived from an origin.
///
/// # Invariants
/// - Always `origin_` followed by 64 lowercase hex characters.
/// - Construction happens only through derivation or validated parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    /// Wraps an already-derived namespace string without re-validation.
    ///
    /// Callers outside this crate go through
    /// [`crate::core::namespace::derive_namespace`] or [`Self::parse`].
    #[must_use]
    pub(crate) fn from_derived(value: String) -> Self {
        Self(value)
    }

    /// Parses and validates a stored namespace string.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidNamespace`] when the prefix or
    /// digest portion is malformed.
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        let Some(digest) = value.strip_prefix(NAMESPACE_PREFIX) else {
            return Err(IdentifierError::InvalidNamespace("missing prefix"));
        };
        if digest.len() != NAMESPACE_DIGEST_HEX {
            return Err(IdentifierError::InvalidNamespace("digest length"));
        }
        if !digest.chars().all(is_lower_hex) {
            return Err(IdentifierError::InvalidNamespace("digest not lowercase hex"));
        }
        Ok(Self(value.to_string()))
    }

    /// Returns the namespace as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Namespace {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// SECTION: Alias
// ============================================================================

/// Short public stand-in for a namespace, used in compact URLs.
///
/// # Invariants
/// - Lowercase hex, even length, between [`MIN_ALIAS_LENGTH`] and
///   [`MAX_ALIAS_LENGTH`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Alias(String);

impl Alias {
    /// Parses and validates an alias string.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidAlias`] when the length or
    /// character set is invalid.
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        if value.len() < MIN_ALIAS_LENGTH || value.len() > MAX_ALIAS_LENGTH {
            return Err(IdentifierError::InvalidAlias("length out of range"));
        }
        if value.len() % 2 != 0 {
            return Err(IdentifierError::InvalidAlias("odd length"));
        }
        if !value.chars().all(is_lower_hex) {
            return Err(IdentifierError::InvalidAlias("not lowercase hex"));
        }
        Ok(Self(value.to_string()))
    }

    /// Returns the alias as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Alias {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// SECTION: Resource Identifier
// ============================================================================

/// Fixed-width resource identifier (channels and other token targets).
///
/// # Invariants
/// - Exactly [`RESOURCE_ID_BYTES`] bytes; rendered as 16 lowercase hex chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId([u8; RESOURCE_ID_BYTES]);

impl ResourceId {
    /// Creates a resource identifier from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; RESOURCE_ID_BYTES]) -> Self {
        Self(bytes)
    }

    /// Parses a resource identifier from its 16-hex-char wire form.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidId`] on length or hex errors.
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        let bytes: [u8; RESOURCE_ID_BYTES] = decode_fixed_hex(value)?;
        Ok(Self(bytes))
    }

    /// Returns the raw identifier bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; RESOURCE_ID_BYTES] {
        &self.0
    }

    /// Returns the truncated prefix used by the V3 token format.
    #[must_use]
    pub fn truncated(&self) -> [u8; RESOURCE_ID_TRUNCATED_BYTES] {
        let mut out = [0u8; RESOURCE_ID_TRUNCATED_BYTES];
        out.copy_from_slice(&self.0[..RESOURCE_ID_TRUNCATED_BYTES]);
        out
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::core::crypto::hex_encode(&self.0))
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// SECTION: Principal Identifier
// ============================================================================

/// Fixed-width principal identifier.
///
/// # Invariants
/// - Exactly [`PRINCIPAL_ID_BYTES`] bytes; rendered as 8 lowercase hex chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrincipalId([u8; PRINCIPAL_ID_BYTES]);

impl PrincipalId {
    /// Creates a principal identifier from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; PRINCIPAL_ID_BYTES]) -> Self {
        Self(bytes)
    }

    /// Parses a principal identifier from its 8-hex-char wire form.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidId`] on length or hex errors.
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        let bytes: [u8; PRINCIPAL_ID_BYTES] = decode_fixed_hex(value)?;
        Ok(Self(bytes))
    }

    /// Returns the raw identifier bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; PRINCIPAL_ID_BYTES] {
        &self.0
    }

    /// Returns the truncated prefix used by the V3 token format.
    #[must_use]
    pub fn truncated(&self) -> [u8; PRINCIPAL_ID_TRUNCATED_BYTES] {
        let mut out = [0u8; PRINCIPAL_ID_TRUNCATED_BYTES];
        out.copy_from_slice(&self.0[..PRINCIPAL_ID_TRUNCATED_BYTES]);
        out
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::core::crypto::hex_encode(&self.0))
    }
}

impl Serialize for PrincipalId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PrincipalId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// SECTION: Hex Helpers
// ============================================================================

/// Returns true for lowercase hex digits.
const fn is_lower_hex(ch: char) -> bool {
    matches!(ch, '0'..='9' | 'a'..='f')
}

/// Decodes a fixed-width lowercase hex string into `N` bytes.
fn decode_fixed_hex<const N: usize>(value: &str) -> Result<[u8; N], IdentifierError> {
    if value.len() != N * 2 {
        return Err(IdentifierError::InvalidId("length"));
    }
    let bytes = crate::core::crypto::hex_decode(value)
        .ok_or(IdentifierError::InvalidId("not lowercase hex"))?;
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
