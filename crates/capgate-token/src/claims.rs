// crates/capgate-token/src/claims.rs
// ============================================================================
// Module: Token Claims
// Description: Decoded token claims and the permission bitmap.
// Purpose: Represent what a verified token authorizes, and for how long.
// Dependencies: capgate-core, serde
// ============================================================================

//! ## Overview
//! Claims are immutable once issued; a token is never mutated, only
//! re-issued. The permission bitmap carries exactly two defined bits (read
//! and write); decode rejects any other bit as malformed rather than
//! ignoring it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use capgate_core::PrincipalId;
use capgate_core::ResourceId;
use capgate_core::Timestamp;
use capgate_core::core::identifiers::PRINCIPAL_ID_TRUNCATED_BYTES;

// ============================================================================
// SECTION: Permissions
// ============================================================================

/// Permission bitmap carried in a token.
///
/// # Invariants
/// - Only [`Self::READ`] and [`Self::WRITE`] bits are ever set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenPermissions(u8);

impl TokenPermissions {
    /// Read permission bit (bit 0).
    pub const READ: Self = Self(0b01);
    /// Write permission bit (bit 1).
    pub const WRITE: Self = Self(0b10);
    /// Both permission bits.
    pub const READ_WRITE: Self = Self(0b11);
    /// Mask of all defined bits.
    const MASK: u8 = 0b11;

    /// Builds a bitmap from raw bits; `None` when undefined bits are set or
    /// no bit is set.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        if bits == 0 || bits & !Self::MASK != 0 {
            None
        } else {
            Some(Self(bits))
        }
    }

    /// Returns the raw bitmap byte.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns true when the token may read.
    #[must_use]
    pub const fn can_read(self) -> bool {
        self.0 & Self::READ.0 != 0
    }

    /// Returns true when the token may write.
    #[must_use]
    pub const fn can_write(self) -> bool {
        self.0 & Self::WRITE.0 != 0
    }

    /// Returns the stable labels for the set bits, in read-then-write order.
    #[must_use]
    pub fn labels(self) -> Vec<&'static str> {
        let mut labels = Vec::with_capacity(2);
        if self.can_read() {
            labels.push("read");
        }
        if self.can_write() {
            labels.push("write");
        }
        labels
    }

    /// Parses the V1 label list form of the bitmap.
    ///
    /// Unknown labels reject the whole list; an empty list is rejected.
    #[must_use]
    pub fn from_labels(labels: &[String]) -> Option<Self> {
        let mut bits = 0u8;
        for label in labels {
            match label.as_str() {
                "read" => bits |= Self::READ.0,
                "write" => bits |= Self::WRITE.0,
                _ => return None,
            }
        }
        Self::from_bits(bits)
    }
}

impl fmt::Display for TokenPermissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.labels().join("+"))
    }
}

// ============================================================================
// SECTION: Author Reference
// ============================================================================

/// Author identity recovered from a decoded token.
///
/// # Invariants
/// - V3 keeps only a 2-byte prefix of the author id; the truncated form is
///   display-only and carries no authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorRef {
    /// Full author id (V1 and V2 tokens).
    Full(PrincipalId),
    /// Truncated author id prefix (V3 tokens; lossy).
    Truncated([u8; PRINCIPAL_ID_TRUNCATED_BYTES]),
}

// ============================================================================
// SECTION: Claims
// ============================================================================

/// Verified claims decoded from a token.
///
/// # Invariants
/// - `resource_id` is always the full resource id: V3's truncated id is
///   resolved back to the candidate whose signature verified.
/// - `expires_at` is in the future at decode time; V3 carries hour
///   granularity, so its value is a whole hour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    /// Resource the token delegates access to.
    pub resource_id: ResourceId,
    /// Permission bitmap.
    pub permissions: TokenPermissions,
    /// Issuing author.
    pub author: AuthorRef,
    /// Expiry instant.
    pub expires_at: Timestamp,
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
