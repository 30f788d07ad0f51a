// crates/capgate-core/src/core/capability.rs
// ============================================================================
// Module: Capgate Capability Vocabulary
// Description: Fixed vocabulary of grantable capability labels.
// Purpose: Gate every storage operation class behind a validated capability.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Capabilities are drawn from a fixed, validated vocabulary. Unknown labels
//! are rejected at parse time and are never silently stored. The vocabulary
//! is closed on purpose: adding an operation class means adding a variant
//! here and updating the static operation mapping in the router, both of
//! which are compile-time-checked exhaustive matches.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use thiserror::Error;

// ============================================================================
// SECTION: Capability
// ============================================================================

/// A named permission gating one class of storage operation.
///
/// # Invariants
/// - Wire labels are stable; parsing accepts exactly these labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    /// Read keys and values in the caller's namespace.
    KvRead,
    /// Write or delete keys in the caller's namespace.
    KvWrite,
    /// Read blob content and metadata.
    BlobRead,
    /// Upload or delete blobs.
    BlobWrite,
    /// Create channels.
    ChannelCreate,
    /// Append events to channels.
    ChannelAppend,
    /// Read channel events.
    ChannelRead,
    /// Delete channels.
    ChannelDelete,
}

/// The full capability vocabulary in stable order.
pub const CAPABILITY_VOCABULARY: &[Capability] = &[
    Capability::KvRead,
    Capability::KvWrite,
    Capability::BlobRead,
    Capability::BlobWrite,
    Capability::ChannelCreate,
    Capability::ChannelAppend,
    Capability::ChannelRead,
    Capability::ChannelDelete,
];

/// Deduplicated, ordered set of capabilities.
pub type CapabilitySet = BTreeSet<Capability>;

/// Capability parse failure.
///
/// # Invariants
/// - Never echoes the rejected label beyond its length-bounded prefix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown capability")]
pub struct CapabilityParseError;

impl Capability {
    /// Returns the stable wire label for this capability.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::KvRead => "kv:read",
            Self::KvWrite => "kv:write",
            Self::BlobRead => "blob:read",
            Self::BlobWrite => "blob:write",
            Self::ChannelCreate => "channel:create",
            Self::ChannelAppend => "channel:append",
            Self::ChannelRead => "channel:read",
            Self::ChannelDelete => "channel:delete",
        }
    }

    /// Parses a wire label against the fixed vocabulary.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityParseError`] for any label outside the vocabulary.
    pub fn parse(label: &str) -> Result<Self, CapabilityParseError> {
        match label {
            "kv:read" => Ok(Self::KvRead),
            "kv:write" => Ok(Self::KvWrite),
            "blob:read" => Ok(Self::BlobRead),
            "blob:write" => Ok(Self::BlobWrite),
            "channel:create" => Ok(Self::ChannelCreate),
            "channel:append" => Ok(Self::ChannelAppend),
            "channel:read" => Ok(Self::ChannelRead),
            "channel:delete" => Ok(Self::ChannelDelete),
            _ => Err(CapabilityParseError),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Capability {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Capability {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(serde::de::Error::custom)
    }
}
