// crates/capgate-core/src/core/records.rs
// ============================================================================
// Module: Capgate Storage Records
// Description: Channel event and blob metadata record types.
// Purpose: Provide the typed records storage adapters produce and consume.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Record types owned by the storage resources they describe. Channel events
//! carry the strictly increasing sequence number assigned by the channel's
//! single write authority; blob metadata carries the visibility policy the
//! serving layer enforces.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::Namespace;
use crate::core::identifiers::PrincipalId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Channel Events
// ============================================================================

/// One event in an append-only channel log.
///
/// # Invariants
/// - `seq` starts at 1, is strictly increasing per channel, and has no gaps.
/// - `seq` is assigned by the channel's write authority, never by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEvent {
    /// Event identifier unique within the channel.
    pub id: u64,
    /// Strictly increasing sequence number, 1-based.
    pub seq: u64,
    /// Author principal when the append was account-backed; `None` for
    /// token-presented appends whose author survives only in the token.
    pub author_id: Option<PrincipalId>,
    /// Event content.
    pub content: String,
    /// Creation timestamp.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Blob Metadata
// ============================================================================

/// Visibility policy for a stored blob.
///
/// # Invariants
/// - Wire labels are stable; the serving layer enforces the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlobVisibility {
    /// Served to anyone who knows the URL.
    Public,
    /// Served only through a presigned, expiring URL.
    Presigned,
    /// Never served outside the owning namespace.
    Private,
}

/// Metadata for one stored blob.
///
/// # Invariants
/// - `namespace` is the owning tenant's namespace; keys are unique within it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobMetadata {
    /// Blob key within the namespace.
    pub key: String,
    /// Owning namespace.
    pub namespace: Namespace,
    /// Content size in bytes.
    pub size: u64,
    /// Declared content type.
    pub content_type: String,
    /// Visibility policy.
    pub visibility: BlobVisibility,
    /// Upload timestamp.
    pub uploaded_at: Timestamp,
}
