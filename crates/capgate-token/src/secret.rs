// crates/capgate-token/src/secret.rs
// ============================================================================
// Module: Token Secret Resolution
// Description: Resolver seam mapping resource references to signing secrets.
// Purpose: Let decode find candidate secrets without coupling to storage.
// Dependencies: capgate-core, async-trait
// ============================================================================

//! ## Overview
//! Tokens are signed with per-resource secrets, so decoding needs a way to
//! look the secret up from the id material in the token. V1 and V2 carry the
//! full resource id; V3 carries a 6-byte prefix that may (rarely) match more
//! than one live resource. The resolver therefore returns a candidate list,
//! and decode accepts the first candidate whose signature verifies — a
//! truncation collision costs one extra HMAC, never a wrong grant.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;

use capgate_core::ResourceId;
use capgate_core::ResourceSecret;
use capgate_core::core::identifiers::RESOURCE_ID_TRUNCATED_BYTES;

// ============================================================================
// SECTION: Resource Reference
// ============================================================================

/// Resource id material recovered from an unverified token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceRef {
    /// Full resource id (V1 and V2 tokens).
    Full(ResourceId),
    /// Truncated resource id prefix (V3 tokens).
    Truncated([u8; RESOURCE_ID_TRUNCATED_BYTES]),
}

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Maps resource references to candidate signing secrets.
///
/// Implementations must treat the reference as untrusted input and return an
/// empty list when nothing matches; decode fails closed on an empty list.
#[async_trait]
pub trait SecretResolver: Send + Sync {
    /// Returns all candidate resources matching the reference.
    async fn resolve(&self, reference: &ResourceRef) -> Vec<(ResourceId, ResourceSecret)>;
}
