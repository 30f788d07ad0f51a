// crates/capgate-core/src/core/principal.rs
// ============================================================================
// Module: Capgate Principal Model
// Description: Authenticated actor records with hashed credentials.
// Purpose: Represent users, services, and apps behind the auth gate.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A principal is an authenticated actor holding a hashed credential. The
//! raw secret is shown once at registration and never persisted; only its
//! SHA-256 fingerprint is stored. Deactivation is logical (`active = false`);
//! physical deletion happens only at the principal's own request.
//!
//! Persisted records from older deployments carry a legacy `service` boolean
//! instead of the `kind` enum. That shape is accepted only here, at the
//! deserialization boundary, and is normalized immediately; business logic
//! sees a single canonical [`PrincipalKind`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;

use crate::core::identifiers::PrincipalId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Principal Kind
// ============================================================================

/// Canonical classification of a principal.
///
/// # Invariants
/// - Wire labels are stable lowercase strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    /// Interactive human account.
    User,
    /// Headless service account.
    Service,
    /// Registered third-party application.
    App,
}

// ============================================================================
// SECTION: Principal Record
// ============================================================================

/// An authenticated actor with a hashed credential.
///
/// # Invariants
/// - `secret_hash` is a lowercase hex SHA-256 fingerprint; the raw secret is
///   never stored.
/// - Inactive principals fail authentication but remain on record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    /// Principal identifier.
    pub id: PrincipalId,
    /// Fingerprint of the API key (the only persisted credential form).
    pub secret_hash: String,
    /// Human-readable display name.
    pub display_name: String,
    /// Canonical principal classification.
    pub kind: PrincipalKind,
    /// Whether the principal may authenticate.
    pub active: bool,
    /// Creation timestamp.
    pub created_at: Timestamp,
}

/// Wire shape accepted when deserializing stored principals.
///
/// # Invariants
/// - Exists only to normalize the legacy `service` boolean; never leaves
///   this module.
#[derive(Deserialize)]
struct PrincipalWire {
    /// Principal identifier.
    id: PrincipalId,
    /// Credential fingerprint.
    secret_hash: String,
    /// Display name.
    display_name: String,
    /// Canonical kind when the record is current.
    #[serde(default)]
    kind: Option<PrincipalKind>,
    /// Legacy service flag from pre-enum records.
    #[serde(default)]
    service: Option<bool>,
    /// Active flag.
    active: bool,
    /// Creation timestamp.
    created_at: Timestamp,
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = PrincipalWire::deserialize(deserializer)?;
        let kind = match (wire.kind, wire.service) {
            (Some(kind), _) => kind,
            (None, Some(true)) => PrincipalKind::Service,
            (None, Some(false) | None) => PrincipalKind::User,
        };
        Ok(Self {
            id: wire.id,
            secret_hash: wire.secret_hash,
            display_name: wire.display_name,
            kind,
            active: wire.active,
            created_at: wire.created_at,
        })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
