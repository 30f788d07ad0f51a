// crates/capgate-core/src/core/grants.rs
// ============================================================================
// Module: Capgate Capability Grants
// Description: Per-origin capability grant records and store logic.
// Purpose: Enforce monotonic, expiring, atomically written capability grants.
// Dependencies: crate::core, crate::interfaces, serde, thiserror
// ============================================================================

//! ## Overview
//! One grant record exists per origin. Granting is a monotonic union and
//! never silently removes an existing capability; revoking to an empty set
//! deletes the record so "granted nothing" and "no record" are
//! indistinguishable to readers. An expired record reads as absent and is
//! purged lazily on the read path.
//!
//! Writes go through a versioned compare-and-swap loop against the backend:
//! two concurrent grants for the same origin must both survive, so a stale
//! read is retried rather than overwritten.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::capability::Capability;
use crate::core::capability::CapabilitySet;
use crate::core::identifiers::Origin;
use crate::core::time::Timestamp;
use crate::interfaces::GrantStore;
use crate::interfaces::StoreError;
use crate::interfaces::VersionedGrant;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum compare-and-swap retries before reporting contention.
const MAX_CAS_RETRIES: usize = 16;

// ============================================================================
// SECTION: Grant Record
// ============================================================================

/// Capability grant record for one origin.
///
/// # Invariants
/// - `capabilities` is deduplicated and never empty in a stored record.
/// - `expires_at` of `None` means the grant does not expire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRecord {
    /// Origin the grant belongs to.
    pub origin: Origin,
    /// Granted capabilities.
    pub capabilities: CapabilitySet,
    /// Timestamp of the first grant.
    pub granted_at: Timestamp,
    /// Optional expiry; an expired record reads as absent.
    pub expires_at: Option<Timestamp>,
}

impl GrantRecord {
    /// Returns true when the record is expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at.is_before(now))
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Capability store failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum GrantError {
    /// Backend failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Compare-and-swap retries exhausted under write contention.
    #[error("grant write contention for origin")]
    Contention,
}

// ============================================================================
// SECTION: Capability Store
// ============================================================================

/// Per-origin capability grant store.
///
/// # Invariants
/// - All writes are full-snapshot compare-and-swap replacements; a crash
///   mid-write leaves the prior record intact.
pub struct CapabilityStore {
    /// Versioned grant backend.
    backend: Arc<dyn GrantStore>,
}

impl CapabilityStore {
    /// Creates a capability store over the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn GrantStore>) -> Self {
        Self {
            backend,
        }
    }

    /// Returns the capabilities granted to an origin at `now`.
    ///
    /// An absent or expired record yields an empty set; an expired record is
    /// deleted as a side effect before returning, unless a concurrent writer
    /// replaced it first (that writer's record then stands).
    ///
    /// # Errors
    ///
    /// Returns [`GrantError`] on backend failure.
    pub async fn get_capabilities(
        &self,
        origin: &Origin,
        now: Timestamp,
    ) -> Result<CapabilitySet, GrantError> {
        match self.backend.load(origin).await? {
            Some(versioned) if versioned.record.is_expired(now) => {
                // Conditional purge: a writer that committed after our load
                // owns the record now, and its snapshot must survive.
                self.backend.remove_if(origin, versioned.version).await?;
                Ok(CapabilitySet::new())
            }
            Some(versioned) => Ok(versioned.record.capabilities),
            None => Ok(CapabilitySet::new()),
        }
    }

    /// Grants capabilities to an origin via union merge.
    ///
    /// Labels outside the fixed vocabulary are discarded, not errors. An
    /// existing record keeps its `granted_at` and `expires_at`; an expired
    /// record is replaced by a fresh one. Returns the resulting set.
    ///
    /// # Errors
    ///
    /// Returns [`GrantError::Contention`] when concurrent writers exhaust
    /// the retry budget, or [`GrantError::Store`] on backend failure.
    pub async fn grant(
        &self,
        origin: &Origin,
        labels: &[String],
        now: Timestamp,
    ) -> Result<CapabilitySet, GrantError> {
        let requested: CapabilitySet =
            labels.iter().filter_map(|label| Capability::parse(label).ok()).collect();
        if requested.is_empty() {
            return self.get_capabilities(origin, now).await;
        }
        for _ in 0..MAX_CAS_RETRIES {
            let current = self.backend.load(origin).await?;
            let (expected_version, record) = match current {
                Some(versioned) if !versioned.record.is_expired(now) => {
                    let VersionedGrant {
                        version,
                        mut record,
                    } = versioned;
                    record.capabilities.extend(requested.iter().copied());
                    (Some(version), record)
                }
                Some(versioned) => (
                    Some(versioned.version),
                    GrantRecord {
                        origin: origin.clone(),
                        capabilities: requested.clone(),
                        granted_at: now,
                        expires_at: None,
                    },
                ),
                None => (
                    None,
                    GrantRecord {
                        origin: origin.clone(),
                        capabilities: requested.clone(),
                        granted_at: now,
                        expires_at: None,
                    },
                ),
            };
            if self.backend.store(origin, expected_version, &record).await? {
                return Ok(record.capabilities);
            }
        }
        Err(GrantError::Contention)
    }

    /// Revokes one capability, or the whole record when `capability` is
    /// omitted. A revoke that empties the set deletes the record.
    ///
    /// # Errors
    ///
    /// Returns [`GrantError::Contention`] when concurrent writers exhaust
    /// the retry budget, or [`GrantError::Store`] on backend failure.
    pub async fn revoke(
        &self,
        origin: &Origin,
        capability: Option<Capability>,
    ) -> Result<(), GrantError> {
        let Some(capability) = capability else {
            self.backend.remove(origin).await?;
            return Ok(());
        };
        for _ in 0..MAX_CAS_RETRIES {
            let Some(versioned) = self.backend.load(origin).await? else {
                return Ok(());
            };
            let VersionedGrant {
                version,
                mut record,
            } = versioned;
            if !record.capabilities.remove(&capability) {
                return Ok(());
            }
            if record.capabilities.is_empty() {
                if self.backend.remove_if(origin, version).await? {
                    return Ok(());
                }
                // Lost the race to a concurrent writer; reload and retry.
                continue;
            }
            if self.backend.store(origin, Some(version), &record).await? {
                return Ok(());
            }
        }
        Err(GrantError::Contention)
    }
}
