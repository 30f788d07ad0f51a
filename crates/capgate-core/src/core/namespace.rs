// crates/capgate-core/src/core/namespace.rs
// ============================================================================
// Module: Capgate Namespace Isolation
// Description: Deterministic namespace derivation and short-alias allocation.
// Purpose: Isolate tenant storage by origin with collision-safe aliases.
// Dependencies: crate::core, crate::interfaces, sha2, thiserror
// ============================================================================

//! ## Overview
//! Namespace derivation is a cross-system cryptographic contract: every
//! component must hash identically or cross-tenant isolation breaks
//! silently. The function is pure, deterministic, and salt-free:
//! `origin_` + lowercase hex SHA-256 of the UTF-8 origin string.
//!
//! Aliases are truncated digests of the namespace, published only after the
//! reverse mapping confirms uniqueness. A truncation collision extends the
//! alias two hex characters at a time; the bind itself is atomic in the
//! backend, so two concurrent first-uses converge on a single alias.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::core::crypto;
use crate::core::identifiers::Alias;
use crate::core::identifiers::MAX_ALIAS_LENGTH;
use crate::core::identifiers::MIN_ALIAS_LENGTH;
use crate::core::identifiers::NAMESPACE_PREFIX;
use crate::core::identifiers::Namespace;
use crate::core::identifiers::Origin;
use crate::interfaces::AliasBinding;
use crate::interfaces::AliasStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Derivation
// ============================================================================

/// Derives the deterministic storage namespace for an origin.
///
/// Pure function of the origin string; no state, no I/O, no randomness.
/// Distinct origins produce distinct namespaces by SHA-256 collision
/// resistance.
#[must_use]
pub fn derive_namespace(origin: &Origin) -> Namespace {
    let digest = crypto::sha256(origin.as_str().as_bytes());
    let mut value = String::with_capacity(NAMESPACE_PREFIX.len() + digest.len() * 2);
    value.push_str(NAMESPACE_PREFIX);
    value.push_str(&crypto::hex_encode(&digest));
    Namespace::from_derived(value)
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Namespace isolator failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum NamespaceIsolatorError {
    /// Backend failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Every truncation length up to the full digest was taken.
    ///
    /// Unreachable in practice: the full-length alias is the namespace
    /// digest itself, which is unique per namespace.
    #[error("alias space exhausted")]
    AliasSpaceExhausted,
}

// ============================================================================
// SECTION: Namespace Isolator
// ============================================================================

/// Allocates and resolves short aliases for namespaces.
///
/// # Invariants
/// - A mapping is published only when both directions were written
///   atomically by the backend.
pub struct NamespaceIsolator {
    /// Bidirectional alias backend.
    backend: Arc<dyn AliasStore>,
}

impl NamespaceIsolator {
    /// Creates a namespace isolator over the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn AliasStore>) -> Self {
        Self {
            backend,
        }
    }

    /// Resolves the namespace behind a published alias.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceIsolatorError`] on backend failure.
    pub async fn resolve_alias(
        &self,
        alias: &Alias,
    ) -> Result<Option<Namespace>, NamespaceIsolatorError> {
        Ok(self.backend.namespace_for(alias).await?)
    }

    /// Returns the alias for a namespace, allocating one on first use.
    ///
    /// Starts from an 8-hex-char truncation of the namespace digest and
    /// extends on collision until the reverse mapping is free. Losing a
    /// concurrent first-use race adopts the winner's alias.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceIsolatorError`] on backend failure or (in theory)
    /// alias space exhaustion.
    pub async fn get_or_create_alias(
        &self,
        namespace: &Namespace,
    ) -> Result<Alias, NamespaceIsolatorError> {
        if let Some(alias) = self.backend.alias_for(namespace).await? {
            return Ok(alias);
        }
        let digest_hex = crypto::hex_encode(&crypto::sha256(namespace.as_str().as_bytes()));
        let mut length = MIN_ALIAS_LENGTH;
        while length <= MAX_ALIAS_LENGTH {
            let candidate = Alias::parse(&digest_hex[..length])
                .map_err(|err| StoreError::Corrupt(err.to_string()))?;
            match self.backend.namespace_for(&candidate).await? {
                Some(existing) if existing == *namespace => return Ok(candidate),
                Some(_) => {
                    // Truncation collision with another namespace.
                    length += 2;
                    continue;
                }
                None => {}
            }
            match self.backend.bind(namespace, &candidate).await? {
                AliasBinding::Bound => return Ok(candidate),
                AliasBinding::ExistingAlias(alias) => return Ok(alias),
                AliasBinding::AliasTaken => {
                    length += 2;
                }
            }
        }
        Err(NamespaceIsolatorError::AliasSpaceExhausted)
    }
}
