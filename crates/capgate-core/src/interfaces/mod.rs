// crates/capgate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Capgate Interfaces
// Description: Backend-agnostic interfaces for state and storage backends.
// Purpose: Define the contract surfaces every gateway backend must satisfy.
// Dependencies: crate::core, async-trait, serde_json
// ============================================================================

//! ## Overview
//! Interfaces define how the gateway reaches persistent state (grants,
//! principals, aliases) and tenant storage (key-value, blobs, channels)
//! without embedding backend-specific details. Implementations must be
//! deterministic and fail closed on missing or invalid data.
//!
//! Invariants:
//! - Grant writes are versioned compare-and-swap; unconditional overwrites
//!   of read-modify-write state are a correctness bug.
//! - Alias binding is atomic across both mapping directions.
//! - Channel sequence assignment is serialized per channel by the store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::core::crypto::ResourceSecret;
use crate::core::grants::GrantRecord;
use crate::core::identifiers::Alias;
use crate::core::identifiers::Namespace;
use crate::core::identifiers::Origin;
use crate::core::identifiers::PrincipalId;
use crate::core::identifiers::RESOURCE_ID_TRUNCATED_BYTES;
use crate::core::identifiers::ResourceId;
use crate::core::principal::Principal;
use crate::core::records::BlobMetadata;
use crate::core::records::BlobVisibility;
use crate::core::records::ChannelEvent;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// State and storage backend failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Messages never carry backend addresses, paths, or tenant data.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend operation failed.
    #[error("store backend failure: {0}")]
    Backend(String),
    /// Stored data failed integrity or shape validation.
    #[error("store data corrupt: {0}")]
    Corrupt(String),
    /// Referenced record does not exist.
    #[error("record not found")]
    NotFound,
}

// ============================================================================
// SECTION: Grant Backend
// ============================================================================

/// A grant record paired with its storage version for compare-and-swap.
///
/// # Invariants
/// - `version` increases by one on every successful store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedGrant {
    /// Storage version of the record.
    pub version: u64,
    /// The grant record itself.
    pub record: GrantRecord,
}

/// Versioned backend for capability grant records, keyed by origin.
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Loads the grant record for an origin, with its version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    async fn load(&self, origin: &Origin) -> Result<Option<VersionedGrant>, StoreError>;

    /// Stores a full grant snapshot if the current version matches.
    ///
    /// `expected_version` of `None` requires that no record exists. Returns
    /// `false` on a version conflict without writing anything.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    async fn store(
        &self,
        origin: &Origin,
        expected_version: Option<u64>,
        record: &GrantRecord,
    ) -> Result<bool, StoreError>;

    /// Removes the grant record for an origin unconditionally, if present.
    ///
    /// Only whole-record revocation may use this; read-modify-write paths
    /// must use [`GrantStore::remove_if`] so a concurrent store is never
    /// silently deleted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    async fn remove(&self, origin: &Origin) -> Result<(), StoreError>;

    /// Removes the grant record only if its version still matches.
    ///
    /// Returns `false` without writing when the record is absent or its
    /// version differs, which means another writer committed after the
    /// caller's load.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    async fn remove_if(&self, origin: &Origin, expected_version: u64)
    -> Result<bool, StoreError>;
}

// ============================================================================
// SECTION: Principal Backend
// ============================================================================

/// Backend for principal records, keyed by credential fingerprint.
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    /// Finds a principal by credential fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    async fn find_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<Principal>, StoreError>;

    /// Finds a principal by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    async fn find_by_id(&self, id: PrincipalId) -> Result<Option<Principal>, StoreError>;

    /// Inserts a new principal. Returns `false` without writing when a
    /// principal with the same fingerprint or id already exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    async fn insert(&self, principal: &Principal) -> Result<bool, StoreError>;

    /// Counts all principal records, active or not.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    async fn count(&self) -> Result<u64, StoreError>;

    /// Sets the active flag on a principal (logical deactivation).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the principal does not exist.
    async fn set_active(&self, id: PrincipalId, active: bool) -> Result<(), StoreError>;

    /// Physically deletes a principal record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the principal does not exist.
    async fn remove(&self, id: PrincipalId) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Alias Backend
// ============================================================================

/// Outcome of an atomic alias bind attempt.
///
/// # Invariants
/// - Exactly one variant describes the post-state of both mapping directions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasBinding {
    /// Both directions were written; the alias now belongs to the namespace.
    Bound,
    /// The namespace already had an alias (possibly bound concurrently);
    /// the caller must adopt it.
    ExistingAlias(Alias),
    /// The alias is already bound to a different namespace.
    AliasTaken,
}

/// Bidirectional alias mapping backend.
#[async_trait]
pub trait AliasStore: Send + Sync {
    /// Returns the alias bound to a namespace, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    async fn alias_for(&self, namespace: &Namespace) -> Result<Option<Alias>, StoreError>;

    /// Returns the namespace bound to an alias, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    async fn namespace_for(&self, alias: &Alias) -> Result<Option<Namespace>, StoreError>;

    /// Atomically binds `alias` to `namespace` in both directions.
    ///
    /// The check-then-write across both directions must be a single atomic
    /// step; two concurrent first-uses must converge on one alias.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    async fn bind(
        &self,
        namespace: &Namespace,
        alias: &Alias,
    ) -> Result<AliasBinding, StoreError>;
}

// ============================================================================
// SECTION: Key-Value Adapter
// ============================================================================

/// Namespaced key-value storage adapter.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Reads a value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    async fn get(&self, namespace: &Namespace, key: &str) -> Result<Option<Value>, StoreError>;

    /// Writes a value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    async fn set(&self, namespace: &Namespace, key: &str, value: Value)
    -> Result<(), StoreError>;

    /// Deletes a key. Deleting an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    async fn delete(&self, namespace: &Namespace, key: &str) -> Result<(), StoreError>;

    /// Lists keys, optionally filtered by prefix, in stable order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    async fn keys(
        &self,
        namespace: &Namespace,
        prefix: Option<&str>,
    ) -> Result<Vec<String>, StoreError>;
}

// ============================================================================
// SECTION: Blob Adapter
// ============================================================================

/// Namespaced blob storage adapter.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores a blob and returns its metadata.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    async fn upload(
        &self,
        namespace: &Namespace,
        key: &str,
        content_type: &str,
        data: Vec<u8>,
        visibility: BlobVisibility,
        now: Timestamp,
    ) -> Result<BlobMetadata, StoreError>;

    /// Reads a blob and its metadata.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    async fn get(
        &self,
        namespace: &Namespace,
        key: &str,
    ) -> Result<Option<(BlobMetadata, Vec<u8>)>, StoreError>;

    /// Deletes a blob.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the blob does not exist.
    async fn delete(&self, namespace: &Namespace, key: &str) -> Result<(), StoreError>;

    /// Lists blob metadata for a namespace in stable key order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    async fn list(&self, namespace: &Namespace) -> Result<Vec<BlobMetadata>, StoreError>;
}

// ============================================================================
// SECTION: Channel Adapter
// ============================================================================

/// A channel resource owned by a namespace.
///
/// # Invariants
/// - The signing secret for the channel lives with the store, never in the
///   record handed to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRecord {
    /// Channel identifier.
    pub id: ResourceId,
    /// Owning namespace.
    pub namespace: Namespace,
    /// Human-readable channel name.
    pub name: String,
    /// Creation timestamp.
    pub created_at: Timestamp,
}

/// Append-only, strictly sequenced channel log adapter.
///
/// Implementations own sequence assignment and must serialize it per channel;
/// concurrent appends must never observe or assign the same `seq` twice.
#[async_trait]
pub trait ChannelStore: Send + Sync {
    /// Creates a channel with a fresh identifier and signing secret.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    async fn create(
        &self,
        namespace: &Namespace,
        name: &str,
        now: Timestamp,
    ) -> Result<ChannelRecord, StoreError>;

    /// Looks up a channel record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    async fn lookup(&self, id: ResourceId) -> Result<Option<ChannelRecord>, StoreError>;

    /// Appends an event, assigning the next sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the channel does not exist.
    async fn append(
        &self,
        id: ResourceId,
        author_id: Option<PrincipalId>,
        content: &str,
        now: Timestamp,
    ) -> Result<ChannelEvent, StoreError>;

    /// Reads all events in sequence order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the channel does not exist.
    async fn read(&self, id: ResourceId) -> Result<Vec<ChannelEvent>, StoreError>;

    /// Deletes a channel and its events.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the channel does not exist.
    async fn delete(&self, id: ResourceId) -> Result<(), StoreError>;

    /// Returns the signing secret for a channel.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the channel does not exist.
    async fn secret(&self, id: ResourceId) -> Result<ResourceSecret, StoreError>;

    /// Resolves all channels whose identifier starts with the truncated
    /// prefix, with their secrets. Used by V3 token verification, where the
    /// signature (not the truncated id) is the authority.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    async fn resolve_truncated(
        &self,
        prefix: [u8; RESOURCE_ID_TRUNCATED_BYTES],
    ) -> Result<Vec<(ResourceId, ResourceSecret)>, StoreError>;
}
