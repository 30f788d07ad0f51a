// crates/capgate-providers/src/state.rs
// ============================================================================
// Module: Memory State Backends
// Description: In-memory grant, principal, and alias backends.
// Purpose: Reference implementations of the gateway state interfaces.
// Dependencies: capgate-core, async-trait
// ============================================================================

//! ## Overview
//! All three state backends keep their records under a single mutex each, so
//! the check-then-write steps the interfaces require (versioned grant CAS,
//! bidirectional alias bind) are trivially atomic. Lock poisoning surfaces
//! as a backend failure rather than a panic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::MutexGuard;

use async_trait::async_trait;
use capgate_core::Alias;
use capgate_core::AliasBinding;
use capgate_core::AliasStore;
use capgate_core::GrantRecord;
use capgate_core::GrantStore;
use capgate_core::Namespace;
use capgate_core::Origin;
use capgate_core::Principal;
use capgate_core::PrincipalId;
use capgate_core::PrincipalStore;
use capgate_core::StoreError;
use capgate_core::VersionedGrant;

// ============================================================================
// SECTION: Lock Helper
// ============================================================================

/// Locks a mutex, converting poisoning into a backend error.
fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex.lock().map_err(|_| StoreError::Backend("state lock poisoned".to_string()))
}

// ============================================================================
// SECTION: Grant Backend
// ============================================================================

/// In-memory versioned grant backend.
///
/// # Invariants
/// - Versions start at 1 and increase by one per successful store.
#[derive(Default)]
pub struct MemoryGrantStore {
    /// Grant records keyed by origin string.
    records: Mutex<BTreeMap<String, VersionedGrant>>,
}

impl MemoryGrantStore {
    /// Creates an empty grant backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GrantStore for MemoryGrantStore {
    async fn load(&self, origin: &Origin) -> Result<Option<VersionedGrant>, StoreError> {
        let records = lock(&self.records)?;
        Ok(records.get(origin.as_str()).cloned())
    }

    async fn store(
        &self,
        origin: &Origin,
        expected_version: Option<u64>,
        record: &GrantRecord,
    ) -> Result<bool, StoreError> {
        let mut records = lock(&self.records)?;
        let current_version = records.get(origin.as_str()).map(|existing| existing.version);
        if current_version != expected_version {
            return Ok(false);
        }
        let next_version = current_version.unwrap_or(0) + 1;
        records.insert(
            origin.as_str().to_string(),
            VersionedGrant {
                version: next_version,
                record: record.clone(),
            },
        );
        Ok(true)
    }

    async fn remove(&self, origin: &Origin) -> Result<(), StoreError> {
        let mut records = lock(&self.records)?;
        records.remove(origin.as_str());
        Ok(())
    }

    async fn remove_if(
        &self,
        origin: &Origin,
        expected_version: u64,
    ) -> Result<bool, StoreError> {
        let mut records = lock(&self.records)?;
        let matches = records
            .get(origin.as_str())
            .is_some_and(|existing| existing.version == expected_version);
        if matches {
            records.remove(origin.as_str());
        }
        Ok(matches)
    }
}

// ============================================================================
// SECTION: Principal Backend
// ============================================================================

/// In-memory principal backend.
///
/// # Invariants
/// - At most one principal per credential fingerprint and per id.
#[derive(Default)]
pub struct MemoryPrincipalStore {
    /// Principal records keyed by credential fingerprint.
    records: Mutex<BTreeMap<String, Principal>>,
}

impl MemoryPrincipalStore {
    /// Creates an empty principal backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PrincipalStore for MemoryPrincipalStore {
    async fn find_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<Principal>, StoreError> {
        let records = lock(&self.records)?;
        Ok(records.get(fingerprint).cloned())
    }

    async fn find_by_id(&self, id: PrincipalId) -> Result<Option<Principal>, StoreError> {
        let records = lock(&self.records)?;
        Ok(records.values().find(|principal| principal.id == id).cloned())
    }

    async fn insert(&self, principal: &Principal) -> Result<bool, StoreError> {
        let mut records = lock(&self.records)?;
        if records.contains_key(&principal.secret_hash) {
            return Ok(false);
        }
        if records.values().any(|existing| existing.id == principal.id) {
            return Ok(false);
        }
        records.insert(principal.secret_hash.clone(), principal.clone());
        Ok(true)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let records = lock(&self.records)?;
        Ok(u64::try_from(records.len()).unwrap_or(u64::MAX))
    }

    async fn set_active(&self, id: PrincipalId, active: bool) -> Result<(), StoreError> {
        let mut records = lock(&self.records)?;
        let Some(principal) = records.values_mut().find(|principal| principal.id == id) else {
            return Err(StoreError::NotFound);
        };
        principal.active = active;
        Ok(())
    }

    async fn remove(&self, id: PrincipalId) -> Result<(), StoreError> {
        let mut records = lock(&self.records)?;
        let Some(fingerprint) = records
            .iter()
            .find(|(_, principal)| principal.id == id)
            .map(|(fingerprint, _)| fingerprint.clone())
        else {
            return Err(StoreError::NotFound);
        };
        records.remove(&fingerprint);
        Ok(())
    }
}

// ============================================================================
// SECTION: Alias Backend
// ============================================================================

/// Both directions of the alias mapping, guarded together.
#[derive(Default)]
struct AliasTables {
    /// Alias string to namespace string.
    alias_to_namespace: BTreeMap<String, String>,
    /// Namespace string to alias string.
    namespace_to_alias: BTreeMap<String, String>,
}

/// In-memory bidirectional alias backend.
///
/// # Invariants
/// - Both mapping directions mutate under one lock; a bind is all-or-nothing.
#[derive(Default)]
pub struct MemoryAliasStore {
    /// Bidirectional mapping tables.
    tables: Mutex<AliasTables>,
}

impl MemoryAliasStore {
    /// Creates an empty alias backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AliasStore for MemoryAliasStore {
    async fn alias_for(&self, namespace: &Namespace) -> Result<Option<Alias>, StoreError> {
        let tables = lock(&self.tables)?;
        tables
            .namespace_to_alias
            .get(namespace.as_str())
            .map(|alias| Alias::parse(alias).map_err(|err| StoreError::Corrupt(err.to_string())))
            .transpose()
    }

    async fn namespace_for(&self, alias: &Alias) -> Result<Option<Namespace>, StoreError> {
        let tables = lock(&self.tables)?;
        tables
            .alias_to_namespace
            .get(alias.as_str())
            .map(|namespace| {
                Namespace::parse(namespace).map_err(|err| StoreError::Corrupt(err.to_string()))
            })
            .transpose()
    }

    async fn bind(
        &self,
        namespace: &Namespace,
        alias: &Alias,
    ) -> Result<AliasBinding, StoreError> {
        let mut tables = lock(&self.tables)?;
        if let Some(existing) = tables.namespace_to_alias.get(namespace.as_str()) {
            let existing =
                Alias::parse(existing).map_err(|err| StoreError::Corrupt(err.to_string()))?;
            return Ok(AliasBinding::ExistingAlias(existing));
        }
        if let Some(existing) = tables.alias_to_namespace.get(alias.as_str()) {
            if existing != namespace.as_str() {
                return Ok(AliasBinding::AliasTaken);
            }
        }
        tables
            .alias_to_namespace
            .insert(alias.as_str().to_string(), namespace.as_str().to_string());
        tables
            .namespace_to_alias
            .insert(namespace.as_str().to_string(), alias.as_str().to_string());
        Ok(AliasBinding::Bound)
    }
}
