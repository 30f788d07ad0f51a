// crates/capgate-store-sqlite/tests/sqlite_store.rs
// ============================================================================
// Module: SQLite Store Tests
// Description: Integration tests for the durable state backends.
// Purpose: Validate persistence, CAS, uniqueness, and schema enforcement.
// Dependencies: capgate-core, capgate-store-sqlite, rusqlite, tempfile, tokio
// ============================================================================

//! ## Overview
//! Opens real database files under a temp directory and checks that grant
//! compare-and-swap, principal uniqueness, and alias binding behave the same
//! across process-style reopen, and that an unknown schema version refuses
//! to open.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;

use capgate_core::Alias;
use capgate_core::AliasBinding;
use capgate_core::AliasStore;
use capgate_core::Capability;
use capgate_core::CapabilitySet;
use capgate_core::GrantRecord;
use capgate_core::GrantStore;
use capgate_core::Origin;
use capgate_core::Principal;
use capgate_core::PrincipalId;
use capgate_core::PrincipalKind;
use capgate_core::PrincipalStore;
use capgate_core::StoreError;
use capgate_core::Timestamp;
use capgate_core::derive_namespace;
use capgate_store_sqlite::SqliteStateStore;
use capgate_store_sqlite::SqliteStoreConfig;
use capgate_store_sqlite::SqliteStoreError;
use rusqlite::Connection;
use tempfile::TempDir;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Opens a store on a fresh database file, returning the temp dir too.
fn open_store() -> (TempDir, SqliteStateStore) {
    let dir = TempDir::new().unwrap();
    let store = open_at(&dir.path().join("state.db"));
    (dir, store)
}

/// Opens (or reopens) a store at the given path with default config.
fn open_at(path: &Path) -> SqliteStateStore {
    SqliteStateStore::open(path, &SqliteStoreConfig::default()).unwrap()
}

/// Parses a test origin.
fn origin(value: &str) -> Origin {
    Origin::parse(value).unwrap()
}

/// Builds a grant record for the given origin and capabilities.
fn record(origin: &Origin, capabilities: &[Capability]) -> GrantRecord {
    GrantRecord {
        origin: origin.clone(),
        capabilities: capabilities.iter().copied().collect::<CapabilitySet>(),
        granted_at: Timestamp::from_unix_seconds(1_000),
        expires_at: None,
    }
}

/// Builds a principal with the given fingerprint and id byte.
fn principal(fingerprint: &str, id_byte: u8) -> Principal {
    Principal {
        id: PrincipalId::from_bytes([id_byte; 4]),
        secret_hash: fingerprint.to_string(),
        display_name: "tester".to_string(),
        kind: PrincipalKind::App,
        active: true,
        created_at: Timestamp::from_unix_seconds(1_000),
    }
}

// ============================================================================
// SECTION: Schema Tests
// ============================================================================

#[tokio::test]
async fn reopening_a_database_preserves_state() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.db");
    let app = origin("https://app.example");

    let store = open_at(&path);
    assert!(store.store(&app, None, &record(&app, &[Capability::KvRead])).await.unwrap());
    drop(store);

    let store = open_at(&path);
    let loaded = store.load(&app).await.unwrap().unwrap();
    assert_eq!(loaded.version, 1);
    assert_eq!(
        loaded.record.capabilities,
        [Capability::KvRead].into_iter().collect::<CapabilitySet>(),
    );
}

#[tokio::test]
async fn unknown_schema_version_refuses_to_open() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.db");
    drop(open_at(&path));

    let raw = Connection::open(&path).unwrap();
    raw.execute("UPDATE store_meta SET version = 99", []).unwrap();
    drop(raw);

    let result = SqliteStateStore::open(&path, &SqliteStoreConfig::default());
    assert!(matches!(result, Err(SqliteStoreError::Schema(99))));
}

#[tokio::test]
async fn in_memory_store_initializes() {
    let store = SqliteStateStore::open_in_memory(&SqliteStoreConfig::default()).unwrap();
    assert_eq!(PrincipalStore::count(&store).await.unwrap(), 0);
}

// ============================================================================
// SECTION: Grant Backend Tests
// ============================================================================

#[tokio::test]
async fn grant_versions_gate_every_write() {
    let (_dir, store) = open_store();
    let app = origin("https://app.example");

    // Creation requires that no record exists.
    assert!(store.store(&app, None, &record(&app, &[Capability::KvRead])).await.unwrap());
    assert!(!store.store(&app, None, &record(&app, &[Capability::KvWrite])).await.unwrap());

    // A stale version is refused without writing.
    assert!(!store.store(&app, Some(7), &record(&app, &[Capability::KvWrite])).await.unwrap());
    let loaded = store.load(&app).await.unwrap().unwrap();
    assert_eq!(loaded.version, 1);

    // The matching version advances the record.
    assert!(
        store
            .store(&app, Some(1), &record(&app, &[Capability::KvRead, Capability::KvWrite]))
            .await
            .unwrap()
    );
    let loaded = store.load(&app).await.unwrap().unwrap();
    assert_eq!(loaded.version, 2);
    assert_eq!(loaded.record.capabilities.len(), 2);
}

#[tokio::test]
async fn conditional_grant_remove_requires_the_current_version() {
    let (_dir, store) = open_store();
    let app = origin("https://app.example");

    assert!(store.store(&app, None, &record(&app, &[Capability::KvRead])).await.unwrap());

    // A stale version deletes nothing.
    assert!(!store.remove_if(&app, 7).await.unwrap());
    assert_eq!(store.load(&app).await.unwrap().unwrap().version, 1);

    assert!(store.remove_if(&app, 1).await.unwrap());
    assert!(store.load(&app).await.unwrap().is_none());

    // Once the record is gone a matching delete reports a mismatch.
    assert!(!store.remove_if(&app, 1).await.unwrap());
}

#[tokio::test]
async fn grant_remove_is_idempotent() {
    let (_dir, store) = open_store();
    let app = origin("https://app.example");

    assert!(store.store(&app, None, &record(&app, &[Capability::KvRead])).await.unwrap());
    GrantStore::remove(&store, &app).await.unwrap();
    assert!(store.load(&app).await.unwrap().is_none());
    GrantStore::remove(&store, &app).await.unwrap();

    // After deletion the origin is creatable again at version 1.
    assert!(store.store(&app, None, &record(&app, &[Capability::BlobRead])).await.unwrap());
    assert_eq!(store.load(&app).await.unwrap().unwrap().version, 1);
}

// ============================================================================
// SECTION: Principal Backend Tests
// ============================================================================

#[tokio::test]
async fn principal_inserts_enforce_both_uniqueness_constraints() {
    let (_dir, store) = open_store();

    assert!(store.insert(&principal("fp-one", 0x01)).await.unwrap());
    // Same fingerprint is refused regardless of id.
    assert!(!store.insert(&principal("fp-one", 0x02)).await.unwrap());
    // Same id is refused regardless of fingerprint.
    assert!(!store.insert(&principal("fp-two", 0x01)).await.unwrap());
    assert_eq!(PrincipalStore::count(&store).await.unwrap(), 1);
}

#[tokio::test]
async fn principal_lookup_and_lifecycle_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.db");
    let subject = principal("fp-one", 0x01);

    let store = open_at(&path);
    assert!(store.insert(&subject).await.unwrap());
    store.set_active(subject.id, false).await.unwrap();
    drop(store);

    let store = open_at(&path);
    let by_fingerprint = store.find_by_fingerprint("fp-one").await.unwrap().unwrap();
    assert!(!by_fingerprint.active);
    let by_id = store.find_by_id(subject.id).await.unwrap().unwrap();
    assert_eq!(by_id.display_name, "tester");

    PrincipalStore::remove(&store, subject.id).await.unwrap();
    assert!(store.find_by_fingerprint("fp-one").await.unwrap().is_none());
    let result = PrincipalStore::remove(&store, subject.id).await;
    assert!(matches!(result, Err(StoreError::NotFound)));
}

#[tokio::test]
async fn mutating_an_absent_principal_reports_not_found() {
    let (_dir, store) = open_store();
    let result = store.set_active(PrincipalId::from_bytes([0xff; 4]), false).await;
    assert!(matches!(result, Err(StoreError::NotFound)));
}

// ============================================================================
// SECTION: Alias Backend Tests
// ============================================================================

#[tokio::test]
async fn alias_binds_cover_both_directions() {
    let (_dir, store) = open_store();
    let namespace = derive_namespace(&origin("https://app.example"));
    let alias = Alias::parse("00aabbcc").unwrap();

    assert_eq!(store.bind(&namespace, &alias).await.unwrap(), AliasBinding::Bound);
    assert_eq!(store.alias_for(&namespace).await.unwrap(), Some(alias.clone()));
    assert_eq!(store.namespace_for(&alias).await.unwrap(), Some(namespace.clone()));

    // A rebind attempt reports the existing alias instead of replacing it.
    let other = Alias::parse("ddeeff00").unwrap();
    assert_eq!(
        store.bind(&namespace, &other).await.unwrap(),
        AliasBinding::ExistingAlias(alias.clone()),
    );

    // A different namespace cannot claim a taken alias.
    let stranger = derive_namespace(&origin("https://other.example"));
    assert_eq!(store.bind(&stranger, &alias).await.unwrap(), AliasBinding::AliasTaken);
}

#[tokio::test]
async fn alias_bindings_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.db");
    let namespace = derive_namespace(&origin("https://app.example"));
    let alias = Alias::parse("00aabbcc").unwrap();

    let store = open_at(&path);
    assert_eq!(store.bind(&namespace, &alias).await.unwrap(), AliasBinding::Bound);
    drop(store);

    let store = open_at(&path);
    assert_eq!(store.namespace_for(&alias).await.unwrap(), Some(namespace));
}
