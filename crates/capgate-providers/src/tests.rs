// crates/capgate-providers/src/tests.rs
// ============================================================================
// Module: Memory Provider Tests
// Description: Unit tests for the in-memory backends and adapters.
// Purpose: Validate the contracts durable backends must also honor.
// Dependencies: capgate-providers, capgate-core, tokio
// ============================================================================

//! ## Overview
//! Exercises the interface contracts against the reference backends:
//! versioned compare-and-swap grant writes, principal uniqueness, atomic
//! alias binds, namespaced key-value and blob isolation, and gap-free
//! channel sequencing under concurrency.

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

use std::collections::BTreeSet;
use std::sync::Arc;

use capgate_core::Alias;
use capgate_core::AliasBinding;
use capgate_core::AliasStore;
use capgate_core::BlobStore;
use capgate_core::BlobVisibility;
use capgate_core::Capability;
use capgate_core::ChannelStore;
use capgate_core::GrantRecord;
use capgate_core::GrantStore;
use capgate_core::KvStore;
use capgate_core::Namespace;
use capgate_core::Origin;
use capgate_core::Principal;
use capgate_core::PrincipalId;
use capgate_core::PrincipalKind;
use capgate_core::PrincipalStore;
use capgate_core::StoreError;
use capgate_core::Timestamp;
use capgate_core::derive_namespace;
use serde_json::json;

use crate::MemoryAliasStore;
use crate::MemoryBlobStore;
use crate::MemoryChannelStore;
use crate::MemoryGrantStore;
use crate::MemoryKvStore;
use crate::MemoryPrincipalStore;

/// Parses a test origin.
fn origin(value: &str) -> Origin {
    Origin::parse(value).unwrap()
}

/// Derives a test namespace.
fn namespace(value: &str) -> Namespace {
    derive_namespace(&origin(value))
}

/// Builds a grant record with the given capabilities.
fn grant_record(origin: &Origin, capabilities: &[Capability]) -> GrantRecord {
    GrantRecord {
        origin: origin.clone(),
        capabilities: capabilities.iter().copied().collect(),
        granted_at: Timestamp::from_unix_seconds(1_000),
        expires_at: None,
    }
}

/// Builds a test principal.
fn principal(id_byte: u8, fingerprint: &str) -> Principal {
    Principal {
        id: PrincipalId::from_bytes([id_byte, 0, 0, 1]),
        secret_hash: fingerprint.to_string(),
        display_name: "tester".to_string(),
        kind: PrincipalKind::User,
        active: true,
        created_at: Timestamp::from_unix_seconds(1_000),
    }
}

// ============================================================================
// SECTION: Grant Backend Tests
// ============================================================================

#[tokio::test]
async fn grant_store_enforces_versions() {
    let store = MemoryGrantStore::new();
    let app = origin("https://app.example");
    let record = grant_record(&app, &[Capability::KvRead]);

    // Create requires that no record exists.
    assert!(store.store(&app, None, &record).await.unwrap());
    assert!(!store.store(&app, None, &record).await.unwrap());

    let loaded = store.load(&app).await.unwrap().unwrap();
    assert_eq!(loaded.version, 1);
    assert_eq!(loaded.record, record);

    // A stale expected version is refused without writing.
    let updated = grant_record(&app, &[Capability::KvRead, Capability::KvWrite]);
    assert!(!store.store(&app, Some(7), &updated).await.unwrap());
    assert!(store.store(&app, Some(1), &updated).await.unwrap());
    let loaded = store.load(&app).await.unwrap().unwrap();
    assert_eq!(loaded.version, 2);
    assert_eq!(loaded.record.capabilities, updated.capabilities);
}

#[tokio::test]
async fn grant_store_conditional_remove_requires_the_current_version() {
    let store = MemoryGrantStore::new();
    let app = origin("https://app.example");
    let record = grant_record(&app, &[Capability::KvRead]);
    assert!(store.store(&app, None, &record).await.unwrap());

    // A stale version leaves the record in place.
    assert!(!store.remove_if(&app, 7).await.unwrap());
    assert!(store.load(&app).await.unwrap().is_some());

    assert!(store.remove_if(&app, 1).await.unwrap());
    assert!(store.load(&app).await.unwrap().is_none());

    // The record is gone; a second conditional delete reports a mismatch.
    assert!(!store.remove_if(&app, 1).await.unwrap());
}

#[tokio::test]
async fn grant_store_remove_is_idempotent() {
    let store = MemoryGrantStore::new();
    let app = origin("https://app.example");
    store.remove(&app).await.unwrap();
    let record = grant_record(&app, &[Capability::KvRead]);
    assert!(store.store(&app, None, &record).await.unwrap());
    store.remove(&app).await.unwrap();
    assert!(store.load(&app).await.unwrap().is_none());
}

// ============================================================================
// SECTION: Principal Backend Tests
// ============================================================================

#[tokio::test]
async fn principal_insert_refuses_duplicates() {
    let store = MemoryPrincipalStore::new();
    assert!(store.insert(&principal(1, "fp-one")).await.unwrap());
    // Same fingerprint, different id.
    assert!(!store.insert(&principal(2, "fp-one")).await.unwrap());
    // Same id, different fingerprint.
    assert!(!store.insert(&principal(1, "fp-two")).await.unwrap());
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn principal_lookup_and_lifecycle() {
    let store = MemoryPrincipalStore::new();
    let record = principal(1, "fp-one");
    store.insert(&record).await.unwrap();

    let by_fp = store.find_by_fingerprint("fp-one").await.unwrap().unwrap();
    assert_eq!(by_fp.id, record.id);
    let by_id = store.find_by_id(record.id).await.unwrap().unwrap();
    assert_eq!(by_id.secret_hash, "fp-one");

    store.set_active(record.id, false).await.unwrap();
    assert!(!store.find_by_id(record.id).await.unwrap().unwrap().active);
    assert_eq!(store.count().await.unwrap(), 1);

    store.remove(record.id).await.unwrap();
    assert!(store.find_by_id(record.id).await.unwrap().is_none());
    let missing = store.remove(record.id).await;
    assert!(matches!(missing, Err(StoreError::NotFound)));
}

// ============================================================================
// SECTION: Alias Backend Tests
// ============================================================================

#[tokio::test]
async fn alias_bind_covers_both_directions() {
    let store = MemoryAliasStore::new();
    let ns = namespace("https://one.example");
    let alias = Alias::parse("00ff00ff").unwrap();
    assert_eq!(store.bind(&ns, &alias).await.unwrap(), AliasBinding::Bound);
    assert_eq!(store.alias_for(&ns).await.unwrap(), Some(alias.clone()));
    assert_eq!(store.namespace_for(&alias).await.unwrap(), Some(ns));
}

#[tokio::test]
async fn alias_bind_reports_existing_and_taken() {
    let store = MemoryAliasStore::new();
    let first = namespace("https://one.example");
    let second = namespace("https://two.example");
    let alias = Alias::parse("00ff00ff").unwrap();
    let other = Alias::parse("11ee11ee").unwrap();

    assert_eq!(store.bind(&first, &alias).await.unwrap(), AliasBinding::Bound);
    // The namespace already holds an alias; the caller must adopt it.
    assert_eq!(
        store.bind(&first, &other).await.unwrap(),
        AliasBinding::ExistingAlias(alias.clone()),
    );
    // The alias belongs to another namespace.
    assert_eq!(store.bind(&second, &alias).await.unwrap(), AliasBinding::AliasTaken);
}

// ============================================================================
// SECTION: Key-Value Adapter Tests
// ============================================================================

#[tokio::test]
async fn kv_is_namespaced_and_prefix_listable() {
    let store = MemoryKvStore::new();
    let one = namespace("https://one.example");
    let two = namespace("https://two.example");

    store.set(&one, "user:1", json!("a")).await.unwrap();
    store.set(&one, "user:2", json!("b")).await.unwrap();
    store.set(&one, "post:1", json!("c")).await.unwrap();
    store.set(&two, "user:1", json!("other")).await.unwrap();

    assert_eq!(store.get(&one, "user:1").await.unwrap(), Some(json!("a")));
    assert_eq!(store.get(&two, "user:1").await.unwrap(), Some(json!("other")));

    let keys = store.keys(&one, Some("user:")).await.unwrap();
    assert_eq!(keys, vec!["user:1".to_string(), "user:2".to_string()]);
    let all = store.keys(&one, None).await.unwrap();
    assert_eq!(all.len(), 3);

    store.delete(&one, "user:1").await.unwrap();
    assert_eq!(store.get(&one, "user:1").await.unwrap(), None);
    // Deleting an absent key is not an error.
    store.delete(&one, "user:1").await.unwrap();
}

// ============================================================================
// SECTION: Blob Adapter Tests
// ============================================================================

#[tokio::test]
async fn blob_round_trip_and_listing() {
    let store = MemoryBlobStore::new();
    let ns = namespace("https://one.example");
    let now = Timestamp::from_unix_seconds(2_000);

    let metadata = store
        .upload(&ns, "avatar.png", "image/png", vec![1, 2, 3], BlobVisibility::Public, now)
        .await
        .unwrap();
    assert_eq!(metadata.size, 3);
    assert_eq!(metadata.visibility, BlobVisibility::Public);

    let (loaded, bytes) = store.get(&ns, "avatar.png").await.unwrap().unwrap();
    assert_eq!(loaded, metadata);
    assert_eq!(bytes, vec![1, 2, 3]);

    let listed = store.list(&ns).await.unwrap();
    assert_eq!(listed, vec![metadata]);

    store.delete(&ns, "avatar.png").await.unwrap();
    let missing = store.delete(&ns, "avatar.png").await;
    assert!(matches!(missing, Err(StoreError::NotFound)));
}

// ============================================================================
// SECTION: Channel Adapter Tests
// ============================================================================

#[tokio::test]
async fn channel_append_sequences_are_gap_free() {
    let store = MemoryChannelStore::new();
    let ns = namespace("https://one.example");
    let now = Timestamp::from_unix_seconds(3_000);
    let record = store.create(&ns, "updates", now).await.unwrap();

    for expected in 1..=5u64 {
        let event = store.append(record.id, None, "event", now).await.unwrap();
        assert_eq!(event.seq, expected);
    }
    let events = store.read(record.id).await.unwrap();
    assert_eq!(events.iter().map(|event| event.seq).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_never_collide() {
    let store = Arc::new(MemoryChannelStore::new());
    let ns = namespace("https://one.example");
    let now = Timestamp::from_unix_seconds(3_000);
    let record = store.create(&ns, "busy", now).await.unwrap();

    let mut handles = Vec::new();
    for worker in 0..8u8 {
        let store = Arc::clone(&store);
        let channel = record.id;
        handles.push(tokio::spawn(async move {
            let mut seqs = Vec::new();
            for _ in 0..16 {
                let event =
                    store.append(channel, None, &format!("w{worker}"), now).await.unwrap();
                seqs.push(event.seq);
            }
            seqs
        }));
    }
    let mut all = BTreeSet::new();
    for handle in handles {
        for seq in handle.await.unwrap() {
            assert!(all.insert(seq), "sequence {seq} assigned twice");
        }
    }
    let expected: BTreeSet<u64> = (1..=128).collect();
    assert_eq!(all, expected);
}

#[tokio::test]
async fn channel_secret_resolution_matches_prefix() {
    let store = MemoryChannelStore::new();
    let ns = namespace("https://one.example");
    let now = Timestamp::from_unix_seconds(3_000);
    let record = store.create(&ns, "updates", now).await.unwrap();

    let secret = store.secret(record.id).await.unwrap();
    let candidates = store.resolve_truncated(record.id.truncated()).await.unwrap();
    assert_eq!(candidates, vec![(record.id, secret)]);

    let none = store.resolve_truncated([0xff; 6]).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn deleted_channel_rejects_operations() {
    let store = MemoryChannelStore::new();
    let ns = namespace("https://one.example");
    let now = Timestamp::from_unix_seconds(3_000);
    let record = store.create(&ns, "gone", now).await.unwrap();
    store.delete(record.id).await.unwrap();

    assert!(matches!(store.append(record.id, None, "x", now).await, Err(StoreError::NotFound)));
    assert!(matches!(store.read(record.id).await, Err(StoreError::NotFound)));
    assert!(matches!(store.secret(record.id).await, Err(StoreError::NotFound)));
    assert!(matches!(store.delete(record.id).await, Err(StoreError::NotFound)));
}
