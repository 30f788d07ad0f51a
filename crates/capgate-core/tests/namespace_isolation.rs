// crates/capgate-core/tests/namespace_isolation.rs
// ============================================================================
// Module: Namespace Isolation Tests
// Description: Integration tests for derivation and alias allocation.
// Purpose: Validate the cross-system derivation contract and alias rules.
// Dependencies: capgate-core, async-trait, tokio
// ============================================================================

//! ## Overview
//! Pins the namespace derivation contract against a known vector and
//! exercises alias allocation over a minimal bidirectional backend:
//! first-use allocation, stable re-reads, collision extension, and
//! adoption of a concurrently bound alias.

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

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use capgate_core::Alias;
use capgate_core::AliasBinding;
use capgate_core::AliasStore;
use capgate_core::Namespace;
use capgate_core::NamespaceIsolator;
use capgate_core::Origin;
use capgate_core::StoreError;
use capgate_core::crypto;
use capgate_core::derive_namespace;

// ============================================================================
// SECTION: Test Backend
// ============================================================================

/// Minimal atomic bidirectional alias backend.
#[derive(Default)]
struct TestAliasBackend {
    /// Both mapping directions under one lock.
    tables: Mutex<(BTreeMap<String, Alias>, BTreeMap<String, Namespace>)>,
}

#[async_trait]
impl AliasStore for TestAliasBackend {
    async fn alias_for(&self, namespace: &Namespace) -> Result<Option<Alias>, StoreError> {
        let tables = self.tables.lock().map_err(|_| StoreError::Backend("poison".into()))?;
        Ok(tables.0.get(namespace.as_str()).cloned())
    }

    async fn namespace_for(&self, alias: &Alias) -> Result<Option<Namespace>, StoreError> {
        let tables = self.tables.lock().map_err(|_| StoreError::Backend("poison".into()))?;
        Ok(tables.1.get(alias.as_str()).cloned())
    }

    async fn bind(&self, namespace: &Namespace, alias: &Alias) -> Result<AliasBinding, StoreError> {
        let mut tables = self.tables.lock().map_err(|_| StoreError::Backend("poison".into()))?;
        if let Some(existing) = tables.0.get(namespace.as_str()) {
            return Ok(AliasBinding::ExistingAlias(existing.clone()));
        }
        if tables.1.contains_key(alias.as_str()) {
            return Ok(AliasBinding::AliasTaken);
        }
        tables.0.insert(namespace.as_str().to_string(), alias.clone());
        tables.1.insert(alias.as_str().to_string(), namespace.clone());
        Ok(AliasBinding::Bound)
    }
}

/// Parses a test origin.
fn origin(value: &str) -> Origin {
    Origin::parse(value).unwrap()
}

/// Returns the hex digest an alias for this namespace truncates.
fn alias_digest(namespace: &Namespace) -> String {
    crypto::hex_encode(&crypto::sha256(namespace.as_str().as_bytes()))
}

// ============================================================================
// SECTION: Derivation Tests
// ============================================================================

#[test]
fn derivation_is_deterministic() {
    let app = origin("https://app.example");
    assert_eq!(derive_namespace(&app), derive_namespace(&app));
}

#[test]
fn derivation_matches_the_documented_contract() {
    let app = origin("https://app.example");
    let namespace = derive_namespace(&app);
    let expected = format!("origin_{}", crypto::hex_encode(&crypto::sha256(b"https://app.example")));
    assert_eq!(namespace.as_str(), expected);
    // A derived namespace always re-parses.
    assert_eq!(Namespace::parse(namespace.as_str()).unwrap(), namespace);
}

#[test]
fn distinct_origins_get_distinct_namespaces() {
    let namespaces: Vec<Namespace> = [
        "https://app.example",
        "https://app.example:8443",
        "http://app.example",
        "https://other.example",
    ]
    .iter()
    .map(|value| derive_namespace(&origin(value)))
    .collect();
    for (left_index, left) in namespaces.iter().enumerate() {
        for right in &namespaces[left_index + 1..] {
            assert_ne!(left, right);
        }
    }
}

// ============================================================================
// SECTION: Alias Allocation Tests
// ============================================================================

#[tokio::test]
async fn first_use_allocates_an_eight_char_alias() {
    let backend = Arc::new(TestAliasBackend::default());
    let isolator = NamespaceIsolator::new(Arc::clone(&backend) as Arc<dyn AliasStore>);
    let namespace = derive_namespace(&origin("https://app.example"));

    let alias = isolator.get_or_create_alias(&namespace).await.unwrap();
    assert_eq!(alias.as_str().len(), 8);
    assert_eq!(alias.as_str(), &alias_digest(&namespace)[..8]);

    // A second call returns the stored alias without re-deriving.
    let again = isolator.get_or_create_alias(&namespace).await.unwrap();
    assert_eq!(again, alias);
    assert_eq!(isolator.resolve_alias(&alias).await.unwrap(), Some(namespace));
}

#[tokio::test]
async fn collision_extends_the_alias_two_chars() {
    let backend = Arc::new(TestAliasBackend::default());
    let isolator = NamespaceIsolator::new(Arc::clone(&backend) as Arc<dyn AliasStore>);
    let namespace = derive_namespace(&origin("https://app.example"));
    let squatter = derive_namespace(&origin("https://squatter.example"));

    // Another namespace already holds this namespace's 8-char truncation.
    let truncation = Alias::parse(&alias_digest(&namespace)[..8]).unwrap();
    assert_eq!(backend.bind(&squatter, &truncation).await.unwrap(), AliasBinding::Bound);

    let alias = isolator.get_or_create_alias(&namespace).await.unwrap();
    assert_eq!(alias.as_str().len(), 10);
    assert_eq!(alias.as_str(), &alias_digest(&namespace)[..10]);
}

#[tokio::test]
async fn losing_a_first_use_race_adopts_the_winner() {
    let backend = Arc::new(TestAliasBackend::default());
    let isolator = NamespaceIsolator::new(Arc::clone(&backend) as Arc<dyn AliasStore>);
    let namespace = derive_namespace(&origin("https://app.example"));

    // The winner bound an alias for this namespace between our read and bind.
    let winner = Alias::parse("aabbccdd").unwrap();
    assert_eq!(backend.bind(&namespace, &winner).await.unwrap(), AliasBinding::Bound);

    let alias = isolator.get_or_create_alias(&namespace).await.unwrap();
    assert_eq!(alias, winner);
}

#[tokio::test]
async fn resolving_an_unbound_alias_yields_none() {
    let backend = Arc::new(TestAliasBackend::default());
    let isolator = NamespaceIsolator::new(backend as Arc<dyn AliasStore>);
    let alias = Alias::parse("00000000").unwrap();
    assert_eq!(isolator.resolve_alias(&alias).await.unwrap(), None);
}
