// crates/capgate-providers/src/kv.rs
// ============================================================================
// Module: Memory Key-Value Adapter
// Description: In-memory namespaced key-value storage adapter.
// Purpose: Reference KvStore implementation for tests and standalone use.
// Dependencies: capgate-core, async-trait, serde_json
// ============================================================================

//! ## Overview
//! Values live in nested ordered maps keyed by namespace then key, so key
//! listings come back in stable order without sorting.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use capgate_core::KvStore;
use capgate_core::Namespace;
use capgate_core::StoreError;
use serde_json::Value;

// ============================================================================
// SECTION: Adapter
// ============================================================================

/// In-memory namespaced key-value store.
#[derive(Default)]
pub struct MemoryKvStore {
    /// Values keyed by namespace string, then key.
    tables: Mutex<BTreeMap<String, BTreeMap<String, Value>>>,
}

impl MemoryKvStore {
    /// Creates an empty key-value store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the tables, converting poisoning into a backend error.
    fn locked(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, BTreeMap<String, Value>>>, StoreError>
    {
        self.tables.lock().map_err(|_| StoreError::Backend("kv lock poisoned".to_string()))
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, namespace: &Namespace, key: &str) -> Result<Option<Value>, StoreError> {
        let tables = self.locked()?;
        Ok(tables.get(namespace.as_str()).and_then(|table| table.get(key).cloned()))
    }

    async fn set(
        &self,
        namespace: &Namespace,
        key: &str,
        value: Value,
    ) -> Result<(), StoreError> {
        let mut tables = self.locked()?;
        tables
            .entry(namespace.as_str().to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, namespace: &Namespace, key: &str) -> Result<(), StoreError> {
        let mut tables = self.locked()?;
        if let Some(table) = tables.get_mut(namespace.as_str()) {
            table.remove(key);
            if table.is_empty() {
                tables.remove(namespace.as_str());
            }
        }
        Ok(())
    }

    async fn keys(
        &self,
        namespace: &Namespace,
        prefix: Option<&str>,
    ) -> Result<Vec<String>, StoreError> {
        let tables = self.locked()?;
        let Some(table) = tables.get(namespace.as_str()) else {
            return Ok(Vec::new());
        };
        Ok(table
            .keys()
            .filter(|key| prefix.is_none_or(|prefix| key.starts_with(prefix)))
            .cloned()
            .collect())
    }
}
