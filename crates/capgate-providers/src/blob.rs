// crates/capgate-providers/src/blob.rs
// ============================================================================
// Module: Memory Blob Adapter
// Description: In-memory namespaced blob storage adapter.
// Purpose: Reference BlobStore implementation for tests and standalone use.
// Dependencies: capgate-core, async-trait
// ============================================================================

//! ## Overview
//! Blob bytes and metadata live together under a single mutex; listings come
//! back in stable key order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use capgate_core::BlobMetadata;
use capgate_core::BlobStore;
use capgate_core::BlobVisibility;
use capgate_core::Namespace;
use capgate_core::StoreError;
use capgate_core::Timestamp;

// ============================================================================
// SECTION: Adapter
// ============================================================================

/// Stored blob entry: metadata plus raw bytes.
type BlobEntry = (BlobMetadata, Vec<u8>);

/// In-memory namespaced blob store.
#[derive(Default)]
pub struct MemoryBlobStore {
    /// Blobs keyed by namespace string, then key.
    tables: Mutex<BTreeMap<String, BTreeMap<String, BlobEntry>>>,
}

impl MemoryBlobStore {
    /// Creates an empty blob store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the tables, converting poisoning into a backend error.
    fn locked(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, BTreeMap<String, BlobEntry>>>, StoreError>
    {
        self.tables.lock().map_err(|_| StoreError::Backend("blob lock poisoned".to_string()))
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        namespace: &Namespace,
        key: &str,
        content_type: &str,
        data: Vec<u8>,
        visibility: BlobVisibility,
        now: Timestamp,
    ) -> Result<BlobMetadata, StoreError> {
        let metadata = BlobMetadata {
            key: key.to_string(),
            namespace: namespace.clone(),
            size: u64::try_from(data.len()).unwrap_or(u64::MAX),
            content_type: content_type.to_string(),
            visibility,
            uploaded_at: now,
        };
        let mut tables = self.locked()?;
        tables
            .entry(namespace.as_str().to_string())
            .or_default()
            .insert(key.to_string(), (metadata.clone(), data));
        Ok(metadata)
    }

    async fn get(
        &self,
        namespace: &Namespace,
        key: &str,
    ) -> Result<Option<(BlobMetadata, Vec<u8>)>, StoreError> {
        let tables = self.locked()?;
        Ok(tables.get(namespace.as_str()).and_then(|table| table.get(key).cloned()))
    }

    async fn delete(&self, namespace: &Namespace, key: &str) -> Result<(), StoreError> {
        let mut tables = self.locked()?;
        let Some(table) = tables.get_mut(namespace.as_str()) else {
            return Err(StoreError::NotFound);
        };
        if table.remove(key).is_none() {
            return Err(StoreError::NotFound);
        }
        if table.is_empty() {
            tables.remove(namespace.as_str());
        }
        Ok(())
    }

    async fn list(&self, namespace: &Namespace) -> Result<Vec<BlobMetadata>, StoreError> {
        let tables = self.locked()?;
        let Some(table) = tables.get(namespace.as_str()) else {
            return Ok(Vec::new());
        };
        Ok(table.values().map(|(metadata, _)| metadata.clone()).collect())
    }
}
