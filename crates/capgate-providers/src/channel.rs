// crates/capgate-providers/src/channel.rs
// ============================================================================
// Module: Memory Channel Adapter
// Description: In-memory append-only channel log adapter.
// Purpose: Reference ChannelStore implementation with serialized sequencing.
// Dependencies: capgate-core, async-trait, rand
// ============================================================================

//! ## Overview
//! Channels, their signing secrets, and their event logs live under one
//! mutex. Sequence assignment happens inside the locked append, so
//! concurrent appends on the same channel always observe distinct,
//! gap-free, strictly increasing sequence numbers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use capgate_core::ChannelEvent;
use capgate_core::ChannelRecord;
use capgate_core::ChannelStore;
use capgate_core::Namespace;
use capgate_core::PrincipalId;
use capgate_core::ResourceId;
use capgate_core::ResourceSecret;
use capgate_core::StoreError;
use capgate_core::Timestamp;
use capgate_core::core::crypto::RESOURCE_SECRET_BYTES;
use capgate_core::core::identifiers::RESOURCE_ID_BYTES;
use capgate_core::core::identifiers::RESOURCE_ID_TRUNCATED_BYTES;
use rand::RngCore;
use rand::rngs::OsRng;

// ============================================================================
// SECTION: Channel State
// ============================================================================

/// Full in-memory state of one channel.
struct ChannelState {
    /// Channel record handed to callers.
    record: ChannelRecord,
    /// Per-resource signing secret.
    secret: ResourceSecret,
    /// Next sequence number to assign (1-based).
    next_seq: u64,
    /// Event log in sequence order.
    events: Vec<ChannelEvent>,
}

// ============================================================================
// SECTION: Adapter
// ============================================================================

/// In-memory append-only channel store.
///
/// # Invariants
/// - Sequence assignment happens under the store lock; `seq` is strictly
///   increasing per channel with no gaps, starting at 1.
#[derive(Default)]
pub struct MemoryChannelStore {
    /// Channels keyed by resource id.
    channels: Mutex<BTreeMap<ResourceId, ChannelState>>,
}

impl MemoryChannelStore {
    /// Creates an empty channel store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the channel table, converting poisoning into a backend error.
    fn locked(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<ResourceId, ChannelState>>, StoreError> {
        self.channels
            .lock()
            .map_err(|_| StoreError::Backend("channel lock poisoned".to_string()))
    }
}

#[async_trait]
impl ChannelStore for MemoryChannelStore {
    async fn create(
        &self,
        namespace: &Namespace,
        name: &str,
        now: Timestamp,
    ) -> Result<ChannelRecord, StoreError> {
        let mut channels = self.locked()?;
        let mut id_bytes = [0u8; RESOURCE_ID_BYTES];
        // Fresh ids collide only against live channels; regenerate on hit.
        let id = loop {
            OsRng.fill_bytes(&mut id_bytes);
            let candidate = ResourceId::from_bytes(id_bytes);
            if !channels.contains_key(&candidate) {
                break candidate;
            }
        };
        let mut secret_bytes = [0u8; RESOURCE_SECRET_BYTES];
        OsRng.fill_bytes(&mut secret_bytes);
        let record = ChannelRecord {
            id,
            namespace: namespace.clone(),
            name: name.to_string(),
            created_at: now,
        };
        channels.insert(
            id,
            ChannelState {
                record: record.clone(),
                secret: ResourceSecret::from_bytes(secret_bytes),
                next_seq: 1,
                events: Vec::new(),
            },
        );
        Ok(record)
    }

    async fn lookup(&self, id: ResourceId) -> Result<Option<ChannelRecord>, StoreError> {
        let channels = self.locked()?;
        Ok(channels.get(&id).map(|state| state.record.clone()))
    }

    async fn append(
        &self,
        id: ResourceId,
        author_id: Option<PrincipalId>,
        content: &str,
        now: Timestamp,
    ) -> Result<ChannelEvent, StoreError> {
        let mut channels = self.locked()?;
        let Some(state) = channels.get_mut(&id) else {
            return Err(StoreError::NotFound);
        };
        let seq = state.next_seq;
        state.next_seq += 1;
        let event = ChannelEvent {
            id: seq,
            seq,
            author_id,
            content: content.to_string(),
            created_at: now,
        };
        state.events.push(event.clone());
        Ok(event)
    }

    async fn read(&self, id: ResourceId) -> Result<Vec<ChannelEvent>, StoreError> {
        let channels = self.locked()?;
        let Some(state) = channels.get(&id) else {
            return Err(StoreError::NotFound);
        };
        Ok(state.events.clone())
    }

    async fn delete(&self, id: ResourceId) -> Result<(), StoreError> {
        let mut channels = self.locked()?;
        if channels.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn secret(&self, id: ResourceId) -> Result<ResourceSecret, StoreError> {
        let channels = self.locked()?;
        let Some(state) = channels.get(&id) else {
            return Err(StoreError::NotFound);
        };
        Ok(state.secret.clone())
    }

    async fn resolve_truncated(
        &self,
        prefix: [u8; RESOURCE_ID_TRUNCATED_BYTES],
    ) -> Result<Vec<(ResourceId, ResourceSecret)>, StoreError> {
        let channels = self.locked()?;
        Ok(channels
            .iter()
            .filter(|(id, _)| id.truncated() == prefix)
            .map(|(id, state)| (*id, state.secret.clone()))
            .collect())
    }
}
