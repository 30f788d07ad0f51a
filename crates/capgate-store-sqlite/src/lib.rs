// crates/capgate-store-sqlite/src/lib.rs
// ============================================================================
// Module: Capgate SQLite Store Library
// Description: Durable SQLite backends for gateway state.
// Purpose: Persist grants, principals, and aliases with atomic writes.
// Dependencies: capgate-core, rusqlite, serde_json
// ============================================================================

//! ## Overview
//! Durable implementations of the gateway's state backends on `SQLite`.
//! Grant writes are versioned compare-and-swap snapshot replacements inside
//! a transaction, so a crash mid-write leaves the prior record intact. Alias
//! binds cover both mapping directions in one transaction.
//! Security posture: database contents are untrusted on load and validated
//! before use.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteStateStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
