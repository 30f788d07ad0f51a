// crates/capgate-providers/src/lib.rs
// ============================================================================
// Module: Capgate Providers Library
// Description: Reference in-memory backends and storage adapters.
// Purpose: Provide ready-made implementations for tests and standalone use.
// Dependencies: capgate-core, async-trait, rand
// ============================================================================

//! ## Overview
//! Reference implementations of every backend and adapter interface in
//! `capgate-core`, held entirely in process memory. They honor the same
//! contracts as durable backends: versioned compare-and-swap grant writes,
//! atomic bidirectional alias binds, and per-channel serialized sequence
//! assignment. Standalone deployments and the test suites use these;
//! production deployments swap in durable backends.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod blob;
pub mod channel;
pub mod kv;
pub mod state;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use blob::MemoryBlobStore;
pub use channel::MemoryChannelStore;
pub use kv::MemoryKvStore;
pub use state::MemoryAliasStore;
pub use state::MemoryGrantStore;
pub use state::MemoryPrincipalStore;

#[cfg(test)]
mod tests;
