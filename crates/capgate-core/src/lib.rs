// crates/capgate-core/src/lib.rs
// ============================================================================
// Module: Capgate Core Library
// Description: Core data model, crypto primitives, and trust-boundary logic.
// Purpose: Provide the backend-agnostic heart of the capability gateway.
// Dependencies: serde, sha2, hmac, subtle, thiserror
// ============================================================================

//! ## Overview
//! Capgate Core defines the data model and security logic shared by every
//! gateway deployment: origin identity, deterministic namespace isolation,
//! the capability vocabulary and grant store, principal records, and the
//! crypto primitives (SHA-256 fingerprints, HMAC-SHA256 with constant-time
//! verification) the token codec builds on.
//!
//! Invariants:
//! - Namespace derivation is deterministic and collision-resistant.
//! - Capability grants are monotonic unions; expired grants read as absent.
//! - Backends are reached only through the interfaces in [`interfaces`].
//!
//! Security posture: every input crossing these types is untrusted; all
//! validation is fail-closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::capability::CAPABILITY_VOCABULARY;
pub use core::capability::Capability;
pub use core::capability::CapabilityParseError;
pub use core::capability::CapabilitySet;
pub use core::crypto;
pub use core::crypto::CryptoError;
pub use core::crypto::ResourceSecret;
pub use core::grants::CapabilityStore;
pub use core::grants::GrantError;
pub use core::grants::GrantRecord;
pub use core::identifiers::Alias;
pub use core::identifiers::IdentifierError;
pub use core::identifiers::Namespace;
pub use core::identifiers::Origin;
pub use core::identifiers::PrincipalId;
pub use core::identifiers::ResourceId;
pub use core::namespace::NamespaceIsolator;
pub use core::namespace::NamespaceIsolatorError;
pub use core::namespace::derive_namespace;
pub use core::principal::Principal;
pub use core::principal::PrincipalKind;
pub use core::records::BlobMetadata;
pub use core::records::BlobVisibility;
pub use core::records::ChannelEvent;
pub use core::time::Timestamp;
pub use interfaces::AliasBinding;
pub use interfaces::AliasStore;
pub use interfaces::BlobStore;
pub use interfaces::ChannelRecord;
pub use interfaces::ChannelStore;
pub use interfaces::GrantStore;
pub use interfaces::KvStore;
pub use interfaces::PrincipalStore;
pub use interfaces::StoreError;
pub use interfaces::VersionedGrant;
