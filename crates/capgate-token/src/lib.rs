// crates/capgate-token/src/lib.rs
// ============================================================================
// Module: Capgate Token Library
// Description: Compact signed capability-token codec in three wire formats.
// Purpose: Issue and verify delegated, time-limited, per-resource tokens.
// Dependencies: capgate-core, base64, serde, serde_jcs, thiserror
// ============================================================================

//! ## Overview
//! Delegated-access tokens let a caller use one resource without an account.
//! Three wire formats share one design principle: version byte first,
//! signature last, sign everything in between. Every format is HMAC-SHA256
//! signed against a secret scoped to the specific resource, and verification
//! compares tags in constant time.
//!
//! Invariants:
//! - Decode dispatches on the first decoded byte and fails closed on any
//!   length, version, expiry, or signature problem.
//! - An expired token is invalid even with a perfect signature.
//! - V3 truncates resource and author ids; the signature, computed against
//!   the full resource secret, is the actual authority.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod claims;
pub mod codec;
pub mod secret;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use claims::AuthorRef;
pub use claims::TokenClaims;
pub use claims::TokenPermissions;
pub use codec::TokenCodec;
pub use codec::TokenError;
pub use codec::TokenVersion;
pub use secret::ResourceRef;
pub use secret::SecretResolver;
