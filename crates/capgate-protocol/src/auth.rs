// crates/capgate-protocol/src/auth.rs
// ============================================================================
// Module: Auth Gate
// Description: API key authentication and principal lifecycle.
// Purpose: Authenticate management callers and mint first-class principals.
// Dependencies: capgate-core, rand, subtle, thiserror
// ============================================================================

//! ## Overview
//! The auth gate sits in front of every management operation. Credentials
//! are API keys presented as `ApiKey <key>`; only the SHA-256 fingerprint of
//! a key is ever stored or compared. Internally the gate distinguishes a
//! missing header from an unknown key from a deactivated principal, but the
//! caller-visible outcome is a single generic `UNAUTHORIZED`: which check
//! failed is an enumeration oracle and never crosses the wire.
//!
//! Bootstrap: a deployment-configured secret may authenticate while the
//! principal table is empty, and authorizes exactly one thing, creating the
//! first principal. The moment any principal exists the bootstrap secret is
//! dead, even if that principal is later deactivated.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use capgate_core::Principal;
use capgate_core::PrincipalId;
use capgate_core::PrincipalKind;
use capgate_core::PrincipalStore;
use capgate_core::StoreError;
use capgate_core::Timestamp;
use capgate_core::core::identifiers::PRINCIPAL_ID_BYTES;
use capgate_core::crypto;
use rand::RngCore;
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Authentication scheme label expected in the credential header.
pub const API_KEY_SCHEME: &str = "ApiKey";
/// Prefix of every gateway-issued API key.
pub const API_KEY_PREFIX: &str = "ak_";
/// Random bytes behind a generated API key.
const API_KEY_SECRET_BYTES: usize = 32;
/// Maximum accepted credential header length.
const MAX_AUTH_HEADER_LENGTH: usize = 512;
/// Maximum accepted display name length.
const MAX_DISPLAY_NAME_LENGTH: usize = 128;
/// Registration retries when a freshly generated id collides.
const MAX_REGISTER_RETRIES: usize = 8;

/// The single outward message for every authentication failure.
pub const UNAUTHORIZED_MESSAGE: &str = "unauthorized";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Authentication and principal lifecycle failures.
///
/// # Invariants
/// - Variants are internal diagnostics only; callers must collapse every
///   authentication variant to one generic unauthorized response.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Credential header missing, malformed, or oversized.
    #[error("credential header invalid")]
    Header,
    /// No principal matches the presented key.
    #[error("credential unknown")]
    UnknownCredential,
    /// The matching principal is deactivated.
    #[error("principal inactive")]
    Inactive,
    /// Bootstrap secret presented after the first principal exists, or no
    /// bootstrap secret is configured.
    #[error("bootstrap unavailable")]
    BootstrapUnavailable,
    /// Display name failed validation.
    #[error("display name invalid")]
    DisplayName,
    /// Id generation kept colliding with existing principals.
    #[error("principal id generation exhausted")]
    IdExhausted,
    /// Backend failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Returns a stable label for telemetry and audit logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::UnknownCredential => "unknown_credential",
            Self::Inactive => "inactive",
            Self::BootstrapUnavailable => "bootstrap_unavailable",
            Self::DisplayName => "display_name",
            Self::IdExhausted => "id_exhausted",
            Self::Store(_) => "store",
        }
    }
}

// ============================================================================
// SECTION: Identity
// ============================================================================

/// The authenticated caller behind a management request.
#[derive(Debug, Clone)]
pub enum AuthIdentity {
    /// Bootstrap secret holder; authorized only to create the first
    /// principal.
    Bootstrap,
    /// A stored, active principal.
    Principal(Principal),
}

// ============================================================================
// SECTION: Auth Gate
// ============================================================================

/// Credential verifier and principal registrar.
///
/// # Invariants
/// - Raw API keys exist only transiently; storage and comparison use
///   SHA-256 fingerprints exclusively.
/// - Fingerprint comparisons on the bootstrap path are constant-time.
pub struct AuthGate {
    /// Principal backend.
    principals: Arc<dyn PrincipalStore>,
    /// Fingerprint of the configured bootstrap secret, if any.
    bootstrap_fingerprint: Option<String>,
}

impl AuthGate {
    /// Creates an auth gate over the given principal backend.
    ///
    /// The bootstrap secret is fingerprinted immediately and the raw value
    /// dropped.
    #[must_use]
    pub fn new(principals: Arc<dyn PrincipalStore>, bootstrap_secret: Option<&str>) -> Self {
        Self {
            principals,
            bootstrap_fingerprint: bootstrap_secret
                .map(|secret| crypto::fingerprint(secret.as_bytes())),
        }
    }

    /// Authenticates a credential header value.
    ///
    /// The header must be exactly `ApiKey <key>`. The key is fingerprinted
    /// and looked up; an unknown fingerprint falls through to the bootstrap
    /// path, which accepts only while zero principals exist.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] describing the internal failure; callers must
    /// collapse it to [`UNAUTHORIZED_MESSAGE`] before it crosses the wire.
    pub async fn authenticate(&self, header: &str) -> Result<AuthIdentity, AuthError> {
        let key = parse_api_key_header(header).ok_or(AuthError::Header)?;
        let presented = crypto::fingerprint(key.as_bytes());
        if let Some(principal) = self.principals.find_by_fingerprint(&presented).await? {
            if !principal.active {
                return Err(AuthError::Inactive);
            }
            return Ok(AuthIdentity::Principal(principal));
        }
        self.authenticate_bootstrap(&presented).await
    }

    /// Verifies the bootstrap fingerprint while the principal table is empty.
    async fn authenticate_bootstrap(&self, presented: &str) -> Result<AuthIdentity, AuthError> {
        let Some(expected) = &self.bootstrap_fingerprint else {
            return Err(AuthError::UnknownCredential);
        };
        // Both sides are fixed-length hex digests; compare without early exit.
        let matches: bool = expected.as_bytes().ct_eq(presented.as_bytes()).into();
        if !matches {
            return Err(AuthError::UnknownCredential);
        }
        if self.principals.count().await? > 0 {
            return Err(AuthError::BootstrapUnavailable);
        }
        Ok(AuthIdentity::Bootstrap)
    }

    /// Registers a new principal and returns it with the raw API key.
    ///
    /// The raw key is shown exactly once; only its fingerprint is stored.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::DisplayName`] on an invalid name,
    /// [`AuthError::IdExhausted`] when id generation keeps colliding, or
    /// [`AuthError::Store`] on backend failure.
    pub async fn register(
        &self,
        display_name: &str,
        kind: PrincipalKind,
        now: Timestamp,
    ) -> Result<(Principal, String), AuthError> {
        if !is_valid_display_name(display_name) {
            return Err(AuthError::DisplayName);
        }
        for _ in 0..MAX_REGISTER_RETRIES {
            let raw_key = generate_api_key();
            let principal = Principal {
                id: generate_principal_id(),
                secret_hash: crypto::fingerprint(raw_key.as_bytes()),
                display_name: display_name.to_string(),
                kind,
                active: true,
                created_at: now,
            };
            if self.principals.insert(&principal).await? {
                return Ok((principal, raw_key));
            }
        }
        Err(AuthError::IdExhausted)
    }

    /// Logically deactivates a principal; the record stays on file.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] wrapping [`StoreError::NotFound`] when
    /// the principal does not exist.
    pub async fn deactivate(&self, id: PrincipalId) -> Result<(), AuthError> {
        Ok(self.principals.set_active(id, false).await?)
    }

    /// Physically deletes a principal record at its own request.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] wrapping [`StoreError::NotFound`] when
    /// the principal does not exist.
    pub async fn remove(&self, id: PrincipalId) -> Result<(), AuthError> {
        Ok(self.principals.remove(id).await?)
    }
}

// ============================================================================
// SECTION: Header Parsing
// ============================================================================

/// Parses a strict `ApiKey <key>` header value.
///
/// Exactly one space, a nonempty key of printable ASCII, no surrounding
/// whitespace. Anything else is rejected.
#[must_use]
pub fn parse_api_key_header(header: &str) -> Option<&str> {
    if header.len() > MAX_AUTH_HEADER_LENGTH {
        return None;
    }
    let key = header.strip_prefix(API_KEY_SCHEME)?.strip_prefix(' ')?;
    if key.is_empty() {
        return None;
    }
    if key.chars().any(|ch| !ch.is_ascii() || ch.is_ascii_whitespace() || ch.is_control()) {
        return None;
    }
    Some(key)
}

/// Validates a display name: nonempty, bounded, no control characters.
fn is_valid_display_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_DISPLAY_NAME_LENGTH
        && !name.chars().any(char::is_control)
        && name.trim() == name
}

// ============================================================================
// SECTION: Generation
// ============================================================================

/// Generates a fresh raw API key.
fn generate_api_key() -> String {
    let mut bytes = [0u8; API_KEY_SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let mut key = String::with_capacity(API_KEY_PREFIX.len() + API_KEY_SECRET_BYTES * 2);
    key.push_str(API_KEY_PREFIX);
    key.push_str(&crypto::hex_encode(&bytes));
    key
}

/// Generates a fresh principal id.
fn generate_principal_id() -> PrincipalId {
    let mut bytes = [0u8; PRINCIPAL_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    PrincipalId::from_bytes(bytes)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
