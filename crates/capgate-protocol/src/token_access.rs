// crates/capgate-protocol/src/token_access.rs
// ============================================================================
// Module: Token Access Path
// Description: Channel access authorized by a presented token alone.
// Purpose: Serve token holders without an origin grant or principal account.
// Dependencies: capgate-core, capgate-token, async-trait
// ============================================================================

//! ## Overview
//! A delegated-access token is a bearer credential scoped to one channel.
//! Requests on this path present the token in the `X-Channel-Token` header
//! and bypass the per-origin grant store entirely: the token's verified
//! permission bitmap is the whole authority. Every internal failure,
//! malformed text, unknown resource, expired claim, or bad signature,
//! surfaces as one outward `INVALID_TOKEN`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use capgate_core::ChannelEvent;
use capgate_core::ChannelStore;
use capgate_core::ResourceId;
use capgate_core::ResourceSecret;
use capgate_core::StoreError;
use capgate_core::Timestamp;
use capgate_token::AuthorRef;
use capgate_token::ResourceRef;
use capgate_token::SecretResolver;
use capgate_token::TokenClaims;
use capgate_token::TokenCodec;
use capgate_token::TokenError;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying a delegated-access token.
pub const CHANNEL_TOKEN_HEADER: &str = "x-channel-token";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Token-path failures.
///
/// # Invariants
/// - Callers must collapse [`Self::Token`] to a single outward
///   `INVALID_TOKEN`; the inner variant never crosses the wire.
#[derive(Debug, Error)]
pub enum TokenAccessError {
    /// Token failed decoding or verification.
    #[error(transparent)]
    Token(#[from] TokenError),
    /// Token verified but does not carry the needed permission.
    #[error("token permission denied")]
    PermissionDenied,
    /// Presented content exceeded the configured limit.
    #[error("content too large")]
    ContentTooLarge,
    /// Backend failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Secret Resolution
// ============================================================================

/// Resolves token resource references against the channel store.
///
/// # Invariants
/// - Resolution failures read as "no candidates"; decode then fails closed
///   without learning why.
pub struct ChannelSecretResolver {
    /// Channel backend.
    channels: Arc<dyn ChannelStore>,
}

impl ChannelSecretResolver {
    /// Creates a resolver over the given channel backend.
    #[must_use]
    pub fn new(channels: Arc<dyn ChannelStore>) -> Self {
        Self {
            channels,
        }
    }
}

#[async_trait]
impl SecretResolver for ChannelSecretResolver {
    async fn resolve(&self, reference: &ResourceRef) -> Vec<(ResourceId, ResourceSecret)> {
        match reference {
            ResourceRef::Full(id) => match self.channels.secret(*id).await {
                Ok(secret) => vec![(*id, secret)],
                Err(_) => Vec::new(),
            },
            ResourceRef::Truncated(prefix) => {
                self.channels.resolve_truncated(*prefix).await.unwrap_or_default()
            }
        }
    }
}

// ============================================================================
// SECTION: Token Access
// ============================================================================

/// Channel reader/appender driven by a presented token.
pub struct TokenAccess {
    /// Channel backend.
    channels: Arc<dyn ChannelStore>,
    /// Secret resolver backing token decode.
    resolver: ChannelSecretResolver,
    /// Maximum accepted event content length.
    max_content_length: usize,
}

impl TokenAccess {
    /// Creates a token access path over the given channel backend.
    #[must_use]
    pub fn new(channels: Arc<dyn ChannelStore>, max_content_length: usize) -> Self {
        Self {
            resolver: ChannelSecretResolver::new(Arc::clone(&channels)),
            channels,
            max_content_length,
        }
    }

    /// Decodes and verifies a token, returning its claims.
    ///
    /// # Errors
    ///
    /// Returns [`TokenAccessError::Token`] on any decode failure.
    pub async fn verify(&self, token: &str, now: Timestamp) -> Result<TokenClaims, TokenAccessError> {
        Ok(TokenCodec::decode(token, &self.resolver, now).await?)
    }

    /// Reads all events of the channel a read-capable token names.
    ///
    /// # Errors
    ///
    /// Returns [`TokenAccessError::Token`] on decode failure,
    /// [`TokenAccessError::PermissionDenied`] for a write-only token, or
    /// [`TokenAccessError::Store`] on backend failure.
    pub async fn read(
        &self,
        token: &str,
        now: Timestamp,
    ) -> Result<Vec<ChannelEvent>, TokenAccessError> {
        let claims = self.verify(token, now).await?;
        if !claims.permissions.can_read() {
            return Err(TokenAccessError::PermissionDenied);
        }
        Ok(self.channels.read(claims.resource_id).await?)
    }

    /// Appends an event to the channel a write-capable token names.
    ///
    /// The event author is the token's full author id when the format
    /// preserved one; ultra-compact tokens carry only a lossy prefix, so
    /// their appends are recorded authorless.
    ///
    /// # Errors
    ///
    /// Returns [`TokenAccessError::Token`] on decode failure,
    /// [`TokenAccessError::PermissionDenied`] for a read-only token,
    /// [`TokenAccessError::ContentTooLarge`] past the limit, or
    /// [`TokenAccessError::Store`] on backend failure.
    pub async fn append(
        &self,
        token: &str,
        content: &str,
        now: Timestamp,
    ) -> Result<ChannelEvent, TokenAccessError> {
        let claims = self.verify(token, now).await?;
        if !claims.permissions.can_write() {
            return Err(TokenAccessError::PermissionDenied);
        }
        if content.len() > self.max_content_length {
            return Err(TokenAccessError::ContentTooLarge);
        }
        let author_id = match claims.author {
            AuthorRef::Full(id) => Some(id),
            AuthorRef::Truncated(_) => None,
        };
        Ok(self.channels.append(claims.resource_id, author_id, content, now).await?)
    }
}
