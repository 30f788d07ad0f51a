// crates/capgate-protocol/src/config.rs
// ============================================================================
// Module: Gateway Configuration
// Description: Validated TOML configuration for the protocol gateway.
// Purpose: Load deployment settings with fail-closed validation.
// Dependencies: serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from TOML and validated before any component is
//! built; a gateway never runs with a config it could not fully validate.
//! Unknown fields are rejected so a typo cannot silently disable a limit.
//! Every limit has a conservative default; defaults are safe for a small
//! deployment and are meant to be raised deliberately.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Protocol version spoken by this gateway.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Default storage adapter time budget in milliseconds.
const DEFAULT_STORAGE_TIMEOUT_MS: u64 = 5_000;
/// Maximum accepted storage timeout in milliseconds.
const MAX_STORAGE_TIMEOUT_MS: u64 = 60_000;
/// Minimum accepted storage timeout in milliseconds.
const MIN_STORAGE_TIMEOUT_MS: u64 = 100;

/// Default delegated-token lifetime in seconds (one day).
const DEFAULT_TOKEN_TTL_SECONDS: i64 = 86_400;
/// Maximum delegated-token lifetime in seconds (thirty days).
const MAX_TOKEN_TTL_SECONDS: i64 = 2_592_000;

/// Minimum length of a configured bootstrap secret.
const MIN_BOOTSTRAP_SECRET_LENGTH: usize = 16;

/// Default maximum inbound message size in bytes.
const DEFAULT_MAX_MESSAGE_BYTES: usize = 262_144;
/// Default maximum key length in characters.
const DEFAULT_MAX_KEY_LENGTH: usize = 256;
/// Default maximum serialized value size in bytes.
const DEFAULT_MAX_VALUE_BYTES: usize = 65_536;
/// Default maximum decoded blob size in bytes.
const DEFAULT_MAX_BLOB_BYTES: usize = 10_485_760;
/// Default maximum channel event content length in characters.
const DEFAULT_MAX_CONTENT_LENGTH: usize = 16_384;
/// Default maximum channel name length in characters.
const DEFAULT_MAX_CHANNEL_NAME_LENGTH: usize = 128;
/// Default maximum capability labels per negotiation request.
const DEFAULT_MAX_CAPABILITIES_PER_REQUEST: usize = 16;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading and validation failures.
///
/// # Invariants
/// - Messages name the offending field, never secret values.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("config parse failure: {0}")]
    Parse(String),
    /// A field failed validation.
    #[error("config invalid: {0}")]
    Invalid(&'static str),
}

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Input size limits enforced by the router.
///
/// # Invariants
/// - All limits are nonzero after validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayLimits {
    /// Maximum inbound message size in bytes.
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
    /// Maximum key length in characters.
    #[serde(default = "default_max_key_length")]
    pub max_key_length: usize,
    /// Maximum serialized value size in bytes.
    #[serde(default = "default_max_value_bytes")]
    pub max_value_bytes: usize,
    /// Maximum decoded blob size in bytes.
    #[serde(default = "default_max_blob_bytes")]
    pub max_blob_bytes: usize,
    /// Maximum channel event content length in characters.
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,
    /// Maximum channel name length in characters.
    #[serde(default = "default_max_channel_name_length")]
    pub max_channel_name_length: usize,
    /// Maximum capability labels per negotiation request.
    #[serde(default = "default_max_capabilities_per_request")]
    pub max_capabilities_per_request: usize,
}

impl Default for GatewayLimits {
    fn default() -> Self {
        Self {
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            max_key_length: DEFAULT_MAX_KEY_LENGTH,
            max_value_bytes: DEFAULT_MAX_VALUE_BYTES,
            max_blob_bytes: DEFAULT_MAX_BLOB_BYTES,
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            max_channel_name_length: DEFAULT_MAX_CHANNEL_NAME_LENGTH,
            max_capabilities_per_request: DEFAULT_MAX_CAPABILITIES_PER_REQUEST,
        }
    }
}

impl GatewayLimits {
    /// Validates every limit.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first zero limit.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_message_bytes == 0 {
            return Err(ConfigError::Invalid("limits.max_message_bytes must be nonzero"));
        }
        if self.max_key_length == 0 {
            return Err(ConfigError::Invalid("limits.max_key_length must be nonzero"));
        }
        if self.max_value_bytes == 0 {
            return Err(ConfigError::Invalid("limits.max_value_bytes must be nonzero"));
        }
        if self.max_blob_bytes == 0 {
            return Err(ConfigError::Invalid("limits.max_blob_bytes must be nonzero"));
        }
        if self.max_content_length == 0 {
            return Err(ConfigError::Invalid("limits.max_content_length must be nonzero"));
        }
        if self.max_channel_name_length == 0 {
            return Err(ConfigError::Invalid("limits.max_channel_name_length must be nonzero"));
        }
        if self.max_capabilities_per_request == 0 {
            return Err(ConfigError::Invalid("limits.max_capabilities_per_request must be nonzero"));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Validated gateway configuration.
///
/// # Invariants
/// - A constructed value has passed [`Self::validate`]; components never
///   re-check config invariants at use sites.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Base URL of the out-of-band capability approval page.
    #[serde(default = "default_approval_url_base")]
    pub approval_url_base: String,
    /// Base URL under which public blobs are served by alias.
    #[serde(default = "default_public_url_base")]
    pub public_url_base: String,
    /// Storage adapter time budget in milliseconds.
    #[serde(default = "default_storage_timeout_ms")]
    pub storage_timeout_ms: u64,
    /// Default delegated-token lifetime in seconds.
    #[serde(default = "default_token_ttl_seconds")]
    pub default_token_ttl_seconds: i64,
    /// Bootstrap secret enabling first-principal creation; `None` disables
    /// the bootstrap path entirely.
    #[serde(default)]
    pub bootstrap_secret: Option<String>,
    /// Input size limits.
    #[serde(default)]
    pub limits: GatewayLimits,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            approval_url_base: default_approval_url_base(),
            public_url_base: default_public_url_base(),
            storage_timeout_ms: DEFAULT_STORAGE_TIMEOUT_MS,
            default_token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            bootstrap_secret: None,
            limits: GatewayLimits::default(),
        }
    }
}

impl GatewayConfig {
    /// Parses and validates a TOML configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML and
    /// [`ConfigError::Invalid`] on the first failed validation.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every field.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url_base(&self.approval_url_base, "approval_url_base must be an http(s) URL")?;
        validate_url_base(&self.public_url_base, "public_url_base must be an http(s) URL")?;
        if !(MIN_STORAGE_TIMEOUT_MS..=MAX_STORAGE_TIMEOUT_MS).contains(&self.storage_timeout_ms) {
            return Err(ConfigError::Invalid("storage_timeout_ms out of range"));
        }
        if !(1..=MAX_TOKEN_TTL_SECONDS).contains(&self.default_token_ttl_seconds) {
            return Err(ConfigError::Invalid("default_token_ttl_seconds out of range"));
        }
        if let Some(secret) = &self.bootstrap_secret
            && secret.len() < MIN_BOOTSTRAP_SECRET_LENGTH
        {
            return Err(ConfigError::Invalid("bootstrap_secret too short"));
        }
        self.limits.validate()?;
        Ok(())
    }

    /// Maximum delegated-token lifetime accepted from a request.
    #[must_use]
    pub const fn max_token_ttl_seconds(&self) -> i64 {
        MAX_TOKEN_TTL_SECONDS
    }

    /// Returns true when a client protocol version is compatible.
    ///
    /// Compatibility is major-version equality; minor versions may differ.
    #[must_use]
    pub fn supports_version(&self, client_version: &str) -> bool {
        match (parse_major(PROTOCOL_VERSION), parse_major(client_version)) {
            (Some(server), Some(client)) => server == client,
            _ => false,
        }
    }
}

/// Validates a URL base field without pulling in a URL parser.
fn validate_url_base(value: &str, message: &'static str) -> Result<(), ConfigError> {
    let scheme_ok = value.starts_with("https://") || value.starts_with("http://");
    if !scheme_ok || value.chars().any(|ch| ch.is_whitespace() || ch.is_control()) {
        return Err(ConfigError::Invalid(message));
    }
    Ok(())
}

/// Parses the major component of a dotted version string.
fn parse_major(version: &str) -> Option<u64> {
    version.split('.').next().and_then(|major| major.parse::<u64>().ok())
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default approval page base URL for local deployments.
fn default_approval_url_base() -> String {
    "http://localhost:8787/approve".to_string()
}

/// Default public blob base URL for local deployments.
fn default_public_url_base() -> String {
    "http://localhost:8787/b".to_string()
}

/// Default storage timeout.
const fn default_storage_timeout_ms() -> u64 {
    DEFAULT_STORAGE_TIMEOUT_MS
}

/// Default token lifetime.
const fn default_token_ttl_seconds() -> i64 {
    DEFAULT_TOKEN_TTL_SECONDS
}

/// Default maximum message size.
const fn default_max_message_bytes() -> usize {
    DEFAULT_MAX_MESSAGE_BYTES
}

/// Default maximum key length.
const fn default_max_key_length() -> usize {
    DEFAULT_MAX_KEY_LENGTH
}

/// Default maximum value size.
const fn default_max_value_bytes() -> usize {
    DEFAULT_MAX_VALUE_BYTES
}

/// Default maximum blob size.
const fn default_max_blob_bytes() -> usize {
    DEFAULT_MAX_BLOB_BYTES
}

/// Default maximum content length.
const fn default_max_content_length() -> usize {
    DEFAULT_MAX_CONTENT_LENGTH
}

/// Default maximum channel name length.
const fn default_max_channel_name_length() -> usize {
    DEFAULT_MAX_CHANNEL_NAME_LENGTH
}

/// Default maximum capability labels per request.
const fn default_max_capabilities_per_request() -> usize {
    DEFAULT_MAX_CAPABILITIES_PER_REQUEST
}

// ============================================================================
// SECTION: Tests
// ============================================================================
