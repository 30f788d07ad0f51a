// crates/capgate-protocol/src/messages.rs
// ============================================================================
// Module: Protocol Messages
// Description: Tagged request/response envelopes for the gateway protocol.
// Purpose: Define the stable wire vocabulary between web clients and gateway.
// Dependencies: capgate-core, serde, serde_json
// ============================================================================

//! ## Overview
//! Every message is a JSON object tagged by a `type` field in screaming
//! snake case. Requests carry a caller-chosen `id` that the matching
//! response echoes; errors echo the `id` when one could be recovered from
//! the malformed input and omit it otherwise. Error codes are a closed,
//! stable vocabulary: clients dispatch on the code, never on the message
//! text.

// ============================================================================
// SECTION: Imports
// ============================================================================

use capgate_core::BlobMetadata;
use capgate_core::BlobVisibility;
use capgate_core::Capability;
use capgate_core::ChannelEvent;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Error Codes
// ============================================================================

/// Stable outward error code vocabulary.
///
/// # Invariants
/// - Wire labels are stable; clients dispatch on them programmatically.
/// - Every authentication failure collapses to [`Self::Unauthorized`] and
///   every token failure to [`Self::InvalidToken`]; the distinction between
///   internal failure reasons never crosses the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Message failed to parse or validate.
    InvalidMessage,
    /// Operation sent before the handshake completed.
    NotReady,
    /// Client protocol version is incompatible.
    UnsupportedVersion,
    /// Credential missing, unknown, or unusable.
    Unauthorized,
    /// Presented token failed verification.
    InvalidToken,
    /// Referenced resource does not exist in the caller's namespace.
    NotFound,
    /// Storage adapter exceeded its time budget.
    Timeout,
    /// Internal failure; no details cross the wire.
    Internal,
}

impl ErrorCode {
    /// Returns the stable wire label for this code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidMessage => "INVALID_MESSAGE",
            Self::NotReady => "NOT_READY",
            Self::UnsupportedVersion => "UNSUPPORTED_VERSION",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::NotFound => "NOT_FOUND",
            Self::Timeout => "TIMEOUT",
            Self::Internal => "INTERNAL",
        }
    }
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Inbound protocol message from a web client.
///
/// # Invariants
/// - Wire tags are stable screaming-snake-case labels.
/// - `id` is untrusted input and must be sanitized before echoing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestMessage {
    /// Handshake open.
    Syn {
        /// Caller-chosen correlation id.
        id: String,
        /// Client protocol version.
        version: String,
    },
    /// Capability negotiation.
    RequestCapabilities {
        /// Caller-chosen correlation id.
        id: String,
        /// Requested capability labels.
        capabilities: Vec<String>,
    },
    /// Read one key.
    KvGet {
        /// Caller-chosen correlation id.
        id: String,
        /// Key within the caller's namespace.
        key: String,
    },
    /// Write one key.
    KvSet {
        /// Caller-chosen correlation id.
        id: String,
        /// Key within the caller's namespace.
        key: String,
        /// Value to store.
        value: Value,
    },
    /// Delete one key.
    KvDelete {
        /// Caller-chosen correlation id.
        id: String,
        /// Key within the caller's namespace.
        key: String,
    },
    /// List keys, optionally by prefix.
    KvKeys {
        /// Caller-chosen correlation id.
        id: String,
        /// Optional key prefix filter.
        #[serde(default)]
        prefix: Option<String>,
    },
    /// Upload a blob.
    BlobUpload {
        /// Caller-chosen correlation id.
        id: String,
        /// Blob key within the caller's namespace.
        key: String,
        /// Declared content type.
        content_type: String,
        /// Standard-base64 blob content.
        data: String,
        /// Visibility policy; private when omitted.
        #[serde(default)]
        visibility: Option<BlobVisibility>,
    },
    /// Read a blob.
    BlobGet {
        /// Caller-chosen correlation id.
        id: String,
        /// Blob key within the caller's namespace.
        key: String,
    },
    /// Delete a blob.
    BlobDelete {
        /// Caller-chosen correlation id.
        id: String,
        /// Blob key within the caller's namespace.
        key: String,
    },
    /// List blob metadata.
    BlobList {
        /// Caller-chosen correlation id.
        id: String,
    },
    /// Create a channel.
    ChannelCreate {
        /// Caller-chosen correlation id.
        id: String,
        /// Human-readable channel name.
        name: String,
    },
    /// Append an event to a channel.
    ChannelAppend {
        /// Caller-chosen correlation id.
        id: String,
        /// Target channel id in hex.
        channel_id: String,
        /// Event content.
        content: String,
    },
    /// Read all events of a channel.
    ChannelRead {
        /// Caller-chosen correlation id.
        id: String,
        /// Target channel id in hex.
        channel_id: String,
    },
    /// Delete a channel.
    ChannelDelete {
        /// Caller-chosen correlation id.
        id: String,
        /// Target channel id in hex.
        channel_id: String,
    },
    /// Issue a delegated-access token for a channel.
    ChannelTokenCreate {
        /// Caller-chosen correlation id.
        id: String,
        /// Target channel id in hex.
        channel_id: String,
        /// Requested permission labels (`read`, `write`).
        permissions: Vec<String>,
        /// Token lifetime in seconds; gateway default when omitted.
        #[serde(default)]
        expires_in: Option<i64>,
    },
}

impl RequestMessage {
    /// Returns the caller-chosen correlation id.
    #[must_use]
    pub fn request_id(&self) -> &str {
        match self {
            Self::Syn {
                id, ..
            }
            | Self::RequestCapabilities {
                id, ..
            }
            | Self::KvGet {
                id, ..
            }
            | Self::KvSet {
                id, ..
            }
            | Self::KvDelete {
                id, ..
            }
            | Self::KvKeys {
                id, ..
            }
            | Self::BlobUpload {
                id, ..
            }
            | Self::BlobGet {
                id, ..
            }
            | Self::BlobDelete {
                id, ..
            }
            | Self::BlobList {
                id,
            }
            | Self::ChannelCreate {
                id, ..
            }
            | Self::ChannelAppend {
                id, ..
            }
            | Self::ChannelRead {
                id, ..
            }
            | Self::ChannelDelete {
                id, ..
            }
            | Self::ChannelTokenCreate {
                id, ..
            } => id,
        }
    }

    /// Returns a stable label for the message kind, for telemetry.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Syn {
                ..
            } => "SYN",
            Self::RequestCapabilities {
                ..
            } => "REQUEST_CAPABILITIES",
            Self::KvGet {
                ..
            } => "KV_GET",
            Self::KvSet {
                ..
            } => "KV_SET",
            Self::KvDelete {
                ..
            } => "KV_DELETE",
            Self::KvKeys {
                ..
            } => "KV_KEYS",
            Self::BlobUpload {
                ..
            } => "BLOB_UPLOAD",
            Self::BlobGet {
                ..
            } => "BLOB_GET",
            Self::BlobDelete {
                ..
            } => "BLOB_DELETE",
            Self::BlobList {
                ..
            } => "BLOB_LIST",
            Self::ChannelCreate {
                ..
            } => "CHANNEL_CREATE",
            Self::ChannelAppend {
                ..
            } => "CHANNEL_APPEND",
            Self::ChannelRead {
                ..
            } => "CHANNEL_READ",
            Self::ChannelDelete {
                ..
            } => "CHANNEL_DELETE",
            Self::ChannelTokenCreate {
                ..
            } => "CHANNEL_TOKEN_CREATE",
        }
    }

    /// Returns the capability gating this message, if it is a storage
    /// operation. Handshake and negotiation messages are ungated.
    #[must_use]
    pub const fn required_capability(&self) -> Option<Capability> {
        match self {
            Self::Syn {
                ..
            }
            | Self::RequestCapabilities {
                ..
            } => None,
            Self::KvGet {
                ..
            }
            | Self::KvKeys {
                ..
            } => Some(Capability::KvRead),
            Self::KvSet {
                ..
            }
            | Self::KvDelete {
                ..
            } => Some(Capability::KvWrite),
            Self::BlobGet {
                ..
            }
            | Self::BlobList {
                ..
            } => Some(Capability::BlobRead),
            Self::BlobUpload {
                ..
            }
            | Self::BlobDelete {
                ..
            } => Some(Capability::BlobWrite),
            Self::ChannelCreate {
                ..
            }
            | Self::ChannelTokenCreate {
                ..
            } => Some(Capability::ChannelCreate),
            Self::ChannelAppend {
                ..
            } => Some(Capability::ChannelAppend),
            Self::ChannelRead {
                ..
            } => Some(Capability::ChannelRead),
            Self::ChannelDelete {
                ..
            } => Some(Capability::ChannelDelete),
        }
    }
}

// ============================================================================
// SECTION: Responses
// ============================================================================

/// Outbound protocol message to a web client.
///
/// # Invariants
/// - Wire tags are stable screaming-snake-case labels.
/// - Every response except [`Self::Error`] echoes the request `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseMessage {
    /// Handshake accept.
    Ack {
        /// Echoed correlation id.
        id: String,
        /// Gateway protocol version.
        version: String,
        /// Capability labels currently granted to the origin.
        capabilities: Vec<String>,
    },
    /// All requested capabilities were already granted.
    CapabilitiesGranted {
        /// Echoed correlation id.
        id: String,
        /// Granted capability labels.
        granted: Vec<String>,
    },
    /// Some requested capabilities need out-of-band approval.
    AuthRequired {
        /// Echoed correlation id.
        id: String,
        /// Capability labels already granted.
        granted: Vec<String>,
        /// URL where the missing capabilities can be approved.
        approval_url: String,
    },
    /// The origin lacks the capability gating the operation.
    PermissionDenied {
        /// Echoed correlation id.
        id: String,
        /// Label of the missing capability.
        capability: String,
    },
    /// Key-value read result.
    KvResult {
        /// Echoed correlation id.
        id: String,
        /// Stored value; `null` when the key is absent.
        value: Option<Value>,
    },
    /// Key-value write or delete acknowledgment.
    KvOk {
        /// Echoed correlation id.
        id: String,
    },
    /// Key listing result.
    KvKeysResult {
        /// Echoed correlation id.
        id: String,
        /// Matching keys in stable order.
        keys: Vec<String>,
    },
    /// Blob upload acknowledgment.
    BlobUploaded {
        /// Echoed correlation id.
        id: String,
        /// Metadata of the stored blob.
        metadata: BlobMetadata,
        /// Compact public URL for public blobs; absent otherwise.
        url: Option<String>,
    },
    /// Blob read result.
    BlobContent {
        /// Echoed correlation id.
        id: String,
        /// Metadata of the blob.
        metadata: BlobMetadata,
        /// Standard-base64 blob content.
        data: String,
    },
    /// Blob delete acknowledgment.
    BlobDeleted {
        /// Echoed correlation id.
        id: String,
    },
    /// Blob listing result.
    BlobListResult {
        /// Echoed correlation id.
        id: String,
        /// Blob metadata in stable key order.
        blobs: Vec<BlobMetadata>,
    },
    /// Channel creation acknowledgment.
    ChannelCreated {
        /// Echoed correlation id.
        id: String,
        /// New channel id in hex.
        channel_id: String,
        /// Channel name as stored.
        name: String,
    },
    /// Channel append acknowledgment.
    ChannelAppended {
        /// Echoed correlation id.
        id: String,
        /// The appended event with its assigned sequence number.
        event: ChannelEvent,
    },
    /// Channel read result.
    ChannelEvents {
        /// Echoed correlation id.
        id: String,
        /// Events in sequence order.
        events: Vec<ChannelEvent>,
    },
    /// Channel delete acknowledgment.
    ChannelDeleted {
        /// Echoed correlation id.
        id: String,
    },
    /// Delegated-access token issuance result.
    ChannelToken {
        /// Echoed correlation id.
        id: String,
        /// Encoded token text.
        token: String,
        /// Requested token expiry in unix seconds; the compact wire format
        /// rounds down to the whole hour, never later than this value.
        expires_at: i64,
    },
    /// Operation failure.
    Error {
        /// Echoed correlation id when one was recoverable.
        id: Option<String>,
        /// Stable error code.
        code: ErrorCode,
        /// Human-readable detail; never authoritative for dispatch.
        message: String,
    },
}

impl ResponseMessage {
    /// Builds an error response.
    #[must_use]
    pub fn error(id: Option<String>, code: ErrorCode, message: &str) -> Self {
        Self::Error {
            id,
            code,
            message: message.to_string(),
        }
    }

    /// Returns the error code carried by this response, if any.
    #[must_use]
    pub const fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Error {
                code, ..
            } => Some(*code),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
