// crates/capgate-protocol/src/router.rs
// ============================================================================
// Module: Message Router
// Description: Session state machine and capability-enforced dispatch.
// Purpose: Route client messages to storage adapters behind capability checks.
// Dependencies: capgate-core, capgate-token, base64, serde_json, tokio, url
// ============================================================================

//! ## Overview
//! The router is the protocol's trust boundary. A session is bound to one
//! verified origin at creation; traffic arriving under any other origin is
//! dropped without a response, so a confused transport cannot be probed for
//! error shapes. Within a session the state machine is strict: nothing but
//! `SYN` is accepted before the handshake, and every storage operation is
//! re-checked against the live grant store, so a revocation takes effect on
//! the very next message.
//!
//! Namespace resolution never trusts the client: the target namespace is
//! derived from the session origin on every operation. Adapter calls are
//! bounded by the configured time budget; a slow backend yields a `TIMEOUT`
//! error instead of a wedged session.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use capgate_core::Alias;
use capgate_core::AliasStore;
use capgate_core::BlobStore;
use capgate_core::BlobVisibility;
use capgate_core::Capability;
use capgate_core::CapabilitySet;
use capgate_core::CapabilityStore;
use capgate_core::ChannelStore;
use capgate_core::GrantError;
use capgate_core::GrantStore;
use capgate_core::KvStore;
use capgate_core::Namespace;
use capgate_core::NamespaceIsolator;
use capgate_core::Origin;
use capgate_core::PrincipalId;
use capgate_core::ResourceId;
use capgate_core::StoreError;
use capgate_core::Timestamp;
use capgate_core::core::identifiers::PRINCIPAL_ID_BYTES;
use capgate_core::crypto;
use capgate_core::derive_namespace;
use capgate_token::TokenCodec;
use capgate_token::TokenError;
use capgate_token::TokenPermissions;
use capgate_token::TokenVersion;
use serde_json::Value;
use thiserror::Error;
use url::Url;
use url::form_urlencoded;

use crate::config::GatewayConfig;
use crate::config::PROTOCOL_VERSION;
use crate::correlation::sanitize_message_id;
use crate::messages::ErrorCode;
use crate::messages::RequestMessage;
use crate::messages::ResponseMessage;
use crate::telemetry::GatewayMetricEvent;
use crate::telemetry::GatewayMetrics;
use crate::telemetry::NoopMetrics;
use crate::telemetry::RequestOutcome;

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Router construction failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum RouterBuildError {
    /// A required backend was not provided.
    #[error("missing backend: {0}")]
    MissingBackend(&'static str),
}

/// Builder assembling a [`GatewayRouter`] from its backends.
#[derive(Default)]
pub struct GatewayRouterBuilder {
    /// Gateway configuration.
    config: Option<GatewayConfig>,
    /// Grant backend.
    grants: Option<Arc<dyn GrantStore>>,
    /// Alias backend.
    aliases: Option<Arc<dyn AliasStore>>,
    /// Key-value adapter.
    kv: Option<Arc<dyn KvStore>>,
    /// Blob adapter.
    blobs: Option<Arc<dyn BlobStore>>,
    /// Channel adapter.
    channels: Option<Arc<dyn ChannelStore>>,
    /// Metrics sink.
    metrics: Option<Arc<dyn GatewayMetrics>>,
}

impl GatewayRouterBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the gateway configuration.
    #[must_use]
    pub fn with_config(mut self, config: GatewayConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the grant backend.
    #[must_use]
    pub fn with_grants(mut self, grants: Arc<dyn GrantStore>) -> Self {
        self.grants = Some(grants);
        self
    }

    /// Sets the alias backend.
    #[must_use]
    pub fn with_aliases(mut self, aliases: Arc<dyn AliasStore>) -> Self {
        self.aliases = Some(aliases);
        self
    }

    /// Sets the key-value adapter.
    #[must_use]
    pub fn with_kv(mut self, kv: Arc<dyn KvStore>) -> Self {
        self.kv = Some(kv);
        self
    }

    /// Sets the blob adapter.
    #[must_use]
    pub fn with_blobs(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    /// Sets the channel adapter.
    #[must_use]
    pub fn with_channels(mut self, channels: Arc<dyn ChannelStore>) -> Self {
        self.channels = Some(channels);
        self
    }

    /// Sets the metrics sink; a no-op sink is used when omitted.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn GatewayMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Builds the router.
    ///
    /// # Errors
    ///
    /// Returns [`RouterBuildError::MissingBackend`] naming the first absent
    /// backend.
    pub fn build(self) -> Result<GatewayRouter, RouterBuildError> {
        let grants = self.grants.ok_or(RouterBuildError::MissingBackend("grants"))?;
        let aliases = self.aliases.ok_or(RouterBuildError::MissingBackend("aliases"))?;
        let kv = self.kv.ok_or(RouterBuildError::MissingBackend("kv"))?;
        let blobs = self.blobs.ok_or(RouterBuildError::MissingBackend("blobs"))?;
        let channels = self.channels.ok_or(RouterBuildError::MissingBackend("channels"))?;
        Ok(GatewayRouter {
            config: self.config.unwrap_or_default(),
            capabilities: CapabilityStore::new(grants),
            isolator: NamespaceIsolator::new(aliases),
            kv,
            blobs,
            channels,
            metrics: self.metrics.unwrap_or_else(|| Arc::new(NoopMetrics)),
        })
    }
}

// ============================================================================
// SECTION: Session
// ============================================================================

/// Session handshake state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    /// No handshake yet; only `SYN` is accepted.
    Uninitialized,
    /// Handshake complete; operations are accepted.
    Ready,
}

/// One client session, bound to a single verified origin.
///
/// # Invariants
/// - `origin` and `namespace` are fixed at creation; a session never serves
///   a second origin.
#[derive(Debug)]
pub struct Session {
    /// Transport-verified origin this session serves.
    origin: Origin,
    /// Namespace derived from the origin.
    namespace: Namespace,
    /// Handshake state.
    state: SessionState,
}

impl Session {
    /// Creates an uninitialized session for a transport-verified origin.
    #[must_use]
    pub fn new(origin: Origin) -> Self {
        let namespace = derive_namespace(&origin);
        Self {
            origin,
            namespace,
            state: SessionState::Uninitialized,
        }
    }

    /// Returns the origin this session serves.
    #[must_use]
    pub const fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Returns true once the handshake completed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }
}

// ============================================================================
// SECTION: Operation Errors
// ============================================================================

/// Internal failure of one dispatched operation.
enum OpError {
    /// Adapter exceeded the time budget.
    Timeout,
    /// Backend failure.
    Store(StoreError),
}

impl From<StoreError> for OpError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl OpError {
    /// Maps the failure to its outward error response.
    fn into_response(self, id: String) -> ResponseMessage {
        match self {
            Self::Timeout => {
                ResponseMessage::error(Some(id), ErrorCode::Timeout, "storage timeout")
            }
            Self::Store(StoreError::NotFound) => {
                ResponseMessage::error(Some(id), ErrorCode::NotFound, "not found")
            }
            Self::Store(_) => {
                ResponseMessage::error(Some(id), ErrorCode::Internal, "storage backend failure")
            }
        }
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Capability-enforcing message router.
///
/// # Invariants
/// - Every storage operation re-reads the grant store; capability checks are
///   never cached across messages.
/// - The target namespace is derived from the session origin, never taken
///   from the message.
pub struct GatewayRouter {
    /// Gateway configuration.
    config: GatewayConfig,
    /// Per-origin capability grants.
    capabilities: CapabilityStore,
    /// Alias allocator for compact public URLs.
    isolator: NamespaceIsolator,
    /// Key-value adapter.
    kv: Arc<dyn KvStore>,
    /// Blob adapter.
    blobs: Arc<dyn BlobStore>,
    /// Channel adapter.
    channels: Arc<dyn ChannelStore>,
    /// Metrics sink.
    metrics: Arc<dyn GatewayMetrics>,
}

impl GatewayRouter {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> GatewayRouterBuilder {
        GatewayRouterBuilder::new()
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Handles one raw inbound message for a session.
    ///
    /// `envelope_origin` is the transport-verified origin of this message.
    /// When it differs from the session's bound origin the message is
    /// dropped and `None` is returned: cross-origin traffic is never
    /// answered, not even with an error.
    pub async fn handle(
        &self,
        session: &mut Session,
        envelope_origin: &Origin,
        raw: &str,
    ) -> Option<ResponseMessage> {
        let started = Instant::now();
        if *envelope_origin != session.origin {
            self.record(
                GatewayMetricEvent {
                    kind: "invalid",
                    outcome: RequestOutcome::Dropped,
                    error_code: None,
                    request_bytes: raw.len(),
                },
                started,
            );
            return None;
        }
        let (kind, response) = self.handle_in_origin(session, raw).await;
        let (outcome, error_code) = match &response {
            ResponseMessage::Error {
                code, ..
            } => (RequestOutcome::Error, Some(code.as_str())),
            ResponseMessage::PermissionDenied {
                ..
            } => (RequestOutcome::Error, None),
            _ => (RequestOutcome::Ok, None),
        };
        self.record(
            GatewayMetricEvent {
                kind,
                outcome,
                error_code,
                request_bytes: raw.len(),
            },
            started,
        );
        Some(response)
    }

    /// Records one metric event with its latency.
    fn record(&self, event: GatewayMetricEvent, started: Instant) {
        self.metrics.record_request(event.clone());
        self.metrics.record_latency(event, started.elapsed());
    }

    /// Handles a message already attributed to the session origin, returning
    /// the message kind label alongside the response.
    async fn handle_in_origin(
        &self,
        session: &mut Session,
        raw: &str,
    ) -> (&'static str, ResponseMessage) {
        if raw.len() > self.config.limits.max_message_bytes {
            return (
                "invalid",
                ResponseMessage::error(None, ErrorCode::InvalidMessage, "message too large"),
            );
        }
        let Ok(value) = serde_json::from_str::<Value>(raw) else {
            return (
                "invalid",
                ResponseMessage::error(None, ErrorCode::InvalidMessage, "malformed json"),
            );
        };
        let recovered_id = recover_message_id(&value);
        let Ok(request) = serde_json::from_value::<RequestMessage>(value) else {
            return (
                "invalid",
                ResponseMessage::error(
                    recovered_id,
                    ErrorCode::InvalidMessage,
                    "unrecognized message",
                ),
            );
        };
        let kind = request.kind();
        if sanitize_message_id(request.request_id()).is_err() {
            return (
                kind,
                ResponseMessage::error(None, ErrorCode::InvalidMessage, "invalid message id"),
            );
        }
        let now = Timestamp::now();
        (kind, self.dispatch(session, request, now).await)
    }

    /// Dispatches a parsed, id-sanitized request.
    async fn dispatch(
        &self,
        session: &mut Session,
        request: RequestMessage,
        now: Timestamp,
    ) -> ResponseMessage {
        if let RequestMessage::Syn {
            id,
            version,
        } = request
        {
            return self.handle_syn(session, id, &version, now).await;
        }
        if !session.is_ready() {
            return ResponseMessage::error(
                Some(request.request_id().to_string()),
                ErrorCode::NotReady,
                "handshake required",
            );
        }
        if let RequestMessage::RequestCapabilities {
            id,
            capabilities,
        } = request
        {
            return self.handle_request_capabilities(session, id, &capabilities, now).await;
        }
        let id = request.request_id().to_string();
        if let Some(required) = request.required_capability() {
            match self.capabilities.get_capabilities(&session.origin, now).await {
                Ok(granted) if granted.contains(&required) => {}
                Ok(_) => {
                    return ResponseMessage::PermissionDenied {
                        id,
                        capability: required.as_str().to_string(),
                    };
                }
                Err(err) => return grant_error_response(id, &err),
            }
        }
        self.dispatch_storage(session, id, request, now).await
    }

    /// Handles the `SYN` handshake.
    async fn handle_syn(
        &self,
        session: &mut Session,
        id: String,
        version: &str,
        now: Timestamp,
    ) -> ResponseMessage {
        if !self.config.supports_version(version) {
            return ResponseMessage::error(
                Some(id),
                ErrorCode::UnsupportedVersion,
                "incompatible protocol version",
            );
        }
        let granted = match self.capabilities.get_capabilities(&session.origin, now).await {
            Ok(granted) => granted,
            Err(err) => return grant_error_response(id, &err),
        };
        session.state = SessionState::Ready;
        ResponseMessage::Ack {
            id,
            version: PROTOCOL_VERSION.to_string(),
            capabilities: capability_labels(&granted),
        }
    }

    /// Handles capability negotiation.
    ///
    /// The request is partitioned against the current grant: labels already
    /// granted come back immediately, the rest are directed to out-of-band
    /// approval. The router itself never grants anything.
    async fn handle_request_capabilities(
        &self,
        session: &Session,
        id: String,
        labels: &[String],
        now: Timestamp,
    ) -> ResponseMessage {
        if labels.is_empty() || labels.len() > self.config.limits.max_capabilities_per_request {
            return ResponseMessage::error(Some(id), ErrorCode::InvalidMessage, "bad capability list");
        }
        let mut requested = CapabilitySet::new();
        for label in labels {
            let Ok(capability) = Capability::parse(label) else {
                return ResponseMessage::error(
                    Some(id),
                    ErrorCode::InvalidMessage,
                    "unknown capability",
                );
            };
            requested.insert(capability);
        }
        let granted = match self.capabilities.get_capabilities(&session.origin, now).await {
            Ok(granted) => granted,
            Err(err) => return grant_error_response(id, &err),
        };
        let missing: CapabilitySet = requested.difference(&granted).copied().collect();
        let already: CapabilitySet = requested.intersection(&granted).copied().collect();
        if missing.is_empty() {
            return ResponseMessage::CapabilitiesGranted {
                id,
                granted: capability_labels(&already),
            };
        }
        ResponseMessage::AuthRequired {
            id,
            granted: capability_labels(&already),
            approval_url: self.approval_url(&session.origin, &missing),
        }
    }

    /// Builds the out-of-band approval URL for missing capabilities.
    fn approval_url(&self, origin: &Origin, missing: &CapabilitySet) -> String {
        let labels = missing.iter().map(|cap| cap.as_str()).collect::<Vec<_>>().join(",");
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("origin", origin.as_str())
            .append_pair("capabilities", &labels)
            .finish();
        format!("{}?{}", self.config.approval_url_base, query)
    }

    /// Dispatches a capability-cleared storage operation.
    #[allow(clippy::too_many_lines, reason = "one arm per protocol operation")]
    async fn dispatch_storage(
        &self,
        session: &Session,
        id: String,
        request: RequestMessage,
        now: Timestamp,
    ) -> ResponseMessage {
        let namespace = &session.namespace;
        match request {
            RequestMessage::KvGet {
                key, ..
            } => {
                if let Err(response) = self.check_key(&id, &key) {
                    return response;
                }
                match self.bounded(self.kv.get(namespace, &key)).await {
                    Ok(value) => ResponseMessage::KvResult {
                        id,
                        value,
                    },
                    Err(err) => err.into_response(id),
                }
            }
            RequestMessage::KvSet {
                key,
                value,
                ..
            } => {
                if let Err(response) = self.check_key(&id, &key) {
                    return response;
                }
                let Ok(serialized) = serde_json::to_vec(&value) else {
                    return ResponseMessage::error(Some(id), ErrorCode::InvalidMessage, "bad value");
                };
                if serialized.len() > self.config.limits.max_value_bytes {
                    return ResponseMessage::error(
                        Some(id),
                        ErrorCode::InvalidMessage,
                        "value too large",
                    );
                }
                match self.bounded(self.kv.set(namespace, &key, value)).await {
                    Ok(()) => ResponseMessage::KvOk {
                        id,
                    },
                    Err(err) => err.into_response(id),
                }
            }
            RequestMessage::KvDelete {
                key, ..
            } => {
                if let Err(response) = self.check_key(&id, &key) {
                    return response;
                }
                match self.bounded(self.kv.delete(namespace, &key)).await {
                    Ok(()) => ResponseMessage::KvOk {
                        id,
                    },
                    Err(err) => err.into_response(id),
                }
            }
            RequestMessage::KvKeys {
                prefix, ..
            } => match self.bounded(self.kv.keys(namespace, prefix.as_deref())).await {
                Ok(keys) => ResponseMessage::KvKeysResult {
                    id,
                    keys,
                },
                Err(err) => err.into_response(id),
            },
            RequestMessage::BlobUpload {
                key,
                content_type,
                data,
                visibility,
                ..
            } => {
                self.handle_blob_upload(session, id, key, content_type, &data, visibility, now)
                    .await
            }
            RequestMessage::BlobGet {
                key, ..
            } => {
                if let Err(response) = self.check_key(&id, &key) {
                    return response;
                }
                match self.bounded(self.blobs.get(namespace, &key)).await {
                    Ok(Some((metadata, bytes))) => ResponseMessage::BlobContent {
                        id,
                        metadata,
                        data: STANDARD.encode(bytes),
                    },
                    Ok(None) => {
                        ResponseMessage::error(Some(id), ErrorCode::NotFound, "not found")
                    }
                    Err(err) => err.into_response(id),
                }
            }
            RequestMessage::BlobDelete {
                key, ..
            } => {
                if let Err(response) = self.check_key(&id, &key) {
                    return response;
                }
                match self.bounded(self.blobs.delete(namespace, &key)).await {
                    Ok(()) => ResponseMessage::BlobDeleted {
                        id,
                    },
                    Err(err) => err.into_response(id),
                }
            }
            RequestMessage::BlobList {
                ..
            } => match self.bounded(self.blobs.list(namespace)).await {
                Ok(blobs) => ResponseMessage::BlobListResult {
                    id,
                    blobs,
                },
                Err(err) => err.into_response(id),
            },
            RequestMessage::ChannelCreate {
                name, ..
            } => {
                if name.is_empty()
                    || name.len() > self.config.limits.max_channel_name_length
                    || name.chars().any(char::is_control)
                {
                    return ResponseMessage::error(
                        Some(id),
                        ErrorCode::InvalidMessage,
                        "bad channel name",
                    );
                }
                match self.bounded(self.channels.create(namespace, &name, now)).await {
                    Ok(record) => ResponseMessage::ChannelCreated {
                        id,
                        channel_id: record.id.to_string(),
                        name: record.name,
                    },
                    Err(err) => err.into_response(id),
                }
            }
            RequestMessage::ChannelAppend {
                channel_id,
                content,
                ..
            } => {
                if content.len() > self.config.limits.max_content_length {
                    return ResponseMessage::error(
                        Some(id),
                        ErrorCode::InvalidMessage,
                        "content too large",
                    );
                }
                let channel = match self.owned_channel(session, &id, &channel_id).await {
                    Ok(channel) => channel,
                    Err(response) => return response,
                };
                match self.bounded(self.channels.append(channel, None, &content, now)).await {
                    Ok(event) => ResponseMessage::ChannelAppended {
                        id,
                        event,
                    },
                    Err(err) => err.into_response(id),
                }
            }
            RequestMessage::ChannelRead {
                channel_id, ..
            } => {
                let channel = match self.owned_channel(session, &id, &channel_id).await {
                    Ok(channel) => channel,
                    Err(response) => return response,
                };
                match self.bounded(self.channels.read(channel)).await {
                    Ok(events) => ResponseMessage::ChannelEvents {
                        id,
                        events,
                    },
                    Err(err) => err.into_response(id),
                }
            }
            RequestMessage::ChannelDelete {
                channel_id, ..
            } => {
                let channel = match self.owned_channel(session, &id, &channel_id).await {
                    Ok(channel) => channel,
                    Err(response) => return response,
                };
                match self.bounded(self.channels.delete(channel)).await {
                    Ok(()) => ResponseMessage::ChannelDeleted {
                        id,
                    },
                    Err(err) => err.into_response(id),
                }
            }
            RequestMessage::ChannelTokenCreate {
                channel_id,
                permissions,
                expires_in,
                ..
            } => {
                self.handle_channel_token_create(session, id, &channel_id, &permissions, expires_in, now)
                    .await
            }
            RequestMessage::Syn {
                ..
            }
            | RequestMessage::RequestCapabilities {
                ..
            } => ResponseMessage::error(Some(id), ErrorCode::Internal, "unroutable message"),
        }
    }

    /// Handles a blob upload, allocating a public URL for public blobs.
    async fn handle_blob_upload(
        &self,
        session: &Session,
        id: String,
        key: String,
        content_type: String,
        data: &str,
        visibility: Option<BlobVisibility>,
        now: Timestamp,
    ) -> ResponseMessage {
        if let Err(response) = self.check_key(&id, &key) {
            return response;
        }
        if content_type.is_empty() || content_type.len() > self.config.limits.max_key_length {
            return ResponseMessage::error(Some(id), ErrorCode::InvalidMessage, "bad content type");
        }
        let Ok(bytes) = STANDARD.decode(data) else {
            return ResponseMessage::error(Some(id), ErrorCode::InvalidMessage, "bad blob encoding");
        };
        if bytes.len() > self.config.limits.max_blob_bytes {
            return ResponseMessage::error(Some(id), ErrorCode::InvalidMessage, "blob too large");
        }
        let visibility = visibility.unwrap_or(BlobVisibility::Private);
        let metadata = match self
            .bounded(self.blobs.upload(
                &session.namespace,
                &key,
                &content_type,
                bytes,
                visibility,
                now,
            ))
            .await
        {
            Ok(metadata) => metadata,
            Err(err) => return err.into_response(id),
        };
        let url = if visibility == BlobVisibility::Public {
            let alias = match self.isolator.get_or_create_alias(&session.namespace).await {
                Ok(alias) => alias,
                Err(_) => {
                    return ResponseMessage::error(
                        Some(id),
                        ErrorCode::Internal,
                        "alias allocation failure",
                    );
                }
            };
            match public_blob_url(&self.config.public_url_base, &alias, &key) {
                Some(url) => Some(url),
                None => {
                    return ResponseMessage::error(
                        Some(id),
                        ErrorCode::Internal,
                        "public url failure",
                    );
                }
            }
        } else {
            None
        };
        ResponseMessage::BlobUploaded {
            id,
            metadata,
            url,
        }
    }

    /// Handles delegated-token issuance for an owned channel.
    async fn handle_channel_token_create(
        &self,
        session: &Session,
        id: String,
        channel_id: &str,
        permissions: &[String],
        expires_in: Option<i64>,
        now: Timestamp,
    ) -> ResponseMessage {
        let Some(permissions) = TokenPermissions::from_labels(permissions) else {
            return ResponseMessage::error(Some(id), ErrorCode::InvalidMessage, "bad permissions");
        };
        let ttl = expires_in.unwrap_or(self.config.default_token_ttl_seconds);
        if !(1..=self.config.max_token_ttl_seconds()).contains(&ttl) {
            return ResponseMessage::error(Some(id), ErrorCode::InvalidMessage, "bad token lifetime");
        }
        let channel = match self.owned_channel(session, &id, channel_id).await {
            Ok(channel) => channel,
            Err(response) => return response,
        };
        let secret = match self.bounded(self.channels.secret(channel)).await {
            Ok(secret) => secret,
            Err(err) => return err.into_response(id),
        };
        let expires_at = now.offset(ttl);
        let author = origin_author_id(&session.origin);
        match TokenCodec::encode(TokenVersion::V3, channel, permissions, author, expires_at, &secret)
        {
            Ok(token) => ResponseMessage::ChannelToken {
                id,
                token,
                expires_at: expires_at.as_unix_seconds(),
            },
            Err(TokenError::NotEncodable(_)) => {
                ResponseMessage::error(Some(id), ErrorCode::InvalidMessage, "bad token lifetime")
            }
            Err(_) => ResponseMessage::error(Some(id), ErrorCode::Internal, "token issue failure"),
        }
    }

    /// Resolves a channel id and confirms the session's namespace owns it.
    ///
    /// A channel outside the namespace reads as absent; existence of other
    /// tenants' channels is never confirmed.
    async fn owned_channel(
        &self,
        session: &Session,
        id: &str,
        channel_id: &str,
    ) -> Result<ResourceId, ResponseMessage> {
        let Ok(channel) = ResourceId::parse(channel_id) else {
            return Err(ResponseMessage::error(
                Some(id.to_string()),
                ErrorCode::InvalidMessage,
                "bad channel id",
            ));
        };
        match self.bounded(self.channels.lookup(channel)).await {
            Ok(Some(record)) if record.namespace == session.namespace => Ok(channel),
            Ok(_) => Err(ResponseMessage::error(
                Some(id.to_string()),
                ErrorCode::NotFound,
                "not found",
            )),
            Err(err) => Err(err.into_response(id.to_string())),
        }
    }

    /// Validates a key field.
    fn check_key(&self, id: &str, key: &str) -> Result<(), ResponseMessage> {
        if key.is_empty()
            || key.len() > self.config.limits.max_key_length
            || key.chars().any(char::is_control)
        {
            return Err(ResponseMessage::error(
                Some(id.to_string()),
                ErrorCode::InvalidMessage,
                "bad key",
            ));
        }
        Ok(())
    }

    /// Runs one adapter call under the configured time budget.
    async fn bounded<T>(
        &self,
        operation: impl Future<Output = Result<T, StoreError>> + Send,
    ) -> Result<T, OpError> {
        let budget = Duration::from_millis(self.config.storage_timeout_ms);
        match tokio::time::timeout(budget, operation).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(OpError::Timeout),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Maps a grant store failure to its outward error response.
fn grant_error_response(id: String, err: &GrantError) -> ResponseMessage {
    match err {
        GrantError::Store(StoreError::NotFound) => {
            ResponseMessage::error(Some(id), ErrorCode::NotFound, "not found")
        }
        GrantError::Store(_) | GrantError::Contention => {
            ResponseMessage::error(Some(id), ErrorCode::Internal, "grant store failure")
        }
    }
}

/// Renders a capability set as stable wire labels.
fn capability_labels(capabilities: &CapabilitySet) -> Vec<String> {
    capabilities.iter().map(|cap| cap.as_str().to_string()).collect()
}

/// Derives the deterministic token author id for an origin issuer.
///
/// Origin sessions have no principal account, so the author recorded in an
/// issued token is a stable digest prefix of the origin itself.
fn origin_author_id(origin: &Origin) -> PrincipalId {
    let digest = crypto::sha256(origin.as_str().as_bytes());
    let mut bytes = [0u8; PRINCIPAL_ID_BYTES];
    bytes.copy_from_slice(&digest[..PRINCIPAL_ID_BYTES]);
    PrincipalId::from_bytes(bytes)
}

/// Recovers a usable `id` field from a malformed message, if present.
fn recover_message_id(value: &Value) -> Option<String> {
    let id = value.get("id")?.as_str()?;
    sanitize_message_id(id).ok()?;
    Some(id.to_string())
}

/// Builds the public URL for a blob behind a namespace alias.
///
/// Path segments are percent-encoded by the URL library; `None` means the
/// configured base cannot carry path segments at all.
fn public_blob_url(base: &str, alias: &Alias, key: &str) -> Option<String> {
    let mut url = Url::parse(base).ok()?;
    url.path_segments_mut().ok()?.push(alias.as_str()).push(key);
    Some(url.to_string())
}
