// crates/capgate-protocol/src/lib.rs
// ============================================================================
// Module: Capgate Protocol Library
// Description: Message protocol, auth gate, and capability-enforced router.
// Purpose: Provide the transport-agnostic trust boundary of the gateway.
// Dependencies: capgate-core, capgate-token, serde, serde_json, tokio
// ============================================================================

//! ## Overview
//! Capgate Protocol is the layer between a transport and the storage
//! adapters. It owns the wire message vocabulary, the per-session handshake
//! state machine, capability-checked dispatch, API key authentication, and
//! the token-presented access path.
//!
//! Invariants:
//! - Sessions are bound to one verified origin; cross-origin messages are
//!   dropped without a response.
//! - Every storage operation re-checks the live grant store.
//! - Authentication failures collapse to one generic outward response.
//!
//! Security posture: all inbound fields are untrusted; validation is
//! fail-closed and error responses never leak which internal check failed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod auth;
pub mod config;
pub mod correlation;
pub mod messages;
pub mod router;
pub mod telemetry;
pub mod token_access;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use auth::AuthError;
pub use auth::AuthGate;
pub use auth::AuthIdentity;
pub use config::ConfigError;
pub use config::GatewayConfig;
pub use config::GatewayLimits;
pub use config::PROTOCOL_VERSION;
pub use correlation::MessageIdRejection;
pub use correlation::sanitize_message_id;
pub use messages::ErrorCode;
pub use messages::RequestMessage;
pub use messages::ResponseMessage;
pub use router::GatewayRouter;
pub use router::GatewayRouterBuilder;
pub use router::RouterBuildError;
pub use router::Session;
pub use telemetry::GatewayMetricEvent;
pub use telemetry::GatewayMetrics;
pub use telemetry::NoopMetrics;
pub use telemetry::RequestOutcome;
pub use token_access::ChannelSecretResolver;
pub use token_access::TokenAccess;
pub use token_access::TokenAccessError;
