// crates/capgate-protocol/src/telemetry.rs
// ============================================================================
// Module: Gateway Telemetry
// Description: Observability hooks for protocol routing and auth decisions.
// Purpose: Provide metric events and latency buckets without hard deps.
// Dependencies: (none beyond std and serde)
// ============================================================================

//! ## Overview
//! This module exposes a thin metrics interface for request counters and
//! latency histograms. It is intentionally dependency-light so deployments
//! can plug in Prometheus or OpenTelemetry without redesign.
//! Security posture: events carry stable labels only, never tenant data,
//! keys, or token material.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default latency buckets in milliseconds for request histograms.
pub const GATEWAY_LATENCY_BUCKETS_MS: &[u64] =
    &[1, 2, 5, 10, 25, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000];

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Request outcome classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum RequestOutcome {
    /// Successful request.
    Ok,
    /// Failed request.
    Error,
    /// Request dropped without a response (cross-origin traffic).
    Dropped,
}

impl RequestOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Dropped => "dropped",
        }
    }
}

/// Gateway request metric event payload.
///
/// # Invariants
/// - Optional fields are `None` when the metadata is unavailable.
#[derive(Debug, Clone)]
pub struct GatewayMetricEvent {
    /// Message kind label, or `"invalid"` when the message failed to parse.
    pub kind: &'static str,
    /// Request outcome.
    pub outcome: RequestOutcome,
    /// Stable error code label when the outcome is an error.
    pub error_code: Option<&'static str>,
    /// Request body size in bytes.
    pub request_bytes: usize,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for gateway requests and latencies.
pub trait GatewayMetrics: Send + Sync {
    /// Records a request counter event.
    fn record_request(&self, event: GatewayMetricEvent);
    /// Records a latency observation for the request.
    fn record_latency(&self, event: GatewayMetricEvent, latency: Duration);
}

/// No-op metrics sink.
///
/// # Invariants
/// - Metrics are intentionally discarded.
pub struct NoopMetrics;

impl GatewayMetrics for NoopMetrics {
    fn record_request(&self, _event: GatewayMetricEvent) {}

    fn record_latency(&self, _event: GatewayMetricEvent, _latency: Duration) {}
}
