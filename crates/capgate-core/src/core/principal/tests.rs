// crates/capgate-core/src/core/principal/tests.rs
// ============================================================================
// Module: Principal Model Tests
// Description: Unit tests for principal serialization and legacy shapes.
// Purpose: Validate normalization of the legacy service flag at the boundary.
// Dependencies: capgate-core
// ============================================================================

//! ## Overview
//! Validates that current records round-trip and that legacy records
//! carrying the pre-enum `service` boolean normalize to the canonical kind,
//! with an explicit `kind` always winning over the flag.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::json;

use super::Principal;
use super::PrincipalKind;
use crate::core::identifiers::PrincipalId;
use crate::core::time::Timestamp;

/// Builds a current-shape wire record with the given extra kind fields.
fn wire(extra: serde_json::Value) -> serde_json::Value {
    let mut record = json!({
        "id": "deadbeef",
        "secret_hash": "fp",
        "display_name": "tester",
        "active": true,
        "created_at": 1000,
    });
    if let (Some(record), Some(extra)) = (record.as_object_mut(), extra.as_object()) {
        for (key, value) in extra {
            record.insert(key.clone(), value.clone());
        }
    }
    record
}

// ============================================================================
// SECTION: Serialization Tests
// ============================================================================

#[test]
fn current_records_round_trip() {
    let principal = Principal {
        id: PrincipalId::from_bytes([0xde, 0xad, 0xbe, 0xef]),
        secret_hash: "fp".to_string(),
        display_name: "tester".to_string(),
        kind: PrincipalKind::App,
        active: true,
        created_at: Timestamp::from_unix_seconds(1_000),
    };
    let serialized = serde_json::to_value(&principal).unwrap();
    assert_eq!(serialized["kind"], json!("app"));
    let back: Principal = serde_json::from_value(serialized).unwrap();
    assert_eq!(back, principal);
}

// ============================================================================
// SECTION: Legacy Normalization Tests
// ============================================================================

#[test]
fn legacy_service_true_becomes_service_kind() {
    let principal: Principal = serde_json::from_value(wire(json!({"service": true}))).unwrap();
    assert_eq!(principal.kind, PrincipalKind::Service);
}

#[test]
fn legacy_service_false_becomes_user_kind() {
    let principal: Principal = serde_json::from_value(wire(json!({"service": false}))).unwrap();
    assert_eq!(principal.kind, PrincipalKind::User);
}

#[test]
fn missing_kind_and_flag_defaults_to_user() {
    let principal: Principal = serde_json::from_value(wire(json!({}))).unwrap();
    assert_eq!(principal.kind, PrincipalKind::User);
}

#[test]
fn explicit_kind_wins_over_legacy_flag() {
    let principal: Principal =
        serde_json::from_value(wire(json!({"kind": "app", "service": true}))).unwrap();
    assert_eq!(principal.kind, PrincipalKind::App);
}
