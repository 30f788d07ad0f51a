// crates/capgate-core/src/core/identifiers/tests.rs
// ============================================================================
// Module: Identifier Tests
// Description: Unit tests for identifier parsing and wire rendering.
// Purpose: Validate construction-boundary rejection of malformed identifiers.
// Dependencies: capgate-core
// ============================================================================

//! ## Overview
//! Validates origin, namespace, alias, and fixed-width id parsing, including
//! the hex round trips the token codec depends on.

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

use super::Alias;
use super::MAX_ORIGIN_LENGTH;
use super::Namespace;
use super::Origin;
use super::PrincipalId;
use super::ResourceId;

// ============================================================================
// SECTION: Origin Tests
// ============================================================================

#[test]
fn parses_well_formed_origins() {
    for value in ["https://app.example", "http://localhost:3000", "capacitor://local"] {
        let origin = Origin::parse(value).unwrap();
        assert_eq!(origin.as_str(), value);
    }
}

#[test]
fn rejects_malformed_origins() {
    let long = format!("https://{}", "a".repeat(MAX_ORIGIN_LENGTH));
    for value in ["", "app.example", "://host", "https://", "https://a b", "https://é.example", long.as_str()] {
        assert!(Origin::parse(value).is_err(), "origin {value:?} should be rejected");
    }
}

#[test]
fn origin_equality_is_exact() {
    let lower = Origin::parse("https://app.example").unwrap();
    let upper = Origin::parse("https://APP.example").unwrap();
    assert_ne!(lower, upper);
}

// ============================================================================
// SECTION: Namespace and Alias Tests
// ============================================================================

#[test]
fn namespace_parse_validates_shape() {
    let valid = format!("origin_{}", "ab".repeat(32));
    assert!(Namespace::parse(&valid).is_ok());
    for value in
        ["", "origin_", "ab".repeat(32).as_str(), &format!("origin_{}", "AB".repeat(32)), &format!("origin_{}", "ab".repeat(31))]
    {
        assert!(Namespace::parse(value).is_err(), "namespace {value:?} should be rejected");
    }
}

#[test]
fn alias_parse_validates_shape() {
    assert!(Alias::parse("00ff00ff").is_ok());
    assert!(Alias::parse(&"ab".repeat(32)).is_ok());
    for value in ["", "00ff00", "00ff00ff0", "00FF00FF", &"ab".repeat(33)] {
        assert!(Alias::parse(value).is_err(), "alias {value:?} should be rejected");
    }
}

// ============================================================================
// SECTION: Fixed-Width Id Tests
// ============================================================================

#[test]
fn resource_id_hex_round_trips() {
    let id = ResourceId::from_bytes([0x00, 0x11, 0x22, 0x33, 0xaa, 0xbb, 0xcc, 0xdd]);
    assert_eq!(id.to_string(), "00112233aabbccdd");
    assert_eq!(ResourceId::parse("00112233aabbccdd").unwrap(), id);
    assert_eq!(id.truncated(), [0x00, 0x11, 0x22, 0x33, 0xaa, 0xbb]);
}

#[test]
fn principal_id_hex_round_trips() {
    let id = PrincipalId::from_bytes([0xde, 0xad, 0xbe, 0xef]);
    assert_eq!(id.to_string(), "deadbeef");
    assert_eq!(PrincipalId::parse("deadbeef").unwrap(), id);
    assert_eq!(id.truncated(), [0xde, 0xad]);
}

#[test]
fn fixed_width_ids_reject_bad_hex() {
    for value in ["", "0011", "00112233aabbccd", "00112233aabbccddee", "00112233AABBCCDD", "00112233aabbccdg"] {
        assert!(ResourceId::parse(value).is_err(), "id {value:?} should be rejected");
    }
    assert!(PrincipalId::parse("DEADBEEF").is_err());
    assert!(PrincipalId::parse("deadbee").is_err());
}

#[test]
fn ids_serialize_as_hex_strings() {
    let id = ResourceId::from_bytes([1, 2, 3, 4, 5, 6, 7, 8]);
    let wire = serde_json::to_value(id).unwrap();
    assert_eq!(wire, serde_json::json!("0102030405060708"));
    let back: ResourceId = serde_json::from_value(wire).unwrap();
    assert_eq!(back, id);
}
