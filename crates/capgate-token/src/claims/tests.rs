// crates/capgate-token/src/claims/tests.rs
// ============================================================================
// Module: Token Claims Tests
// Description: Unit tests for the permission bitmap.
// Purpose: Validate bit, label, and rejection rules for token permissions.
// Dependencies: capgate-token
// ============================================================================

//! ## Overview
//! Validates that the permission bitmap accepts exactly the two defined
//! bits, that labels and bits agree in both directions, and that empty or
//! unknown inputs reject.

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

use super::TokenPermissions;

/// Converts labels to owned strings.
fn labels(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

// ============================================================================
// SECTION: Bitmap Tests
// ============================================================================

#[test]
fn defined_bit_patterns_round_trip() {
    for bits in [0b01u8, 0b10, 0b11] {
        let permissions = TokenPermissions::from_bits(bits).unwrap();
        assert_eq!(permissions.bits(), bits);
    }
    assert_eq!(TokenPermissions::READ.bits(), 0b01);
    assert_eq!(TokenPermissions::WRITE.bits(), 0b10);
    assert_eq!(TokenPermissions::READ_WRITE.bits(), 0b11);
}

#[test]
fn zero_and_undefined_bits_reject() {
    assert_eq!(TokenPermissions::from_bits(0), None);
    for bits in [0b100u8, 0b101, 0b1000_0000, 0xff] {
        assert_eq!(TokenPermissions::from_bits(bits), None, "bits {bits:#010b} should reject");
    }
}

#[test]
fn capability_predicates_follow_the_bits() {
    assert!(TokenPermissions::READ.can_read());
    assert!(!TokenPermissions::READ.can_write());
    assert!(!TokenPermissions::WRITE.can_read());
    assert!(TokenPermissions::WRITE.can_write());
    assert!(TokenPermissions::READ_WRITE.can_read());
    assert!(TokenPermissions::READ_WRITE.can_write());
}

// ============================================================================
// SECTION: Label Tests
// ============================================================================

#[test]
fn labels_render_in_read_then_write_order() {
    assert_eq!(TokenPermissions::READ.labels(), vec!["read"]);
    assert_eq!(TokenPermissions::WRITE.labels(), vec!["write"]);
    assert_eq!(TokenPermissions::READ_WRITE.labels(), vec!["read", "write"]);
    assert_eq!(TokenPermissions::READ_WRITE.to_string(), "read+write");
}

#[test]
fn label_lists_parse_regardless_of_order() {
    assert_eq!(TokenPermissions::from_labels(&labels(&["read"])), Some(TokenPermissions::READ));
    assert_eq!(
        TokenPermissions::from_labels(&labels(&["write", "read"])),
        Some(TokenPermissions::READ_WRITE),
    );
    // Repeated labels are idempotent bit sets.
    assert_eq!(
        TokenPermissions::from_labels(&labels(&["read", "read"])),
        Some(TokenPermissions::READ),
    );
}

#[test]
fn empty_or_unknown_label_lists_reject() {
    assert_eq!(TokenPermissions::from_labels(&[]), None);
    assert_eq!(TokenPermissions::from_labels(&labels(&["admin"])), None);
    assert_eq!(TokenPermissions::from_labels(&labels(&["read", "admin"])), None);
    assert_eq!(TokenPermissions::from_labels(&labels(&["READ"])), None);
}
