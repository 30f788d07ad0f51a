// crates/capgate-protocol/src/correlation/tests.rs
// ============================================================================
// Module: Correlation Policy Tests
// Description: Unit tests for message id sanitization.
// Purpose: Validate rejection reasons for untrusted correlation ids.
// Dependencies: capgate-protocol
// ============================================================================

//! ## Overview
//! Validates that message id sanitization rejects malformed inputs with
//! stable, labeled reasons and accepts strict token-shaped ids.

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

use super::MAX_MESSAGE_ID_LENGTH;
use super::MessageIdRejection;
use super::sanitize_message_id;

// ============================================================================
// SECTION: Sanitization Tests
// ============================================================================

#[test]
fn accepts_token_shaped_ids() {
    for id in ["req-1", "a", "msg_42", "X.9~z", "0123456789"] {
        assert_eq!(sanitize_message_id(id), Ok(()), "id {id:?} should pass");
    }
}

#[test]
fn rejects_empty_id() {
    assert_eq!(sanitize_message_id(""), Err(MessageIdRejection::Empty));
}

#[test]
fn rejects_oversized_id() {
    let id = "a".repeat(MAX_MESSAGE_ID_LENGTH + 1);
    assert_eq!(sanitize_message_id(&id), Err(MessageIdRejection::TooLong));
}

#[test]
fn accepts_id_at_exact_limit() {
    let id = "a".repeat(MAX_MESSAGE_ID_LENGTH);
    assert_eq!(sanitize_message_id(&id), Ok(()));
}

#[test]
fn rejects_whitespace() {
    assert_eq!(sanitize_message_id("req 1"), Err(MessageIdRejection::ContainsWhitespace));
}

#[test]
fn rejects_control_characters() {
    assert_eq!(sanitize_message_id("req\u{1}1"), Err(MessageIdRejection::ContainsControlChar));
}

#[test]
fn rejects_non_ascii() {
    assert_eq!(sanitize_message_id("réq"), Err(MessageIdRejection::NonAscii));
}

#[test]
fn rejects_disallowed_ascii() {
    for id in ["a\"b", "a(b)", "a,b", "a;b", "a@b", "a[b]"] {
        assert_eq!(
            sanitize_message_id(id),
            Err(MessageIdRejection::ContainsDisallowedChar),
            "id {id:?} should be rejected",
        );
    }
}

#[test]
fn rejection_labels_are_stable() {
    assert_eq!(MessageIdRejection::Empty.label(), "empty");
    assert_eq!(MessageIdRejection::TooLong.label(), "too_long");
    assert_eq!(MessageIdRejection::ContainsWhitespace.label(), "contains_whitespace");
    assert_eq!(MessageIdRejection::ContainsControlChar.label(), "contains_control_char");
    assert_eq!(MessageIdRejection::NonAscii.label(), "non_ascii");
    assert_eq!(MessageIdRejection::ContainsDisallowedChar.label(), "contains_disallowed_char");
}
