// crates/capgate-protocol/src/correlation.rs
// ============================================================================
// Module: Correlation Policy
// Description: Sanitization for caller-chosen message correlation ids.
// Purpose: Provide deterministic, fail-closed correlation handling.
// Dependencies: (none beyond std)
// ============================================================================

//! ## Overview
//! Every request carries a caller-chosen `id` that the matching response
//! echoes verbatim. The id is **unsafe** input: it crosses back over the
//! wire and may land in logs, so it is validated against strict token rules
//! before any use. Invalid ids reject the whole message rather than being
//! repaired.
//! Security posture: correlation ids are untrusted input and are never
//! echoed unsanitized.

use std::fmt;

/// Maximum allowed length for a caller-chosen message id.
pub const MAX_MESSAGE_ID_LENGTH: usize = 128;

/// Typed rejection reason for invalid message ids.
///
/// # Invariants
/// - Variants are stable for audit labeling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageIdRejection {
    /// Input was empty.
    Empty,
    /// Input exceeded the maximum length.
    TooLong,
    /// Input contained whitespace.
    ContainsWhitespace,
    /// Input contained control characters.
    ContainsControlChar,
    /// Input contained non-ASCII characters.
    NonAscii,
    /// Input contained disallowed ASCII characters.
    ContainsDisallowedChar,
}

impl MessageIdRejection {
    /// Returns a stable label for this rejection reason.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::TooLong => "too_long",
            Self::ContainsWhitespace => "contains_whitespace",
            Self::ContainsControlChar => "contains_control_char",
            Self::NonAscii => "non_ascii",
            Self::ContainsDisallowedChar => "contains_disallowed_char",
        }
    }
}

impl fmt::Display for MessageIdRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Validates a caller-chosen message id using strict token rules.
///
/// # Errors
/// Returns [`MessageIdRejection`] when the id is empty, too long, or
/// contains disallowed characters.
pub fn sanitize_message_id(value: &str) -> Result<(), MessageIdRejection> {
    if value.is_empty() {
        return Err(MessageIdRejection::Empty);
    }
    if value.len() > MAX_MESSAGE_ID_LENGTH {
        return Err(MessageIdRejection::TooLong);
    }
    for ch in value.chars() {
        if !ch.is_ascii() {
            return Err(MessageIdRejection::NonAscii);
        }
        if ch.is_ascii_whitespace() {
            return Err(MessageIdRejection::ContainsWhitespace);
        }
        if ch.is_control() {
            return Err(MessageIdRejection::ContainsControlChar);
        }
        if !is_tchar(ch) {
            return Err(MessageIdRejection::ContainsDisallowedChar);
        }
    }
    Ok(())
}

/// Returns true when the character is a valid HTTP token character.
const fn is_tchar(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(
            ch,
            '!' | '#'
                | '$'
                | '%'
                | '&'
                | '\''
                | '*'
                | '+'
                | '-'
                | '.'
                | '^'
                | '_'
                | '`'
                | '|'
                | '~'
        )
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
