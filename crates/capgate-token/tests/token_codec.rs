// crates/capgate-token/tests/token_codec.rs
// ============================================================================
// Module: Token Codec Tests
// Description: Integration tests for the three token wire formats.
// Purpose: Validate round trips, documented V3 loss, and fail-closed decode.
// Dependencies: capgate-core, capgate-token, async-trait, base64, tokio
// ============================================================================

//! ## Overview
//! Round-trips every wire format through an in-test resolver, pins the
//! documented V3 lossiness (truncated author, hour-rounded expiry), and
//! checks that decode rejects expired, tampered, foreign, and malformed
//! tokens with the right variant.

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

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use capgate_core::PrincipalId;
use capgate_core::ResourceId;
use capgate_core::ResourceSecret;
use capgate_core::Timestamp;
use capgate_token::AuthorRef;
use capgate_token::ResourceRef;
use capgate_token::SecretResolver;
use capgate_token::TokenCodec;
use capgate_token::TokenError;
use capgate_token::TokenPermissions;
use capgate_token::TokenVersion;

// ============================================================================
// SECTION: Test Resolver
// ============================================================================

/// In-test resolver over a fixed resource table.
struct TableResolver {
    /// Known resources and their signing secrets.
    entries: Vec<(ResourceId, ResourceSecret)>,
}

#[async_trait]
impl SecretResolver for TableResolver {
    async fn resolve(&self, reference: &ResourceRef) -> Vec<(ResourceId, ResourceSecret)> {
        self.entries
            .iter()
            .filter(|(id, _)| match reference {
                ResourceRef::Full(full) => id == full,
                ResourceRef::Truncated(prefix) => id.truncated() == *prefix,
            })
            .cloned()
            .collect()
    }
}

/// The resource id every fixture token refers to.
fn resource() -> ResourceId {
    ResourceId::from_bytes([0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88])
}

/// The author id every fixture token carries.
fn author() -> PrincipalId {
    PrincipalId::from_bytes([0xde, 0xad, 0xbe, 0xef])
}

/// The signing secret for [`resource`].
fn secret() -> ResourceSecret {
    ResourceSecret::from_bytes([0x41; 32])
}

/// A resolver that knows exactly the fixture resource.
fn resolver() -> TableResolver {
    TableResolver {
        entries: vec![(resource(), secret())],
    }
}

/// Decode-time clock used by most tests.
fn now() -> Timestamp {
    Timestamp::from_unix_seconds(1_700_000_000)
}

/// An expiry comfortably after [`now`].
fn expiry() -> Timestamp {
    Timestamp::from_unix_seconds(1_700_086_400)
}

// ============================================================================
// SECTION: Round-Trip Tests
// ============================================================================

#[tokio::test]
async fn v1_round_trips_with_full_claims() {
    let token = TokenCodec::encode(
        TokenVersion::V1,
        resource(),
        TokenPermissions::READ_WRITE,
        author(),
        expiry(),
        &secret(),
    )
    .unwrap();
    let claims = TokenCodec::decode(&token, &resolver(), now()).await.unwrap();
    assert_eq!(claims.resource_id, resource());
    assert_eq!(claims.permissions, TokenPermissions::READ_WRITE);
    assert_eq!(claims.author, AuthorRef::Full(author()));
    assert_eq!(claims.expires_at, expiry());
}

#[tokio::test]
async fn v2_round_trips_with_full_claims() {
    let token = TokenCodec::encode(
        TokenVersion::V2,
        resource(),
        TokenPermissions::READ,
        author(),
        expiry(),
        &secret(),
    )
    .unwrap();
    assert_eq!(URL_SAFE_NO_PAD.decode(&token).unwrap().len(), 34);
    let claims = TokenCodec::decode(&token, &resolver(), now()).await.unwrap();
    assert_eq!(claims.resource_id, resource());
    assert_eq!(claims.permissions, TokenPermissions::READ);
    assert_eq!(claims.author, AuthorRef::Full(author()));
    assert_eq!(claims.expires_at, expiry());
}

#[tokio::test]
async fn v3_round_trips_with_documented_loss() {
    let token = TokenCodec::encode(
        TokenVersion::V3,
        resource(),
        TokenPermissions::WRITE,
        author(),
        expiry(),
        &secret(),
    )
    .unwrap();
    assert_eq!(URL_SAFE_NO_PAD.decode(&token).unwrap().len(), 25);
    let claims = TokenCodec::decode(&token, &resolver(), now()).await.unwrap();
    // The truncated resource id resolves back to the full id.
    assert_eq!(claims.resource_id, resource());
    assert_eq!(claims.permissions, TokenPermissions::WRITE);
    // The author survives only as a 2-byte prefix.
    assert_eq!(claims.author, AuthorRef::Truncated([0xde, 0xad]));
    // The expiry rounds down to the whole hour, never later.
    let seconds = claims.expires_at.as_unix_seconds();
    assert_eq!(seconds % 3_600, 0);
    assert!(seconds <= expiry().as_unix_seconds());
    assert!(seconds > expiry().as_unix_seconds() - 3_600);
}

#[tokio::test]
async fn v3_tries_every_truncation_candidate() {
    // A second live resource shares the 6-byte prefix but has its own secret.
    let twin = ResourceId::from_bytes([0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x00, 0x00]);
    let resolver = TableResolver {
        entries: vec![(twin, ResourceSecret::from_bytes([0x42; 32])), (resource(), secret())],
    };
    let token = TokenCodec::encode(
        TokenVersion::V3,
        resource(),
        TokenPermissions::READ,
        author(),
        expiry(),
        &secret(),
    )
    .unwrap();
    let claims = TokenCodec::decode(&token, &resolver, now()).await.unwrap();
    // The signature picks the right candidate out of the collision.
    assert_eq!(claims.resource_id, resource());
}

// ============================================================================
// SECTION: Rejection Tests
// ============================================================================

#[tokio::test]
async fn expiry_beats_a_perfect_signature() {
    for version in [TokenVersion::V1, TokenVersion::V2, TokenVersion::V3] {
        let token = TokenCodec::encode(
            version,
            resource(),
            TokenPermissions::READ,
            author(),
            expiry(),
            &secret(),
        )
        .unwrap();
        let late = Timestamp::from_unix_seconds(1_800_000_000);
        let result = TokenCodec::decode(&token, &resolver(), late).await;
        assert_eq!(result, Err(TokenError::Expired), "{version:?} should expire");
    }
}

#[tokio::test]
async fn wrong_secret_fails_the_signature() {
    let token = TokenCodec::encode(
        TokenVersion::V2,
        resource(),
        TokenPermissions::READ,
        author(),
        expiry(),
        &ResourceSecret::from_bytes([0x42; 32]),
    )
    .unwrap();
    let result = TokenCodec::decode(&token, &resolver(), now()).await;
    assert_eq!(result, Err(TokenError::Signature));
}

#[tokio::test]
async fn unknown_resource_fails_before_verification() {
    let stranger = TableResolver { entries: Vec::new() };
    let token = TokenCodec::encode(
        TokenVersion::V2,
        resource(),
        TokenPermissions::READ,
        author(),
        expiry(),
        &secret(),
    )
    .unwrap();
    let result = TokenCodec::decode(&token, &stranger, now()).await;
    assert_eq!(result, Err(TokenError::UnknownResource));
}

#[tokio::test]
async fn wrong_length_for_the_version_rejects() {
    let short = URL_SAFE_NO_PAD.encode([0x02u8; 20]);
    assert_eq!(TokenCodec::decode(&short, &resolver(), now()).await, Err(TokenError::Length));
    let long = URL_SAFE_NO_PAD.encode([0x03u8; 40]);
    assert_eq!(TokenCodec::decode(&long, &resolver(), now()).await, Err(TokenError::Length));
}

#[tokio::test]
async fn unknown_version_byte_rejects() {
    let bytes = [0x7fu8; 34];
    let token = URL_SAFE_NO_PAD.encode(bytes);
    assert_eq!(
        TokenCodec::decode(&token, &resolver(), now()).await,
        Err(TokenError::UnknownVersion),
    );
}

#[tokio::test]
async fn undefined_permission_bits_reject() {
    let token = TokenCodec::encode(
        TokenVersion::V2,
        resource(),
        TokenPermissions::READ,
        author(),
        expiry(),
        &secret(),
    )
    .unwrap();
    let mut bytes = URL_SAFE_NO_PAD.decode(&token).unwrap();
    bytes[9] = 0b1000_0001;
    let tampered = URL_SAFE_NO_PAD.encode(&bytes);
    assert_eq!(
        TokenCodec::decode(&tampered, &resolver(), now()).await,
        Err(TokenError::Malformed),
    );
}

#[tokio::test]
async fn degenerate_token_text_rejects() {
    assert_eq!(TokenCodec::decode("", &resolver(), now()).await, Err(TokenError::Malformed));
    let oversized = "A".repeat(2_048);
    assert_eq!(
        TokenCodec::decode(&oversized, &resolver(), now()).await,
        Err(TokenError::Malformed),
    );
    assert_eq!(
        TokenCodec::decode("not base64 !!", &resolver(), now()).await,
        Err(TokenError::Malformed),
    );
}

#[tokio::test]
async fn v3_encode_rejects_out_of_range_expiry() {
    let far = Timestamp::from_unix_seconds(0x00ff_ffff * 3_600 + 3_600);
    let result = TokenCodec::encode(
        TokenVersion::V3,
        resource(),
        TokenPermissions::READ,
        author(),
        far,
        &secret(),
    );
    assert!(matches!(result, Err(TokenError::NotEncodable(_))));
}
