use super::*;

use base64::Engine as _;

fn make_token(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{payload}.signature")
}

// =============================================================================
// decode_claims
// =============================================================================

#[test]
fn decode_claims_reads_sub_and_sid() {
    let token = make_token(&serde_json::json!({
        "sub": "user_2abc",
        "sid": "sess_9xyz",
        "exp": 1_790_000_000u64,
    }));
    let claims = decode_claims(&token).expect("valid token should decode");
    assert_eq!(claims.sub, "user_2abc");
    assert_eq!(claims.sid, "sess_9xyz");
}

#[test]
fn decode_claims_rejects_two_segments() {
    let err = decode_claims("header.payload").expect_err("should reject");
    assert!(matches!(err, AuthError::InvalidToken(_)));
}

#[test]
fn decode_claims_rejects_four_segments() {
    let err = decode_claims("a.b.c.d").expect_err("should reject");
    assert!(matches!(err, AuthError::InvalidToken(_)));
}

#[test]
fn decode_claims_rejects_bad_base64() {
    let err = decode_claims("head.!!!not-base64!!!.sig").expect_err("should reject");
    assert!(matches!(err, AuthError::InvalidToken(_)));
}

#[test]
fn decode_claims_rejects_missing_sid() {
    let token = make_token(&serde_json::json!({ "sub": "user_2abc" }));
    let err = decode_claims(&token).expect_err("should reject");
    assert!(matches!(err, AuthError::InvalidToken(_)));
}

#[test]
fn decode_claims_rejects_non_json_payload() {
    let payload = URL_SAFE_NO_PAD.encode(b"plain text");
    let err = decode_claims(&format!("head.{payload}.sig")).expect_err("should reject");
    assert!(matches!(err, AuthError::InvalidToken(_)));
}

// =============================================================================
// bearer_token
// =============================================================================

fn request_with_auth(value: Option<&str>) -> Request {
    let mut builder = axum::http::Request::builder().uri("/api/decks");
    if let Some(value) = value {
        builder = builder.header(axum::http::header::AUTHORIZATION, value);
    }
    builder.body(axum::body::Body::empty()).expect("request should build")
}

#[test]
fn bearer_token_strips_prefix() {
    let request = request_with_auth(Some("Bearer abc123"));
    assert_eq!(bearer_token(&request).as_deref(), Some("abc123"));
}

#[test]
fn bearer_token_trims_whitespace() {
    let request = request_with_auth(Some("Bearer   abc123  "));
    assert_eq!(bearer_token(&request).as_deref(), Some("abc123"));
}

#[test]
fn bearer_token_rejects_missing_header() {
    let request = request_with_auth(None);
    assert!(bearer_token(&request).is_none());
}

#[test]
fn bearer_token_rejects_wrong_scheme() {
    let request = request_with_auth(Some("Basic abc123"));
    assert!(bearer_token(&request).is_none());
}

#[test]
fn bearer_token_rejects_empty_token() {
    let request = request_with_auth(Some("Bearer    "));
    assert!(bearer_token(&request).is_none());
}
