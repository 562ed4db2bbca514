use super::*;

use base64::Engine as _;
use time::macros::datetime;

const NOW: OffsetDateTime = datetime!(2026-08-28 12:00:00 UTC);

fn stripe_sign(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mut signed = format!("{timestamp}.").into_bytes();
    signed.extend_from_slice(payload);
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(&signed);
    mac.finalize()
        .into_bytes()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn svix_sign(key: &[u8], msg_id: &str, timestamp: &str, payload: &[u8]) -> String {
    let mut signed = format!("{msg_id}.{timestamp}.").into_bytes();
    signed.extend_from_slice(payload);
    let mut mac = HmacSha256::new_from_slice(key).unwrap();
    mac.update(&signed);
    BASE64.encode(mac.finalize().into_bytes())
}

// =============================================================================
// hex_decode
// =============================================================================

#[test]
fn hex_decode_round_trip() {
    assert_eq!(hex_decode("deadbeef"), Some(vec![0xde, 0xad, 0xbe, 0xef]));
}

#[test]
fn hex_decode_rejects_odd_length() {
    assert_eq!(hex_decode("abc"), None);
}

#[test]
fn hex_decode_rejects_non_hex() {
    assert_eq!(hex_decode("zz"), None);
}

#[test]
fn hex_decode_rejects_multi_byte_utf8() {
    // "éé" is four bytes but two chars; must reject, not panic mid-char.
    assert_eq!(hex_decode("éé"), None);
}

// =============================================================================
// verify_stripe_signature
// =============================================================================

#[test]
fn stripe_signature_accepts_valid_header() {
    let payload = br#"{"type":"customer.subscription.created"}"#;
    let timestamp = NOW.unix_timestamp();
    let signature = stripe_sign("whsec_test", timestamp, payload);
    let header = format!("t={timestamp},v1={signature}");

    verify_stripe_signature("whsec_test", &header, payload, NOW).expect("should verify");
}

#[test]
fn stripe_signature_rejects_wrong_secret() {
    let payload = b"payload";
    let timestamp = NOW.unix_timestamp();
    let signature = stripe_sign("other_secret", timestamp, payload);
    let header = format!("t={timestamp},v1={signature}");

    let err = verify_stripe_signature("whsec_test", &header, payload, NOW)
        .expect_err("should reject");
    assert!(matches!(err, BillingError::InvalidSignature(_)));
}

#[test]
fn stripe_signature_rejects_tampered_payload() {
    let timestamp = NOW.unix_timestamp();
    let signature = stripe_sign("whsec_test", timestamp, b"original");
    let header = format!("t={timestamp},v1={signature}");

    assert!(verify_stripe_signature("whsec_test", &header, b"tampered", NOW).is_err());
}

#[test]
fn stripe_signature_rejects_stale_timestamp() {
    let payload = b"payload";
    let timestamp = NOW.unix_timestamp() - TIMESTAMP_TOLERANCE_SECS - 1;
    let signature = stripe_sign("whsec_test", timestamp, payload);
    let header = format!("t={timestamp},v1={signature}");

    assert!(verify_stripe_signature("whsec_test", &header, payload, NOW).is_err());
}

#[test]
fn stripe_signature_accepts_any_matching_v1() {
    let payload = b"payload";
    let timestamp = NOW.unix_timestamp();
    let good = stripe_sign("whsec_test", timestamp, payload);
    let header = format!("t={timestamp},v1=00ff,v1={good}");

    verify_stripe_signature("whsec_test", &header, payload, NOW).expect("should verify");
}

#[test]
fn stripe_signature_rejects_missing_timestamp() {
    let err = verify_stripe_signature("whsec_test", "v1=00ff", b"payload", NOW)
        .expect_err("should reject");
    assert!(matches!(err, BillingError::InvalidSignature(_)));
}

// =============================================================================
// verify_svix_signature
// =============================================================================

#[test]
fn svix_signature_accepts_valid_header() {
    let key = b"0123456789abcdef0123456789abcdef";
    let secret = format!("whsec_{}", BASE64.encode(key));
    let payload = br#"{"type":"user.created"}"#;
    let timestamp = NOW.unix_timestamp().to_string();
    let signature = svix_sign(key, "msg_1", &timestamp, payload);
    let header = format!("v1,{signature}");

    verify_svix_signature(&secret, "msg_1", &timestamp, &header, payload, NOW)
        .expect("should verify");
}

#[test]
fn svix_signature_rejects_wrong_message_id() {
    let key = b"0123456789abcdef0123456789abcdef";
    let secret = format!("whsec_{}", BASE64.encode(key));
    let payload = b"payload";
    let timestamp = NOW.unix_timestamp().to_string();
    let signature = svix_sign(key, "msg_1", &timestamp, payload);
    let header = format!("v1,{signature}");

    assert!(
        verify_svix_signature(&secret, "msg_2", &timestamp, &header, payload, NOW).is_err()
    );
}

#[test]
fn svix_signature_skips_unknown_versions() {
    let key = b"0123456789abcdef0123456789abcdef";
    let secret = format!("whsec_{}", BASE64.encode(key));
    let payload = b"payload";
    let timestamp = NOW.unix_timestamp().to_string();
    let signature = svix_sign(key, "msg_1", &timestamp, payload);
    let header = format!("v2,bogus v1,{signature}");

    verify_svix_signature(&secret, "msg_1", &timestamp, &header, payload, NOW)
        .expect("should verify");
}

#[test]
fn svix_signature_rejects_bad_timestamp() {
    let key = b"0123456789abcdef0123456789abcdef";
    let secret = format!("whsec_{}", BASE64.encode(key));
    let err = verify_svix_signature(&secret, "msg_1", "not-a-number", "v1,sig", b"x", NOW)
        .expect_err("should reject");
    assert!(matches!(err, BillingError::InvalidSignature(_)));
}

// =============================================================================
// plan_from_subscription
// =============================================================================

fn subscription_json(price_id: Option<&str>, metadata_plan: Option<&str>) -> StripeSubscription {
    let mut object = serde_json::json!({
        "id": "sub_1",
        "customer": "cus_1",
        "status": "active",
    });
    if let Some(price_id) = price_id {
        object["items"] = serde_json::json!({
            "data": [{
                "price": { "id": price_id },
                "current_period_start": null,
                "current_period_end": null,
            }]
        });
    }
    if let Some(plan) = metadata_plan {
        object["metadata"] = serde_json::json!({ "plan_type": plan });
    }
    serde_json::from_value(object).expect("fixture should deserialize")
}

#[test]
fn plan_from_known_price_ids() {
    assert_eq!(plan_from_subscription(&subscription_json(Some("price_basic"), None)), "basic");
    assert_eq!(plan_from_subscription(&subscription_json(Some("price_premium"), None)), "premium");
    assert_eq!(plan_from_subscription(&subscription_json(Some("price_pro"), None)), "pro");
}

#[test]
fn plan_falls_back_to_metadata_for_unknown_price() {
    let sub = subscription_json(Some("price_custom"), Some("premium"));
    assert_eq!(plan_from_subscription(&sub), "premium");
}

#[test]
fn plan_defaults_to_basic() {
    assert_eq!(plan_from_subscription(&subscription_json(None, None)), "basic");
}

// =============================================================================
// one_month_later
// =============================================================================

#[test]
fn one_month_later_plain_case() {
    assert_eq!(
        one_month_later(datetime!(2026-08-15 10:00:00 UTC)),
        datetime!(2026-09-15 10:00:00 UTC)
    );
}

#[test]
fn one_month_later_clamps_day_to_month_length() {
    assert_eq!(
        one_month_later(datetime!(2026-01-31 10:00:00 UTC)),
        datetime!(2026-02-28 10:00:00 UTC)
    );
}

#[test]
fn one_month_later_december_rolls_year() {
    assert_eq!(
        one_month_later(datetime!(2026-12-15 10:00:00 UTC)),
        datetime!(2027-01-15 10:00:00 UTC)
    );
}

// =============================================================================
// event parsing
// =============================================================================

#[test]
fn stripe_customer_accepts_bare_id() {
    let sub: StripeSubscription = serde_json::from_value(serde_json::json!({
        "id": "sub_1",
        "customer": "cus_1",
        "status": "active",
    }))
    .expect("should deserialize");
    assert!(matches!(sub.customer, StripeCustomer::Id(ref id) if id == "cus_1"));
}

#[test]
fn stripe_customer_accepts_expanded_object() {
    let sub: StripeSubscription = serde_json::from_value(serde_json::json!({
        "id": "sub_1",
        "customer": { "id": "cus_1", "email": "user@example.com" },
        "status": "active",
    }))
    .expect("should deserialize");
    assert!(matches!(
        sub.customer,
        StripeCustomer::Object { ref email, .. } if email.as_deref() == Some("user@example.com")
    ));
}

#[test]
fn clerk_event_reads_first_email() {
    let event: ClerkEvent = serde_json::from_slice(
        br#"{
            "type": "user.created",
            "data": {
                "id": "user_2abc",
                "email_addresses": [
                    { "email_address": "first@example.com" },
                    { "email_address": "second@example.com" }
                ],
                "first_name": "Ada"
            }
        }"#,
    )
    .expect("should deserialize");
    assert_eq!(event.event_type, "user.created");
    assert_eq!(event.data.email_addresses[0].email_address, "first@example.com");
    assert_eq!(event.data.first_name.as_deref(), Some("Ada"));
}

#[test]
fn clerk_event_tolerates_missing_optional_fields() {
    let event: ClerkEvent = serde_json::from_slice(
        br#"{ "type": "user.deleted", "data": { "id": "user_2abc" } }"#,
    )
    .expect("should deserialize");
    assert!(event.data.email_addresses.is_empty());
    assert!(event.data.first_name.is_none());
}
