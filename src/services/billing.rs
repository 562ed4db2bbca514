//! Billing and identity webhooks — signature verification and event handling.
//!
//! DESIGN
//! ======
//! Webhooks carry no bearer token; the HMAC signature is the authentication.
//! Stripe signs `"{t}.{payload}"` with a hex signature in `Stripe-Signature`;
//! Clerk uses the svix scheme, signing `"{id}.{timestamp}.{payload}"` with a
//! base64 signature and a `whsec_`-prefixed base64 secret. Both verifiers
//! are pure functions over an explicit clock: constant-time comparison via
//! the `Mac` trait, five-minute timestamp tolerance.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::subscription::{self, NewSubscription, SubscriptionError};

type HmacSha256 = Hmac<Sha256>;

/// Maximum skew between the signed timestamp and our clock.
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("webhook secret not configured")]
    MissingSecret,
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    #[error("malformed event: {0}")]
    BadEvent(String),
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

// =============================================================================
// SIGNATURE VERIFICATION
// =============================================================================

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    s.as_bytes()
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(pair, 16).ok()
        })
        .collect()
}

fn check_tolerance(timestamp: i64, now: OffsetDateTime) -> Result<(), BillingError> {
    if (now.unix_timestamp() - timestamp).abs() > TIMESTAMP_TOLERANCE_SECS {
        return Err(BillingError::InvalidSignature("timestamp outside tolerance".into()));
    }
    Ok(())
}

fn mac_with(secret: &[u8], message: &[u8]) -> Result<HmacSha256, BillingError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|_| BillingError::InvalidSignature("bad secret".into()))?;
    mac.update(message);
    Ok(mac)
}

/// Verify a `Stripe-Signature` header (`t=...,v1=...`) against the raw body.
///
/// # Errors
///
/// `InvalidSignature` for a malformed header, stale timestamp, or no
/// matching `v1` signature.
pub fn verify_stripe_signature(
    secret: &str,
    header: &str,
    payload: &[u8],
    now: OffsetDateTime,
) -> Result<(), BillingError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }
    let timestamp = timestamp
        .ok_or_else(|| BillingError::InvalidSignature("missing timestamp".into()))?;
    check_tolerance(timestamp, now)?;

    let mut signed = format!("{timestamp}.").into_bytes();
    signed.extend_from_slice(payload);

    for signature in signatures {
        let Some(bytes) = hex_decode(signature) else {
            continue;
        };
        if mac_with(secret.as_bytes(), &signed)?.verify_slice(&bytes).is_ok() {
            return Ok(());
        }
    }
    Err(BillingError::InvalidSignature("no matching v1 signature".into()))
}

/// Verify svix-style webhook headers (`svix-id`, `svix-timestamp`,
/// `svix-signature`) against the raw body.
///
/// # Errors
///
/// `InvalidSignature` for a bad secret, stale timestamp, or no matching
/// `v1` signature.
pub fn verify_svix_signature(
    secret: &str,
    msg_id: &str,
    timestamp: &str,
    signature_header: &str,
    payload: &[u8],
    now: OffsetDateTime,
) -> Result<(), BillingError> {
    let key = BASE64
        .decode(secret.strip_prefix("whsec_").unwrap_or(secret))
        .map_err(|_| BillingError::InvalidSignature("bad secret".into()))?;

    let parsed: i64 = timestamp
        .parse()
        .map_err(|_| BillingError::InvalidSignature("bad timestamp".into()))?;
    check_tolerance(parsed, now)?;

    let mut signed = format!("{msg_id}.{timestamp}.").into_bytes();
    signed.extend_from_slice(payload);

    for entry in signature_header.split_whitespace() {
        let Some(("v1", signature)) = entry.split_once(',') else {
            continue;
        };
        let Ok(bytes) = BASE64.decode(signature) else {
            continue;
        };
        if mac_with(&key, &signed)?.verify_slice(&bytes).is_ok() {
            return Ok(());
        }
    }
    Err(BillingError::InvalidSignature("no matching v1 signature".into()))
}

// =============================================================================
// STRIPE EVENTS
// =============================================================================

#[derive(Debug, serde::Deserialize)]
pub struct StripeEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, serde::Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, serde::Deserialize)]
struct StripeSubscription {
    id: String,
    customer: StripeCustomer,
    status: String,
    #[serde(default)]
    cancel_at_period_end: bool,
    #[serde(default)]
    metadata: std::collections::HashMap<String, String>,
    #[serde(default)]
    items: StripeItems,
}

/// The `customer` field is a bare id unless the event was created with the
/// customer expanded. We need the expanded form for the email lookup.
#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum StripeCustomer {
    Id(String),
    Object { id: String, email: Option<String> },
}

#[derive(Debug, Default, serde::Deserialize)]
struct StripeItems {
    #[serde(default)]
    data: Vec<StripeItem>,
}

#[derive(Debug, serde::Deserialize)]
struct StripeItem {
    price: StripePrice,
    current_period_start: Option<i64>,
    current_period_end: Option<i64>,
}

#[derive(Debug, serde::Deserialize)]
struct StripePrice {
    id: String,
}

fn plan_from_subscription(sub: &StripeSubscription) -> String {
    if let Some(item) = sub.items.data.first() {
        match item.price.id.as_str() {
            "price_basic" => return "basic".into(),
            "price_premium" => return "premium".into(),
            "price_pro" => return "pro".into(),
            _ => {}
        }
    }
    sub.metadata.get("plan_type").cloned().unwrap_or_else(|| "basic".into())
}

fn one_month_later(now: OffsetDateTime) -> OffsetDateTime {
    let date = now.date();
    let (year, month) = match date.month() {
        time::Month::December => (date.year() + 1, time::Month::January),
        m => (date.year(), m.next()),
    };
    let day = date.day().min(month.length(year));
    time::Date::from_calendar_date(year, month, day)
        .unwrap_or(date)
        .with_time(now.time())
        .assume_utc()
}

/// Apply one verified Stripe event. Unknown event types are acknowledged
/// and ignored.
///
/// # Errors
///
/// `BadEvent` for payloads that do not parse or lack a customer email,
/// subscription errors, or a database error.
pub async fn handle_stripe_event(pool: &PgPool, payload: &[u8]) -> Result<(), BillingError> {
    let event: StripeEvent = serde_json::from_slice(payload)
        .map_err(|e| BillingError::BadEvent(e.to_string()))?;

    match event.event_type.as_str() {
        "customer.subscription.created" => {
            let sub: StripeSubscription = serde_json::from_value(event.data.object)
                .map_err(|e| BillingError::BadEvent(e.to_string()))?;
            let (customer_id, email) = match &sub.customer {
                StripeCustomer::Object { id, email: Some(email) } => (id.clone(), email.clone()),
                _ => {
                    return Err(BillingError::BadEvent(
                        "event does not carry the customer email".into(),
                    ));
                }
            };

            let now = OffsetDateTime::now_utc();
            let (period_start, period_end) = match sub.items.data.first() {
                Some(StripeItem {
                    current_period_start: Some(start),
                    current_period_end: Some(end),
                    ..
                }) => (
                    OffsetDateTime::from_unix_timestamp(*start)
                        .map_err(|e| BillingError::BadEvent(e.to_string()))?,
                    OffsetDateTime::from_unix_timestamp(*end)
                        .map_err(|e| BillingError::BadEvent(e.to_string()))?,
                ),
                _ => (now, one_month_later(now)),
            };

            let record = NewSubscription {
                email,
                stripe_subscription_id: sub.id.clone(),
                stripe_customer_id: customer_id,
                status: sub.status.clone(),
                plan_type: plan_from_subscription(&sub),
                current_period_start: period_start,
                current_period_end: period_end,
                cancel_at_period_end: sub.cancel_at_period_end,
            };
            subscription::create_subscription(pool, &record).await?;
            Ok(())
        }
        "customer.subscription.deleted" => {
            let sub: StripeSubscription = serde_json::from_value(event.data.object)
                .map_err(|e| BillingError::BadEvent(e.to_string()))?;
            subscription::cancel_subscription(pool, &sub.id).await?;
            Ok(())
        }
        other => {
            tracing::info!(event_type = other, "ignoring unhandled billing event");
            Ok(())
        }
    }
}

// =============================================================================
// CLERK EVENTS
// =============================================================================

#[derive(Debug, serde::Deserialize)]
pub struct ClerkEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: ClerkEventData,
}

#[derive(Debug, serde::Deserialize)]
pub struct ClerkEventData {
    pub id: String,
    #[serde(default)]
    pub email_addresses: Vec<ClerkEmail>,
    #[serde(default)]
    pub first_name: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
pub struct ClerkEmail {
    pub email_address: String,
}

/// Apply one verified Clerk event. Only `user.created` mutates state.
///
/// # Errors
///
/// `BadEvent` for unparseable payloads or a `user.created` without an
/// email address, or a database error.
pub async fn handle_clerk_event(pool: &PgPool, payload: &[u8]) -> Result<(), BillingError> {
    let event: ClerkEvent = serde_json::from_slice(payload)
        .map_err(|e| BillingError::BadEvent(e.to_string()))?;

    if event.event_type != "user.created" {
        tracing::info!(event_type = %event.event_type, "ignoring unhandled identity event");
        return Ok(());
    }

    let Some(email) = event.data.email_addresses.first() else {
        return Err(BillingError::BadEvent("no email address provided".into()));
    };
    let name = event.data.first_name.unwrap_or_default();

    let created = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO users (clerk_id, email, name)
         VALUES ($1, $2, $3)
         ON CONFLICT (clerk_id) DO NOTHING
         RETURNING id",
    )
    .bind(&event.data.id)
    .bind(&email.email_address)
    .bind(&name)
    .fetch_optional(pool)
    .await?;

    match created {
        Some(user_id) => tracing::info!(%user_id, clerk_id = %event.data.id, "user created"),
        None => tracing::warn!(clerk_id = %event.data.id, "replayed user.created event ignored"),
    }
    Ok(())
}

#[cfg(test)]
#[path = "billing_test.rs"]
mod tests;
