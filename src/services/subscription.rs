//! Subscription service — plan resolution and webhook-driven row lifecycle.

use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::rate_limit::Plan;

#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    #[error("no user with email {0}")]
    UnknownEmail(String),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Resolve the caller's effective plan. Among non-deleted subscriptions with
/// `status = 'active'` and an unexpired period, the highest tier wins.
/// Falls back to [`Plan::None`] on no match or query failure, so a broken
/// subscriptions table degrades users to free limits instead of erroring.
pub async fn resolve_plan(pool: &PgPool, user_id: Uuid) -> Plan {
    let result = sqlx::query_scalar::<_, String>(
        "SELECT plan_type FROM subscriptions
         WHERE user_id = $1
           AND status = 'active'
           AND current_period_end > now()
           AND deleted_at IS NULL",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await;

    match result {
        Ok(plan_types) => plan_types
            .iter()
            .map(|p| Plan::from_plan_type(p))
            .max()
            .unwrap_or(Plan::None),
        Err(e) => {
            tracing::warn!(error = %e, %user_id, "plan lookup failed, treating as free tier");
            Plan::None
        }
    }
}

/// A subscription as reported by a billing webhook event.
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub email: String,
    pub stripe_subscription_id: String,
    pub stripe_customer_id: String,
    pub status: String,
    pub plan_type: String,
    pub current_period_start: OffsetDateTime,
    pub current_period_end: OffsetDateTime,
    pub cancel_at_period_end: bool,
}

/// Insert a subscription row for the user owning `email`.
///
/// # Errors
///
/// Returns `UnknownEmail` if no user row matches, or a database error.
pub async fn create_subscription(
    pool: &PgPool,
    sub: &NewSubscription,
) -> Result<Uuid, SubscriptionError> {
    let user_id = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM users WHERE email = $1 AND deleted_at IS NULL",
    )
    .bind(&sub.email)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| SubscriptionError::UnknownEmail(sub.email.clone()))?;

    let id = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO subscriptions
             (user_id, email, stripe_subscription_id, stripe_customer_id, status,
              plan_type, current_period_start, current_period_end, cancel_at_period_end)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         ON CONFLICT (stripe_subscription_id) DO UPDATE SET
             status = EXCLUDED.status,
             plan_type = EXCLUDED.plan_type,
             current_period_start = EXCLUDED.current_period_start,
             current_period_end = EXCLUDED.current_period_end,
             cancel_at_period_end = EXCLUDED.cancel_at_period_end,
             updated_at = now()
         RETURNING id",
    )
    .bind(user_id)
    .bind(&sub.email)
    .bind(&sub.stripe_subscription_id)
    .bind(&sub.stripe_customer_id)
    .bind(&sub.status)
    .bind(&sub.plan_type)
    .bind(sub.current_period_start)
    .bind(sub.current_period_end)
    .bind(sub.cancel_at_period_end)
    .fetch_one(pool)
    .await?;

    tracing::info!(%user_id, subscription_id = %id, plan = %sub.plan_type, "subscription created");
    Ok(id)
}

/// Soft-delete the subscription matching a Stripe subscription id. Missing
/// rows are ignored so replayed deletion events stay idempotent.
///
/// # Errors
///
/// Returns a database error if the update fails.
pub async fn cancel_subscription(
    pool: &PgPool,
    stripe_subscription_id: &str,
) -> Result<(), SubscriptionError> {
    let result = sqlx::query(
        "UPDATE subscriptions
         SET status = 'canceled', canceled_at = now(), deleted_at = now(), updated_at = now()
         WHERE stripe_subscription_id = $1 AND deleted_at IS NULL",
    )
    .bind(stripe_subscription_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        tracing::warn!(stripe_subscription_id, "deletion event for unknown subscription");
    } else {
        tracing::info!(stripe_subscription_id, "subscription canceled");
    }
    Ok(())
}
