//! Plan-based quota enforcement for AI endpoints.
//!
//! DESIGN
//! ======
//! Every AI request passes two counters in the quota store: a monthly cap
//! (free tier only) and an hourly sliding window sized by the caller's
//! subscription plan. The monthly check runs first; a rejection there never
//! touches the hourly window. Both checks fail closed: if the store is
//! unreachable the request is refused with 503 rather than admitted
//! unmetered.
//!
//! The admission policy lives in [`admit`], which depends only on the
//! [`QuotaOps`] trait and an explicit clock so it can be tested against an
//! in-memory mock. The Axum middleware wraps it with plan lookup and
//! response headers.

use axum::Extension;
use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use time::{Date, Month, OffsetDateTime};

use crate::error::ApiError;
use crate::quota::QuotaOps;
use crate::services::auth::CurrentUser;
use crate::services::subscription;
use crate::state::AppState;

// =============================================================================
// PLANS
// =============================================================================

/// Subscription plan, ordered by tier so the highest active plan wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Plan {
    None,
    Basic,
    Premium,
    Pro,
}

impl Plan {
    #[must_use]
    pub fn from_plan_type(plan_type: &str) -> Self {
        match plan_type {
            "basic" => Self::Basic,
            "premium" => Self::Premium,
            "pro" => Self::Pro,
            _ => Self::None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Basic => "basic",
            Self::Premium => "premium",
            Self::Pro => "pro",
        }
    }

    #[must_use]
    pub fn hourly_limit(self) -> i64 {
        match self {
            Self::None => 5,
            Self::Basic => 10,
            Self::Premium => 50,
            Self::Pro => 200,
        }
    }

    /// Monthly cap. 0 means unlimited.
    #[must_use]
    pub fn monthly_limit(self) -> i64 {
        match self {
            Self::None => 50,
            _ => 0,
        }
    }

    #[must_use]
    pub fn upgrade_message(self) -> &'static str {
        match self {
            Self::None => {
                "Consider subscribing to Basic plan for 10 requests/hour, \
                 Premium for 50 requests/hour, or Pro for 200 requests/hour"
            }
            Self::Basic => "Upgrade to Premium for 50 requests/hour or Pro for 200 requests/hour",
            Self::Premium => "Upgrade to Pro for 200 requests/hour",
            Self::Pro => "",
        }
    }
}

// =============================================================================
// CLOCK MATH
// =============================================================================

/// Unix seconds of the next clock-hour boundary.
#[must_use]
pub fn next_hour_start(now: OffsetDateTime) -> i64 {
    (now.unix_timestamp() / 3600 + 1) * 3600
}

/// First instant of the next calendar month, UTC.
#[must_use]
pub fn next_month_start(now: OffsetDateTime) -> OffsetDateTime {
    let date = now.date();
    let (year, month) = match date.month() {
        Month::December => (date.year() + 1, Month::January),
        m => (date.year(), m.next()),
    };
    // Day 1 of a real month is always constructible; fall back rather than panic.
    Date::from_calendar_date(year, month, 1)
        .unwrap_or(date)
        .midnight()
        .assume_utc()
}

/// Month segment for the monthly counter key, e.g. `"2026-08"`.
#[must_use]
pub fn month_key(now: OffsetDateTime) -> String {
    format!("{:04}-{:02}", now.date().year(), now.date().month() as u8)
}

// =============================================================================
// ADMISSION
// =============================================================================

/// Quota usage for one counter, reported in response headers.
#[derive(Debug, Clone, Copy)]
pub struct CounterAllowance {
    pub limit: i64,
    pub remaining: i64,
    pub reset: i64,
}

/// Header values for whichever checks ran, reported on admitted and denied
/// responses alike.
#[derive(Debug, Clone, Copy, Default)]
pub struct Allowance {
    /// `None` when the hourly check did not run (a monthly rejection).
    pub hourly: Option<CounterAllowance>,
    /// `None` when the plan has no monthly cap.
    pub monthly: Option<CounterAllowance>,
}

/// Outcome of a refused admission.
#[derive(Debug)]
pub enum AdmitError {
    /// The quota store could not be reached.
    Store(ApiError),
    /// A counter is exhausted. `allowance` still carries the header values
    /// for the checks that ran.
    Limited { allowance: Allowance, error: ApiError },
}

/// Run the monthly then hourly checks for one request.
///
/// # Errors
///
/// `AdmitError::Limited` when either counter is exhausted, with the header
/// values alongside the 429, and `AdmitError::Store` when the quota store
/// cannot be reached.
pub async fn admit(
    quota: &dyn QuotaOps,
    clerk_id: &str,
    endpoint: &str,
    plan: Plan,
    now: OffsetDateTime,
) -> Result<Allowance, AdmitError> {
    let store_down = |e: crate::quota::QuotaError| {
        tracing::error!(error = %e, "quota store unreachable");
        AdmitError::Store(ApiError::StoreUnavailable(
            "rate limiting unavailable, request refused".into(),
        ))
    };

    let mut allowance = Allowance::default();

    let monthly_limit = plan.monthly_limit();
    if monthly_limit > 0 {
        let key = format!("rate_limit:monthly:v1:{clerk_id}:{endpoint}:{}", month_key(now));
        let reset = next_month_start(now).unix_timestamp();
        let ttl = reset - now.unix_timestamp();
        let admit = quota
            .admit_monthly(&key, monthly_limit, ttl.max(1))
            .await
            .map_err(store_down)?;
        allowance.monthly = Some(CounterAllowance {
            limit: monthly_limit,
            remaining: (monthly_limit - admit.count).max(0),
            reset,
        });
        if !admit.allowed {
            return Err(AdmitError::Limited {
                allowance,
                error: ApiError::RateLimited {
                    message: format!(
                        "You have exceeded the monthly limit of {monthly_limit} requests for free tier"
                    ),
                    retry_after: reset - now.unix_timestamp(),
                    current_plan: plan.as_str().into(),
                    upgrade_message: "Upgrade to a paid plan for unlimited monthly usage".into(),
                },
            });
        }
    }

    let hourly_limit = plan.hourly_limit();
    let key = format!("rate_limit:v1:{clerk_id}:{endpoint}:1h");
    let reset = next_hour_start(now);
    let admit = quota
        .admit_hourly(&key, hourly_limit, now.unix_timestamp() * 1000)
        .await
        .map_err(store_down)?;
    allowance.hourly = Some(CounterAllowance {
        limit: hourly_limit,
        remaining: (hourly_limit - admit.count).max(0),
        reset,
    });
    if !admit.allowed {
        return Err(AdmitError::Limited {
            allowance,
            error: ApiError::RateLimited {
                message: format!(
                    "You have exceeded the hourly limit of {hourly_limit} requests for {} plan",
                    plan.as_str()
                ),
                retry_after: reset - now.unix_timestamp(),
                current_plan: plan.as_str().into(),
                upgrade_message: plan.upgrade_message().into(),
            },
        });
    }

    Ok(allowance)
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

/// Per-route quota middleware. Layered with
/// `from_fn_with_state((state, endpoint_tag), quota_middleware)` inside the
/// auth middleware, which supplies the [`CurrentUser`] extension.
pub async fn quota_middleware(
    State((state, endpoint)): State<(AppState, &'static str)>,
    Extension(user): Extension<CurrentUser>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(quota) = state.quota.as_deref() else {
        return Err(ApiError::StoreUnavailable(
            "rate limiting unavailable, request refused".into(),
        ));
    };

    let plan = subscription::resolve_plan(&state.pool, user.id).await;
    let allowance =
        match admit(quota, &user.clerk_id, endpoint, plan, OffsetDateTime::now_utc()).await {
            Ok(allowance) => allowance,
            Err(AdmitError::Limited { allowance, error }) => {
                let mut response = error.into_response();
                apply_headers(&mut response, &allowance);
                return Ok(response);
            }
            Err(AdmitError::Store(error)) => return Err(error),
        };

    let mut response = next.run(request).await;
    apply_headers(&mut response, &allowance);
    Ok(response)
}

fn apply_headers(response: &mut Response, allowance: &Allowance) {
    let headers = response.headers_mut();
    let mut set = |name: &'static str, value: i64| {
        if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
            headers.insert(name, value);
        }
    };
    if let Some(hourly) = allowance.hourly {
        set("x-ratelimit-hourly-limit", hourly.limit);
        set("x-ratelimit-hourly-remaining", hourly.remaining);
        set("x-ratelimit-hourly-reset", hourly.reset);
    }
    if let Some(monthly) = allowance.monthly {
        set("x-ratelimit-monthly-limit", monthly.limit);
        set("x-ratelimit-monthly-remaining", monthly.remaining);
        set("x-ratelimit-monthly-reset", monthly.reset);
    }
}

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
