//! Redis-backed quota store.
//!
//! DESIGN
//! ======
//! Two counters per user and endpoint group: an hourly sliding window kept
//! as a sorted set of request timestamps, and a calendar-month counter kept
//! as a plain integer. Both check-and-count operations run as Lua scripts
//! so concurrent requests cannot admit past the limit. A rejected request
//! never increments either counter.
//!
//! The store exposes the narrow [`QuotaOps`] trait so the admission policy
//! in `rate_limit` can be tested against an in-memory mock.

use async_trait::async_trait;
use rand::Rng as _;
use redis::Script;
use redis::aio::ConnectionManager;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum QuotaError {
    #[error("REDIS_URL not set")]
    MissingUrl,
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

// =============================================================================
// QUOTA OPS TRAIT
// =============================================================================

/// Outcome of an admission attempt against one counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admit {
    pub allowed: bool,
    /// Usage after this attempt. Unchanged from before when rejected.
    pub count: i64,
}

/// Atomic check-and-count operations against the quota store.
#[async_trait]
pub trait QuotaOps: Send + Sync {
    /// Admit into a one-hour sliding window capped at `limit`.
    async fn admit_hourly(&self, key: &str, limit: i64, now_ms: i64) -> Result<Admit, QuotaError>;

    /// Admit into a monthly counter capped at `limit` (0 means unlimited).
    /// `ttl_secs` sets expiry when the counter is first created.
    async fn admit_monthly(&self, key: &str, limit: i64, ttl_secs: i64)
    -> Result<Admit, QuotaError>;
}

// =============================================================================
// REDIS IMPLEMENTATION
// =============================================================================

const WINDOW_MS: i64 = 3_600_000;
// Sorted sets linger past the window so a dormant key still expires.
const HOURLY_KEY_TTL_SECS: i64 = 7_200;

// KEYS[1] window set; ARGV: now_ms, window_ms, limit, member, ttl_secs.
// Returns {allowed, count_after}.
const HOURLY_SCRIPT: &str = r"
local cutoff = tonumber(ARGV[1]) - tonumber(ARGV[2])
redis.call('ZREMRANGEBYSCORE', KEYS[1], '-inf', cutoff)
local count = redis.call('ZCARD', KEYS[1])
if count < tonumber(ARGV[3]) then
    redis.call('ZADD', KEYS[1], ARGV[1], ARGV[4])
    redis.call('EXPIRE', KEYS[1], ARGV[5])
    return {1, count + 1}
end
return {0, count}
";

// KEYS[1] month counter; ARGV: limit (0 = unlimited), ttl_secs.
// Returns {allowed, count_after}.
const MONTHLY_SCRIPT: &str = r"
local limit = tonumber(ARGV[1])
local count = tonumber(redis.call('GET', KEYS[1]) or '0')
if limit == 0 or count < limit then
    local after = redis.call('INCR', KEYS[1])
    if after == 1 then
        redis.call('EXPIRE', KEYS[1], ARGV[2])
    end
    return {1, after}
end
return {0, count}
";

pub struct RedisQuota {
    conn: ConnectionManager,
    hourly: Script,
    monthly: Script,
}

impl RedisQuota {
    /// Connect using the `REDIS_URL` environment variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is unset or the connection fails.
    pub async fn from_env() -> Result<Self, QuotaError> {
        let url = std::env::var("REDIS_URL").map_err(|_| QuotaError::MissingUrl)?;
        Self::connect(&url).await
    }

    /// # Errors
    ///
    /// Returns an error if the Redis connection cannot be established.
    pub async fn connect(url: &str) -> Result<Self, QuotaError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            hourly: Script::new(HOURLY_SCRIPT),
            monthly: Script::new(MONTHLY_SCRIPT),
        })
    }
}

#[async_trait]
impl QuotaOps for RedisQuota {
    async fn admit_hourly(&self, key: &str, limit: i64, now_ms: i64) -> Result<Admit, QuotaError> {
        // Random suffix keeps members unique when two requests land in the
        // same millisecond.
        let member = format!("{now_ms}-{}", rand::rng().random::<u32>());
        let mut conn = self.conn.clone();
        let (allowed, count): (i64, i64) = self
            .hourly
            .key(key)
            .arg(now_ms)
            .arg(WINDOW_MS)
            .arg(limit)
            .arg(member)
            .arg(HOURLY_KEY_TTL_SECS)
            .invoke_async(&mut conn)
            .await?;
        Ok(Admit { allowed: allowed == 1, count })
    }

    async fn admit_monthly(
        &self,
        key: &str,
        limit: i64,
        ttl_secs: i64,
    ) -> Result<Admit, QuotaError> {
        let mut conn = self.conn.clone();
        let (allowed, count): (i64, i64) = self
            .monthly
            .key(key)
            .arg(limit)
            .arg(ttl_secs)
            .invoke_async(&mut conn)
            .await?;
        Ok(Admit { allowed: allowed == 1, count })
    }
}
