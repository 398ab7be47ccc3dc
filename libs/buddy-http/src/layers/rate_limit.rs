use crate::config::RateLimitConfig;
use crate::error::HttpError;
use crate::response::ResponseBody;
use bytes::Bytes;
use governor::middleware::StateInformationMiddleware;
use governor::{DefaultDirectRateLimiter, Quota};
use http::{HeaderMap, Request, Response};
use http_body_util::Full;
use parking_lot::Mutex;
use std::future::Future;
use std::num::NonZeroU32;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Notify;
use tokio::time::Instant;
use tower::{Layer, Service};

/// Requests left in the current quota window
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-rate-limit-remaining";

/// Unix time (seconds) at which the quota window resets
pub const RATE_LIMIT_RESET_HEADER: &str = "x-rate-limit-reset";

/// Replenish interval of a bucket whose quota is exhausted, once the reset passes
const IDLE_POLL: Duration = Duration::from_secs(1);

/// Slowest replenish interval, and longest hold for an exhausted quota
const MAX_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

type Bucket = DefaultDirectRateLimiter<StateInformationMiddleware>;

/// Snapshot of the limiter's current rate and burst
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateBudget {
    /// Tokens per second
    pub rate: f64,
    /// Bucket capacity
    pub burst: u32,
}

struct LimiterState {
    bucket: Arc<Bucket>,
    budget: RateBudget,
    /// No token is released before this instant (quota exhausted)
    resume_at: Option<Instant>,
}

fn bucket(budget: RateBudget) -> Bucket {
    let period = if budget.rate > 0.0 {
        Duration::try_from_secs_f64(budget.rate.recip()).map_or(MAX_PERIOD, |p| p.min(MAX_PERIOD))
    } else {
        IDLE_POLL
    };
    let quota = Quota::with_period(period.max(Duration::from_nanos(1)))
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
        .allow_burst(NonZeroU32::new(budget.burst).unwrap_or(NonZeroU32::MIN));
    governor::RateLimiter::direct(quota).with_middleware::<StateInformationMiddleware>()
}

/// Token-bucket limiter shared by every request of one client.
///
/// Starts from [`RateLimitConfig`] and, when adaptive, re-tunes itself from
/// the quota headers of each response:
///
/// | remaining            | burst                  | rate (tokens/s)          |
/// |----------------------|------------------------|--------------------------|
/// | `<= headroom`        | 1                      | `remaining / seconds`    |
/// | `> headroom`         | `remaining - headroom` | 1                        |
///
/// where `seconds = max(reset - now, 1)`. With nothing remaining the bucket
/// is emptied and the next token is held until the reset instant.
///
/// Each re-tune swaps in a fresh `governor` bucket that keeps the tokens
/// already spent; waiters on the old bucket move over to the new one. The
/// lock is only taken for bookkeeping, waits happen outside it.
pub struct RateLimiter {
    state: Mutex<LimiterState>,
    swapped: Notify,
    adaptive: bool,
    headroom: u64,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: &RateLimitConfig) -> Self {
        let budget = RateBudget {
            rate: config.initial_rate.max(0.0),
            burst: config.initial_burst,
        };
        Self {
            state: Mutex::new(LimiterState {
                bucket: Arc::new(bucket(budget)),
                budget,
                resume_at: None,
            }),
            swapped: Notify::new(),
            adaptive: config.adaptive,
            headroom: config.headroom,
        }
    }

    /// Current rate and burst
    #[must_use]
    pub fn budget(&self) -> RateBudget {
        self.state.lock().budget
    }

    /// Take a token if one is available right now
    #[must_use]
    pub fn try_acquire(&self) -> bool {
        let state = self.state.lock();
        if state.resume_at.is_some_and(|resume_at| Instant::now() < resume_at) {
            return false;
        }
        state.bucket.check().is_ok()
    }

    /// Wait for and consume one token.
    ///
    /// Dropping the returned future leaves the bucket untouched.
    pub async fn acquire(&self) {
        loop {
            let swapped = self.swapped.notified();
            let (bucket, resume_at) = {
                let state = self.state.lock();
                (Arc::clone(&state.bucket), state.resume_at)
            };

            if let Some(resume_at) = resume_at
                && Instant::now() < resume_at
            {
                tracing::trace!(
                    wait_ms = resume_at.saturating_duration_since(Instant::now()).as_millis(),
                    "rate limiter holding until quota reset"
                );
                tokio::select! {
                    () = tokio::time::sleep_until(resume_at) => {}
                    () = swapped => {}
                }
                continue;
            }

            tokio::select! {
                snapshot = bucket.until_ready() => {
                    tracing::trace!(
                        remaining_burst = snapshot.remaining_burst_capacity(),
                        "rate limiter token taken"
                    );
                    return;
                }
                () = swapped => {}
            }
        }
    }

    /// Re-tune from response headers. No-op unless both quota headers parse.
    pub fn observe(&self, headers: &HeaderMap) {
        if !self.adaptive {
            return;
        }
        if let Some((remaining, reset)) = parse_quota(headers) {
            self.apply_quota(remaining, reset, unix_now());
        }
    }

    /// Re-tune from a quota report: `remaining` requests until unix time `reset`.
    #[allow(clippy::cast_precision_loss)]
    pub fn apply_quota(&self, remaining: u64, reset: i64, now: i64) {
        let seconds = u64::try_from(reset.saturating_sub(now)).unwrap_or(0).max(1);
        let instant = Instant::now();

        let (budget, resume_at) = if remaining <= self.headroom {
            let budget = RateBudget {
                rate: remaining as f64 / seconds as f64,
                burst: 1,
            };
            let hold = Duration::from_secs(seconds).min(MAX_PERIOD);
            let resume_at = (remaining == 0).then(|| instant + hold);
            (budget, resume_at)
        } else {
            let budget = RateBudget {
                rate: 1.0,
                burst: u32::try_from(remaining - self.headroom).unwrap_or(u32::MAX),
            };
            (budget, None)
        };

        let mut state = self.state.lock();
        let fresh = bucket(budget);
        if resume_at.is_none() {
            // Checking the old bucket spends one of its tokens, hence the +1
            let held = state.resume_at.is_some_and(|at| instant < at);
            let carried = match state.bucket.check() {
                Ok(snapshot) if !held => snapshot.remaining_burst_capacity().saturating_add(1),
                _ => 0,
            };
            if let Some(spent) = NonZeroU32::new(budget.burst - carried.min(budget.burst)) {
                let _ = fresh.check_n(spent);
            }
        }
        *state = LimiterState {
            bucket: Arc::new(fresh),
            budget,
            resume_at,
        };
        drop(state);
        self.swapped.notify_waiters();

        tracing::debug!(
            remaining,
            reset_in_secs = seconds,
            rate = budget.rate,
            burst = budget.burst,
            "rate budget updated from quota headers"
        );
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RateLimiter")
            .field("budget", &state.budget)
            .field("resume_at", &state.resume_at)
            .field("adaptive", &self.adaptive)
            .field("headroom", &self.headroom)
            .finish_non_exhaustive()
    }
}

/// Parse `(remaining, reset)` from the quota headers
#[must_use]
pub fn parse_quota(headers: &HeaderMap) -> Option<(u64, i64)> {
    let remaining = header_number::<u64>(headers, RATE_LIMIT_REMAINING_HEADER)?;
    let reset = header_number::<i64>(headers, RATE_LIMIT_RESET_HEADER)?;
    Some((remaining, reset))
}

/// Time left until the reported quota reset, in whole seconds.
///
/// `Some(ZERO)` when the reset is already in the past.
#[must_use]
pub fn until_reset(headers: &HeaderMap) -> Option<Duration> {
    let reset = header_number::<i64>(headers, RATE_LIMIT_RESET_HEADER)?;
    let seconds = u64::try_from(reset.saturating_sub(unix_now())).unwrap_or(0);
    Some(Duration::from_secs(seconds))
}

fn header_number<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
}

/// Tower layer that takes a token before each attempt and re-tunes from each response
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<RateLimiter>,
}

impl RateLimitLayer {
    #[must_use]
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: Arc::clone(&self.limiter),
        }
    }
}

/// Service produced by [`RateLimitLayer`]
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: Arc<RateLimiter>,
}

impl<S> Service<Request<Full<Bytes>>> for RateLimitService<S>
where
    S: Service<Request<Full<Bytes>>, Response = Response<ResponseBody>, Error = HttpError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
{
    type Response = S::Response;
    type Error = HttpError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let limiter = Arc::clone(&self.limiter);

        Box::pin(async move {
            limiter.acquire().await;
            let response = inner.call(req).await?;
            limiter.observe(response.headers());
            Ok(response)
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(&RateLimitConfig::default())
    }

    #[test]
    fn test_initial_budget() {
        let budget = limiter().budget();
        assert!((budget.rate - 1000.0).abs() < f64::EPSILON);
        assert_eq!(budget.burst, 1000);
    }

    #[tokio::test]
    async fn test_low_quota_throttles_to_single_token() {
        let limiter = limiter();
        limiter.apply_quota(50, 1_000_010, 1_000_000);

        let budget = limiter.budget();
        assert!((budget.rate - 5.0).abs() < f64::EPSILON);
        assert_eq!(budget.burst, 1);
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn test_new_budget_keeps_spent_tokens() {
        let limiter = limiter();
        limiter.apply_quota(150, 1_000_060, 1_000_000);
        let taken = (0..100).take_while(|_| limiter.try_acquire()).count();
        assert_eq!(taken, 50);

        limiter.apply_quota(130, 1_000_060, 1_000_000);
        assert_eq!(limiter.budget().burst, 30);
        assert!(!limiter.try_acquire());
    }

    #[tokio::test]
    async fn test_ample_quota_keeps_headroom() {
        let limiter = limiter();
        limiter.apply_quota(500, 1_000_060, 1_000_000);

        let budget = limiter.budget();
        assert!((budget.rate - 1.0).abs() < f64::EPSILON);
        assert_eq!(budget.burst, 400);
    }

    #[tokio::test]
    async fn test_reset_in_the_past_counts_as_one_second() {
        let limiter = limiter();
        limiter.apply_quota(10, 999_990, 1_000_000);

        let budget = limiter.budget();
        assert!((budget.rate - 10.0).abs() < f64::EPSILON);
        assert_eq!(budget.burst, 1);
    }

    #[tokio::test]
    async fn test_throttled_rate_never_exceeds_quota() {
        let limiter = limiter();
        for remaining in 0..=100_u64 {
            for window in [1_i64, 2, 7, 60, 3600] {
                limiter.apply_quota(remaining, 1_000_000 + window, 1_000_000);
                let budget = limiter.budget();
                #[allow(clippy::cast_precision_loss)]
                let allowed = remaining as f64 + 1e-9;
                #[allow(clippy::cast_precision_loss)]
                let spent = budget.rate * window as f64;
                assert!(spent <= allowed, "remaining={remaining} window={window}");
                assert_eq!(budget.burst, 1);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_quota_holds_until_reset() {
        let limiter = limiter();
        limiter.apply_quota(0, 1_000_002, 1_000_000);
        assert!(limiter.budget().rate.abs() < f64::EPSILON);

        let started = Instant::now();
        limiter.acquire().await;
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_tokens_refill_at_rate() {
        let limiter = RateLimiter::new(&RateLimitConfig::fixed(10.0, 1));

        let started = std::time::Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(180), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(1), "{elapsed:?}");
    }

    #[tokio::test]
    async fn test_dropped_wait_leaves_bucket_untouched() {
        let limiter = RateLimiter::new(&RateLimitConfig::fixed(1.0, 1));
        limiter.acquire().await;
        let before = limiter.budget();

        let waited =
            tokio::time::timeout(Duration::from_millis(100), limiter.acquire()).await;
        assert!(waited.is_err());
        assert_eq!(limiter.budget(), before);
        assert!(!limiter.try_acquire());
    }

    #[tokio::test]
    async fn test_waiter_moves_to_new_budget() {
        let limiter = Arc::new(RateLimiter::new(&RateLimitConfig::default()));
        limiter.apply_quota(0, unix_now() + 3600, unix_now());

        let waiter = tokio::spawn({
            let limiter = Arc::clone(&limiter);
            async move { limiter.acquire().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        limiter.apply_quota(500, unix_now() + 60, unix_now());
        tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_observe_requires_both_headers() {
        let limiter = limiter();
        let mut headers = HeaderMap::new();
        headers.insert(RATE_LIMIT_REMAINING_HEADER, "5".parse().unwrap());
        limiter.observe(&headers);
        assert_eq!(limiter.budget().burst, 1000);

        headers.insert(RATE_LIMIT_RESET_HEADER, "not-a-number".parse().unwrap());
        limiter.observe(&headers);
        assert_eq!(limiter.budget().burst, 1000);
    }

    #[test]
    fn test_fixed_limiter_ignores_headers() {
        let limiter = RateLimiter::new(&RateLimitConfig::fixed(3.0, 3));
        let mut headers = HeaderMap::new();
        headers.insert(RATE_LIMIT_REMAINING_HEADER, "5".parse().unwrap());
        headers.insert(RATE_LIMIT_RESET_HEADER, "1".parse().unwrap());
        limiter.observe(&headers);
        assert_eq!(limiter.budget().burst, 3);
    }

    #[test]
    fn test_until_reset() {
        let mut headers = HeaderMap::new();
        assert_eq!(until_reset(&headers), None);

        headers.insert(RATE_LIMIT_RESET_HEADER, "0".parse().unwrap());
        assert_eq!(until_reset(&headers), Some(Duration::ZERO));

        let future = (unix_now() + 30).to_string();
        headers.insert(RATE_LIMIT_RESET_HEADER, future.parse().unwrap());
        let wait = until_reset(&headers).unwrap();
        assert!(wait >= Duration::from_secs(29) && wait <= Duration::from_secs(30));
    }
}
