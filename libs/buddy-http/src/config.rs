use rand::Rng;
use std::time::Duration;

/// Default User-Agent string for HTTP requests
pub const DEFAULT_USER_AGENT: &str = concat!("buddy-http/", env!("CARGO_PKG_VERSION"));

/// Remaining-quota threshold below which the adaptive limiter throttles to burst 1
pub const DEFAULT_RATE_LIMIT_HEADROOM: u64 = 100;

/// Conditions evaluated by the retry engine after an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum RetryTrigger {
    /// Connection-level errors (connection refused, DNS failure, reset, TLS, etc.)
    TransportError,
    /// Single attempt exceeded the per-request timeout
    Timeout,
    /// Specific HTTP status code
    Status(u16),
    /// Error that is never retryable (e.g. caller cancellation)
    NonRetryable,
}

impl RetryTrigger {
    /// HTTP 429 Too Many Requests
    pub const TOO_MANY_REQUESTS: Self = Self::Status(429);
    /// HTTP 500 Internal Server Error
    pub const INTERNAL_SERVER_ERROR: Self = Self::Status(500);
    /// HTTP 503 Service Unavailable
    pub const SERVICE_UNAVAILABLE: Self = Self::Status(503);
}

/// Linear backoff with jitter
///
/// For attempt `n` (1-indexed) the delay is `(min + U[0, max - min]) * n`.
/// The same `min`/`max` pair is the base window for 429 responses, where the
/// server-reported reset time replaces the linear component.
#[derive(Debug, Clone)]
pub struct LinearJitterBackoff {
    /// Lower bound of the per-attempt base delay (default: 700ms)
    pub min: Duration,

    /// Upper bound of the per-attempt base delay (default: 1000ms)
    pub max: Duration,
}

impl Default for LinearJitterBackoff {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(700),
            max: Duration::from_millis(1000),
        }
    }
}

impl LinearJitterBackoff {
    /// Create backoff with custom bounds
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// Create fast backoff for testing (1ms..2ms)
    #[must_use]
    pub fn fast() -> Self {
        Self {
            min: Duration::from_millis(1),
            max: Duration::from_millis(2),
        }
    }

    /// Width of the jitter window. Zero when `max <= min`.
    #[must_use]
    pub fn spread(&self) -> Duration {
        self.max.saturating_sub(self.min)
    }

    /// Uniform random jitter in `[0, max - min]`
    #[must_use]
    pub fn jitter(&self) -> Duration {
        let spread = self.spread();
        if spread.is_zero() {
            return Duration::ZERO;
        }
        let mut rng = rand::rng();
        spread.mul_f64(rng.random_range(0.0..=1.0))
    }

    /// Delay before retry number `attempt` (1-indexed) after a 5xx response
    #[must_use]
    pub fn server_error_delay(&self, attempt: usize) -> Duration {
        let factor = u32::try_from(attempt.max(1)).unwrap_or(u32::MAX);
        (self.min + self.jitter()).saturating_mul(factor)
    }

    /// Delay before retrying a 429 response
    ///
    /// `until_reset` is the server-reported time left until the quota resets, if any.
    /// Result lies in `[max(T, min), max(T, min) + (max - min)]`.
    #[must_use]
    pub fn rate_limited_delay(&self, until_reset: Option<Duration>) -> Duration {
        let floor = until_reset.map_or(self.min, |wait| wait.max(self.min));
        floor + self.jitter()
    }
}

/// Retry policy configuration
///
/// The decision function only looks at the outcome of the last attempt:
/// - 429 and any 5xx are retried for every method, including POST;
/// - connection-level errors and attempt timeouts are terminal unless
///   `retry_transport_errors` is set;
/// - everything else is returned to the caller.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt (default: 5)
    /// Total attempts = 1 (initial) + `max_retries`
    pub max_retries: usize,

    /// Backoff strategy configuration
    pub backoff: LinearJitterBackoff,

    /// Retry connection-level failures and attempt timeouts (default: false)
    ///
    /// The pooled transport already reconnects stale connections on its own,
    /// so by default a transport error surfaces immediately.
    pub retry_transport_errors: bool,

    /// Maximum bytes to drain from response body before retrying on HTTP status.
    /// Draining the body allows connection reuse. Default: 64 KiB.
    pub retry_response_drain_limit: usize,
}

/// Default drain limit for response bodies before retry (64 KiB)
pub const DEFAULT_RETRY_RESPONSE_DRAIN_LIMIT: usize = 64 * 1024;

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff: LinearJitterBackoff::default(),
            retry_transport_errors: false,
            retry_response_drain_limit: DEFAULT_RETRY_RESPONSE_DRAIN_LIMIT,
        }
    }
}

impl RetryConfig {
    /// Create config with no retries
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Default retry cap with millisecond backoff, for tests against mock servers
    #[must_use]
    pub fn fast() -> Self {
        Self {
            backoff: LinearJitterBackoff::fast(),
            ..Default::default()
        }
    }

    /// Check if the given trigger should cause a retry
    #[must_use]
    pub fn should_retry(&self, trigger: RetryTrigger) -> bool {
        match trigger {
            RetryTrigger::Status(code) => code == 429 || code >= 500,
            RetryTrigger::TransportError | RetryTrigger::Timeout => self.retry_transport_errors,
            RetryTrigger::NonRetryable => false,
        }
    }
}

/// Token-bucket rate limit configuration
///
/// The bucket starts at `initial_rate`/`initial_burst` and, when `adaptive` is
/// set, is re-tuned after every response carrying `X-Rate-Limit-Remaining`
/// and `X-Rate-Limit-Reset`.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Initial refill rate in requests per second (default: 1000)
    pub initial_rate: f64,

    /// Initial bucket capacity (default: 1000)
    pub initial_burst: u32,

    /// Follow server-reported quota headers (default: true)
    pub adaptive: bool,

    /// Remaining-quota threshold for aggressive throttling (default: 100)
    pub headroom: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            initial_rate: 1000.0,
            initial_burst: 1000,
            adaptive: true,
            headroom: DEFAULT_RATE_LIMIT_HEADROOM,
        }
    }
}

impl RateLimitConfig {
    /// Fixed budget that ignores response headers
    #[must_use]
    pub fn fixed(rate: f64, burst: u32) -> Self {
        Self {
            initial_rate: rate,
            initial_burst: burst,
            adaptive: false,
            ..Default::default()
        }
    }
}

/// TLS root certificate configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TlsRootConfig {
    /// Use Mozilla's root certificates (webpki-roots, no OS dependency)
    #[default]
    WebPki,
    /// Use OS native root certificate store
    Native,
}

/// Transport security configuration
///
/// Controls whether the client enforces TLS or allows insecure HTTP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportSecurity {
    /// Require TLS for all connections (HTTPS only) - default and recommended
    #[default]
    TlsOnly,
    /// Allow plain HTTP connections (mock servers, on-premises installs)
    AllowInsecureHttp,
}

/// Overall HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Per-attempt timeout (default: 30 seconds)
    ///
    /// The caller's [`CallContext`](crate::CallContext) deadline, when shorter, wins.
    pub request_timeout: Duration,

    /// Maximum response body size in bytes (default: 10 MB)
    pub max_body_size: usize,

    /// User-Agent header value
    pub user_agent: String,

    /// Retry policy configuration
    pub retry: Option<RetryConfig>,

    /// Token-bucket rate limiting
    pub rate_limit: Option<RateLimitConfig>,

    /// Transport security mode (default: `TlsOnly`)
    pub transport: TransportSecurity,

    /// TLS root certificate strategy (default: `WebPki`)
    pub tls_roots: TlsRootConfig,

    /// Skip TLS peer verification entirely (default: false)
    ///
    /// Only for on-premises deployments with self-signed certificates.
    pub danger_accept_invalid_certs: bool,

    /// Buffer capacity for concurrent request handling (default: 1024)
    pub buffer_capacity: usize,

    /// Timeout for idle connections in the pool (default: 90 seconds)
    pub pool_idle_timeout: Option<Duration>,

    /// Maximum number of idle connections per host (default: 100)
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_body_size: 10 * 1024 * 1024, // 10 MB
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            retry: Some(RetryConfig::default()),
            rate_limit: Some(RateLimitConfig::default()),
            transport: TransportSecurity::TlsOnly,
            tls_roots: TlsRootConfig::default(),
            danger_accept_invalid_certs: false,
            buffer_capacity: 1024,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 100,
        }
    }
}

impl HttpClientConfig {
    /// Create configuration for testing with mock servers (allows insecure HTTP)
    ///
    /// Keeps the production retry cap and rate limiter, with millisecond backoff.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            retry: Some(RetryConfig::fast()),
            transport: TransportSecurity::AllowInsecureHttp,
            buffer_capacity: 256,
            pool_idle_timeout: Some(Duration::from_secs(10)),
            pool_max_idle_per_host: 4,
            ..Default::default()
        }
    }
}
