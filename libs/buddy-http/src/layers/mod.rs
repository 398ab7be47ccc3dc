//! Tower layers composing the client stack
//!
//! Outermost first:
//!
//! - [`RetryLayer`] - re-sends on 429/5xx with linear jittered backoff
//! - [`RateLimitLayer`] - takes a token per attempt, re-tunes from quota headers
//! - [`TraceLayer`] - `outgoing_http` span and [`HttpObserver`] callbacks
//! - [`DefaultHeadersLayer`] - User-Agent, Accept and Authorization

mod headers;
mod rate_limit;
mod retry;
mod trace;

pub use headers::{DefaultHeadersLayer, DefaultHeadersService};
pub use rate_limit::{
    RATE_LIMIT_REMAINING_HEADER, RATE_LIMIT_RESET_HEADER, RateBudget, RateLimitLayer,
    RateLimitService, RateLimiter, parse_quota, until_reset,
};
pub use retry::{RETRY_ATTEMPT_HEADER, RetryLayer, RetryService};
pub use trace::{HttpObserver, TraceLayer, TraceService};
