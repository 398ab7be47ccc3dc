#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! HTTP client core for the Buddy.Works REST API
//!
//! A hyper-based client with:
//! - TLS via rustls (HTTPS only unless insecure HTTP is enabled explicitly)
//! - Connection pooling and per-attempt timeouts
//! - An adaptive token-bucket limiter driven by `X-Rate-Limit-*` headers
//! - Retries on 429 and 5xx with linear jittered backoff
//! - Per-call deadlines and cancellation through [`CallContext`]
//! - Error records with the message flattened out of the API error body
//!
//! # Example
//!
//! ```ignore
//! use buddy_http::{BaseUrl, CallContext, HttpClient, api_path, encode_segment};
//!
//! let base = BaseUrl::parse("https://api.buddy.works")?;
//! let client = HttpClient::builder().bearer_auth(token).build()?;
//! let ctx = CallContext::background().with_timeout(Duration::from_secs(60));
//!
//! let url = base.join(&api_path!("/workspaces/{}", encode_segment(domain)), None);
//! let (workspace, raw) = client
//!     .get(&url)
//!     .context(&ctx)
//!     .send()
//!     .await?
//!     .decode::<Workspace>()
//!     .await?;
//! ```

mod builder;
mod client;
mod config;
mod context;
mod encode;
mod error;
pub mod error_body;
mod layers;
mod path;
mod request;
mod response;
pub mod tls;

pub use builder::HttpClientBuilder;
pub use client::HttpClient;
pub use config::{
    DEFAULT_RATE_LIMIT_HEADROOM, DEFAULT_USER_AGENT, HttpClientConfig, LinearJitterBackoff,
    RateLimitConfig, RetryConfig, RetryTrigger, TlsRootConfig, TransportSecurity,
};
pub use context::CallContext;
pub use encode::{
    DEFAULT_PER_PAGE, Nullable, Paged, encode_json, encode_query, is_empty_str, is_zero,
};
pub use error::{ErrorKind, ErrorResponse, HttpError, InvalidUriKind};
pub use layers::{
    DefaultHeadersLayer, HttpObserver, RATE_LIMIT_REMAINING_HEADER, RATE_LIMIT_RESET_HEADER,
    RETRY_ATTEMPT_HEADER, RateBudget, RateLimitLayer, RateLimiter, RetryLayer, TraceLayer,
};
pub use path::{ApiPath, BaseUrl, encode_segment};
pub use request::RequestBuilder;
pub use response::{HttpResponse, RawResponse, ResponseBody, SUCCESS_STATUSES, is_success_status};
