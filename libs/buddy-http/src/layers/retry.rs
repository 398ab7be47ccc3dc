use crate::config::{RetryConfig, RetryTrigger};
use crate::context::CallContext;
use crate::error::HttpError;
use crate::layers::rate_limit::until_reset;
use crate::response::ResponseBody;
use bytes::Bytes;
use http::{HeaderValue, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::{Layer, Service, ServiceExt};

/// Header carrying the retry number (1-indexed) on retried attempts
pub const RETRY_ATTEMPT_HEADER: &str = "X-Retry-Attempt";

/// Tower layer that re-sends requests answered with 429 or 5xx
#[derive(Clone)]
pub struct RetryLayer {
    config: RetryConfig,
}

impl RetryLayer {
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

impl<S> Layer<S> for RetryLayer {
    type Service = RetryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RetryService {
            inner,
            config: self.config.clone(),
        }
    }
}

/// Service that implements the retry policy.
///
/// After the retries run out the last response is returned as `Ok`, whatever
/// its status; turning it into an error is the decoder's job. `Err` is only
/// returned for transport failures and for the caller's [`CallContext`]
/// (taken from the request extensions) firing between attempts.
///
/// Backoff:
/// - 429: until the `X-Rate-Limit-Reset` instant (at least `min`) plus jitter;
/// - 5xx and retryable errors: `(min + jitter) * n` for retry `n`.
#[derive(Clone)]
pub struct RetryService<S> {
    inner: S,
    config: RetryConfig,
}

impl<S> Service<Request<Full<Bytes>>> for RetryService<S>
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
        // Consume the instance that was poll_ready'd
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let config = self.config.clone();

        let (parts, body) = req.into_parts();
        let ctx = parts
            .extensions
            .get::<CallContext>()
            .cloned()
            .unwrap_or_default();
        let parts = std::sync::Arc::new(parts);

        Box::pin(async move {
            let method = parts.method.clone();
            let host = parts
                .uri
                .authority()
                .map_or_else(|| "unknown".to_owned(), ToString::to_string);

            let mut attempt = 0usize;
            loop {
                ctx.check()?;

                let mut req = Request::from_parts((*parts).clone(), body.clone());
                *req.extensions_mut() = parts.extensions.clone();
                if attempt > 0
                    && let Ok(value) = HeaderValue::try_from(attempt.to_string())
                {
                    req.headers_mut().insert(RETRY_ATTEMPT_HEADER, value);
                }

                let mut svc = inner.clone();
                svc.ready().await?;

                match svc.call(req).await {
                    Ok(resp) => {
                        let status = resp.status();
                        let trigger = RetryTrigger::Status(status.as_u16());
                        if attempt >= config.max_retries || !config.should_retry(trigger) {
                            return Ok(resp);
                        }

                        let backoff = if status == StatusCode::TOO_MANY_REQUESTS {
                            config
                                .backoff
                                .rate_limited_delay(until_reset(resp.headers()))
                        } else {
                            config.backoff.server_error_delay(attempt + 1)
                        };

                        if let Err(e) =
                            drain_response_body(resp, config.retry_response_drain_limit).await
                        {
                            tracing::debug!(
                                error = %e,
                                "failed to drain response body before retry; connection may not be reused"
                            );
                        }

                        let backoff = clamp_to_deadline(&ctx, backoff)?;
                        tracing::debug!(
                            retry = attempt + 1,
                            max_retries = config.max_retries,
                            status = status.as_u16(),
                            method = %method,
                            host = %host,
                            backoff_ms = backoff.as_millis(),
                            "retrying request after status code"
                        );
                        tokio::time::sleep(backoff).await;
                    }
                    Err(err) => {
                        if attempt >= config.max_retries
                            || !config.should_retry(retry_trigger(&err))
                        {
                            return Err(err);
                        }

                        let backoff =
                            clamp_to_deadline(&ctx, config.backoff.server_error_delay(attempt + 1))?;
                        tracing::debug!(
                            retry = attempt + 1,
                            max_retries = config.max_retries,
                            error = %err,
                            method = %method,
                            host = %host,
                            backoff_ms = backoff.as_millis(),
                            "retrying request after error"
                        );
                        tokio::time::sleep(backoff).await;
                    }
                }
                attempt += 1;
            }
        })
    }
}

/// Shorten `backoff` so it does not outlive the caller's deadline.
fn clamp_to_deadline(ctx: &CallContext, backoff: Duration) -> Result<Duration, HttpError> {
    match ctx.remaining() {
        Some(remaining) if remaining.is_zero() => Err(HttpError::DeadlineExceeded),
        Some(remaining) => Ok(backoff.min(remaining)),
        None => Ok(backoff),
    }
}

/// Read and discard up to `limit` bytes so the connection can go back to the pool.
async fn drain_response_body(
    response: Response<ResponseBody>,
    limit: usize,
) -> Result<(), HttpError> {
    let mut body = std::pin::pin!(response.into_body());
    let mut drained = 0usize;

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(HttpError::Transport)?;
        if let Some(chunk) = frame.data_ref() {
            drained += chunk.len();
            if drained >= limit {
                break;
            }
        }
    }
    Ok(())
}

fn retry_trigger(err: &HttpError) -> RetryTrigger {
    match err {
        HttpError::Transport(_) => RetryTrigger::TransportError,
        HttpError::Timeout(_) => RetryTrigger::Timeout,
        _ => RetryTrigger::NonRetryable,
    }
}
