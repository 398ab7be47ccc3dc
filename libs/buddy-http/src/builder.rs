use crate::config::{
    HttpClientConfig, RateLimitConfig, RetryConfig, TlsRootConfig, TransportSecurity,
};
use crate::error::HttpError;
use crate::layers::{
    DefaultHeadersLayer, HttpObserver, RateLimitLayer, RateLimiter, RetryLayer, TraceLayer,
};
use crate::response::ResponseBody;
use crate::tls;
use bytes::Bytes;
use http::Response;
use http::header::{HeaderName, HeaderValue};
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::sync::Arc;
use std::time::Duration;
use tower::buffer::Buffer;
use tower::timeout::TimeoutLayer;
use tower::util::BoxCloneService;
use tower::{ServiceBuilder, ServiceExt};
use tower_http::decompression::DecompressionLayer;

type InnerService =
    BoxCloneService<http::Request<Full<Bytes>>, http::Response<ResponseBody>, HttpError>;

/// Builder for constructing an [`HttpClient`](crate::HttpClient) with a layered tower middleware stack.
pub struct HttpClientBuilder {
    config: HttpClientConfig,
    headers: Vec<(HeaderName, HeaderValue)>,
    observer: Option<Arc<dyn HttpObserver>>,
    limiter: Option<Arc<RateLimiter>>,
    error: Option<HttpError>,
}

impl HttpClientBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(HttpClientConfig::default())
    }

    #[must_use]
    pub fn with_config(config: HttpClientConfig) -> Self {
        Self {
            config,
            headers: Vec::new(),
            observer: None,
            limiter: None,
            error: None,
        }
    }

    /// Per-attempt timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Retry policy (`None` sends every request once)
    #[must_use]
    pub fn retry(mut self, retry: Option<RetryConfig>) -> Self {
        self.config.retry = retry;
        self
    }

    /// Rate limiting (`None` disables the limiter)
    #[must_use]
    pub fn rate_limit(mut self, rate_limit: Option<RateLimitConfig>) -> Self {
        self.config.rate_limit = rate_limit;
        self
    }

    /// Share an existing limiter, e.g. between clients talking to one account.
    ///
    /// Takes precedence over [`rate_limit`](Self::rate_limit).
    #[must_use]
    pub fn shared_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    #[must_use]
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    #[must_use]
    pub fn transport(mut self, transport: TransportSecurity) -> Self {
        self.config.transport = transport;
        self
    }

    /// Allow insecure HTTP connections.
    ///
    /// Only available in debug builds or with the `allow-insecure-http` feature.
    #[must_use]
    #[cfg(any(debug_assertions, feature = "allow-insecure-http"))]
    pub fn allow_insecure_http(mut self) -> Self {
        tracing::warn!(
            target: "buddy_http::security",
            "plain-HTTP base URLs allowed; the bearer token may travel unencrypted"
        );
        self.config.transport = TransportSecurity::AllowInsecureHttp;
        self
    }

    #[must_use]
    pub fn tls_roots(mut self, roots: TlsRootConfig) -> Self {
        self.config.tls_roots = roots;
        self
    }

    /// Skip server certificate verification
    #[must_use]
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.config.danger_accept_invalid_certs = accept;
        self
    }

    /// Header added to every request that does not already carry it
    #[must_use]
    pub fn default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    /// `Authorization: Bearer <token>` on every request, marked sensitive
    #[must_use]
    pub fn bearer_auth(mut self, token: &str) -> Self {
        match HeaderValue::try_from(format!("Bearer {token}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                self.headers.push((http::header::AUTHORIZATION, value));
            }
            Err(e) => self.error = Some(HttpError::InvalidHeaderValue(e)),
        }
        self
    }

    /// Callbacks around every attempt
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn HttpObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Clamped to at least 1
    #[must_use]
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn pool_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    #[must_use]
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.config.pool_max_idle_per_host = max;
        self
    }

    /// Build the HTTP client with all configured layers.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    /// Returns an error if TLS initialization fails or a header is invalid
    pub fn build(self) -> Result<crate::HttpClient, HttpError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        if self.config.transport == TransportSecurity::AllowInsecureHttp {
            tracing::warn!(
                "insecure HTTP enabled for the Buddy API; \
                 only mock servers and trusted proxies should be reachable this way"
            );
        }

        let timeout = self.config.request_timeout;
        let https = build_https_connector(&self.config)?;

        let mut client_builder = Client::builder(TokioExecutor::new());
        client_builder
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(self.config.pool_max_idle_per_host)
            .http2_only(false);
        if let Some(idle_timeout) = self.config.pool_idle_timeout {
            client_builder.pool_idle_timeout(idle_timeout);
        }
        let hyper_client = client_builder.build::<_, Full<Bytes>>(https);

        let mut headers_layer = DefaultHeadersLayer::try_new(&self.config.user_agent)?;
        for (name, value) in self.headers {
            headers_layer = headers_layer.with_header(name, value);
        }

        // Outer to inner:
        //   Buffer -> Retry -> RateLimit -> Trace -> ErrorMapping -> Timeout ->
        //   DefaultHeaders -> Decompression -> hyper
        // Retry sits outside the limiter so every attempt takes a token.
        let service = ServiceBuilder::new()
            .layer(TimeoutLayer::new(timeout))
            .layer(headers_layer)
            .layer(DecompressionLayer::new())
            .service(hyper_client)
            .map_response(map_decompression_response)
            .map_err(move |e: tower::BoxError| map_tower_error(e, timeout));

        let mut boxed: InnerService = ServiceBuilder::new()
            .layer(TraceLayer::new(self.observer))
            .service(service.boxed_clone())
            .boxed_clone();

        let limiter = self.limiter.or_else(|| {
            self.config
                .rate_limit
                .as_ref()
                .map(|config| Arc::new(RateLimiter::new(config)))
        });
        if let Some(limiter) = &limiter {
            boxed = ServiceBuilder::new()
                .layer(RateLimitLayer::new(Arc::clone(limiter)))
                .service(boxed)
                .boxed_clone();
        }

        if let Some(retry) = self.config.retry {
            boxed = ServiceBuilder::new()
                .layer(RetryLayer::new(retry))
                .service(boxed)
                .boxed_clone();
        }

        let service: crate::client::BufferedService =
            Buffer::new(boxed, self.config.buffer_capacity.max(1));

        Ok(crate::HttpClient {
            service,
            max_body_size: self.config.max_body_size,
            request_timeout: timeout,
            transport_security: self.config.transport,
            rate_limiter: limiter,
        })
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Map tower errors to `HttpError`, keeping typed errors boxed by middleware
fn map_tower_error(err: tower::BoxError, timeout: Duration) -> HttpError {
    if err.is::<tower::timeout::error::Elapsed>() {
        return HttpError::Timeout(timeout);
    }
    match err.downcast::<HttpError>() {
        Ok(http_err) => *http_err,
        Err(other) => HttpError::Transport(other),
    }
}

fn map_decompression_response<B>(response: Response<B>) -> Response<ResponseBody>
where
    B: hyper::body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = response.into_parts();
    let boxed: ResponseBody = body.map_err(Into::into).boxed();
    Response::from_parts(parts, boxed)
}

/// HTTPS connector for the configured trust mode. HTTP/1.1 and h2 via ALPN.
fn build_https_connector(
    config: &HttpClientConfig,
) -> Result<HttpsConnector<HttpConnector>, HttpError> {
    let allow_http = config.transport == TransportSecurity::AllowInsecureHttp;

    let builder = if config.danger_accept_invalid_certs {
        tracing::warn!(
            target: "buddy_http::security",
            "TLS certificate verification disabled"
        );
        let client_config = tls::insecure_client_config().map_err(|e| HttpError::Tls(e.into()))?;
        hyper_rustls::HttpsConnectorBuilder::new().with_tls_config(client_config)
    } else {
        match config.tls_roots {
            TlsRootConfig::WebPki => hyper_rustls::HttpsConnectorBuilder::new()
                .with_provider_and_webpki_roots(tls::crypto_provider())
                .map_err(|e| HttpError::Tls(Box::new(e)))?,
            TlsRootConfig::Native => {
                let client_config =
                    tls::native_roots_client_config().map_err(|e| HttpError::Tls(e.into()))?;
                hyper_rustls::HttpsConnectorBuilder::new().with_tls_config(client_config)
            }
        }
    };

    Ok(if allow_http {
        builder.https_or_http().enable_all_versions().build()
    } else {
        builder.https_only().enable_all_versions().build()
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builder_default() {
        let client = HttpClientBuilder::new().build().unwrap();
        let budget = client.rate_limiter().unwrap().budget();
        assert_eq!(budget.burst, 1000);
    }

    #[tokio::test]
    async fn test_builder_without_rate_limit() {
        let client = HttpClientBuilder::new().rate_limit(None).build().unwrap();
        assert!(client.rate_limiter().is_none());
    }

    #[tokio::test]
    async fn test_shared_limiter_wins() {
        let limiter = Arc::new(RateLimiter::new(&RateLimitConfig::fixed(5.0, 5)));
        let client = HttpClientBuilder::new()
            .shared_rate_limiter(Arc::clone(&limiter))
            .build()
            .unwrap();
        assert!(Arc::ptr_eq(client.rate_limiter().unwrap(), &limiter));
    }

    #[tokio::test]
    async fn test_builder_invalid_user_agent() {
        let result = HttpClientBuilder::new().user_agent("bad\nagent").build();
        assert!(matches!(result, Err(HttpError::InvalidHeaderValue(_))));
    }

    #[tokio::test]
    async fn test_builder_invalid_token() {
        let result = HttpClientBuilder::new().bearer_auth("line\nbreak").build();
        assert!(matches!(result, Err(HttpError::InvalidHeaderValue(_))));
    }

    #[tokio::test]
    async fn test_builder_accept_invalid_certs() {
        let result = HttpClientBuilder::new()
            .danger_accept_invalid_certs(true)
            .build();
        assert!(result.is_ok());
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_insecure_http_warning_emitted() {
        let result = HttpClientBuilder::new().allow_insecure_http().build();
        assert!(result.is_ok());
        assert!(logs_contain("insecure HTTP enabled"));
    }

    #[test]
    fn test_map_tower_error_keeps_typed_errors() {
        let err = map_tower_error(
            Box::new(std::io::Error::other("reset by peer")),
            Duration::from_secs(30),
        );
        assert!(matches!(err, HttpError::Transport(_)));

        let err = map_tower_error(Box::new(HttpError::ServiceClosed), Duration::from_secs(1));
        assert!(matches!(err, HttpError::ServiceClosed));
    }
}
