use crate::client::{BufferedService, map_buffer_error};
use crate::config::TransportSecurity;
use crate::context::CallContext;
use crate::encode::{encode_json, encode_query};
use crate::error::{HttpError, InvalidUriKind};
use crate::response::HttpResponse;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::Request;
use http_body_util::Full;
use serde::Serialize;
use std::time::Duration;
use tower::{Service, ServiceExt};

#[derive(Clone, Debug)]
enum BodyKind {
    Empty,
    Json(Bytes),
}

/// HTTP request builder with fluent API
///
/// Created by [`HttpClient::request`](crate::HttpClient::request) and the
/// per-method shorthands. Header errors are deferred to [`send`](Self::send).
///
/// ```ignore
/// let ctx = CallContext::background().with_timeout(Duration::from_secs(30));
/// let (project, raw) = client
///     .post(&base.join(&api_path!("/workspaces/{}/projects", "acme"), None))
///     .json(&CreateProject { name: "web" })?
///     .context(&ctx)
///     .send()
///     .await?
///     .decode::<Project>()
///     .await?;
/// ```
#[must_use = "RequestBuilder does nothing until .send() is called"]
pub struct RequestBuilder {
    service: BufferedService,
    max_body_size: usize,
    timeout: Duration,
    method: http::Method,
    url: String,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: BodyKind,
    error: Option<HttpError>,
    transport_security: TransportSecurity,
    ctx: CallContext,
}

impl RequestBuilder {
    pub(crate) fn new(
        service: BufferedService,
        max_body_size: usize,
        timeout: Duration,
        method: http::Method,
        url: String,
        transport_security: TransportSecurity,
    ) -> Self {
        Self {
            service,
            max_body_size,
            timeout,
            method,
            url,
            headers: Vec::new(),
            body: BodyKind::Empty,
            error: None,
            transport_security,
            ctx: CallContext::background(),
        }
    }

    /// Add a single header to the request
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }

        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => self.headers.push((name, value)),
            (Err(e), _) => self.error = Some(HttpError::InvalidHeaderName(e)),
            (_, Err(e)) => self.error = Some(HttpError::InvalidHeaderValue(e)),
        }
        self
    }

    /// Per-request `Authorization: Bearer` header, marked sensitive
    pub fn bearer_auth(mut self, token: &str) -> Self {
        if self.error.is_some() {
            return self;
        }

        match HeaderValue::try_from(format!("Bearer {token}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                self.headers.push((http::header::AUTHORIZATION, value));
            }
            Err(e) => self.error = Some(HttpError::InvalidHeaderValue(e)),
        }
        self
    }

    /// Append an options record as the query string.
    ///
    /// # Errors
    ///
    /// [`HttpError::QueryEncode`] if the record cannot be encoded.
    pub fn query<O: Serialize + ?Sized>(mut self, options: &O) -> Result<Self, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        let query = encode_query(options)?;
        if !query.is_empty() {
            let separator = if self.url.contains('?') { '&' } else { '?' };
            self.url.push(separator);
            self.url.push_str(&query);
        }
        Ok(self)
    }

    /// Set request body as JSON (`Content-Type: application/json` unless set)
    ///
    /// # Errors
    ///
    /// [`HttpError::Encode`] if serialization fails.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        self.body = BodyKind::Json(Bytes::from(encode_json(body)?));
        Ok(self)
    }

    /// Bound the call by `ctx`
    pub fn context(mut self, ctx: &CallContext) -> Self {
        self.ctx = ctx.clone();
        self
    }

    /// URL the request will be sent to
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn validate_url(&self) -> Result<http::Uri, HttpError> {
        let uri: http::Uri =
            self.url
                .parse()
                .map_err(|e: http::uri::InvalidUri| HttpError::InvalidUri {
                    url: self.url.clone(),
                    kind: InvalidUriKind::ParseError,
                    reason: e.to_string(),
                })?;

        if uri.authority().is_none() {
            return Err(HttpError::InvalidUri {
                url: self.url.clone(),
                kind: InvalidUriKind::MissingAuthority,
                reason: "missing host/authority".to_owned(),
            });
        }

        match uri.scheme_str() {
            Some("https") => Ok(uri),
            Some("http") => match self.transport_security {
                TransportSecurity::AllowInsecureHttp => Ok(uri),
                TransportSecurity::TlsOnly => Err(HttpError::InvalidScheme {
                    scheme: "http".to_owned(),
                    reason: "HTTPS required (transport security is TlsOnly)".to_owned(),
                }),
            },
            Some(scheme) => Err(HttpError::InvalidScheme {
                scheme: scheme.to_owned(),
                reason: "only http:// and https:// schemes are supported".to_owned(),
            }),
            None => Err(HttpError::InvalidUri {
                url: self.url.clone(),
                kind: InvalidUriKind::MissingScheme,
                reason: "missing scheme".to_owned(),
            }),
        }
    }

    /// Send the request through the client stack.
    ///
    /// The returned response may carry any status; use
    /// [`HttpResponse::decode`] and friends to apply the success set.
    ///
    /// # Errors
    ///
    /// Deferred build errors, URL validation, transport failures after the
    /// retry policy, and [`HttpError::Cancelled`]/[`HttpError::DeadlineExceeded`]
    /// from the call context. A context that is already done sends nothing.
    pub async fn send(mut self) -> Result<HttpResponse, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        let uri = self.validate_url()?;
        self.ctx.check()?;

        let mut builder = Request::builder()
            .method(self.method.clone())
            .uri(uri.clone());

        let has_content_type = self
            .headers
            .iter()
            .any(|(name, _)| name == http::header::CONTENT_TYPE);
        if !has_content_type && matches!(self.body, BodyKind::Json(_)) {
            builder = builder.header(http::header::CONTENT_TYPE, "application/json");
        }
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }

        let body = match self.body {
            BodyKind::Empty => Bytes::new(),
            BodyKind::Json(b) => b,
        };
        let mut request = builder.body(Full::new(body))?;
        request.extensions_mut().insert(self.ctx.clone());

        let mut service = self.service;
        let inner = self
            .ctx
            .run(async move {
                service.ready().await.map_err(map_buffer_error)?;
                service.call(request).await.map_err(map_buffer_error)
            })
            .await?;

        Ok(HttpResponse {
            inner,
            method: self.method,
            url: uri,
            max_body_size: self.max_body_size,
            ctx: self.ctx,
            timeout: self.timeout,
        })
    }
}
