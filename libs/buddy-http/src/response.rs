use crate::context::CallContext;
use crate::error::{ErrorResponse, HttpError};
use crate::error_body::error_message;
use bytes::Bytes;
use http::{HeaderMap, Method, Response, StatusCode, Uri};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Type alias for the boxed response body that supports decompression.
pub type ResponseBody =
    http_body_util::combinators::BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

/// Statuses treated as success by the decoder
pub const SUCCESS_STATUSES: [StatusCode; 5] = [
    StatusCode::OK,
    StatusCode::CREATED,
    StatusCode::ACCEPTED,
    StatusCode::NO_CONTENT,
    StatusCode::NOT_MODIFIED,
];

#[must_use]
pub fn is_success_status(status: StatusCode) -> bool {
    SUCCESS_STATUSES.contains(&status)
}

/// Metadata of a response whose body has been consumed
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub method: Method,
    pub url: Uri,
    pub status: StatusCode,
    pub headers: HeaderMap,
}

/// HTTP response wrapper with limited body reading.
///
/// Every body-consuming method takes `self`, so a response is read exactly once.
/// Body reads stay bounded by the call's [`CallContext`] and by the
/// per-attempt timeout: a buffered read must finish within it, a streamed
/// copy must see a frame within it.
#[derive(Debug)]
pub struct HttpResponse {
    pub(crate) inner: Response<ResponseBody>,
    pub(crate) method: Method,
    pub(crate) url: Uri,
    pub(crate) max_body_size: usize,
    pub(crate) ctx: CallContext,
    pub(crate) timeout: Duration,
}

impl HttpResponse {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    #[must_use]
    pub fn raw(&self) -> RawResponse {
        RawResponse {
            method: self.method.clone(),
            url: self.url.clone(),
            status: self.inner.status(),
            headers: self.inner.headers().clone(),
        }
    }

    /// Consume the wrapper and return the underlying response
    #[must_use]
    pub fn into_inner(self) -> Response<ResponseBody> {
        self.inner
    }

    /// Read the body regardless of status.
    ///
    /// # Errors
    ///
    /// [`HttpError::BodyTooLarge`] past the configured limit,
    /// [`HttpError::Timeout`] when the body takes longer than one attempt,
    /// the call context error, or a transport error.
    pub async fn bytes(self) -> Result<Bytes, HttpError> {
        let Self {
            inner,
            max_body_size,
            ctx,
            timeout,
            ..
        } = self;
        read_body_bounded(inner, max_body_size, &ctx, timeout).await
    }

    /// Read the body, failing on a status outside [`SUCCESS_STATUSES`].
    ///
    /// # Errors
    ///
    /// [`HttpError::Status`] carrying the error record, or a body read error.
    pub async fn checked_bytes(self) -> Result<(Bytes, RawResponse), HttpError> {
        let raw = self.raw();
        if !is_success_status(raw.status) {
            return Err(self.into_error().await);
        }
        let body = self.bytes().await?;
        Ok((body, raw))
    }

    /// Decode a JSON body into `T`.
    ///
    /// An empty body decodes as JSON `null`, so `()` and `Option<_>` targets
    /// accept 204 responses.
    ///
    /// # Errors
    ///
    /// [`HttpError::Status`] on a non-success status, [`HttpError::Decode`]
    /// when the body does not match `T`.
    pub async fn decode<T: DeserializeOwned>(self) -> Result<(T, RawResponse), HttpError> {
        let (body, raw) = self.checked_bytes().await?;
        let input: &[u8] = if body.is_empty() { b"null" } else { &body };
        match serde_json::from_slice(input) {
            Ok(value) => Ok((value, raw)),
            Err(source) => Err(HttpError::Decode {
                status: raw.status,
                body,
                source,
            }),
        }
    }

    /// Stream the body verbatim into `writer`, returning the byte count.
    ///
    /// # Errors
    ///
    /// [`HttpError::Status`] on a non-success status, [`HttpError::Timeout`]
    /// when no frame arrives within one attempt timeout, the call context
    /// error, or a read/write failure.
    pub async fn copy_to<W>(self, writer: &mut W) -> Result<(u64, RawResponse), HttpError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let raw = self.raw();
        if !is_success_status(raw.status) {
            return Err(self.into_error().await);
        }

        let timeout = self.timeout;
        let ctx = self.ctx;
        let mut body = std::pin::pin!(self.inner.into_body());
        let copy = async {
            let mut written = 0u64;
            loop {
                let frame = tokio::time::timeout(timeout, body.frame())
                    .await
                    .map_err(|_| HttpError::Timeout(timeout))?;
                let Some(frame) = frame else { break };
                let frame = frame.map_err(HttpError::Transport)?;
                if let Some(chunk) = frame.data_ref() {
                    writer
                        .write_all(chunk)
                        .await
                        .map_err(|e| HttpError::Transport(Box::new(e)))?;
                    written += chunk.len() as u64;
                }
            }
            writer
                .flush()
                .await
                .map_err(|e| HttpError::Transport(Box::new(e)))?;
            Ok::<_, HttpError>(written)
        };
        let written = ctx.run(copy).await?;
        Ok((written, raw))
    }

    /// Discard the body after checking the status.
    ///
    /// # Errors
    ///
    /// [`HttpError::Status`] on a non-success status.
    pub async fn finish(self) -> Result<RawResponse, HttpError> {
        self.checked_bytes().await.map(|(_, raw)| raw)
    }

    /// Build the error record for this response, consuming the body.
    pub async fn into_error(self) -> HttpError {
        let raw = self.raw();
        let body = match self.bytes().await {
            Ok(body) => body,
            Err(e @ (HttpError::DeadlineExceeded | HttpError::Cancelled)) => return e,
            Err(e) => {
                tracing::debug!(error = %e, status = raw.status.as_u16(), "failed to read error body");
                Bytes::new()
            }
        };
        let message = error_message(&body);

        HttpError::from(ErrorResponse {
            method: raw.method,
            url: raw.url,
            status: raw.status,
            headers: raw.headers,
            body,
            message,
        })
    }
}

/// [`read_body_limited`] under the call context and the per-attempt timeout
async fn read_body_bounded(
    response: Response<ResponseBody>,
    limit: usize,
    ctx: &CallContext,
    timeout: Duration,
) -> Result<Bytes, HttpError> {
    ctx.run(async {
        tokio::time::timeout(timeout, read_body_limited(response, limit))
            .await
            .map_err(|_| HttpError::Timeout(timeout))?
    })
    .await
}

/// Read a response body, failing once it grows past `limit` bytes
pub async fn read_body_limited(
    response: Response<ResponseBody>,
    limit: usize,
) -> Result<Bytes, HttpError> {
    let mut body = std::pin::pin!(response.into_body());
    let mut collected = Vec::new();

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(HttpError::Transport)?;
        if let Some(chunk) = frame.data_ref() {
            if collected.len() + chunk.len() > limit {
                return Err(HttpError::BodyTooLarge {
                    limit,
                    actual: collected.len() + chunk.len(),
                });
            }
            collected.extend_from_slice(chunk);
        }
    }

    Ok(Bytes::from(collected))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use http_body_util::Full;
    use serde::Deserialize;

    fn response(status: u16, body: &'static [u8]) -> HttpResponse {
        let body = Full::new(Bytes::from_static(body))
            .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> { Box::new(e) })
            .boxed();
        HttpResponse {
            inner: Response::builder().status(status).body(body).unwrap(),
            method: Method::GET,
            url: "https://api.buddy.works/workspaces/acme?page=1".parse().unwrap(),
            max_body_size: 1024,
            ctx: CallContext::background(),
            timeout: Duration::from_secs(5),
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Workspace {
        domain: String,
    }

    #[test]
    fn test_success_set() {
        for code in [200, 201, 202, 204, 304] {
            assert!(is_success_status(StatusCode::from_u16(code).unwrap()));
        }
        for code in [203, 206, 301, 400, 404, 500] {
            assert!(!is_success_status(StatusCode::from_u16(code).unwrap()));
        }
    }

    #[tokio::test]
    async fn test_decode_success() {
        let (workspace, raw) = response(200, br#"{"domain":"acme","extra":1}"#)
            .decode::<Workspace>()
            .await
            .unwrap();
        assert_eq!(workspace.domain, "acme");
        assert_eq!(raw.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_decode_empty_body() {
        let (value, raw) = response(204, b"").decode::<()>().await.unwrap();
        assert_eq!(value, ());
        assert_eq!(raw.status, StatusCode::NO_CONTENT);

        let (value, _) = response(304, b"").decode::<Option<Workspace>>().await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_decode_shape_mismatch() {
        let err = response(200, br#"{"name":1}"#)
            .decode::<Workspace>()
            .await
            .unwrap_err();
        match err {
            HttpError::Decode { status, body, .. } => {
                assert_eq!(status, StatusCode::OK);
                assert_eq!(&body[..], br#"{"name":1}"#);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_non_success_builds_error_record() {
        let err = response(422, br#"{"errors":[{"message":"a"},{"message":"b"}]}"#)
            .decode::<Workspace>()
            .await
            .unwrap_err();
        let record = err.response().unwrap();
        assert_eq!(record.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(record.message, "a\nb");
        assert_eq!(
            err.to_string(),
            "GET https://api.buddy.works/workspaces/acme: 422\na\nb"
        );
    }

    #[tokio::test]
    async fn test_copy_to_is_verbatim() {
        let mut sink = Vec::new();
        let (written, _) = response(200, b"\x00binary\xffpayload")
            .copy_to(&mut sink)
            .await
            .unwrap();
        assert_eq!(written, 15);
        assert_eq!(sink, b"\x00binary\xffpayload");
    }

    #[tokio::test]
    async fn test_body_limit() {
        let mut resp = response(200, b"0123456789");
        resp.max_body_size = 4;
        let err = resp.bytes().await.unwrap_err();
        assert!(matches!(err, HttpError::BodyTooLarge { limit: 4, .. }));
    }
}
