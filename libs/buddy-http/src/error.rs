use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri};
use std::fmt;
use thiserror::Error;

/// Classification of URL validation failures.
///
/// Provides programmatic matching for different failure modes without
/// relying on unstable error message strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidUriKind {
    /// URL could not be parsed (malformed syntax)
    ParseError,
    /// URL is missing required host/authority component
    MissingAuthority,
    /// URL is missing required scheme (http/https)
    MissingScheme,
}

/// Coarse error categories surfaced to callers.
///
/// Every [`HttpError`] maps to exactly one kind; adapters branch on the kind
/// (and on [`HttpError::status`]) instead of on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Construction-time failure: bad base URL, header, or request options
    Config,
    /// Network, TLS or attempt-timeout failure
    Transport,
    /// Caller's deadline expired or the call was cancelled
    Timeout,
    /// Non-success status after retries
    Http,
    /// Success status but the body did not match the expected shape
    Decode,
}

/// Error record built from a non-success response.
///
/// Holds the request identity, the status, the fully buffered body and the
/// human message flattened out of it. Display form:
/// `"<METHOD> <scheme>://<host><path>: <status>\n<message>"`.
#[derive(Debug, Clone)]
pub struct ErrorResponse {
    pub method: Method,
    pub url: Uri,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub message: String,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}://{}{}: {}\n{}",
            self.method,
            self.url.scheme_str().unwrap_or("https"),
            self.url.authority().map_or("", http::uri::Authority::as_str),
            self.url.path(),
            self.status.as_u16(),
            self.message
        )
    }
}

/// HTTP client error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpError {
    /// Request building failed
    #[error("Failed to build request: {0}")]
    RequestBuild(#[from] http::Error),

    /// Invalid header name
    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    /// Invalid header value
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// Invalid URL (failed to parse)
    ///
    /// Use the `kind` field for programmatic matching. The `reason` field contains
    /// a diagnostic message intended for logging only.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUri {
        /// The URL that failed to parse
        url: String,
        /// Structured failure classification for programmatic matching
        kind: InvalidUriKind,
        /// Diagnostic message (unstable format, for logging only)
        reason: String,
    },

    /// Invalid URL scheme for transport security configuration
    #[error("URL scheme '{scheme}' not allowed: {reason}")]
    InvalidScheme {
        /// The URL scheme that was rejected
        scheme: String,
        /// Reason the scheme was rejected
        reason: String,
    },

    /// Request body serialization failed
    #[error("JSON encoding failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Query string encoding failed
    #[error("Query encoding failed: {0}")]
    QueryEncode(#[from] serde_urlencoded::ser::Error),

    /// Single request attempt timed out
    #[error("Request attempt timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Transport error (network, connection, etc)
    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// TLS error
    #[error("TLS error: {0}")]
    Tls(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Response body exceeded size limit
    #[error("Response body too large: limit {limit} bytes, got {actual} bytes")]
    BodyTooLarge { limit: usize, actual: usize },

    /// Internal service failure (buffer worker died, channel closed)
    #[error("Service unavailable: internal failure")]
    ServiceClosed,

    /// Caller's deadline passed before the call completed
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// Caller cancelled the call
    #[error("context canceled")]
    Cancelled,

    /// Non-success HTTP status (after retries)
    #[error("{0}")]
    Status(Box<ErrorResponse>),

    /// Status was acceptable to the decoder but not to the operation
    #[error("{message}")]
    UnexpectedStatus {
        status: StatusCode,
        message: String,
    },

    /// Success status but the body did not decode into the target
    #[error("failed to decode {status} response body: {source}")]
    Decode {
        status: StatusCode,
        body: Bytes,
        #[source]
        source: serde_json::Error,
    },
}

impl HttpError {
    /// Category of this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RequestBuild(_)
            | Self::InvalidHeaderName(_)
            | Self::InvalidHeaderValue(_)
            | Self::InvalidUri { .. }
            | Self::InvalidScheme { .. }
            | Self::Encode(_)
            | Self::QueryEncode(_) => ErrorKind::Config,
            Self::Timeout(_)
            | Self::Transport(_)
            | Self::Tls(_)
            | Self::BodyTooLarge { .. }
            | Self::ServiceClosed => ErrorKind::Transport,
            Self::DeadlineExceeded | Self::Cancelled => ErrorKind::Timeout,
            Self::Status(_) | Self::UnexpectedStatus { .. } => ErrorKind::Http,
            Self::Decode { .. } => ErrorKind::Decode,
        }
    }

    /// HTTP status of the response behind this error, if one was received
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status(response) => Some(response.status),
            Self::UnexpectedStatus { status, .. } | Self::Decode { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// `true` when the server answered 404
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// Error record, for non-success responses
    #[must_use]
    pub fn response(&self) -> Option<&ErrorResponse> {
        match self {
            Self::Status(response) => Some(response),
            _ => None,
        }
    }
}

impl From<ErrorResponse> for HttpError {
    fn from(response: ErrorResponse) -> Self {
        Self::Status(Box::new(response))
    }
}

impl From<hyper::Error> for HttpError {
    fn from(err: hyper::Error) -> Self {
        HttpError::Transport(Box::new(err))
    }
}

impl From<hyper_util::client::legacy::Error> for HttpError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        HttpError::Transport(Box::new(err))
    }
}
