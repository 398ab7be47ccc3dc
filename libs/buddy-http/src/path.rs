use crate::error::{HttpError, InvalidUriKind};
use std::borrow::Cow;
use std::fmt;
use url::Url;

/// Relative API path, e.g. `/workspaces/acme/projects/web`.
///
/// Built with [`api_path!`](crate::api_path), which checks the placeholder
/// count at compile time. Substituted values are inserted as-is; wrap
/// user-supplied identifiers in [`encode_segment`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApiPath(String);

impl ApiPath {
    /// Wrap a formatted path, adding the leading `/` if missing
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        if path.starts_with('/') {
            Self(path)
        } else {
            Self(format!("/{path}"))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApiPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Format an [`ApiPath`].
///
/// ```
/// use buddy_http::{api_path, encode_segment};
///
/// let path = api_path!("/workspaces/{}/projects/{}", "acme", encode_segment("a b"));
/// assert_eq!(path.as_str(), "/workspaces/acme/projects/a%20b");
/// ```
#[macro_export]
macro_rules! api_path {
    ($template:literal $(, $arg:expr)* $(,)?) => {
        $crate::ApiPath::new(::std::format!($template $(, $arg)*))
    };
}

/// Percent-encode a single path segment (`/` included)
#[must_use]
pub fn encode_segment(segment: &str) -> Cow<'_, str> {
    urlencoding::encode(segment)
}

/// Validated API base URL.
///
/// Any path prefix of the base is kept, so `https://host/api/` joined with
/// `/workspaces` yields `https://host/api/workspaces`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl {
    url: Url,
    prefix: String,
}

impl BaseUrl {
    /// Parse and validate an absolute `http`/`https` base URL.
    ///
    /// # Errors
    ///
    /// [`HttpError::InvalidUri`] or [`HttpError::InvalidScheme`].
    pub fn parse(raw: &str) -> Result<Self, HttpError> {
        let url = Url::parse(raw).map_err(|e| HttpError::InvalidUri {
            url: raw.to_owned(),
            kind: match e {
                url::ParseError::RelativeUrlWithoutBase => InvalidUriKind::MissingScheme,
                url::ParseError::EmptyHost => InvalidUriKind::MissingAuthority,
                _ => InvalidUriKind::ParseError,
            },
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(HttpError::InvalidScheme {
                    scheme: other.to_owned(),
                    reason: "base URL must use http or https".to_owned(),
                });
            }
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(HttpError::InvalidUri {
                url: raw.to_owned(),
                kind: InvalidUriKind::MissingAuthority,
                reason: "URL must have a host".to_owned(),
            });
        }

        let mut stripped = url.clone();
        stripped.set_query(None);
        stripped.set_fragment(None);
        let prefix = stripped.as_str().trim_end_matches('/').to_owned();

        Ok(Self { url, prefix })
    }

    #[must_use]
    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    #[must_use]
    pub fn as_url(&self) -> &Url {
        &self.url
    }

    /// Absolute URL for `path`, with an optional pre-encoded query string.
    ///
    /// Escapes already present in `path` are carried through untouched.
    #[must_use]
    pub fn join(&self, path: &ApiPath, query: Option<&str>) -> String {
        match query {
            Some(query) if !query.is_empty() => format!("{}{}?{query}", self.prefix, path),
            _ => format!("{}{}", self.prefix, path),
        }
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix)
    }
}

impl std::str::FromStr for BaseUrl {
    type Err = HttpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::api_path;

    #[test]
    fn test_api_path_formats_and_prefixes_slash() {
        let path = api_path!("workspaces/{}/members/{}", "acme", 42);
        assert_eq!(path.as_str(), "/workspaces/acme/members/42");
        assert_eq!(api_path!("/workspaces").to_string(), "/workspaces");
    }

    #[test]
    fn test_join_keeps_base_prefix() {
        let base = BaseUrl::parse("https://buddy.internal/api/").unwrap();
        let url = base.join(&api_path!("/workspaces/{}", "acme"), None);
        assert_eq!(url, "https://buddy.internal/api/workspaces/acme");

        let url = base.join(&api_path!("/workspaces"), Some("page=2&per_page=30"));
        assert_eq!(url, "https://buddy.internal/api/workspaces?page=2&per_page=30");
    }

    #[test]
    fn test_join_drops_base_query() {
        let base = BaseUrl::parse("https://api.buddy.works?x=1").unwrap();
        assert_eq!(
            base.join(&api_path!("/user"), Some("")),
            "https://api.buddy.works/user"
        );
    }

    #[test]
    fn test_encoded_segment_survives_request_uri() {
        let base = BaseUrl::parse("https://api.buddy.works").unwrap();
        let name = "release 1/2";
        let path = api_path!(
            "/workspaces/{}/variables/{}",
            "acme",
            encode_segment(name)
        );
        let url = base.join(&path, None);

        let uri: http::Uri = url.parse().unwrap();
        assert_eq!(uri.path(), "/workspaces/acme/variables/release%201%2F2");

        let last = uri.path().rsplit('/').next().unwrap();
        assert_eq!(urlencoding::decode(last).unwrap(), name);
    }

    #[test]
    fn test_parse_rejects_bad_base_urls() {
        let err = BaseUrl::parse("api.buddy.works").unwrap_err();
        assert!(matches!(
            err,
            HttpError::InvalidUri {
                kind: InvalidUriKind::MissingScheme,
                ..
            }
        ));

        let err = BaseUrl::parse("ftp://api.buddy.works").unwrap_err();
        assert!(matches!(err, HttpError::InvalidScheme { .. }));

        assert!(BaseUrl::parse("http://localhost:8080").is_ok());
    }
}
