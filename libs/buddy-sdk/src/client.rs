use crate::config::{ConfigError, ProviderConfig};
use crate::pagination::{Envelope, collect_pages};
use crate::resources::{
    Groups, Integrations, Members, PermissionSets, Pipelines, Projects, Variables, Webhooks,
    Workspaces,
};
use buddy_http::{
    ApiPath, BaseUrl, CallContext, HttpClient, HttpClientBuilder, HttpError, Paged, RawResponse,
    TransportSecurity,
};
use http::StatusCode;
use http::header::{ACCEPT, HeaderValue};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWrite;

/// Default `User-Agent` of SDK requests
pub const DEFAULT_USER_AGENT: &str = concat!("buddy-sdk/", env!("CARGO_PKG_VERSION"));

/// Message of the error returned when a delete is answered with anything but 204.
///
/// Matched verbatim by existing callers, spelling included.
pub const DELETE_FAILED_MESSAGE: &str = "something went wrong while deleteing resource";

/// Buddy.Works API client.
///
/// Holds the base URL and an [`HttpClient`] whose stack adds the bearer
/// token, `Accept: application/json`, rate limiting and retries to every
/// request. Cloning is cheap; clones share the connection pool and the rate
/// budget. Resource facades borrow the client:
///
/// ```ignore
/// let client = BuddyClient::new(&ProviderConfig::load(&ProviderSettings::default())?)?;
/// let ctx = CallContext::background().with_timeout(Duration::from_secs(60));
/// let (projects, _) = client.projects().list(&ctx, "acme", &ProjectFilter::default()).await?;
/// ```
#[derive(Clone)]
pub struct BuddyClient {
    http: HttpClient,
    base: BaseUrl,
}

impl BuddyClient {
    /// Client with the default HTTP stack.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Client`] for an unparseable base URL, a plain-HTTP base
    /// URL on a TLS-only stack, or a TLS setup failure.
    pub fn new(config: &ProviderConfig) -> Result<Self, ConfigError> {
        Self::with_http_builder(config, HttpClient::builder())
    }

    /// Client over a caller-tuned HTTP stack; the provider settings are applied on top.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_http_builder(
        config: &ProviderConfig,
        builder: HttpClientBuilder,
    ) -> Result<Self, ConfigError> {
        let base = BaseUrl::parse(&config.base_url)?;

        let mut builder = builder
            .user_agent(DEFAULT_USER_AGENT)
            .default_header(ACCEPT, HeaderValue::from_static("application/json"))
            .bearer_auth(config.token.expose_secret());
        if config.insecure {
            tracing::warn!(
                target: "buddy_sdk::security",
                base_url = %base,
                "TLS certificate verification disabled for the Buddy API"
            );
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder.build()?;
        if base.scheme() == "http" && http.transport_security() == TransportSecurity::TlsOnly {
            return Err(ConfigError::Client(HttpError::InvalidScheme {
                scheme: "http".to_owned(),
                reason: format!(
                    "base URL {base} is plain HTTP but the client only allows HTTPS; \
                     enable insecure HTTP to reach it"
                ),
            }));
        }
        tracing::debug!(base_url = %base, "Buddy API client ready");
        Ok(Self { http, base })
    }

    #[must_use]
    pub fn base_url(&self) -> &BaseUrl {
        &self.base
    }

    /// Underlying HTTP client, for requests the facades do not cover
    #[must_use]
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    #[must_use]
    pub fn url(&self, path: &ApiPath) -> String {
        self.base.join(path, None)
    }

    #[must_use]
    pub fn workspaces(&self) -> Workspaces<'_> {
        Workspaces::new(self)
    }

    #[must_use]
    pub fn members(&self) -> Members<'_> {
        Members::new(self)
    }

    #[must_use]
    pub fn groups(&self) -> Groups<'_> {
        Groups::new(self)
    }

    #[must_use]
    pub fn projects(&self) -> Projects<'_> {
        Projects::new(self)
    }

    #[must_use]
    pub fn pipelines(&self) -> Pipelines<'_> {
        Pipelines::new(self)
    }

    #[must_use]
    pub fn variables(&self) -> Variables<'_> {
        Variables::new(self)
    }

    #[must_use]
    pub fn webhooks(&self) -> Webhooks<'_> {
        Webhooks::new(self)
    }

    #[must_use]
    pub fn integrations(&self) -> Integrations<'_> {
        Integrations::new(self)
    }

    #[must_use]
    pub fn permission_sets(&self) -> PermissionSets<'_> {
        PermissionSets::new(self)
    }

    /// `GET path` decoded as `T`.
    ///
    /// # Errors
    ///
    /// Any [`HttpError`]; non-success statuses carry the error record.
    pub async fn get<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        path: &ApiPath,
    ) -> Result<(T, RawResponse), HttpError> {
        self.http
            .get(&self.url(path))
            .context(ctx)
            .send()
            .await?
            .decode()
            .await
    }

    /// `GET path?options` decoded as `T`.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get), plus [`HttpError::QueryEncode`].
    pub async fn get_with<T, O>(
        &self,
        ctx: &CallContext,
        path: &ApiPath,
        options: &O,
    ) -> Result<(T, RawResponse), HttpError>
    where
        T: DeserializeOwned,
        O: Serialize + ?Sized,
    {
        self.http
            .get(&self.url(path))
            .query(options)?
            .context(ctx)
            .send()
            .await?
            .decode()
            .await
    }

    /// `POST path` with a JSON body.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get), plus [`HttpError::Encode`].
    pub async fn create<T, B>(
        &self,
        ctx: &CallContext,
        path: &ApiPath,
        body: &B,
    ) -> Result<(T, RawResponse), HttpError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.http
            .post(&self.url(path))
            .json(body)?
            .context(ctx)
            .send()
            .await?
            .decode()
            .await
    }

    /// `PATCH path` with a JSON body.
    ///
    /// # Errors
    ///
    /// Same as [`create`](Self::create).
    pub async fn update<T, B>(
        &self,
        ctx: &CallContext,
        path: &ApiPath,
        body: &B,
    ) -> Result<(T, RawResponse), HttpError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.http
            .patch(&self.url(path))
            .json(body)?
            .context(ctx)
            .send()
            .await?
            .decode()
            .await
    }

    /// `DELETE path`, which must be answered with 204.
    ///
    /// # Errors
    ///
    /// The error record for a non-success status, and
    /// [`HttpError::UnexpectedStatus`] with [`DELETE_FAILED_MESSAGE`] for any
    /// other success status.
    pub async fn delete(
        &self,
        ctx: &CallContext,
        path: &ApiPath,
    ) -> Result<RawResponse, HttpError> {
        let raw = self
            .http
            .delete(&self.url(path))
            .context(ctx)
            .send()
            .await?
            .finish()
            .await?;

        if raw.status != StatusCode::NO_CONTENT {
            tracing::debug!(
                status = raw.status.as_u16(),
                url = %raw.url,
                "delete not acknowledged with 204"
            );
            return Err(HttpError::UnexpectedStatus {
                status: raw.status,
                message: DELETE_FAILED_MESSAGE.to_owned(),
            });
        }
        Ok(raw)
    }

    /// Every page of `path?options`, merged into one envelope.
    ///
    /// # Errors
    ///
    /// The first failing page's error.
    pub async fn list_all<E, O>(
        &self,
        ctx: &CallContext,
        path: &ApiPath,
        options: &O,
    ) -> Result<(E, RawResponse), HttpError>
    where
        E: Envelope,
        O: Serialize,
    {
        let url = self.url(path);
        collect_pages(|page| {
            let request = self.http.get(&url).context(ctx).query(&Paged::new(options, page));
            async move { request?.send().await?.decode().await }
        })
        .await
    }

    /// `GET path`, streaming the body verbatim into `writer`.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get), plus write failures as transport errors.
    pub async fn download<W>(
        &self,
        ctx: &CallContext,
        path: &ApiPath,
        writer: &mut W,
    ) -> Result<(u64, RawResponse), HttpError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        self.http
            .get(&self.url(path))
            .context(ctx)
            .send()
            .await?
            .copy_to(writer)
            .await
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use buddy_http::HttpClientConfig;
    use httpmock::prelude::*;
    use serde_json::{Value, json};

    fn client(server: &MockServer) -> BuddyClient {
        let config = ProviderConfig::new("s3cret").with_base_url(server.base_url());
        BuddyClient::with_http_builder(
            &config,
            HttpClientBuilder::with_config(HttpClientConfig::for_testing()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_requests_carry_auth_accept_and_user_agent() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/user")
                .header("authorization", "Bearer s3cret")
                .header("accept", "application/json")
                .header("user-agent", DEFAULT_USER_AGENT);
            then.status(200).json_body(json!({ "name": "jane" }));
        });

        let (user, raw): (Value, _) = client(&server)
            .get(&CallContext::background(), &ApiPath::new("/user"))
            .await
            .unwrap();
        assert_eq!(user["name"], "jane");
        assert_eq!(raw.status, StatusCode::OK);
        mock.assert();
    }

    #[tokio::test]
    async fn test_base_path_prefix_is_preserved() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/workspaces");
            then.status(200).json_body(json!({ "workspaces": [] }));
        });

        let config = ProviderConfig::new("t").with_base_url(server.url("/api/"));
        let client = BuddyClient::with_http_builder(
            &config,
            HttpClientBuilder::with_config(HttpClientConfig::for_testing()),
        )
        .unwrap();

        let _: (Value, _) = client
            .get(&CallContext::background(), &ApiPath::new("workspaces"))
            .await
            .unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn test_delete_requires_no_content() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE).path("/workspaces/acme/webhooks/1");
            then.status(204);
        });
        server.mock(|when, then| {
            when.method(DELETE).path("/workspaces/acme/webhooks/2");
            then.status(200).json_body(json!({}));
        });

        let client = client(&server);
        let ctx = CallContext::background();

        let raw = client
            .delete(&ctx, &ApiPath::new("/workspaces/acme/webhooks/1"))
            .await
            .unwrap();
        assert_eq!(raw.status, StatusCode::NO_CONTENT);

        let err = client
            .delete(&ctx, &ApiPath::new("/workspaces/acme/webhooks/2"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), DELETE_FAILED_MESSAGE);
        assert_eq!(err.status(), Some(StatusCode::OK));
    }

    #[tokio::test]
    async fn test_download_copies_body_verbatim() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/workspaces/acme/artifact");
            then.status(200).body("raw,bytes\n1,2\n");
        });

        let mut sink = Vec::new();
        let (written, raw) = client(&server)
            .download(
                &CallContext::background(),
                &ApiPath::new("/workspaces/acme/artifact"),
                &mut sink,
            )
            .await
            .unwrap();
        assert_eq!(written, 14);
        assert_eq!(sink, b"raw,bytes\n1,2\n");
        assert_eq!(raw.status, StatusCode::OK);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_insecure_flag_is_logged() {
        let config = ProviderConfig::new("t")
            .with_base_url("https://buddy.internal/api")
            .with_insecure(true);
        let client = BuddyClient::new(&config).unwrap();

        assert_eq!(client.base_url().to_string(), "https://buddy.internal/api");
        assert!(logs_contain("TLS certificate verification disabled for the Buddy API"));
    }

    #[tokio::test]
    async fn test_plain_http_base_is_rejected_on_tls_only_stack() {
        let config = ProviderConfig::new("t").with_base_url("http://127.0.0.1:9");
        let err = BuddyClient::new(&config).err().unwrap();
        match err {
            ConfigError::Client(HttpError::InvalidScheme { scheme, reason }) => {
                assert_eq!(scheme, "http");
                assert!(reason.contains("http://127.0.0.1:9"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }

        let insecure = HttpClientBuilder::new().transport(TransportSecurity::AllowInsecureHttp);
        let client = BuddyClient::with_http_builder(&config, insecure).unwrap();
        assert_eq!(client.base_url().scheme(), "http");
    }

    #[tokio::test]
    async fn test_invalid_base_url_is_a_config_error() {
        let config = ProviderConfig::new("t").with_base_url("api.buddy.works");
        let err = BuddyClient::new(&config).err().unwrap();
        assert!(matches!(err, ConfigError::Client(HttpError::InvalidUri { .. })));
    }
}
