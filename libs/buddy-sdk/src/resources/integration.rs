use super::PipelineRef;
use crate::BuddyClient;
use buddy_http::{ApiPath, CallContext, HttpError, RawResponse, api_path, encode_segment};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Third-party integration (Git hosting, cloud provider, registry, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Integration {
    pub url: String,
    pub html_url: String,
    pub hash_id: String,
    pub name: String,
    /// e.g. `GITHUB`, `AMAZON`, `DOCKER_HUB`
    #[serde(rename = "type")]
    pub kind: String,
    /// `WORKSPACE`, `PROJECT`, `ADMIN`, `GROUP`, ...
    pub scope: String,
    pub project_name: String,
    pub group_id: i64,
    pub identifier: String,
    pub all_pipelines_allowed: bool,
    pub allowed_pipelines: Vec<PipelineRef>,
}

envelope! {
    IntegrationList { integrations: Integration }
}

/// Create/update options. Which credential fields apply depends on `kind`.
#[derive(Clone, Default, Serialize)]
pub struct IntegrationOps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_pipelines_allowed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_pipelines: Option<Vec<PipelineRef>>,
}

impl fmt::Debug for IntegrationOps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |secret: Option<&String>| secret.map(|_| "[REDACTED]");
        f.debug_struct("IntegrationOps")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("scope", &self.scope)
            .field("project_name", &self.project_name)
            .field("group_id", &self.group_id)
            .field("identifier", &self.identifier)
            .field("token", &redact(self.token.as_ref()))
            .field("username", &self.username)
            .field("password", &redact(self.password.as_ref()))
            .field("access_key", &self.access_key)
            .field("secret_key", &redact(self.secret_key.as_ref()))
            .field("api_key", &redact(self.api_key.as_ref()))
            .field("all_pipelines_allowed", &self.all_pipelines_allowed)
            .field("allowed_pipelines", &self.allowed_pipelines)
            .finish()
    }
}

pub struct Integrations<'c> {
    client: &'c BuddyClient,
}

fn integrations_path(domain: &str) -> ApiPath {
    api_path!("/workspaces/{}/integrations", encode_segment(domain))
}

fn integration_path(domain: &str, hash_id: &str) -> ApiPath {
    api_path!(
        "/workspaces/{}/integrations/{}",
        encode_segment(domain),
        encode_segment(hash_id)
    )
}

impl<'c> Integrations<'c> {
    #[must_use]
    pub fn new(client: &'c BuddyClient) -> Self {
        Self { client }
    }

    /// # Errors
    ///
    /// Any [`HttpError`] from the call.
    pub async fn create(
        &self,
        ctx: &CallContext,
        domain: &str,
        ops: &IntegrationOps,
    ) -> Result<(Integration, RawResponse), HttpError> {
        self.client.create(ctx, &integrations_path(domain), ops).await
    }

    /// # Errors
    ///
    /// Any [`HttpError`] from the call.
    pub async fn get(
        &self,
        ctx: &CallContext,
        domain: &str,
        hash_id: &str,
    ) -> Result<(Integration, RawResponse), HttpError> {
        self.client
            .get(ctx, &integration_path(domain, hash_id))
            .await
    }

    /// # Errors
    ///
    /// Any [`HttpError`] from the call.
    pub async fn update(
        &self,
        ctx: &CallContext,
        domain: &str,
        hash_id: &str,
        ops: &IntegrationOps,
    ) -> Result<(Integration, RawResponse), HttpError> {
        self.client
            .update(ctx, &integration_path(domain, hash_id), ops)
            .await
    }

    /// # Errors
    ///
    /// Any [`HttpError`]; a success status other than 204 is an error too.
    pub async fn delete(
        &self,
        ctx: &CallContext,
        domain: &str,
        hash_id: &str,
    ) -> Result<RawResponse, HttpError> {
        self.client
            .delete(ctx, &integration_path(domain, hash_id))
            .await
    }

    /// # Errors
    ///
    /// Any [`HttpError`] from the call.
    pub async fn list(
        &self,
        ctx: &CallContext,
        domain: &str,
    ) -> Result<(IntegrationList, RawResponse), HttpError> {
        self.client.get(ctx, &integrations_path(domain)).await
    }
}
